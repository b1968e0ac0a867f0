//! HTML5 Parser
//!
//! Streaming driver around html5ever. Chunks are tokenized as they arrive and
//! a microtask checkpoint runs after each one, so observers see parser-built
//! content in chunk-sized batches.

use std::fmt;

use arbor_dom::{DocumentKind, DomTree, NodeId};
use html5ever::driver::{ParseOpts, Parser};
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::TreeBuilderOpts;

use crate::ParseOutput;
use crate::adapter::{ParserAdapter, ParserOptions};
use crate::sink::HtmlSink;

/// Streaming HTML5 parser
pub struct HtmlParser {
    parser: Parser<HtmlSink>,
}

impl HtmlParser {
    /// Parser writing into a fresh HTML document
    pub fn new(options: ParserOptions) -> Self {
        let mut tree = DomTree::new();
        let document = tree.create_document(DocumentKind::Html);
        Self::with_tree(tree, document, options)
    }

    /// Parser writing into `document` of an existing tree
    ///
    /// Custom element definitions and observers already set up on the tree
    /// apply to the parsed content.
    pub fn with_tree(tree: DomTree, document: NodeId, options: ParserOptions) -> Self {
        tracing::debug!(?document, ?options, "Starting HTML parse");
        let opts = ParseOpts {
            tree_builder: TreeBuilderOpts {
                scripting_enabled: options.scripting_enabled,
                ..Default::default()
            },
            ..Default::default()
        };
        let sink = HtmlSink::new(ParserAdapter::new(tree, document, options));
        Self {
            parser: parse_document(sink, opts),
        }
    }

    fn sink(&self) -> &HtmlSink {
        &self.parser.tokenizer.sink.sink
    }

    /// Feed the next chunk of input
    pub fn feed(&mut self, chunk: &str) {
        tracing::trace!("Feeding {} bytes", chunk.len());
        self.parser.process(StrTendril::from(chunk));
        self.sink().adapter_mut().tree_mut().perform_microtask_checkpoint();
    }

    /// Run `f` against the tree between chunks
    pub fn with_tree_mut<T>(&self, f: impl FnOnce(&mut DomTree) -> T) -> T {
        f(self.sink().adapter_mut().tree_mut())
    }

    pub fn document(&self) -> NodeId {
        self.sink().adapter().create_document()
    }

    /// Flush the tokenizer and hand back the tree
    pub fn finish(self) -> ParseOutput {
        let output = self.parser.finish();
        tracing::debug!(
            "Parsed {} nodes with {} errors",
            output.tree.len(),
            output.errors.len()
        );
        output
    }

    /// Parse a complete string
    pub fn parse(self, html: &str) -> ParseOutput {
        let mut parser = self;
        parser.feed(html);
        parser.finish()
    }
}

impl fmt::Debug for HtmlParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlParser")
            .field("document", &self.document())
            .finish_non_exhaustive()
    }
}
