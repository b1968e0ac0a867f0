//! Arbor HTML Parser
//!
//! Streaming HTML5 parsing into an Arbor DOM tree, built on html5ever.
//! Tree construction goes through [`ParserAdapter`], so custom element
//! reactions and mutation observers behave as they do for script edits.

mod adapter;
mod parser;
mod sink;

pub use adapter::{ParserAdapter, ParserAttribute, ParserOptions};
pub use parser::HtmlParser;
pub use sink::{HtmlSink, SinkHandle};

use arbor_dom::{DomError, DomTree, NodeId};

/// Parse a complete HTML document with default options
pub fn parse(html: &str) -> ParseOutput {
    HtmlParser::new(ParserOptions::default()).parse(html)
}

/// Result of parsing HTML
#[derive(Debug)]
pub struct ParseOutput {
    pub tree: DomTree,
    pub document: NodeId,
    pub errors: Vec<ParseError>,
}

/// Non-fatal problem found while parsing
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Tree construction error: {0}")]
    Tree(#[from] DomError),
}
