//! Stream a document through the parser while a mutation observer and a
//! custom element definition watch the tree being built.
//!
//! Run with `RUST_LOG=debug` to see parser and reaction tracing.

use std::rc::Rc;

use anyhow::Result;
use arbor_dom::{
    CallbackKind, CustomElementConstructor, DefinitionOptions, DocumentKind, DomTree, LifecycleCallback,
    MutationObserverInit, MutationRecord, NodeId, ObserverId, ScriptError,
};
use arbor_html::{HtmlParser, ParserOptions};

struct Greeting;

impl CustomElementConstructor for Greeting {
    fn construct(&self, _tree: &mut DomTree, element: NodeId) -> Result<(), ScriptError> {
        println!("constructing x-greeting {element:?}");
        Ok(())
    }

    fn lifecycle_callbacks(&self) -> Vec<CallbackKind> {
        vec![CallbackKind::Connected]
    }

    fn callback(&self, tree: &mut DomTree, element: NodeId, callback: &LifecycleCallback) -> Result<(), ScriptError> {
        if matches!(callback, LifecycleCallback::Connected) {
            println!("x-greeting connected, says {:?}", tree.text_content(element));
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut tree = DomTree::new();
    let document = tree.create_document(DocumentKind::Html);
    tree.define("x-greeting", Rc::new(Greeting), DefinitionOptions::default())?;

    let observer = tree.create_mutation_observer(|tree: &mut DomTree, records: Vec<MutationRecord>, _: ObserverId| {
        for record in records {
            let target = tree
                .element(record.target)
                .map_or("#document", |e| e.local_name())
                .to_string();
            println!(
                "{} on {}: +{} -{}",
                record.mutation_type.as_str(),
                target,
                record.added_nodes.len(),
                record.removed_nodes.len()
            );
        }
        Ok::<_, ScriptError>(())
    });
    tree.observe(
        observer,
        document,
        MutationObserverInit {
            child_list: true,
            character_data: Some(true),
            subtree: true,
            ..Default::default()
        },
    )?;

    let mut parser = HtmlParser::with_tree(tree, document, ParserOptions::default());
    for chunk in [
        "<!DOCTYPE html><html><head><title>Arbor</title></head>",
        "<body><x-greeting>Hel",
        "lo</x-greeting><p>done</p></body></html>",
    ] {
        println!("-- chunk {chunk:?}");
        parser.feed(chunk);
    }

    let output = parser.finish();
    println!(
        "parsed {} nodes, {} parse errors",
        output.tree.len(),
        output.errors.len()
    );
    Ok(())
}
