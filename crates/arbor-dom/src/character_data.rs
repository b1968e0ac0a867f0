//! Character Data
//!
//! Text and comment editing. Offsets and counts are in UTF-16 code units.

use crate::node::NodeData;
use crate::observer::MutationType;
use crate::{DomError, DomResult, DomTree, NodeId};

/// Byte index of a UTF-16 offset
///
/// An offset inside a surrogate pair resolves to the start of that character.
fn byte_index(s: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    for (index, c) in s.char_indices() {
        if units + c.len_utf16() > utf16_offset {
            return index;
        }
        units += c.len_utf16();
    }
    s.len()
}

fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

impl DomTree {
    /// Data of a text or comment node
    pub fn data(&self, node: NodeId) -> Option<&str> {
        self.get(node)?.character_data()
    }

    /// Length in UTF-16 code units
    pub fn data_length(&self, node: NodeId) -> usize {
        self.data(node).map(utf16_len).unwrap_or(0)
    }

    fn expect_character_data(&self, node: NodeId) -> DomResult<&str> {
        self.data(node).ok_or(DomError::InvalidState("node is not a text or comment node"))
    }

    pub fn set_data(&mut self, node: NodeId, data: &str) -> DomResult<()> {
        let length = utf16_len(self.expect_character_data(node)?);
        self.replace_data(node, 0, length, data)
    }

    pub fn append_data(&mut self, node: NodeId, data: &str) -> DomResult<()> {
        let length = utf16_len(self.expect_character_data(node)?);
        self.replace_data(node, length, 0, data)
    }

    pub fn insert_data(&mut self, node: NodeId, offset: usize, data: &str) -> DomResult<()> {
        self.replace_data(node, offset, 0, data)
    }

    pub fn delete_data(&mut self, node: NodeId, offset: usize, count: usize) -> DomResult<()> {
        self.replace_data(node, offset, count, "")
    }

    /// Replace `count` code units at `offset` with `data`
    ///
    /// `count` is clamped to the end of the data; an `offset` past the end
    /// fails with an index size error.
    pub fn replace_data(&mut self, node: NodeId, offset: usize, count: usize, data: &str) -> DomResult<()> {
        let current = self.expect_character_data(node)?;
        let length = utf16_len(current);
        if offset > length {
            return Err(DomError::IndexSize { offset, length });
        }
        let count = count.min(length - offset);

        let start = byte_index(current, offset);
        let end = byte_index(current, offset + count);
        let old_value = current.to_string();
        let mut new_value = String::with_capacity(old_value.len() - (end - start) + data.len());
        new_value.push_str(&old_value[..start]);
        new_value.push_str(data);
        new_value.push_str(&old_value[end..]);

        self.queue_mutation_record(
            MutationType::CharacterData,
            node,
            None,
            None,
            Some(&old_value),
            Vec::new(),
            Vec::new(),
            None,
            None,
        );

        if let NodeData::Text(s) | NodeData::Comment(s) = &mut self.node_mut(node).data {
            *s = new_value;
        }
        Ok(())
    }

    /// Data of `count` code units at `offset`
    pub fn substring_data(&self, node: NodeId, offset: usize, count: usize) -> DomResult<String> {
        let current = self.expect_character_data(node)?;
        let length = utf16_len(current);
        if offset > length {
            return Err(DomError::IndexSize { offset, length });
        }
        let start = byte_index(current, offset);
        let end = byte_index(current, offset + count.min(length - offset));
        Ok(current[start..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentKind;

    #[test]
    fn test_byte_index_counts_utf16_units() {
        let s = "a\u{1F600}b";
        assert_eq!(byte_index(s, 0), 0);
        assert_eq!(byte_index(s, 1), 1);
        assert_eq!(byte_index(s, 3), 5);
        assert_eq!(byte_index(s, 4), 6);
        assert_eq!(utf16_len(s), 4);
    }

    #[test]
    fn test_edit_text() {
        let mut tree = DomTree::new();
        let doc = tree.create_document(DocumentKind::Html);
        let text = tree.create_text_node(doc, "hello");

        tree.append_data(text, " world").unwrap();
        assert_eq!(tree.data(text), Some("hello world"));

        tree.replace_data(text, 0, 5, "goodbye").unwrap();
        assert_eq!(tree.data(text), Some("goodbye world"));

        tree.delete_data(text, 7, 100).unwrap();
        assert_eq!(tree.data(text), Some("goodbye"));

        tree.insert_data(text, 0, ">").unwrap();
        assert_eq!(tree.substring_data(text, 0, 2).unwrap(), ">g");
        assert_eq!(tree.data_length(text), 8);
    }

    #[test]
    fn test_offset_past_end() {
        let mut tree = DomTree::new();
        let doc = tree.create_document(DocumentKind::Html);
        let comment = tree.create_comment(doc, "abc");

        assert_eq!(
            tree.replace_data(comment, 4, 0, "x"),
            Err(DomError::IndexSize { offset: 4, length: 3 })
        );
        tree.set_data(comment, "xyz").unwrap();
        assert_eq!(tree.data(comment), Some("xyz"));
    }

    #[test]
    fn test_element_has_no_data() {
        let mut tree = DomTree::new();
        let doc = tree.create_document(DocumentKind::Html);
        let div = tree.create_element(doc, "div", Default::default()).unwrap();
        assert!(matches!(tree.set_data(div, "x"), Err(DomError::InvalidState(_))));
    }
}
