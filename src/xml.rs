//! # Score Tree
//!
//! A small owned element tree over `quick-xml`, holding the `.mscx` score
//! while the transforms rewrite it.
//!
//! ## Queries
//! Lookups follow the shape of the paths the transforms need:
//! - [`Element::children_of`] / [`Element::children_of_mut`] - every `child`
//!   whose parent is named `parent`, anywhere below the receiver (`.//Part/Staff`)
//! - [`Element::find_paths`] - the same matches as child-index paths, for
//!   inserting siblings next to a match
//! - [`Element::descendants`] - every element with a given name (`.//Note`)
//!
//! ## Formatting
//! Whitespace-only text between child elements is layout and is dropped on
//! parse, unless the parent also holds real text (`<text>My <b>Polka</b> <i>No 2</i></text>`),
//! in which case every text node is kept. [`serialize`] writes a fixed
//! `<?xml version="1.0" encoding="UTF-8"?>` header followed by the tree indented
//! by two spaces. Elements holding text are written without any added
//! whitespace, so mixed content survives a round trip unchanged.

use crate::error::{PaviaError, Result};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Child-index path from an ancestor down to one of its descendants.
pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// An element holding only text, e.g. `<pitch>60</pitch>`.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text.into()));
        element
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace the direct text content, keeping child elements.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|node| !matches!(node, Node::Text(_)));
        self.children.insert(0, Node::Text(text.into()));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Remove direct children named `name`, returning how many went.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, Node::Element(element) if element.name == name));
        before - self.children.len()
    }

    /// Remove every element named `name` below the receiver.
    pub fn remove_descendants(&mut self, name: &str) -> usize {
        let mut removed = self.remove_children(name);
        for child in self.elements_mut() {
            removed += child.remove_descendants(name);
        }
        removed
    }

    /// Every element named `name` below the receiver, in document order.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        collect_descendants(self, name, &mut found);
        found
    }

    /// Outermost elements named `name` below the receiver, in document order.
    pub fn descendants_mut<'a>(&'a mut self, name: &str) -> Vec<&'a mut Element> {
        let mut found = Vec::new();
        collect_descendants_mut(self, name, &mut found);
        found
    }

    /// Every `child` element whose parent is named `parent`.
    pub fn children_of<'a>(&'a self, parent: &str, child: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        collect_children(self, parent, child, &mut found);
        found
    }

    pub fn children_of_mut<'a>(&'a mut self, parent: &str, child: &str) -> Vec<&'a mut Element> {
        let mut found = Vec::new();
        collect_children_mut(self, parent, child, &mut found);
        found
    }

    /// Paths of the same matches as [`Element::children_of`].
    pub fn find_paths(&self, parent: &str, child: &str) -> Vec<Path> {
        let mut found = Vec::new();
        self.collect_paths(parent, child, &mut Vec::new(), &mut found);
        found
    }

    fn collect_paths(&self, parent: &str, child: &str, prefix: &mut Path, found: &mut Vec<Path>) {
        for (i, node) in self.children.iter().enumerate() {
            if let Node::Element(element) = node {
                prefix.push(i);
                if self.name == parent && element.name == child {
                    found.push(prefix.clone());
                } else {
                    element.collect_paths(parent, child, prefix, found);
                }
                prefix.pop();
            }
        }
    }

    pub fn at_path(&self, path: &[usize]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |element, &i| match element.children.get(i) {
                Some(Node::Element(child)) => Some(child),
                _ => None,
            })
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut element = self;
        for &i in path {
            element = match element.children.get_mut(i) {
                Some(Node::Element(child)) => child,
                _ => return None,
            };
        }
        Some(element)
    }

    /// Insert `sibling` right after the element at `path`.
    pub fn insert_after_path(&mut self, path: &[usize], sibling: Element) -> bool {
        let Some((&last, parent_path)) = path.split_last() else {
            return false;
        };
        match self.at_path_mut(parent_path) {
            Some(parent) if last < parent.children.len() => {
                parent.children.insert(last + 1, Node::Element(sibling));
                true
            }
            _ => false,
        }
    }

    pub fn remove_at_path(&mut self, path: &[usize]) -> Option<Node> {
        let (&last, parent_path) = path.split_last()?;
        let parent = self.at_path_mut(parent_path)?;
        (last < parent.children.len()).then(|| parent.children.remove(last))
    }

    /// Visit every outermost element named `name` and insert whatever `f`
    /// returns immediately before it, in order.
    pub fn insert_before_each<F>(&mut self, name: &str, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut Element) -> Result<Vec<Element>>,
    {
        let mut i = 0;
        while i < self.children.len() {
            let inserted = match &mut self.children[i] {
                Node::Element(child) if child.name == name => f(child)?,
                Node::Element(child) => {
                    child.insert_before_each(name, f)?;
                    Vec::new()
                }
                _ => Vec::new(),
            };
            let count = inserted.len();
            for (offset, element) in inserted.into_iter().enumerate() {
                self.children.insert(i + offset, Node::Element(element));
            }
            i += count + 1;
        }
        Ok(())
    }
}

fn collect_descendants<'a>(element: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    for child in element.elements() {
        if child.name == name {
            found.push(child);
        }
        collect_descendants(child, name, found);
    }
}

fn collect_descendants_mut<'a>(
    element: &'a mut Element,
    name: &str,
    found: &mut Vec<&'a mut Element>,
) {
    for child in element.elements_mut() {
        if child.name == name {
            found.push(child);
        } else {
            collect_descendants_mut(child, name, found);
        }
    }
}

fn collect_children<'a>(
    element: &'a Element,
    parent: &str,
    child: &str,
    found: &mut Vec<&'a Element>,
) {
    let is_parent = element.name == parent;
    for candidate in element.elements() {
        if is_parent && candidate.name == child {
            found.push(candidate);
        } else {
            collect_children(candidate, parent, child, found);
        }
    }
}

fn collect_children_mut<'a>(
    element: &'a mut Element,
    parent: &str,
    child: &str,
    found: &mut Vec<&'a mut Element>,
) {
    let is_parent = element.name == parent;
    for candidate in element.elements_mut() {
        if is_parent && candidate.name == child {
            found.push(candidate);
        } else {
            collect_children_mut(candidate, parent, child, found);
        }
    }
}

/// Parse a score member into its root element.
pub fn parse(bytes: &[u8]) -> Result<Element> {
    let source = std::str::from_utf8(bytes).map_err(|e| PaviaError::ParseError {
        position: e.valid_up_to(),
        message: e.to_string(),
    })?;
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let parse_error = |e: quick_xml::Error| PaviaError::ParseError {
            position,
            message: e.to_string(),
        };
        match reader.read_event().map_err(parse_error)? {
            Event::Start(start) => stack.push(element_from_start(&start).map_err(parse_error)?),
            Event::Empty(start) => {
                let element = element_from_start(&start).map_err(parse_error)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::End(_) => {
                let mut element = stack.pop().ok_or_else(|| PaviaError::ParseError {
                    position,
                    message: "closing tag without an open element".to_string(),
                })?;
                drop_layout_whitespace(&mut element);
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(parse_error)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    parent.children.push(Node::Text(text));
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&comment).into_owned();
                    parent.children.push(Node::Comment(text));
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(PaviaError::ParseError {
            position: reader.buffer_position(),
            message: format!("element <{}> is never closed", open.name),
        });
    }
    root.ok_or_else(|| PaviaError::ParseError {
        position: reader.buffer_position(),
        message: "document has no root element".to_string(),
    })
}

/// Blank text between child elements is indentation, unless the element
/// also carries real text.
fn drop_layout_whitespace(element: &mut Element) {
    let has_elements = element.elements().next().is_some();
    let has_text = element
        .children
        .iter()
        .any(|node| matches!(node, Node::Text(text) if !text.trim().is_empty()));
    if has_elements && !has_text {
        element.children.retain(|node| !matches!(node, Node::Text(_)));
    }
}

fn element_from_start(start: &BytesStart) -> std::result::Result<Element, quick_xml::Error> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: usize,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(PaviaError::ParseError {
                position,
                message: format!("second root element <{}>", element.name),
            })
        }
    }
    Ok(())
}

/// Serialize a tree with the declaration header and two-space indentation.
pub fn serialize(root: &Element) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_layout(&mut writer, 0)?;
    write_element(&mut writer, root, 0, true)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_layout(writer: &mut Writer<Vec<u8>>, depth: usize) -> Result<()> {
    let layout = format!("\n{}", "  ".repeat(depth));
    writer.write_event(Event::Text(BytesText::from_escaped(layout)))?;
    Ok(())
}

/// `indent` is false anywhere below an element that holds text.
fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    depth: usize,
    indent: bool,
) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    let indent = indent && !element.children.iter().any(|node| matches!(node, Node::Text(_)));
    for child in &element.children {
        if indent {
            write_layout(writer, depth + 1)?;
        }
        match child {
            Node::Element(child) => write_element(writer, child, depth + 1, indent)?,
            Node::Text(text) => {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?
            }
            Node::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?
            }
        }
    }
    if indent {
        write_layout(writer, depth)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<museScore version="4.20">
  <Score>
    <Part>
      <Staff id="1"/>
      <Staff id="2"/>
    </Part>
    <Staff id="1"><Measure/></Staff>
    <Staff id="2"><Measure/></Staff>
  </Score>
</museScore>
"#;

    #[test]
    fn test_parse_drops_blank_text() {
        let root = parse(SCORE.as_bytes()).unwrap();
        assert_eq!(root.name, "museScore");
        assert_eq!(root.attribute("version"), Some("4.20"));
        let score = root.first_child("Score").unwrap();
        assert_eq!(score.children.len(), 3);
        assert!(score.children.iter().all(|n| matches!(n, Node::Element(_))));
    }

    #[test]
    fn test_children_of_distinguishes_parents() {
        let root = parse(SCORE.as_bytes()).unwrap();
        assert_eq!(root.children_of("Part", "Staff").len(), 2);
        let score_staves = root.children_of("Score", "Staff");
        assert_eq!(score_staves.len(), 2);
        assert!(score_staves.iter().all(|s| s.first_child("Measure").is_some()));
        assert_eq!(root.descendants("Staff").len(), 4);
    }

    #[test]
    fn test_find_paths_matches_children_of() {
        let root = parse(SCORE.as_bytes()).unwrap();
        let paths = root.find_paths("Score", "Staff");
        assert_eq!(paths, vec![vec![0, 1], vec![0, 2]]);
        assert_eq!(root.at_path(&paths[1]).unwrap().attribute("id"), Some("2"));
    }

    #[test]
    fn test_insert_after_and_remove_path() {
        let mut root = parse(SCORE.as_bytes()).unwrap();
        let path = root.find_paths("Part", "Staff")[0].clone();
        assert!(root.insert_after_path(&path, Element::new("Staff").with_attribute("id", "9")));
        let ids: Vec<_> = root
            .children_of("Part", "Staff")
            .iter()
            .map(|s| s.attribute("id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "9", "2"]);
        assert!(root.remove_at_path(&path).is_some());
        assert_eq!(root.children_of("Part", "Staff").len(), 2);
    }

    #[test]
    fn test_insert_before_each_keeps_order() {
        let mut voice = Element::new("voice")
            .with_child(Element::new("Chord"))
            .with_child(Element::new("Rest"))
            .with_child(Element::new("Chord"));
        voice
            .insert_before_each("Chord", &mut |_: &mut Element| {
                Ok(vec![Element::new("StaffText")])
            })
            .unwrap();
        let names: Vec<_> = voice.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["StaffText", "Chord", "Rest", "StaffText", "Chord"]);
    }

    #[test]
    fn test_serialize_is_stable_and_escapes() {
        let root = Element::new("museScore").with_child(
            Element::new("Score").with_child(Element::with_text("text", "A & B\nC")),
        );
        let bytes = serialize(&root).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(text.contains("<text>A &amp; B\nC</text>"));
        let reparsed = parse(&bytes).unwrap();
        assert_eq!(reparsed, root);
        assert_eq!(serialize(&reparsed).unwrap(), bytes);
    }

    #[test]
    fn test_mixed_content_round_trips_unchanged() {
        let source = r#"<?xml version="1.0" encoding="UTF-8"?>
<museScore>
  <VBox>
    <Text>
      <style>title</style>
      <text><font size="20"/>My <b>Polka</b> <i>No 2</i></text>
    </Text>
    <Text>
      <text> </text>
    </Text>
  </VBox>
</museScore>
"#;
        let root = parse(source.as_bytes()).unwrap();
        let text = root.descendants("text")[0];
        let kinds: Vec<_> = text
            .children
            .iter()
            .map(|node| match node {
                Node::Element(e) => e.name.clone(),
                Node::Text(t) => format!("{t:?}"),
                Node::Comment(_) => "comment".to_string(),
            })
            .collect();
        assert_eq!(kinds, vec!["font", "\"My \"", "b", "\" \"", "i"]);
        assert_eq!(root.descendants("text")[1].text(), " ");
        assert_eq!(String::from_utf8(serialize(&root).unwrap()).unwrap(), source);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            parse(b"<museScore><Score></museScore>"),
            Err(PaviaError::ParseError { .. })
        ));
        assert!(matches!(parse(b""), Err(PaviaError::ParseError { .. })));
        assert!(matches!(parse(&[0xff, 0xfe]), Err(PaviaError::ParseError { .. })));
    }

    #[test]
    fn test_remove_descendants() {
        let mut chord = Element::new("Chord")
            .with_child(Element::new("Note").with_child(Element::with_text("play", "1")))
            .with_child(Element::new("Note"));
        assert_eq!(chord.remove_descendants("play"), 1);
        assert_eq!(chord.remove_descendants("Note"), 2);
        assert!(chord.children.is_empty());
    }
}
