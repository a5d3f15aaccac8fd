//! Minimal element tree over `quick-xml` events.
//!
//! Suite summaries are small, attribute-free documents, so the tree only keeps
//! element names, concatenated text, and children. Well-formedness is checked
//! here rather than left to the reader, so a truncated document is always
//! reported as an error instead of being silently accepted.

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

/// An XML element with its text content and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// First child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Every child with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child with the given name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }
}

/// Why a document is not well-formed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("unexpected end of document: <{0}> is not closed")]
    Unclosed(String),
    #[error("mismatched end tag at byte {position}: expected </{expected}>, found </{found}>")]
    Mismatch {
        expected: String,
        found: String,
        position: usize,
    },
    #[error("end tag </{name}> at byte {position} has no matching start tag")]
    UnexpectedEnd { name: String, position: usize },
    #[error("more than one root element (second root <{0}>)")]
    MultipleRoots(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("text outside the root element at byte {0}")]
    TextOutsideRoot(usize),
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    root: Option<Element>,
}

impl TreeBuilder {
    fn open(&mut self, name: String) -> Result<(), DocumentError> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(DocumentError::MultipleRoots(name));
        }
        self.stack.push(Element::named(name));
        Ok(())
    }

    fn close(&mut self, name: &str, position: usize) -> Result<(), DocumentError> {
        let Some(element) = self.stack.pop() else {
            return Err(DocumentError::UnexpectedEnd {
                name: name.to_owned(),
                position,
            });
        };
        if element.name != name {
            return Err(DocumentError::Mismatch {
                expected: element.name,
                found: name.to_owned(),
                position,
            });
        }
        self.attach(element);
        Ok(())
    }

    fn attach(&mut self, element: Element) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.root = Some(element),
        }
    }

    fn text(&mut self, text: &str, position: usize) -> Result<(), DocumentError> {
        match self.stack.last_mut() {
            Some(current) => {
                current.text.push_str(text);
                Ok(())
            }
            None if text.trim().is_empty() => Ok(()),
            None => Err(DocumentError::TextOutsideRoot(position)),
        }
    }

    fn finish(mut self) -> Result<Element, DocumentError> {
        if let Some(open) = self.stack.pop() {
            return Err(DocumentError::Unclosed(open.name));
        }
        self.root.ok_or(DocumentError::NoRoot)
    }
}

fn lossy_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parse `input` into an element tree.
///
/// # Errors
///
/// Returns [`DocumentError`] if the document is not well-formed: syntax
/// errors, unclosed or mismatched elements, several roots, or stray text.
pub fn parse_document(input: &str) -> Result<Element, DocumentError> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut builder = TreeBuilder::default();
    loop {
        let position = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(start) => builder.open(lossy_name(start.name().as_ref()))?,
            Event::Empty(empty) => {
                let name = lossy_name(empty.name().as_ref());
                builder.open(name.clone())?;
                builder.close(&name, position)?;
            }
            Event::End(end) => builder.close(&lossy_name(end.name().as_ref()), position)?,
            Event::Text(text) => builder.text(&text.unescape()?, position)?,
            Event::CData(cdata) => {
                builder.text(&String::from_utf8_lossy(&cdata.into_inner()), position)?;
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
        }
    }

    builder.finish()
}
