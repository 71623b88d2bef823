//! Owned XML element tree with the text/tail split the formatter relies on.
//!
//! Doxygen interleaves prose and inline markup freely:
//!
//! ```text
//! <para>this.text<ref>ref.text</ref>ref.tail<formula>…</formula>tail</para>
//! ```
//!
//! Character data belonging to an element is therefore split across its
//! children's tails in document order, and the formatter reassembles prose
//! by concatenating these fragments as it walks.

use anyhow::{Context, Result};
use std::io::Read;
use xml::reader::{ParserConfig, XmlEvent};

/// A single XML element, owned, immutable after parsing.
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Tag name (namespace prefixes are not used by Doxygen output).
    pub name: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    /// Character data before the first child.
    pub text: Option<String>,
    /// Character data between this element's close tag and the next sibling.
    pub tail: Option<String>,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given tag name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given tag name.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// The dispatch tag for this element.
    pub fn tag(&self) -> Tag {
        Tag::from_name(&self.name)
    }

    /// Recursive subtree text: element text, then each child's flattened
    /// text and tail, space-separated. Used for program listings and
    /// inline literals where markup is dropped but all words survive.
    pub fn flatten(&self) -> String {
        let mut t = String::new();
        if let Some(ref text) = self.text {
            t.push_str(text);
        }
        for child in &self.children {
            t.push(' ');
            t.push_str(&child.flatten());
            if let Some(ref tail) = child.tail {
                t.push(' ');
                t.push_str(tail);
            }
        }
        t
    }
}

/// Closed enumeration of the Doxygen tags the formatter and index have
/// rules for. Everything else maps to `Other` and takes the generic
/// child-recursion arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Para,
    Ref,
    Ulink,
    Emphasis,
    Bold,
    ComputerOutput,
    Preformatted,
    ProgramListing,
    Verbatim,
    Superscript,
    Subscript,
    Formula,
    Table,
    Row,
    Entry,
    ItemizedList,
    OrderedList,
    ListItem,
    ParameterList,
    ParameterName,
    ParameterDescription,
    SimpleSect,
    Sect1,
    Sect2,
    Sect3,
    Sect4,
    Title,
    XrefSect,
    XrefTitle,
    XrefDescription,
    Image,
    Anchor,
    HtmlOnly,
    LatexOnly,
    CompoundDef,
    MemberDef,
    EnumValue,
    CompoundName,
    Name,
    Other,
}

impl Tag {
    pub fn from_name(name: &str) -> Tag {
        match name {
            "para" => Tag::Para,
            "ref" => Tag::Ref,
            "ulink" => Tag::Ulink,
            "emphasis" => Tag::Emphasis,
            "bold" => Tag::Bold,
            "computeroutput" => Tag::ComputerOutput,
            "preformatted" => Tag::Preformatted,
            "programlisting" => Tag::ProgramListing,
            "verbatim" => Tag::Verbatim,
            "superscript" => Tag::Superscript,
            "subscript" => Tag::Subscript,
            "formula" => Tag::Formula,
            "table" => Tag::Table,
            "row" => Tag::Row,
            "entry" => Tag::Entry,
            "itemizedlist" => Tag::ItemizedList,
            "orderedlist" => Tag::OrderedList,
            "listitem" => Tag::ListItem,
            "parameterlist" => Tag::ParameterList,
            "parametername" => Tag::ParameterName,
            "parameterdescription" => Tag::ParameterDescription,
            "simplesect" => Tag::SimpleSect,
            "sect1" => Tag::Sect1,
            "sect2" => Tag::Sect2,
            "sect3" => Tag::Sect3,
            "sect4" => Tag::Sect4,
            "title" => Tag::Title,
            "xrefsect" => Tag::XrefSect,
            "xreftitle" => Tag::XrefTitle,
            "xrefdescription" => Tag::XrefDescription,
            "image" => Tag::Image,
            "anchor" => Tag::Anchor,
            "htmlonly" => Tag::HtmlOnly,
            "latexonly" => Tag::LatexOnly,
            "compounddef" => Tag::CompoundDef,
            "memberdef" => Tag::MemberDef,
            "enumvalue" => Tag::EnumValue,
            "compoundname" => Tag::CompoundName,
            "name" => Tag::Name,
            _ => Tag::Other,
        }
    }
}

/// Parse a whole XML document into its root element.
///
/// Whitespace is preserved (it is significant inside preformatted blocks
/// and between inline elements) and CDATA sections fold into ordinary
/// character data.
pub fn parse_document<R: Read>(reader: R) -> Result<Element> {
    let parser = ParserConfig::new()
        .trim_whitespace(false)
        .whitespace_to_characters(true)
        .cdata_to_characters(true)
        .create_reader(reader);

    let mut stack: Vec<Element> = Vec::new();

    for event in parser {
        match event.context("malformed XML")? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                stack.push(Element {
                    name: name.local_name,
                    attrs: attributes
                        .into_iter()
                        .map(|a| (a.name.local_name, a.value))
                        .collect(),
                    ..Element::default()
                });
            }
            XmlEvent::Characters(data) => {
                // Text before the first child belongs to the open element;
                // anything later is the tail of its most recent child.
                if let Some(open) = stack.last_mut() {
                    match open.children.last_mut() {
                        Some(last) => append(&mut last.tail, &data),
                        None => append(&mut open.text, &data),
                    }
                }
            }
            XmlEvent::EndElement { .. } => {
                let Some(done) = stack.pop() else {
                    anyhow::bail!("unbalanced end tag");
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return Ok(done),
                }
            }
            _ => {}
        }
    }

    anyhow::bail!("document contained no root element")
}

fn append(slot: &mut Option<String>, data: &str) {
    match slot {
        Some(s) => s.push_str(data),
        None => *slot = Some(data.to_string()),
    }
}

#[cfg(test)]
pub(crate) fn parse_str(s: &str) -> Element {
    parse_document(s.as_bytes()).unwrap()
}
