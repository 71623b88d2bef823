//! Doxygen symbol index — every compound XML file, loaded once per run.
//!
//! Cross-references in Doxygen output point at element ids that can live in
//! any compound file, so the whole tree is read up front and queried through
//! a precomputed id table. The index is immutable after construction and is
//! borrowed by every formatter instance.

use crate::xml::{self, Element, Tag};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// What kind of element a reference target resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetNode {
    Member,
    Compound,
    EnumValue,
    Anchor,
    Section,
    Other(String),
}

impl TargetNode {
    /// The XML tag name this classification came from, for error reports.
    pub fn tag_name(&self) -> &str {
        match self {
            TargetNode::Member => "memberdef",
            TargetNode::Compound => "compounddef",
            TargetNode::EnumValue => "enumvalue",
            TargetNode::Anchor => "anchor",
            TargetNode::Section => "sect",
            TargetNode::Other(name) => name,
        }
    }
}

/// Everything reference resolution needs to know about a target, computed
/// once at load time so lookups never re-walk the tree.
#[derive(Debug, Clone)]
pub struct RefTarget {
    pub node: TargetNode,
    /// The element's kind attribute (namespace, page, file, …).
    pub kind: Option<String>,
    /// The element's own name (`<name>` or `<compoundname>` text).
    pub name: Option<String>,
    /// Name of the enclosing compound, for qualifying members.
    pub compound: Option<String>,
}

/// A documented compound retained for page generation.
pub struct Compound {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub title: Option<String>,
    /// The compounddef element, owned.
    pub root: Element,
}

/// The loaded symbol database.
#[derive(Default)]
pub struct DoxygenIndex {
    targets: HashMap<String, RefTarget>,
    compounds: Vec<Compound>,
}

impl DoxygenIndex {
    /// Load every compound file in a Doxygen XML output directory.
    ///
    /// `index.xml` (root tag `doxygenindex`) is a table of contents that
    /// duplicates ids from the compound files, so it is skipped.
    pub fn load(dir: &Path) -> Result<DoxygenIndex> {
        let pattern = dir.join("*.xml");
        let pattern = pattern.to_string_lossy();

        let mut index = DoxygenIndex::default();
        let mut seen = 0usize;
        for entry in glob::glob(&pattern)
            .with_context(|| format!("invalid xml directory: {}", dir.display()))?
        {
            let path = entry?;
            let file = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let root = xml::parse_document(BufReader::new(file))
                .with_context(|| format!("failed to parse {}", path.display()))?;
            if root.name == "doxygenindex" {
                continue;
            }
            index.absorb(root);
            seen += 1;
        }

        if seen == 0 {
            anyhow::bail!("no compound XML files found in {}", dir.display());
        }
        Ok(index)
    }

    /// Build an index from already-parsed documents.
    #[cfg(test)]
    pub fn from_documents(documents: Vec<Element>) -> DoxygenIndex {
        let mut index = DoxygenIndex::default();
        for root in documents {
            index.absorb(root);
        }
        index
    }

    /// Look up a reference target by element id.
    pub fn target(&self, id: &str) -> Option<&RefTarget> {
        self.targets.get(id)
    }

    /// All compounds, in load order.
    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    /// Find a compound by its fully-qualified name.
    pub fn compound_by_name(&self, name: &str) -> Option<&Compound> {
        self.compounds.iter().find(|c| c.name == name)
    }

    /// Register one parsed document (a `<doxygen>` root holding one or more
    /// compounddef elements).
    fn absorb(&mut self, root: Element) {
        for child in root.children {
            if child.tag() == Tag::CompoundDef {
                self.absorb_compound(child);
            }
        }
    }

    fn absorb_compound(&mut self, compound: Element) {
        let name = compound
            .find("compoundname")
            .and_then(|n| n.text.clone())
            .unwrap_or_default();
        let kind = compound.attr("kind").unwrap_or("").to_string();
        let title = compound.find("title").and_then(|t| t.text.clone());

        if let Some(id) = compound.attr("id") {
            self.targets.insert(
                id.to_string(),
                RefTarget {
                    node: TargetNode::Compound,
                    kind: compound.attr("kind").map(str::to_string),
                    name: Some(name.clone()),
                    compound: None,
                },
            );
        }
        for child in &compound.children {
            self.collect(child, &name);
        }

        self.compounds.push(Compound {
            id: compound.attr("id").unwrap_or("").to_string(),
            kind,
            name,
            title,
            root: compound,
        });
    }

    /// One recursive walk per compound picks up every element a `ref` node
    /// might point at.
    fn collect(&mut self, el: &Element, compound_name: &str) {
        if let Some(id) = el.attr("id") {
            let target = match el.tag() {
                Tag::MemberDef => Some(RefTarget {
                    node: TargetNode::Member,
                    kind: el.attr("kind").map(str::to_string),
                    name: el.find("name").and_then(|n| n.text.clone()),
                    compound: Some(compound_name.to_string()),
                }),
                Tag::EnumValue => Some(RefTarget {
                    node: TargetNode::EnumValue,
                    kind: None,
                    name: el.find("name").and_then(|n| n.text.clone()),
                    compound: Some(compound_name.to_string()),
                }),
                Tag::Anchor => Some(RefTarget {
                    node: TargetNode::Anchor,
                    kind: None,
                    name: None,
                    compound: Some(compound_name.to_string()),
                }),
                Tag::Sect1 | Tag::Sect2 | Tag::Sect3 | Tag::Sect4 => Some(RefTarget {
                    node: TargetNode::Section,
                    kind: None,
                    name: el.find("title").and_then(|t| t.text.clone()),
                    compound: Some(compound_name.to_string()),
                }),
                Tag::CompoundDef => None, // handled by absorb_compound
                // Anything else with an id can still be the target of a
                // ref node; resolution reports it as unsupported.
                _ => Some(RefTarget {
                    node: TargetNode::Other(el.name.clone()),
                    kind: el.attr("kind").map(str::to_string),
                    name: None,
                    compound: Some(compound_name.to_string()),
                }),
            };
            if let Some(target) = target {
                // First match wins; duplicate ids are not expected.
                self.targets.entry(id.to_string()).or_insert(target);
            }
        }
        for child in &el.children {
            self.collect(child, compound_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_str;

    fn sample() -> DoxygenIndex {
        DoxygenIndex::from_documents(vec![parse_str(
            r#"<doxygen>
                 <compounddef id="classgeom" kind="class">
                   <compoundname>geom::Grid</compoundname>
                   <sectiondef>
                     <memberdef id="classgeom_1a12" kind="function">
                       <name>spacing</name>
                     </memberdef>
                   </sectiondef>
                 </compounddef>
                 <compounddef id="Specifics" kind="page">
                   <compoundname>Specifics</compoundname>
                   <title>Model specifics</title>
                   <detaileddescription>
                     <sect1 id="Specifics_1overview"><title>Overview</title></sect1>
                     <para><anchor id="Specifics_1CITEREF_smith99"/></para>
                   </detaileddescription>
                 </compounddef>
               </doxygen>"#,
        )])
    }

    #[test]
    fn member_target_carries_enclosing_compound() {
        let index = sample();
        let t = index.target("classgeom_1a12").unwrap();
        assert_eq!(t.node, TargetNode::Member);
        assert_eq!(t.name.as_deref(), Some("spacing"));
        assert_eq!(t.compound.as_deref(), Some("geom::Grid"));
    }

    #[test]
    fn compound_target_by_id() {
        let index = sample();
        let t = index.target("Specifics").unwrap();
        assert_eq!(t.node, TargetNode::Compound);
        assert_eq!(t.kind.as_deref(), Some("page"));
    }

    #[test]
    fn sections_and_anchors_are_indexed() {
        let index = sample();
        assert_eq!(
            index.target("Specifics_1overview").unwrap().node,
            TargetNode::Section
        );
        assert_eq!(
            index.target("Specifics_1CITEREF_smith99").unwrap().node,
            TargetNode::Anchor
        );
    }

    #[test]
    fn compounds_retained_for_page_generation() {
        let index = sample();
        assert_eq!(index.compounds().len(), 2);
        let page = index.compound_by_name("Specifics").unwrap();
        assert_eq!(page.title.as_deref(), Some("Model specifics"));
        assert!(page.root.find("detaileddescription").is_some());
    }

    #[test]
    fn unknown_id_is_absent() {
        assert!(sample().target("nope").is_none());
    }
}
