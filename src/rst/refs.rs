//! Cross-reference resolution against the symbol index.
//!
//! A `ref` node carries a target id and display text. The id is looked up
//! in the index and the reference is rendered according to what it points
//! at: members and compounds get a semantic role with the fully-qualified
//! name as the link target, pages get a `:ref:` against the page id,
//! Doxygen-processed citations get `:cite:`, section anchors get `:ref:`,
//! and ids missing from the index degrade to a plain reference on the
//! assumption they are same-document section labels. Anything else is an
//! unsupported construct and fails the build: a silently mis-resolved
//! reference in technical documentation is worse than a visible error.

use super::{node_text, FormatError, Formatter};
use crate::index::TargetNode;
use crate::xml::Element;

/// Ids of Doxygen-processed citations embed the citation key.
const CITATION_MARKER: &str = "_1CITEREF_";

/// Doxygen separates a page name from an anchor name with `_1`.
const ANCHOR_INFIX: &str = "_1";

impl<'a> Formatter<'a> {
    pub(super) fn visit_ref(&mut self, node: &Element) -> Result<(), FormatError> {
        let refid = node.attr("refid").unwrap_or("");
        let display = node_text(node).to_string();

        // Citation ids win regardless of what they resolve to.
        if let Some(pos) = refid.find(CITATION_MARKER) {
            let role = format!(":cite:`{}`", &refid[pos + CITATION_MARKER.len()..]);
            self.current().push_str(&role);
            return Ok(());
        }

        let index = self.index;
        let Some(target) = index.target(refid) else {
            self.trace(&format!("unresolved reference id \"{}\"", refid));
            let role = format!("`{}`_", display);
            self.current().push_str(&role);
            return Ok(());
        };

        // File references are not linkable in the target format.
        if target.kind.as_deref() == Some("file") {
            let literal = format!("``{}``", display);
            self.current().push_str(&literal);
            return Ok(());
        }

        let real_name = match &target.node {
            TargetNode::Member => match (&target.compound, &target.name) {
                (Some(compound), Some(name)) => Some(format!("{}::{}", compound, name)),
                (_, name) => name.clone(),
            },
            TargetNode::Compound if target.kind.as_deref() == Some("page") => {
                // The page generator plants a matching target at the top of
                // every page, so the bare page id is referenceable.
                let role = format!(":ref:`{}`", refid);
                self.current().push_str(&role);
                return Ok(());
            }
            TargetNode::Compound | TargetNode::EnumValue => target.name.clone(),
            TargetNode::Anchor | TargetNode::Section => {
                return self.section_ref(refid, &display, &target.node)
            }
            TargetNode::Other(tag) => {
                return Err(FormatError::UnsupportedConstruct {
                    tag: tag.clone(),
                    id: refid.to_string(),
                })
            }
        };

        let mut role = format!(":cpp:any:`{}", display);
        match real_name {
            Some(name) if !name.is_empty() => {
                role.push_str(" <");
                role.push_str(&name);
                role.push_str(">`");
            }
            _ => role.push('`'),
        }
        self.current().push_str(&role);
        Ok(())
    }

    /// An anchor or section target. The display text is only shown when it
    /// adds something beyond the anchor name embedded in the id.
    fn section_ref(
        &mut self,
        refid: &str,
        display: &str,
        target: &TargetNode,
    ) -> Result<(), FormatError> {
        match refid.find(ANCHOR_INFIX) {
            Some(pos) => {
                let tail = &refid[pos + ANCHOR_INFIX.len()..];
                let role = if display.is_empty() || display == tail {
                    format!(":ref:`{}`", refid)
                } else {
                    format!(":ref:`{} <{}>`", display, refid)
                };
                self.current().push_str(&role);
                Ok(())
            }
            // An anchor-shaped target whose id encodes neither a citation
            // nor a section: no rule, and guessing would mislink.
            None => Err(FormatError::UnsupportedConstruct {
                tag: target.tag_name().to_string(),
                id: refid.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{format_description, BuildMode, FormatError};
    use crate::index::DoxygenIndex;
    use crate::xml::parse_str;

    fn sample_index() -> DoxygenIndex {
        DoxygenIndex::from_documents(vec![parse_str(
            r#"<doxygen>
                 <compounddef id="classgeom_grid" kind="class">
                   <compoundname>geom::Grid</compoundname>
                   <sectiondef>
                     <memberdef id="classgeom_grid_1a12" kind="function">
                       <name>spacing</name>
                     </memberdef>
                     <memberdef id="classgeom_grid_1enum" kind="enum">
                       <name>Staggering</name>
                       <enumvalue id="classgeom_grid_1ev0"><name>ARAKAWA_C</name></enumvalue>
                     </memberdef>
                   </sectiondef>
                 </compounddef>
                 <compounddef id="grid_8h" kind="file">
                   <compoundname>grid.h</compoundname>
                 </compounddef>
                 <compounddef id="Specifics" kind="page">
                   <compoundname>Specifics</compoundname>
                   <title>Model specifics</title>
                   <detaileddescription>
                     <para>
                       <anchor id="Specifics_1notes"/>
                       <anchor id="oddanchor"/>
                     </para>
                     <sect1 id="Specifics_1overview"><title>Overview</title></sect1>
                   </detaileddescription>
                 </compounddef>
               </doxygen>"#,
        )])
    }

    fn fmt(xml: &str) -> Result<Vec<String>, FormatError> {
        let index = sample_index();
        let node = parse_str(xml);
        format_description(&node, &index, BuildMode::Unset, 0)
    }

    #[test]
    fn member_ref_qualifies_with_compound() {
        let lines =
            fmt(r#"<d><para><ref refid="classgeom_grid_1a12" kindref="member">spacing()</ref></para></d>"#)
                .unwrap();
        assert_eq!(lines[0], ":cpp:any:`spacing() <geom::Grid::spacing>`");
    }

    #[test]
    fn compound_ref_uses_its_own_name() {
        let lines =
            fmt(r#"<d><para><ref refid="classgeom_grid" kindref="compound">Grid</ref></para></d>"#)
                .unwrap();
        assert_eq!(lines[0], ":cpp:any:`Grid <geom::Grid>`");
    }

    #[test]
    fn enum_value_ref_resolves() {
        let lines =
            fmt(r#"<d><para><ref refid="classgeom_grid_1ev0">C grid</ref></para></d>"#).unwrap();
        assert_eq!(lines[0], ":cpp:any:`C grid <ARAKAWA_C>`");
    }

    #[test]
    fn page_ref_targets_page_id() {
        let lines =
            fmt(r#"<d><para><ref refid="Specifics" kindref="compound">specifics</ref></para></d>"#)
                .unwrap();
        assert_eq!(lines[0], ":ref:`Specifics`");
    }

    #[test]
    fn file_ref_is_inline_literal() {
        let lines = fmt(r#"<d><para><ref refid="grid_8h">grid.h</ref></para></d>"#).unwrap();
        assert_eq!(lines[0], "``grid.h``");
    }

    #[test]
    fn citation_id_strips_through_marker() {
        let lines =
            fmt(r#"<d><para><ref refid="Refs_1CITEREF_smith99">[1]</ref></para></d>"#).unwrap();
        assert_eq!(lines[0], ":cite:`smith99`");
    }

    #[test]
    fn bare_citation_id_works_without_index_entry() {
        let lines = fmt(r#"<d><para><ref refid="_1CITEREF_foo">[2]</ref></para></d>"#).unwrap();
        assert_eq!(lines[0], ":cite:`foo`");
    }

    #[test]
    fn anchor_ref_with_matching_text_is_bare() {
        let lines =
            fmt(r#"<d><para><ref refid="Specifics_1notes">notes</ref></para></d>"#).unwrap();
        assert_eq!(lines[0], ":ref:`Specifics_1notes`");
    }

    #[test]
    fn anchor_ref_with_custom_text_shows_label() {
        let lines =
            fmt(r#"<d><para><ref refid="Specifics_1notes">the notes</ref></para></d>"#).unwrap();
        assert_eq!(lines[0], ":ref:`the notes <Specifics_1notes>`");
    }

    #[test]
    fn section_ref_resolves_like_anchor() {
        let lines =
            fmt(r#"<d><para><ref refid="Specifics_1overview"></ref></para></d>"#).unwrap();
        assert_eq!(lines[0], ":ref:`Specifics_1overview`");
    }

    #[test]
    fn unknown_id_degrades_to_plain_reference() {
        let lines = fmt(r#"<d><para><ref refid="nowhere">General Coordinate</ref></para></d>"#)
            .unwrap();
        assert_eq!(lines[0], "`General Coordinate`_");
    }

    #[test]
    fn malformed_anchor_id_is_unsupported() {
        let err = fmt(r#"<d><para><ref refid="oddanchor">odd</ref></para></d>"#).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnsupportedConstruct { ref tag, .. } if tag == "anchor"
        ));
    }

    #[test]
    fn unclassifiable_target_is_unsupported() {
        // sectiondef ids are indexed but have no reference rule
        let index = DoxygenIndex::from_documents(vec![parse_str(
            r#"<doxygen><compounddef id="c" kind="class">
                 <compoundname>C</compoundname>
                 <sectiondef id="secdef"><memberdef id="m"><name>f</name></memberdef></sectiondef>
               </compounddef></doxygen>"#,
        )]);
        let node = parse_str(r#"<d><para><ref refid="secdef">x</ref></para></d>"#);
        let err = format_description(&node, &index, BuildMode::Unset, 0).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnsupportedConstruct { ref tag, .. } if tag == "sectiondef"
        ));
    }

    #[test]
    fn ref_tail_text_follows_the_role() {
        let lines = fmt(
            r#"<d><para>see <ref refid="classgeom_grid_1a12">spacing()</ref> for details.</para></d>"#,
        )
        .unwrap();
        assert_eq!(
            lines[1],
            "see :cpp:any:`spacing() <geom::Grid::spacing>` for details."
        );
    }
}
