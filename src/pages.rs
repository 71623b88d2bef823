//! Page assembly — one reST document per documented page or module.
//!
//! Each generated document starts with an explicit target for the compound
//! id (page references rely on it), then the underlined title, the
//! formatted description, and any footnotes collected while formatting.

use crate::index::{Compound, DoxygenIndex};
use crate::rst::{self, BuildMode};
use crate::xml::Element;
use anyhow::{Context, Result};

/// A generated document, ready to be written out.
pub struct RenderedPage {
    pub file_name: String,
    pub content: String,
}

/// Render every page compound (except the index page, which links to
/// itself) and every namespace/module compound.
pub fn generate_all(
    index: &DoxygenIndex,
    mode: BuildMode,
    verbosity: u8,
) -> Result<Vec<RenderedPage>> {
    let mut pages = Vec::new();
    for compound in index.compounds() {
        let wanted = match compound.kind.as_str() {
            "page" => compound.id != "indexpage",
            "namespace" | "module" => true,
            _ => false,
        };
        if !wanted {
            continue;
        }
        if verbosity > 0 {
            eprintln!("doxyrst: generating {} ({})", compound.name, compound.kind);
        }
        let content = render_compound(compound, index, mode, verbosity)?;
        pages.push(RenderedPage {
            file_name: format!("{}.rst", compound.name.replace("::", ".")),
            content,
        });
    }
    Ok(pages)
}

/// Render a single compound to reST.
pub fn render_compound(
    compound: &Compound,
    index: &DoxygenIndex,
    mode: BuildMode,
    verbosity: u8,
) -> Result<String> {
    let title = match compound.kind.as_str() {
        "page" => compound
            .title
            .clone()
            .unwrap_or_else(|| compound.name.clone()),
        _ => format!("{} module reference", compound.name),
    };

    let mut lines: Vec<String> = Vec::new();
    if !compound.id.is_empty() {
        lines.push(format!(".. _{}:", compound.id));
        lines.push(String::new());
    }
    lines.push(title.clone());
    lines.push("=".repeat(title.chars().count()));
    lines.push(String::new());

    if let Some(desc) = description_of(&compound.root) {
        let page = rst::format_page(desc, index, mode, verbosity)
            .with_context(|| format!("failed to format {}", compound.name))?;
        lines.extend(page.lines);
        if !page.footnotes.is_empty() {
            lines.push(String::new());
            lines.extend(page.footnotes);
            lines.push(String::new());
        }
    }

    let mut content = lines.join("\n");
    content.push('\n');
    Ok(content)
}

/// The detailed description, falling back to the brief one when the
/// detailed block carries no content at all.
fn description_of(root: &Element) -> Option<&Element> {
    let detailed = root.find("detaileddescription");
    if let Some(d) = detailed {
        let has_text = d.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !d.children.is_empty() || has_text {
            return Some(d);
        }
    }
    root.find("briefdescription").or(detailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_str;

    fn sample_index() -> DoxygenIndex {
        DoxygenIndex::from_documents(vec![parse_str(
            r#"<doxygen>
                 <compounddef id="indexpage" kind="page">
                   <compoundname>index</compoundname>
                   <detaileddescription><para>toc</para></detaileddescription>
                 </compounddef>
                 <compounddef id="Specifics" kind="page">
                   <compoundname>Specifics</compoundname>
                   <title>Model specifics</title>
                   <detaileddescription>
                     <para>About the model.<latexonly>\footnote{fine print}</latexonly></para>
                   </detaileddescription>
                 </compounddef>
                 <compounddef id="namespaceocean_diag" kind="namespace">
                   <compoundname>ocean::diag</compoundname>
                   <briefdescription><para>Diagnostics.</para></briefdescription>
                   <detaileddescription></detaileddescription>
                 </compounddef>
               </doxygen>"#,
        )])
    }

    #[test]
    fn index_page_is_skipped() {
        let index = sample_index();
        let pages = generate_all(&index, BuildMode::Unset, 0).unwrap();
        assert!(pages.iter().all(|p| p.file_name != "index.rst"));
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn page_has_target_title_and_underline() {
        let index = sample_index();
        let page = render_compound(
            index.compound_by_name("Specifics").unwrap(),
            &index,
            BuildMode::Unset,
            0,
        )
        .unwrap();
        let lines: Vec<&str> = page.lines().collect();
        assert_eq!(lines[0], ".. _Specifics:");
        assert_eq!(lines[2], "Model specifics");
        assert_eq!(lines[3], "===============");
        assert!(lines.contains(&"About the model."));
    }

    #[test]
    fn footnotes_land_at_the_bottom() {
        let index = sample_index();
        let page = render_compound(
            index.compound_by_name("Specifics").unwrap(),
            &index,
            BuildMode::Latex,
            0,
        )
        .unwrap();
        let body = page.find("About the model.[#]_").unwrap();
        let note = page.find(".. [#] fine print").unwrap();
        assert!(note > body);
    }

    #[test]
    fn namespace_file_name_replaces_separators() {
        let index = sample_index();
        let pages = generate_all(&index, BuildMode::Unset, 0).unwrap();
        assert!(pages.iter().any(|p| p.file_name == "ocean.diag.rst"));
    }

    #[test]
    fn module_title_and_brief_fallback() {
        let index = sample_index();
        let page = render_compound(
            index.compound_by_name("ocean::diag").unwrap(),
            &index,
            BuildMode::Unset,
            0,
        )
        .unwrap();
        assert!(page.contains("ocean::diag module reference"));
        // detaileddescription is empty, so the brief one is used
        assert!(page.contains("Diagnostics."));
    }
}
