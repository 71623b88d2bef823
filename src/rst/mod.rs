//! XML-to-reStructuredText formatting engine.
//!
//! A recursive, stateful walk over a Doxygen description subtree. Each
//! element kind has a formatting rule; unknown elements recurse into their
//! children so prose embedded anywhere still comes out. The walker carries
//! a line buffer, a continuation flag for run-on inline text, a queue of
//! pending math labels, the build mode, and a list nesting depth. Later
//! nodes' output depends on exactly what was emitted before them, so the
//! walk is strictly sequential.

mod math;
mod refs;
mod table;

use crate::index::DoxygenIndex;
use crate::xml::{Element, Tag};
use anyhow::anyhow;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Target output flavor. Conditional content (`htmlonly`/`latexonly`
/// segments, typed images) is gated on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    Html,
    Latex,
    LatexPdf,
    #[default]
    Unset,
}

impl BuildMode {
    pub fn from_name(name: &str) -> anyhow::Result<BuildMode> {
        match name {
            "html" => Ok(BuildMode::Html),
            "latex" => Ok(BuildMode::Latex),
            "latexpdf" => Ok(BuildMode::LatexPdf),
            _ => Err(anyhow!(
                "unknown build mode: {}. Use html, latex, or latexpdf",
                name
            )),
        }
    }

    fn is_latex(self) -> bool {
        matches!(self, BuildMode::Latex | BuildMode::LatexPdf)
    }
}

/// Formatting failure. Unresolved references degrade gracefully and are
/// not errors; a recognized element whose shape has no rule is, since
/// silently misrendering technical documentation is worse than a build
/// failure.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported construct: <{tag}> referenced by id \"{id}\"")]
    UnsupportedConstruct { tag: String, id: String },
}

/// Output of a page-level format: the reST body plus footnote directives
/// collected from anywhere in the page (including table cells and
/// admonition bodies).
pub struct PageText {
    pub lines: Vec<String>,
    pub footnotes: Vec<String>,
}

/// Format a description subtree (typically a `detaileddescription`) into
/// reST lines. Trailing whitespace is stripped from every line.
pub fn format_description(
    node: &Element,
    index: &DoxygenIndex,
    mode: BuildMode,
    verbosity: u8,
) -> Result<Vec<String>, FormatError> {
    let mut fmt = Formatter::new(index, mode, verbosity);
    fmt.generic_visit(node)?;
    let (lines, _) = fmt.finish();
    Ok(rstrip_all(lines))
}

/// Format a page-level subtree, additionally returning collected
/// footnotes for the caller to append at the bottom of the page.
pub fn format_page(
    node: &Element,
    index: &DoxygenIndex,
    mode: BuildMode,
    verbosity: u8,
) -> Result<PageText, FormatError> {
    let mut fmt = Formatter::new(index, mode, verbosity);
    fmt.generic_visit(node)?;
    let (lines, footnotes) = fmt.finish();
    Ok(PageText {
        lines: rstrip_all(lines),
        footnotes,
    })
}

fn rstrip_all(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim_end().to_string())
        .collect()
}

fn node_text(node: &Element) -> &str {
    node.text.as_deref().unwrap_or("")
}

// Inline escape commands recognized inside mode-conditional raw content.
static RE_LATEX_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\ref\{(.*?)\}").unwrap());

static RE_CITE_CMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\cite\{(.*?)\}").unwrap());

static RE_EQREF2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\eqref2\{(.*?)\}").unwrap());

static RE_FOOTNOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\footnote\{(.*?)\}").unwrap());

/// The tree walker. One instance per formatting request; sub-formats
/// (table cells, admonition bodies, parameter lists) construct a fresh
/// instance with an isolated line buffer and splice its footnotes back.
pub(crate) struct Formatter<'a> {
    lines: Vec<String>,
    continue_line: bool,
    math_labels: Vec<String>,
    mode: BuildMode,
    verbosity: u8,
    list_indent: usize,
    footnotes: Vec<String>,
    index: &'a DoxygenIndex,
}

impl<'a> Formatter<'a> {
    fn new(index: &'a DoxygenIndex, mode: BuildMode, verbosity: u8) -> Formatter<'a> {
        Formatter {
            lines: vec![String::new()],
            continue_line: false,
            math_labels: Vec::new(),
            mode,
            verbosity,
            list_indent: 0,
            footnotes: Vec::new(),
            index,
        }
    }

    /// Isolated sub-formatter: fresh line buffer, shared configuration.
    fn nested(&self) -> Formatter<'a> {
        Formatter::new(self.index, self.mode, self.verbosity)
    }

    /// Flush pending math labels and hand the buffers to the caller.
    fn finish(mut self) -> (Vec<String>, Vec<String>) {
        self.flush_math_labels();
        (self.lines, self.footnotes)
    }

    fn trace(&self, msg: &str) {
        if self.verbosity > 0 {
            eprintln!("doxyrst: {}", msg);
        }
    }

    fn current(&mut self) -> &mut String {
        self.lines.last_mut().expect("line buffer is never empty")
    }

    /// Append paragraph text, either run-on onto the current line or as a
    /// fresh line with leading whitespace dropped.
    fn para_text(&mut self, text: &str) {
        if self.continue_line {
            self.current().push_str(text);
        } else {
            self.lines.push(text.trim_start().to_string());
        }
    }

    // -- Dispatch -------------------------------------------------------------

    fn visit(&mut self, node: &Element) -> Result<(), FormatError> {
        // Labels attach to the most recent math block; any non-formula
        // output in between would orphan them.
        if !self.math_labels.is_empty() && node.tag() != Tag::Formula {
            self.flush_math_labels();
        }
        if self.verbosity > 1 {
            eprintln!("doxyrst: visit <{}>", node.name);
        }
        match node.tag() {
            Tag::Para => self.visit_para(node),
            Tag::Ref => self.visit_ref(node),
            Tag::Ulink => {
                self.para_text(&format!(
                    "`{} <{}>`_",
                    node_text(node),
                    node.attr("url").unwrap_or("")
                ));
                Ok(())
            }
            Tag::Emphasis => {
                self.para_text(&format!("*{}*", node_text(node)));
                Ok(())
            }
            Tag::Bold => {
                self.para_text(&format!("**{}**", node_text(node)));
                Ok(())
            }
            Tag::Superscript => {
                self.role_text(node, "superscript");
                Ok(())
            }
            Tag::Subscript => {
                self.role_text(node, "subscript");
                Ok(())
            }
            Tag::ComputerOutput => self.visit_computeroutput(node),
            Tag::Preformatted | Tag::Verbatim => {
                self.visit_preformatted(node);
                Ok(())
            }
            Tag::ProgramListing => {
                self.visit_programlisting(node);
                Ok(())
            }
            Tag::Formula => {
                self.visit_formula(node);
                Ok(())
            }
            Tag::Table => self.visit_table(node),
            Tag::ItemizedList => self.visit_list(node, "*"),
            Tag::OrderedList => self.visit_list(node, "#."),
            Tag::ParameterList => self.visit_parameterlist(node),
            Tag::ParameterName => {
                self.visit_parametername(node);
                Ok(())
            }
            Tag::SimpleSect => self.visit_simplesect(node),
            Tag::Sect1 => self.visit_sect(node, '='),
            Tag::Sect2 => self.visit_sect(node, '-'),
            Tag::Sect3 => self.visit_sect(node, '^'),
            Tag::Sect4 => self.visit_sect(node, '"'),
            Tag::XrefSect => self.visit_xrefsect(node),
            Tag::Image => {
                self.visit_image(node);
                Ok(())
            }
            Tag::HtmlOnly => {
                self.visit_htmlonly(node);
                Ok(())
            }
            Tag::LatexOnly => {
                self.visit_latexonly(node);
                Ok(())
            }
            _ => self.generic_visit(node),
        }
    }

    /// Default rule: no output of our own, recurse into children in
    /// document order.
    fn generic_visit(&mut self, node: &Element) -> Result<(), FormatError> {
        for child in &node.children {
            self.visit(child)?;
        }
        Ok(())
    }

    // -- Paragraphs and inline text -------------------------------------------

    fn visit_para(&mut self, node: &Element) -> Result<(), FormatError> {
        if let Some(ref text) = node.text {
            self.para_text(text);
        }
        for child in &node.children {
            self.visit(child)?;
            // Tail text runs on directly after whatever the child emitted.
            self.continue_line = true;
            if let Some(ref tail) = child.tail {
                self.para_text(tail);
            }
        }
        self.lines.push(String::new());
        self.continue_line = false;
        Ok(())
    }

    /// Interpreted-text roles need surrounding whitespace; a non-space
    /// tail character is escaped with a line continuation marker.
    fn role_text(&mut self, node: &Element, role: &str) {
        let mut text = format!(" :{}:`{}`", role, node_text(node));
        if node.tail.as_deref().is_some_and(|t| !t.starts_with(' ')) {
            text.push('\\');
        }
        text.push(' ');
        self.para_text(&text);
    }

    // -- Literal blocks -------------------------------------------------------

    fn preformat_text(&mut self, body: &[String]) {
        self.lines.push(String::new());
        self.lines.push("::".to_string());
        self.lines.push(String::new());
        for line in body {
            self.lines.push(format!("  {}", line));
        }
        self.lines.push(String::new());
    }

    fn visit_preformatted(&mut self, node: &Element) {
        let mut segment = String::from(node_text(node));
        for child in &node.children {
            segment.push_str(node_text(child));
            if let Some(ref tail) = child.tail {
                segment.push_str(tail);
            }
        }
        let body: Vec<String> = segment.split('\n').map(str::to_string).collect();
        self.preformat_text(&body);
    }

    fn visit_programlisting(&mut self, node: &Element) {
        // One codeline child per source line; markup inside is dropped.
        let body: Vec<String> = node.children.iter().map(Element::flatten).collect();
        self.preformat_text(&body);
    }

    fn visit_computeroutput(&mut self, node: &Element) -> Result<(), FormatError> {
        if let Some(pre) = node.find("preformatted") {
            self.visit_preformatted(pre);
            return Ok(());
        }
        // Links cannot nest inside inline literals, so flatten everything.
        let literal = format!("``{}``", node.flatten());
        self.current().push_str(&literal);
        Ok(())
    }

    // -- Sections -------------------------------------------------------------

    fn visit_sect(&mut self, node: &Element, underline: char) -> Result<(), FormatError> {
        // Implicit target so refs can link to the section by id without an
        // explicit label in the source.
        if let Some(id) = node.attr("id") {
            self.lines.push(format!(".. _{}:", id));
            self.lines.push(String::new());
        }
        if let Some(title) = node.find("title").and_then(|t| t.text.as_deref()) {
            self.lines.push(title.to_string());
            self.lines
                .push(underline.to_string().repeat(title.chars().count()));
            self.lines.push(String::new());
        }
        self.generic_visit(node)
    }

    // -- Lists ----------------------------------------------------------------

    fn visit_list(&mut self, node: &Element, marker: &str) -> Result<(), FormatError> {
        self.list_indent += 1;
        for child in &node.children {
            if child.tag() == Tag::ListItem {
                self.visit_listitem(child, marker)?;
            } else {
                self.visit(child)?;
            }
        }
        self.list_indent -= 1;
        Ok(())
    }

    fn visit_listitem(&mut self, node: &Element, marker: &str) -> Result<(), FormatError> {
        let indent = "  ".repeat(self.list_indent.saturating_sub(1));
        self.lines.push(String::new());
        self.lines.push(format!("{}{} ", indent, marker));
        self.continue_line = true;
        self.generic_visit(node)
    }

    // -- Parameter lists ------------------------------------------------------

    fn visit_parametername(&mut self, node: &Element) {
        let direction = match node.attr("direction") {
            Some(d) => format!("[{}] ", d),
            None => String::new(),
        };
        self.lines
            .push(format!(":param {}: {}", node_text(node), direction));
        self.continue_line = true;
    }

    fn visit_parameterlist(&mut self, node: &Element) -> Result<(), FormatError> {
        let mut sub = self.nested();
        sub.generic_visit(node)?;
        let (body, notes) = sub.finish();
        self.footnotes.extend(notes);

        self.lines.push(String::new());
        self.lines.extend(body.into_iter().filter(|l| !l.is_empty()));
        self.lines.push(String::new());
        Ok(())
    }

    // -- Callouts and admonitions ---------------------------------------------

    fn visit_simplesect(&mut self, node: &Element) -> Result<(), FormatError> {
        match node.attr("kind") {
            Some("return") => {
                self.lines.push(":returns: ".to_string());
                self.continue_line = true;
                self.generic_visit(node)
            }
            Some("see") => {
                self.lines.push("**See also:** ".to_string());
                self.continue_line = true;
                self.generic_visit(node)
            }
            Some(kind @ ("note" | "warning" | "attention")) => {
                let header = format!(".. {}::", kind);
                self.directive_block(node, header)
            }
            _ => self.generic_visit(node),
        }
    }

    fn visit_xrefsect(&mut self, node: &Element) -> Result<(), FormatError> {
        // Deprecated markers and other titled annotation blocks all render
        // as admonitions; a block without a title is skipped.
        let Some(title) = node.find("xreftitle").and_then(|t| t.text.clone()) else {
            return Ok(());
        };
        self.directive_block(node, format!(".. admonition:: {}", title))
    }

    /// Format the node's subtree in isolation and emit it as the indented
    /// body of a directive.
    fn directive_block(&mut self, node: &Element, header: String) -> Result<(), FormatError> {
        let mut sub = self.nested();
        sub.generic_visit(node)?;
        let (body, notes) = sub.finish();
        self.footnotes.extend(notes);

        self.lines.push(header);
        for line in body {
            self.lines.push(format!("   {}", line));
        }
        Ok(())
    }

    // -- Images ---------------------------------------------------------------

    fn visit_image(&mut self, node: &Element) {
        // Typed image variants only apply to the matching build.
        if let Some(kind) = node.attr("type") {
            let wanted = match self.mode {
                BuildMode::Html => kind == "html",
                BuildMode::Latex | BuildMode::LatexPdf => kind == "latex",
                BuildMode::Unset => true,
            };
            if !wanted {
                return;
            }
        }
        let name = node.attr("name").unwrap_or("");
        if node_text(node).trim().is_empty() {
            self.lines.push(format!(".. image:: /images/{}", name));
        } else {
            self.lines.push(format!(".. figure:: /images/{}", name));
            self.lines.push(String::new());
            self.lines.push(node_text(node).to_string());
        }
    }

    // -- Mode-conditional raw passthrough -------------------------------------

    fn visit_latexonly(&mut self, node: &Element) {
        if !self.mode.is_latex() {
            return;
        }
        let Some(text) = node.text.clone() else {
            return;
        };
        let text = self.capture_footnotes(&text);
        if RE_LATEX_REF.is_match(&text) {
            // The LaTeX writer resolves the \ref itself; hand it the whole
            // command through a raw role.
            let role = format!(" :latex:`{}`", text.trim());
            self.current().push_str(&role);
        } else if let Some(caps) = RE_CITE_CMD.captures(&text) {
            let role = format!(" :cite:`{}`", &caps[1]);
            self.current().push_str(&role);
        } else {
            self.current().push_str(&text);
        }
    }

    fn visit_htmlonly(&mut self, node: &Element) {
        if self.mode != BuildMode::Html {
            return;
        }
        let Some(text) = node.text.clone() else {
            return;
        };
        let text = self.capture_footnotes(&text);
        if let Some(caps) = RE_EQREF2.captures(&text) {
            // \eqref2{tag,txt} carries an optional display text after the
            // comma; without one the bare equation number is shown.
            let role = match caps[1].split_once(',') {
                Some((tag, label)) => format!(" :math:numref:`{}` - {}", tag, label),
                None => format!(" :math:numref:`{}`", &caps[1]),
            };
            self.current().push_str(&role);
        } else {
            self.current().push_str(&text);
        }
    }

    /// Replace `\footnote{...}` commands with auto-numbered markers and
    /// queue the footnote directives for the end of the page.
    fn capture_footnotes(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in RE_FOOTNOTE.captures_iter(text) {
            if let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) {
                out.push_str(&text[last..whole.start()]);
                out.push_str("[#]_");
                self.footnotes.push(format!(".. [#] {}", body.as_str().trim()));
                last = whole.end();
            }
        }
        out.push_str(&text[last..]);
        out
    }
}
