//! Formula handling: block/inline classification and math label tracking.
//!
//! Doxygen hands formulas over as raw LaTeX. Display math (`\[ … \]`, or
//! anything not wrapped in `$`) becomes a `.. math::` directive; `$…$`
//! becomes an inline `:math:` role that continues the current line.
//!
//! Labels are the awkward part: `\label{html:NAME}` commands embedded in a
//! formula have to come out as a `:label:` option on the directive, and the
//! target format allows exactly one label per block. Labels are queued when
//! a formula is scanned and attached to the most recent math block when the
//! walk reaches anything that is not a formula.

use super::{node_text, BuildMode, Formatter};
use crate::xml::Element;
use regex::Regex;
use std::sync::LazyLock;

// A label run faked up for the HTML build: ` \label{html:…}…\\`. The LaTeX
// writer must never see it.
static RE_HTML_LABEL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" \\label\{html:.*?\}.*?\\\\").unwrap());

static RE_MATH_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\label\{html:(.*?)\} ").unwrap());

impl<'a> Formatter<'a> {
    pub(super) fn visit_formula(&mut self, node: &Element) {
        let mut text = node_text(node).trim().to_string();

        if self.mode == BuildMode::LatexPdf {
            if let Some(m) = RE_HTML_LABEL_RUN.find(&text) {
                let range = m.range();
                text.replace_range(range, "");
            }
        }

        if text.starts_with("\\[") || !text.starts_with('$') {
            let body = match text.strip_prefix("\\[") {
                Some(rest) => rest.strip_suffix("\\]").unwrap_or(rest).trim(),
                None => text.as_str(),
            };
            // Queued labels belong to the previous block, not this one.
            if !self.math_labels.is_empty() {
                self.flush_math_labels();
            }
            self.lines.push(String::new());
            self.lines.push(format!(".. math:: {}", body));
            self.lines.push(String::new());
            self.continue_line = false;
        } else {
            let inner = text
                .strip_prefix('$')
                .and_then(|t| t.strip_suffix('$'))
                .unwrap_or(&text)
                .trim();
            let inline = format!(":math:`{}`", inner);
            if self.continue_line {
                self.current().push_str(&inline);
            } else {
                self.lines.push(inline);
            }
            self.continue_line = true;
        }

        if text.contains("\\label") {
            for caps in RE_MATH_LABEL.captures_iter(&text) {
                if let Some(label) = caps.get(1) {
                    self.math_labels.push(label.as_str().to_string());
                }
            }
        }
    }

    /// Attach the first pending label to the most recent math block and
    /// drop the rest (one label per block in the target format).
    pub(super) fn flush_math_labels(&mut self) {
        if self.math_labels.is_empty() {
            return;
        }
        self.trace("attaching math label to preceding math block");
        if let Some(idx) = self.lines.iter().rposition(|l| l.starts_with(".. math::")) {
            self.lines
                .insert(idx + 1, format!("   :label: {}", self.math_labels[0]));
            self.lines.insert(idx + 2, String::new());
        }
        self.math_labels.clear();
    }
}
