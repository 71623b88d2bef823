//! Fixed-width grid table layout.
//!
//! Column widths are data-dependent: every cell is formatted first, in an
//! isolated formatter instance, and each column is sized to its widest
//! line plus padding. Only then are the rows rendered between `+---+`
//! separators, the header row set off with `=`.

use super::{FormatError, Formatter};
use crate::xml::{Element, Tag};

impl<'a> Formatter<'a> {
    pub(super) fn visit_table(&mut self, node: &Element) -> Result<(), FormatError> {
        let cols: usize = node
            .attr("cols")
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        if cols == 0 {
            return Ok(());
        }

        // Pass 1: format every cell and find column widths.
        let mut widths = vec![0usize; cols];
        let mut rows: Vec<Vec<Vec<String>>> = Vec::new();
        for row_node in node.find_all("row") {
            let mut row = Vec::new();
            let entries = row_node
                .children
                .iter()
                .filter(|c| c.tag() == Tag::Entry)
                .take(cols);
            for (i, entry) in entries.enumerate() {
                let mut sub = self.nested();
                sub.generic_visit(entry)?;
                let (cell, notes) = sub.finish();
                self.footnotes.extend(notes);

                let longest = cell.iter().map(|l| l.chars().count()).max().unwrap_or(0);
                widths[i] = widths[i].max(longest + 2);
                row.push(cell);
            }
            rows.push(row);
        }
        if rows.is_empty() {
            return Ok(());
        }

        // Pass 2: render.
        let sep = separator(&widths, '-');
        self.lines.push(String::new());
        self.lines.push(sep.clone());
        self.append_table_row(&rows[0], &widths);
        self.lines.push(separator(&widths, '='));
        for row in &rows[1..] {
            self.append_table_row(row, &widths);
            self.lines.push(sep.clone());
        }
        self.lines.push(String::new());
        Ok(())
    }

    /// One output line per the row's tallest cell; shorter cells pad with
    /// blank fill.
    fn append_table_row(&mut self, row: &[Vec<String>], widths: &[usize]) {
        let height = row.iter().map(Vec::len).max().unwrap_or(0);
        for k in 0..height {
            let mut line = String::from("|");
            for (i, cell) in row.iter().enumerate() {
                match cell.get(k) {
                    Some(text) => {
                        line.push(' ');
                        line.push_str(text);
                        let used = text.chars().count() + 1;
                        line.push_str(&" ".repeat(widths[i].saturating_sub(used)));
                    }
                    None => line.push_str(&" ".repeat(widths[i])),
                }
                line.push('|');
            }
            self.lines.push(line);
        }
    }
}

fn separator(widths: &[usize], fill: char) -> String {
    let mut sep = String::from("+");
    for width in widths {
        sep.push_str(&fill.to_string().repeat(*width));
        sep.push('+');
    }
    sep
}

#[cfg(test)]
mod tests {
    use super::super::{format_description, BuildMode};
    use crate::index::DoxygenIndex;
    use crate::xml::parse_str;

    fn fmt(xml: &str) -> Vec<String> {
        let index = DoxygenIndex::default();
        let node = parse_str(xml);
        format_description(&node, &index, BuildMode::Unset, 0).unwrap()
    }

    fn two_by_two() -> Vec<String> {
        fmt(r#"<d><table rows="2" cols="2">
                 <row><entry thead="yes"><para>A</para></entry><entry thead="yes"><para>B</para></entry></row>
                 <row><entry><para>1</para></entry><entry><para>2</para></entry></row>
               </table></d>"#)
    }

    #[test]
    fn separators_have_one_plus_per_column_boundary() {
        let lines = two_by_two();
        let sep = lines.iter().find(|l| l.starts_with('+')).unwrap();
        assert_eq!(sep.matches('+').count(), 3);
    }

    #[test]
    fn header_separator_uses_equals() {
        let lines = two_by_two();
        assert!(lines.iter().any(|l| l.starts_with("+=")));
        // header separator sits between the header row and the body row
        let header = lines.iter().position(|l| l.contains("| A")).unwrap();
        let eq = lines.iter().position(|l| l.starts_with("+=")).unwrap();
        let body = lines.iter().position(|l| l.contains("| 1")).unwrap();
        assert!(header < eq && eq < body);
    }

    #[test]
    fn column_width_covers_padding() {
        let lines = two_by_two();
        let sep = lines.iter().find(|l| l.starts_with('+')).unwrap();
        // each column is at least len("A") + 2 wide
        let runs: Vec<usize> = sep.split('+').filter(|s| !s.is_empty()).map(str::len).collect();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|w| *w >= 3));
    }

    #[test]
    fn widest_cell_sets_the_column_width() {
        let lines = fmt(
            r#"<d><table rows="2" cols="1">
                 <row><entry><para>wide header cell</para></entry></row>
                 <row><entry><para>x</para></entry></row>
               </table></d>"#,
        );
        let sep = lines.iter().find(|l| l.starts_with('+')).unwrap();
        assert_eq!(sep.len(), "wide header cell".len() + 2 + 2);
        // every row line is as wide as the separator
        assert!(lines
            .iter()
            .filter(|l| l.starts_with('|'))
            .all(|l| l.chars().count() == sep.len()));
    }

    #[test]
    fn table_is_surrounded_by_blank_lines() {
        let lines = two_by_two();
        let first = lines.iter().position(|l| l.starts_with('+')).unwrap();
        let last = lines.iter().rposition(|l| l.starts_with('+')).unwrap();
        assert_eq!(lines[first - 1], "");
        assert_eq!(lines[last + 1], "");
    }

    #[test]
    fn rowless_table_emits_nothing() {
        let lines = fmt(r#"<d><table cols="3"></table></d>"#);
        assert!(lines.iter().all(|l| l.is_empty()));
    }

    #[test]
    fn inline_markup_inside_cells_is_formatted() {
        let lines = fmt(
            r#"<d><table rows="2" cols="1">
                 <row><entry><para>name</para></entry></row>
                 <row><entry><para><emphasis>em</emphasis></para></entry></row>
               </table></d>"#,
        );
        assert!(lines.iter().any(|l| l.contains("| *em*")));
    }
}
