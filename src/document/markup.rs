//! Scanners for lightweight markup: pipe and grid tables, headings,
//! frontmatter and LaTeX-style formulas.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Table, TableData, TableFormat};

static PIPE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\|.*\|.*\n\|[\s\-|:]*\|[\s\-|:]*\n(?:\|.*\|.*\n)*")
        .expect("pipe table pattern")
});
static GRID_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\+[-=+]+\n(?:\|.*\n)+\+[-=+]+\n").expect("grid table pattern"));
static ATX_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").expect("heading pattern"));
static FRONTMATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\n(.*?)\n---").expect("frontmatter pattern"));
static DISPLAY_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").expect("display math pattern"));
static BRACKET_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\\\?\[(.+?)\\\\?\]").expect("bracket math pattern"));
static PAREN_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\\?\((.+?)\\\\?\)").expect("paren math pattern"));

/// Characters allowed in a reStructuredText section underline.
const RST_ADORNMENTS: &str = "-=`:\"'~^_*+#<>";

/// Pipe tables with at least one data row, numbered in order.
pub(crate) fn markdown_tables(content: &str) -> Vec<Table> {
    let mut tables = Vec::new();
    for found in PIPE_TABLE.find_iter(content) {
        let lines: Vec<&str> = found.as_str().trim().split('\n').collect();
        if lines.len() < 2 {
            continue;
        }
        let headers = split_pipe_row(lines[0]);
        let rows: Vec<Vec<String>> = lines[2..]
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| split_pipe_row(line))
            .collect();
        if rows.is_empty() {
            continue;
        }

        let shape = (rows.len(), headers.len());
        tables.push(Table {
            format: Some(TableFormat::Markdown),
            headers: Some(headers),
            data: Some(TableData::Rows(rows)),
            shape: Some(shape),
            ..Table::new(tables.len())
        });
    }
    tables
}

/// `| a | b |` to `["a", "b"]`: text outside the outer pipes is dropped.
fn split_pipe_row(line: &str) -> Vec<String> {
    let cells: Vec<&str> = line.split('|').collect();
    if cells.len() < 2 {
        return Vec::new();
    }
    cells[1..cells.len() - 1]
        .iter()
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Grid tables, kept as their raw block.
pub(crate) fn rst_tables(content: &str) -> Vec<Table> {
    GRID_TABLE
        .find_iter(content)
        .enumerate()
        .map(|(index, found)| Table {
            format: Some(TableFormat::Rst),
            raw_text: Some(found.as_str().trim().to_string()),
            ..Table::new(index)
        })
        .collect()
}

/// Formulas in `$$..$$`, `$..$`, `\[..\]` and `\(..\)` notation, each
/// re-wrapped in its delimiters. Duplicates are removed and the result is
/// sorted, so encounter order is not kept.
pub(crate) fn latex_formulas(content: &str) -> Vec<String> {
    let mut formulas = BTreeSet::new();
    for caps in DISPLAY_MATH.captures_iter(content) {
        formulas.insert(format!("$${}$$", &caps[1]));
    }
    for inner in inline_math(content) {
        formulas.insert(format!("${}$", inner));
    }
    for caps in BRACKET_MATH.captures_iter(content) {
        formulas.insert(format!("\\[{}\\]", &caps[1]));
    }
    for caps in PAREN_MATH.captures_iter(content) {
        formulas.insert(format!("\\({}\\)", &caps[1]));
    }
    formulas.into_iter().collect()
}

/// Single-dollar spans on one line. Neither delimiter may touch another `$`,
/// the body is non-empty and matched as short as possible.
fn inline_math(content: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = content.char_indices().collect();
    let is_dollar = |i: usize| chars.get(i).map(|(_, c)| *c == '$').unwrap_or(false);

    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let opens = chars[i].1 == '$' && !(i > 0 && is_dollar(i - 1)) && !is_dollar(i + 1);
        if !opens {
            i += 1;
            continue;
        }

        let mut close = None;
        for j in i + 1..chars.len() {
            let c = chars[j].1;
            if c == '\n' {
                break;
            }
            if j >= i + 2 && c == '$' && !is_dollar(j - 1) && !is_dollar(j + 1) {
                close = Some(j);
                break;
            }
        }

        match close {
            Some(j) => {
                spans.push(&content[chars[i + 1].0..chars[j].0]);
                i = j + 1;
            }
            None => i += 1,
        }
    }
    spans
}

/// ATX heading texts in document order.
pub(crate) fn markdown_headings(content: &str) -> Vec<String> {
    ATX_HEADING
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Line count of a leading `---` delimited block, if the content opens with one.
pub(crate) fn frontmatter_lines(content: &str) -> Option<usize> {
    FRONTMATTER
        .captures(content)
        .map(|caps| caps[1].split('\n').count())
}

/// Section titles: a text line directly followed by an underline made of one
/// repeated adornment character, at least 3 long and as wide as the title.
pub(crate) fn rst_headings(content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    lines
        .windows(2)
        .filter_map(|pair| {
            let title = pair[0].trim_end();
            let underline = pair[1].trim_end();
            if title.trim().is_empty() || is_adornment(title) || !is_adornment(underline) {
                return None;
            }
            let width = underline.chars().count();
            (width >= 3 && width >= title.chars().count()).then(|| title.to_string())
        })
        .collect()
}

fn is_adornment(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) if RST_ADORNMENTS.contains(first) => chars.all(|c| c == first),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_table() {
        let tables = markdown_tables("# T\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.id, "table_000");
        assert_eq!(table.format, Some(TableFormat::Markdown));
        assert_eq!(table.headers, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(
            table.data,
            Some(TableData::Rows(vec![vec!["1".to_string(), "2".to_string()]]))
        );
        assert_eq!(table.shape, Some((1, 2)));
    }

    #[test]
    fn test_header_only_table_is_dropped() {
        let content = "| x |\n|---|\n\ntext\n\n| a | b |\n| :-: | --- |\n| 1 | 2 |\n| 3 | 4 |\n";
        let tables = markdown_tables(content);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].id, "table_000");
        assert_eq!(tables[0].shape, Some((2, 2)));
    }

    #[test]
    fn test_rst_grid_table() {
        let content = "Intro\n\n+---+---+\n| a | b |\n| 1 | 2 |\n+---+---+\n\nAfter\n";
        let tables = rst_tables(content);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].format, Some(TableFormat::Rst));
        assert_eq!(
            tables[0].raw_text.as_deref(),
            Some("+---+---+\n| a | b |\n| 1 | 2 |\n+---+---+")
        );
        assert!(tables[0].data.is_none());
    }

    #[test]
    fn test_formula_notations() {
        let content = "Energy $E=mc^2$ and $$\\sum_i x_i$$.\n\
                       Also \\(a+b\\) and \\[\\int f\\] and again $E=mc^2$.\n\
                       Price is $5 and\n$6 later.";
        let formulas = latex_formulas(content);
        assert_eq!(
            formulas,
            vec![
                "$$\\sum_i x_i$$".to_string(),
                "$E=mc^2$".to_string(),
                "\\(a+b\\)".to_string(),
                "\\[\\int f\\]".to_string(),
            ]
        );
    }

    #[test]
    fn test_inline_math_skips_double_dollars() {
        assert_eq!(inline_math("$$x$$"), Vec::<&str>::new());
        assert_eq!(inline_math("$a$$b$"), vec!["a$$b"]);
        assert_eq!(inline_math("한 $α$ 둘"), vec!["α"]);
    }

    #[test]
    fn test_headings_and_frontmatter() {
        let content = "---\ntitle: x\ntags: y\n---\n# One\ntext\n### Three ###\n####### seven\n";
        assert_eq!(markdown_headings(content), ["One", "Three ###"]);
        assert_eq!(frontmatter_lines(content), Some(2));
        assert_eq!(frontmatter_lines("# no frontmatter"), None);
    }

    #[test]
    fn test_rst_headings() {
        let content = "Title\n=====\n\nShort underline\n===\n\nSection\n-------\n\nMixed\n=-=-=\n";
        assert_eq!(rst_headings(content), ["Title", "Section"]);
    }
}
