use std::borrow::Cow;
use std::fmt::Write as _;

/// Renders an aligned plain-text table. Numeric cells are right-aligned;
/// Hangul and other wide characters count as two terminal columns.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    let mut numeric = vec![!rows.is_empty(); column_count];

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
            numeric[idx] &= is_numeric_cell(cell);
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths, &vec![false; column_count]);
    let _ = writeln!(output, "{header_line}");

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths, &numeric);
    let _ = writeln!(output, "{separator_line}");

    for row in rows {
        let row_line = format_row(row, &widths, &numeric);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    let rendered = render_table(headers, rows);
    print!("{rendered}");
}

/// [`print_table`] preceded by a title line, or a note when there are no rows.
pub fn print_titled(title: &str, headers: &[String], rows: &[Vec<String>]) {
    println!("{title}");
    if rows.is_empty() {
        println!("(no rows)");
    } else {
        print_table(headers, rows);
    }
    println!();
}

fn format_row(values: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let padding = widths[idx].saturating_sub(display_width(sanitized.as_ref()));
        let pad = " ".repeat(padding);
        if right_align.get(idx).copied().unwrap_or(false) {
            cells.push(format!("{pad}{sanitized}"));
        } else {
            cells.push(format!("{sanitized}{pad}"));
        }
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn is_numeric_cell(value: &str) -> bool {
    let trimmed = value.trim().trim_end_matches('%');
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
}

fn display_width(value: &str) -> usize {
    value.chars().map(char_width).sum()
}

fn char_width(ch: char) -> usize {
    match u32::from(ch) {
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA960..=0xA97F
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6 => 2,
        _ => 1,
    }
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn numeric_columns_are_right_aligned() {
        let rendered = render_table(
            &strings(&["department", "count"]),
            &[strings(&["CS", "10"]), strings(&["EE", "8"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "department  count");
        assert_eq!(lines[1], "----------  -----");
        assert_eq!(lines[2], "CS             10");
        assert_eq!(lines[3], "EE              8");
    }

    #[test]
    fn hangul_counts_as_double_width() {
        assert_eq!(display_width("학과"), 4);
        assert_eq!(display_width("CS"), 2);
        let rendered = render_table(
            &strings(&["학과", "n"]),
            &[strings(&["컴퓨터", "x"]), strings(&["EE", "y"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "학과    n");
        assert_eq!(lines[2], "컴퓨터  x");
        assert_eq!(lines[3], "EE      y");
    }

    #[test]
    fn control_characters_are_flattened() {
        let rendered = render_table(&strings(&["note"]), &[strings(&["a\tb\nc"])]);
        assert!(rendered.contains("a b c"));
    }
}
