use unicode_width::UnicodeWidthStr;

use crate::query_executor::ResultRow;

const BOX_TL: char = '┌';
const BOX_TR: char = '┐';
const BOX_BL: char = '└';
const BOX_BR: char = '┘';
const BOX_H: char = '─';
const BOX_V: char = '│';
const BOX_TD: char = '┬';
const BOX_TU: char = '┴';
const BOX_VR: char = '├';
const BOX_VL: char = '┤';
const BOX_CROSS: char = '┼';

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Pads `s` with spaces to `width` display columns.
pub fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{s}{}", " ".repeat(fill))
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let segments: Vec<String> = widths
        .iter()
        .map(|w| BOX_H.to_string().repeat(w + 2))
        .collect();
    format!("{left}{}{right}", segments.join(&mid.to_string()))
}

fn row_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| format!(" {} ", pad(cell, w)))
        .collect();
    format!("{BOX_V}{}{BOX_V}", padded.join(&BOX_V.to_string()))
}

/// Renders rows as a box-drawn table. Column widths follow display width, so
/// wide characters stay aligned.
pub fn render_table(headers: &[String], rows: &[ResultRow]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (w, value) in widths.iter_mut().zip(row.values()) {
            *w = (*w).max(display_width(value));
        }
    }

    let mut lines = vec![
        border(&widths, BOX_TL, BOX_TD, BOX_TR),
        row_line(headers.iter().map(String::as_str), &widths),
    ];
    if !rows.is_empty() {
        lines.push(border(&widths, BOX_VR, BOX_CROSS, BOX_VL));
        for row in rows {
            lines.push(row_line(row.values(), &widths));
        }
    }
    lines.push(border(&widths, BOX_BL, BOX_TU, BOX_BR));
    lines.join("\n")
}
