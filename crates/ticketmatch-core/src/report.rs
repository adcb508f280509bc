//! Presenting ranked matches: a plain text table for the terminal, or JSON.

use crate::ranker::RankedMatch;

/// Metadata columns hidden by default (snapshot bookkeeping, not useful to a reader).
pub const DEFAULT_HIDDEN_FIELDS: &[&str] = &["description_length", "context"];

pub const SCORE_COLUMN: &str = "similarity_score";

/// Render matches as a table: `id`, the metadata columns in the order they first
/// appear (minus `hidden`), then the similarity score. Every value is shown as text,
/// dates included.
pub fn render_table(matches: &[RankedMatch<'_>], hidden: &[String]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for key in matches.iter().flat_map(|m| m.metadata.keys()) {
        if !columns.contains(&key.as_str()) && !hidden.iter().any(|h| h == key) {
            columns.push(key);
        }
    }

    let mut header = vec!["id".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));
    header.push(SCORE_COLUMN.to_string());

    let rows: Vec<Vec<String>> = matches
        .iter()
        .map(|m| {
            let mut row = vec![m.id.to_string()];
            row.extend(columns.iter().map(|c| m.metadata.get(*c).map(value_text).unwrap_or_default()));
            row.push(score_text(m.score));
            row
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

/// Pretty JSON array of matches (position, id, metadata, score).
/// Undefined scores serialize as `null`.
pub fn to_json(matches: &[RankedMatch<'_>]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(matches)
}

/// Text form of a metadata value. Strings (dates included) are shown verbatim.
pub fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn score_text(score: f32) -> String {
    if score.is_finite() {
        format!("{score:.4}")
    } else {
        "n/a".to_string()
    }
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(c, &w)| {
            // Cells are single-line; embedded newlines would break the grid.
            let c = c.replace('\n', " ");
            format!("{c:<w$}")
        })
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}
