//! Flattening of parsed table structures into embeddable text.
//!
//! Raw payloads represent tables as dict-of-rows-of-cells. Downstream
//! embedding wants plain text, so tables are rendered as Markdown by default
//! with a lines fallback.

use serde_json::Value;

/// Output format for [`stringify_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Markdown,
    Lines,
}

/// Recursively extract all text content from a nested payload value.
pub fn deep_extract_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => join_non_empty(items.iter().map(deep_extract_text)),
        Value::Object(map) => {
            let mut texts = Vec::new();
            if let Some(t) = map.get("#text") {
                texts.push(deep_extract_text(t));
            }
            for key in ["p", "em", "strong", "span", "a"] {
                if let Some(v) = map.get(key) {
                    texts.push(deep_extract_text(v));
                }
            }
            if texts.iter().all(|t| t.is_empty()) {
                texts.clear();
                for (key, v) in map {
                    if !key.starts_with('@') && key != "#text" {
                        texts.push(deep_extract_text(v));
                    }
                }
            }
            join_non_empty(texts.into_iter())
        }
    }
}

fn join_non_empty(parts: impl Iterator<Item = String>) -> String {
    parts
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_row_cells(row: &Value) -> Vec<String> {
    match row {
        Value::Object(map) => match map.get("td") {
            Some(Value::Array(cells)) => cells.iter().map(deep_extract_text).collect(),
            Some(single) => vec![deep_extract_text(single)],
            None => Vec::new(),
        },
        Value::Array(cells) => cells.iter().map(deep_extract_text).collect(),
        other => vec![deep_extract_text(other)],
    }
}

fn as_row_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn rows_from_table(table: &Value) -> Vec<&Value> {
    if let Some(tr) = table.get("tr") {
        return as_row_list(tr);
    }
    match table.get("tbody") {
        Some(Value::Object(tbody)) => tbody.get("tr").map(as_row_list).unwrap_or_default(),
        Some(Value::Array(bodies)) => bodies
            .iter()
            .filter_map(|tb| tb.get("tr"))
            .flat_map(as_row_list)
            .collect(),
        _ => Vec::new(),
    }
}

/// Render a parsed table value as text. Empty cells become `-`; fully empty
/// rows are dropped; rows are padded to a common width.
pub fn stringify_table(table: &Value, format: TableFormat) -> String {
    if !table.is_object() {
        return String::new();
    }
    let rows = rows_from_table(table);
    if rows.is_empty() {
        return String::new();
    }

    let mut parsed_rows: Vec<Vec<String>> = Vec::new();
    let mut max_cols = 0usize;
    for row in rows {
        let cells: Vec<String> = extract_row_cells(row)
            .into_iter()
            .map(|c| {
                let c = c.trim().to_string();
                if c.is_empty() {
                    "-".to_string()
                } else {
                    c
                }
            })
            .collect();
        if cells.iter().any(|c| c != "-") {
            max_cols = max_cols.max(cells.len());
            parsed_rows.push(cells);
        }
    }
    if parsed_rows.is_empty() || max_cols == 0 {
        return String::new();
    }
    for cells in &mut parsed_rows {
        while cells.len() < max_cols {
            cells.push("-".to_string());
        }
    }

    let mut lines = Vec::new();
    match format {
        TableFormat::Markdown => {
            lines.push(format!("| {} |", parsed_rows[0].join(" | ")));
            lines.push(format!("|{}|", vec!["---"; max_cols].join("|")));
            for cells in &parsed_rows[1..] {
                lines.push(format!("| {} |", cells.join(" | ")));
            }
        }
        TableFormat::Lines => {
            for cells in &parsed_rows {
                let non_empty: Vec<&String> = cells.iter().filter(|c| *c != "-").collect();
                match non_empty.len() {
                    1 => lines.push(non_empty[0].clone()),
                    2 => lines.push(format!("{}: {}", non_empty[0], non_empty[1])),
                    _ => lines.push(
                        non_empty
                            .iter()
                            .map(|s| s.as_str())
                            .collect::<Vec<_>>()
                            .join(" | "),
                    ),
                }
            }
        }
    }
    lines.join("\n")
}

/// Stringify any raw element content: strings pass through, tables are
/// flattened, other structures fall back to deep text extraction.
pub fn stringify_element_content(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) if map.contains_key("tr") || map.contains_key("tbody") => {
            stringify_table(content, TableFormat::Markdown)
        }
        other => deep_extract_text(other),
    }
}
