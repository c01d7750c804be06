use serde_json::Value;

/// Displayed text for one cell. Strings render verbatim (no quotes), null as
/// empty, everything else in its JSON form.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render columns and rows into an aligned text grid for the transcript.
///
/// One header line, a separator, one line per row, cells in the order they
/// were supplied. A row with more or fewer cells than the header renders
/// as-is; no column-count validation is performed.
pub fn format_table(columns: &[String], rows: &[Vec<Value>]) -> Vec<String> {
    let row_texts: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    // Column widths sized to content. Use character count, not byte length,
    // for proper UTF-8 alignment.
    let width = |s: &str| s.chars().count();
    let column_count = columns
        .len()
        .max(row_texts.iter().map(Vec::len).max().unwrap_or(0));

    let mut widths = vec![0usize; column_count];
    for (i, header) in columns.iter().enumerate() {
        widths[i] = width(header);
    }
    for row in &row_texts {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(width(cell));
        }
    }

    let render_row = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<1$}", cell, widths[i]))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let header_cells: Vec<String> = columns.to_vec();
    let separator = widths
        .iter()
        .take(columns.len().max(1))
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render_row(&header_cells));
    lines.push(separator);
    for row in &row_texts {
        lines.push(render_row(row));
    }
    lines
}
