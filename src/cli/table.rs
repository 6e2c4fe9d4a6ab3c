//! ASCII table formatter for query results.
//!
//! ```text
//! +---+---+
//! | a | b |
//! +---+---+
//! | 1 | 2 |
//! +---+---+
//! 1 row in set
//! ```
//!
//! Column widths are the maximum of header and value widths; values render
//! through the engine's canonical `Display` (nulls as `null`).

use crate::exec::Row;

pub fn format_table(headers: &[String], rows: &[Row]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len().max(1)).collect();
    let rendered: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.values.iter().map(|v| v.to_string()).collect())
        .collect();
    for row in &rendered {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let separator = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let mut out = String::new();
    out.push_str(&separator);
    out.push('|');
    for (header, width) in headers.iter().zip(&widths) {
        let w = *width;
        out.push_str(&format!(" {header:<w$} |"));
    }
    out.push('\n');
    out.push_str(&separator);
    for row in &rendered {
        out.push('|');
        for (cell, width) in row.iter().zip(&widths) {
            let w = *width;
            out.push_str(&format!(" {cell:<w$} |"));
        }
        out.push('\n');
    }
    out.push_str(&separator);
    let n = rows.len();
    out.push_str(&format!("{n} row{} in set\n", if n == 1 { "" } else { "s" }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn formats_headers_and_rows() {
        let rows = vec![
            Row {
                values: vec![Value::Integer(1), Value::str("alice")],
            },
            Row {
                values: vec![Value::Integer(2), Value::str("bo")],
            },
        ];
        let out = format_table(&["id".to_string(), "name".to_string()], &rows);
        assert!(out.contains("| id | name  |"));
        assert!(out.contains("| 1  | alice |"));
        assert!(out.ends_with("2 rows in set\n"));
    }
}
