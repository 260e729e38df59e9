//! Row selection strings: `"a:b"`, `"a,b,c"` or `"n"`.
//!
//! Slices are half-open and clamp to the table bounds. Negative positions
//! count from the end. Explicit positions must be in range.

use crate::error::{AimlError, Result};

/// Resolves a selection string against a table of `n_rows` rows.
pub fn parse_row_selection(selection: &str, n_rows: usize) -> Result<Vec<usize>> {
    let selection = selection.trim();
    if selection.is_empty() {
        return Ok((0..n_rows).collect());
    }

    if selection.contains(':') {
        let parts: Vec<&str> = selection.split(':').collect();
        if parts.len() != 2 {
            return Err(AimlError::InvalidRowSelection(format!(
                "'{}' has more than one ':'",
                selection
            )));
        }
        let start = parse_bound(parts[0], selection)?.map_or(0, |b| clamp(b, n_rows));
        let stop = parse_bound(parts[1], selection)?.map_or(n_rows, |b| clamp(b, n_rows));
        return Ok((start..stop.max(start)).collect());
    }

    selection
        .split(',')
        .map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return Err(AimlError::InvalidRowSelection(format!(
                    "empty position in '{}'",
                    selection
                )));
            }
            let position = parse_position(part, selection)?;
            resolve(position, n_rows).ok_or_else(|| {
                AimlError::InvalidRowSelection(format!(
                    "position {} is out of range for {} rows",
                    position, n_rows
                ))
            })
        })
        .collect()
}

fn parse_position(text: &str, selection: &str) -> Result<i64> {
    text.parse::<i64>().map_err(|_| {
        AimlError::InvalidRowSelection(format!("'{}' in '{}' is not an integer", text, selection))
    })
}

fn parse_bound(text: &str, selection: &str) -> Result<Option<i64>> {
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        parse_position(text, selection).map(Some)
    }
}

fn clamp(bound: i64, n_rows: usize) -> usize {
    let n = n_rows as i64;
    let absolute = if bound < 0 { bound + n } else { bound };
    absolute.clamp(0, n) as usize
}

fn resolve(position: i64, n_rows: usize) -> Option<usize> {
    let n = n_rows as i64;
    let absolute = if position < 0 { position + n } else { position };
    (0..n).contains(&absolute).then_some(absolute as usize)
}
