//! Loading evaluation cases from JSONL.

use std::path::Path;

use crate::{
    error::{DjxError, IoResultExt, Result},
    models::EvalCase,
};

/// Read one case per non-blank line of `path`.
pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let text = std::fs::read_to_string(path).fs_context(path)?;
    parse_cases(&text)
}

/// Parse JSONL case text, numbering cases in input order.
///
/// A malformed line fails the whole load: a batch with silently missing
/// cases would report misleading rates.
pub fn parse_cases(text: &str) -> Result<Vec<EvalCase>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line_no, line)| {
            serde_json::from_str::<EvalCase>(line).map_err(|e| {
                DjxError::invalid_input("cases").with_reason(format!("line {}: {e}", line_no + 1))
            })
        })
        .enumerate()
        .map(|(index, case)| {
            case.map(|mut case| {
                case.index = index;
                case
            })
        })
        .collect()
}
