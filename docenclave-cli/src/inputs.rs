//! Input path expansion.

use docenclave::error::{DocEnclaveError, Result};
use std::path::PathBuf;

fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Expand glob patterns into paths, keeping argument order.
///
/// Matches of one pattern are sorted. Plain paths must exist, patterns must
/// match at least one file.
pub fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for input in inputs {
        if !is_pattern(input) {
            let path = PathBuf::from(input);
            if !path.is_file() {
                return Err(DocEnclaveError::file_not_found(path));
            }
            paths.push(path);
            continue;
        }

        let entries = glob::glob(input)
            .map_err(|err| DocEnclaveError::invalid_config(format!("bad pattern '{input}': {err}")))?;
        let mut matched: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        if matched.is_empty() {
            return Err(DocEnclaveError::invalid_config(format!(
                "no files match '{input}'"
            )));
        }
        matched.sort();
        paths.append(&mut matched);
    }

    Ok(paths)
}
