//! Extraction of citation keys and figure references from LaTeX sources.

use std::collections::{BTreeSet, HashSet};

use regex::Regex;

/// Extracts every citation key referenced through `\cite{…}`,
/// `\citep{…}`, or `\citet{…}`.
///
/// Each command takes a comma-separated key list in one braced
/// argument; keys are trimmed and empty items are dropped, so an empty
/// argument list contributes nothing.
pub fn cited_keys(tex: &str) -> HashSet<String> {
    let re = Regex::new(r"\\cite[tp]?\{([^}]*)\}").unwrap();

    let mut keys = HashSet::new();
    for cap in re.captures_iter(tex) {
        for key in cap[1].split(',') {
            let key = key.trim();
            if !key.is_empty() {
                keys.insert(key.to_string());
            }
        }
    }
    keys
}

/// Extracts the sorted union of keys from `\citation{…}` lines of a
/// LaTeX `.aux` file.
pub fn aux_keys(aux: &str) -> Vec<String> {
    let re = Regex::new(r"^\\citation\{([^}]*)\}").unwrap();

    let mut keys = BTreeSet::new();
    for line in aux.lines() {
        if let Some(cap) = re.captures(line.trim_start()) {
            for key in cap[1].split(',') {
                let key = key.trim();
                if !key.is_empty() {
                    keys.insert(key.to_string());
                }
            }
        }
    }
    keys.into_iter().collect()
}

/// Extracts the PDF file names referenced by `\includegraphics`
/// commands, optional bracket arguments included.
pub fn included_figures(tex: &str) -> HashSet<String> {
    let re = Regex::new(r"\\includegraphics(?:\[[^\]]*\])?\{([^}]+?\.pdf)\}").unwrap();

    re.captures_iter(tex)
        .map(|cap| cap[1].to_string())
        .collect()
}
