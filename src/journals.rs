//! Journal-name normalization.
//!
//! A read-only table maps long journal names to their standard short
//! forms. Matching is performed after title-casing the entry's journal
//! value so that case variants of the same name still hit the table.

use std::collections::BTreeSet;

use crate::bibtex::Entry;

/// Long journal names and their standard abbreviations.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Physical Review Letters", "Phys. Rev. Lett."),
    ("Physical Review A", "Phys. Rev. A"),
    ("Physical Review B", "Phys. Rev. B"),
    ("Physical Review X", "Phys. Rev. X"),
    ("Physical Review Research", "Phys. Rev. Res."),
    ("Nano Letters", "Nano Lett."),
    ("Nature Communications", "Nat Commun"),
    ("Nature Reviews Materials", "Nat Rev Mater"),
    ("Nature Materials", "Nat. Mater."),
    ("Nature Nanotechnology", "Nat. Nanotechnol."),
    ("Nature Physics", "Nat. Phys."),
    (
        "Proceedings of the National Academy of Sciences",
        "Proc. Natl. Acad. Sci. U.S.A.",
    ),
    ("Communications Physics", "Commun Phys"),
    ("Nature Reviews Physics", "Nat Rev Phys"),
    ("Reviews of Modern Physics", "Rev. Mod. Phys."),
    ("Science Advances", "Sci. Adv."),
    ("Scientific Reports", "Sci Rep"),
    ("Reports on Progress in Physics", "Rep. Prog. Phys."),
    (
        "Journal of Physics: Condensed Matter",
        "J. Phys.: Condens. Matter",
    ),
];

const SMALL_WORDS: &[&str] = &[
    "of", "the", "and", "in", "on", "at", "by", "for", "to", "with", "a", "an",
];

/// Looks up the abbreviation for a long journal name, exact match.
pub fn abbreviation_for(long_name: &str) -> Option<&'static str> {
    ABBREVIATIONS
        .iter()
        .find(|(long, _)| *long == long_name)
        .map(|(_, short)| *short)
}

/// Title-cases a journal name: each word capitalized, except small
/// connective words after the first position, which stay as-is when
/// already lowercase.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i != 0 && SMALL_WORDS.contains(&word) {
                word.to_string()
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Replaces long journal names with their short forms in place.
/// Returns the number of entries changed.
pub fn abbreviate(entries: &mut [Entry]) -> usize {
    let mut changed = 0;
    for entry in entries.iter_mut() {
        let Some(journal) = entry.journal() else {
            continue;
        };
        if let Some(short) = abbreviation_for(&title_case(journal)) {
            if entry.journal() != Some(short) {
                entry.set("journal", short);
                changed += 1;
            }
        }
    }
    changed
}

/// The sorted set of distinct journal names present in the entries.
pub fn journal_names(entries: &[Entry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| e.journal())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
