//! Title capitalization protection.
//!
//! BibTeX styles are free to downcase titles; wrapping every word in
//! braces pins the exact capitalization the author wrote.

use crate::bibtex::Entry;

/// Wraps each whitespace-separated word of the title in braces.
pub fn brace_words(title: &str) -> String {
    title
        .split_whitespace()
        .map(|word| format!("{{{}}}", word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Applies [`brace_words`] to every entry with a title, in place.
/// Returns the number of entries changed.
pub fn protect_titles(entries: &mut [Entry]) -> usize {
    let mut changed = 0;
    for entry in entries.iter_mut() {
        if let Some(title) = entry.title() {
            let braced = brace_words(title);
            if entry.title() != Some(braced.as_str()) {
                entry.set("title", braced);
                changed += 1;
            }
        }
    }
    changed
}
