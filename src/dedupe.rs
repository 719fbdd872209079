//! Duplicate detection and resolution for bibliography entries.
//!
//! Entries are grouped by a normalized (title, author, year) signature;
//! groups with more than one member are probable duplicates. Display
//! mode renders a report; interactive resolution asks a
//! [`DecisionSource`] which member of each group to keep and produces a
//! deduplicated entry list plus citation-key rewrite rules.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::bibtex::Entry;

/// Normalized (title, author, year) triple used as the grouping key.
///
/// Title and author are lowercased with every non-alphanumeric
/// character removed, so punctuation, spacing, and case variants of the
/// same paper collapse together. Year is compared verbatim after
/// trimming surrounding whitespace: an entry missing its year never
/// groups with one that has it. DOI is intentionally not part of the
/// signature.
pub type Signature = (String, String, String);

/// Computes the grouping signature of an entry. Missing fields are
/// treated as empty strings; this never fails.
pub fn signature(entry: &Entry) -> Signature {
    (
        squash(entry.title().unwrap_or("")),
        squash(entry.author().unwrap_or("")),
        entry.year().unwrap_or("").trim().to_string(),
    )
}

fn squash(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Entries sharing one signature, in the order they appeared in the
/// source file. Always has at least two members.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub entries: Vec<Entry>,
}

impl DuplicateGroup {
    /// True when the usage filter is inactive or at least one member's
    /// key is cited.
    pub fn is_interesting(&self, used: Option<&HashSet<String>>) -> bool {
        match used {
            Some(used) => self.entries.iter().any(|e| used.contains(&e.key)),
            None => true,
        }
    }
}

/// Partitions entries by signature and returns the groups with two or
/// more members, in first-seen signature order. One pass, O(n).
pub fn find_duplicates(entries: &[Entry]) -> Vec<DuplicateGroup> {
    let mut index: HashMap<Signature, usize> = HashMap::new();
    let mut groups: Vec<Vec<Entry>> = Vec::new();

    for entry in entries {
        match index.entry(signature(entry)) {
            MapEntry::Occupied(slot) => groups[*slot.get()].push(entry.clone()),
            MapEntry::Vacant(slot) => {
                slot.insert(groups.len());
                groups.push(vec![entry.clone()]);
            }
        }
    }

    groups
        .into_iter()
        .filter(|g| g.len() > 1)
        .map(|entries| DuplicateGroup { entries })
        .collect()
}

/// The operator's answer for one duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep the member at this 1-based index; discard the rest.
    Keep(usize),
    /// Deliberately leave the whole group untouched.
    Skip,
    /// The answer could not be understood.
    Invalid,
}

/// Supplies one decision per duplicate group.
///
/// The binary wires in a blocking stdin prompt; tests supply scripted
/// decisions.
pub trait DecisionSource {
    fn choose(&mut self, group: &DuplicateGroup) -> Decision;

    /// Called when the choice was invalid or out of range and the group
    /// is being kept as-is. Distinguishes this from a deliberate skip.
    fn warn_invalid(&mut self) {}
}

/// Result of an interactive resolution pass.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Every entry that survives: entries never in a duplicate group,
    /// members of skipped or filtered-out groups, and the chosen member
    /// of each resolved group. Input order is preserved.
    pub kept: Vec<Entry>,
    /// (discarded key, kept key) pairs, one per discarded entry, in
    /// original member order.
    pub replacements: Vec<(String, String)>,
}

/// Resolves each interesting duplicate group with one decision from
/// `source`, sequentially.
///
/// Groups with no cited member (when `used` is given) bypass the
/// decision entirely: all members are kept and no replacement is
/// recorded. An invalid or out-of-range answer keeps the whole group
/// and triggers [`DecisionSource::warn_invalid`].
pub fn resolve(
    entries: &[Entry],
    groups: &[DuplicateGroup],
    used: Option<&HashSet<String>>,
    source: &mut dyn DecisionSource,
) -> Resolution {
    let mut discarded: HashSet<String> = HashSet::new();
    let mut replacements: Vec<(String, String)> = Vec::new();

    for group in groups {
        if !group.is_interesting(used) {
            continue;
        }

        match source.choose(group) {
            Decision::Skip => {}
            Decision::Keep(n) if (1..=group.entries.len()).contains(&n) => {
                let kept_key = group.entries[n - 1].key.clone();
                for (i, entry) in group.entries.iter().enumerate() {
                    if i != n - 1 {
                        discarded.insert(entry.key.clone());
                        replacements.push((entry.key.clone(), kept_key.clone()));
                    }
                }
            }
            _ => source.warn_invalid(),
        }
    }

    let kept = entries
        .iter()
        .filter(|e| !discarded.contains(&e.key))
        .cloned()
        .collect();

    Resolution { kept, replacements }
}

/// Parses an operator answer: a 1-based index, or `s` to skip.
pub fn parse_decision(answer: &str) -> Decision {
    let answer = answer.trim().to_lowercase();
    if answer == "s" {
        return Decision::Skip;
    }
    match answer.parse::<usize>() {
        Ok(n) if n >= 1 => Decision::Keep(n),
        _ => Decision::Invalid,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Title/Author/Year header of a group, taken from its first member.
pub fn render_group_header(group: &DuplicateGroup) -> String {
    let first = &group.entries[0];
    format!(
        "--- Duplicate group ---\nTitle : {}\nAuthor: {}\nYear  : {}\n",
        first.title().unwrap_or(""),
        first.author().unwrap_or(""),
        first.year().unwrap_or("")
    )
}

fn member_line(entry: &Entry, used: Option<&HashSet<String>>) -> String {
    let mark = match used {
        Some(used) if used.contains(&entry.key) => " (USED)",
        _ => "",
    };
    format!(
        "Key: {} | DOI: {} | Year: {}{}",
        entry.key,
        entry.doi().unwrap_or("N/A"),
        entry.year().unwrap_or("N/A"),
        mark
    )
}

/// Group presentation for the interactive prompt, with 1-based indices.
pub fn render_group_numbered(group: &DuplicateGroup, used: Option<&HashSet<String>>) -> String {
    let mut out = render_group_header(group);
    for (i, entry) in group.entries.iter().enumerate() {
        let _ = writeln!(out, "{}: {}", i + 1, member_line(entry, used));
    }
    out
}

/// Display-mode report over all groups.
///
/// The count covers every duplicate group found; when the usage filter
/// is active, groups with no cited member are counted but not listed.
/// Zero groups yields the single "no duplicates" line.
pub fn render_report(groups: &[DuplicateGroup], used: Option<&HashSet<String>>) -> String {
    if groups.is_empty() {
        return "No duplicates found.\n".to_string();
    }

    let mut out = format!("Found {} possible duplicate groups:\n\n", groups.len());
    for group in groups {
        if !group.is_interesting(used) {
            continue;
        }
        out.push_str(&render_group_header(group));
        for entry in &group.entries {
            let _ = writeln!(out, "{}", member_line(entry, used));
        }
        out.push('\n');
    }
    out
}

/// Renders the replacement mapping as a sed script: three substitution
/// rules per pair, one for each citation command spelling. The output
/// is directly usable as `sed -f replace_keys.sed main.tex`.
pub fn sed_rules(replacements: &[(String, String)]) -> String {
    let mut out = String::new();
    for (old, new) in replacements {
        for cmd in ["cite", "citep", "citet"] {
            let _ = writeln!(out, "s/\\\\{}{{{}}}/\\\\{}{{{}}}/g", cmd, old, cmd, new);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, title: &str, author: &str, year: &str) -> Entry {
        let mut e = Entry::new(key, "article");
        if !title.is_empty() {
            e.set("title", title);
        }
        if !author.is_empty() {
            e.set("author", author);
        }
        if !year.is_empty() {
            e.set("year", year);
        }
        e
    }

    fn used(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    /// Scripted decision source for tests.
    struct Scripted {
        decisions: Vec<Decision>,
        next: usize,
        invalid_warnings: usize,
    }

    impl Scripted {
        fn new(decisions: Vec<Decision>) -> Self {
            Scripted {
                decisions,
                next: 0,
                invalid_warnings: 0,
            }
        }
    }

    impl DecisionSource for Scripted {
        fn choose(&mut self, _group: &DuplicateGroup) -> Decision {
            let d = self.decisions[self.next];
            self.next += 1;
            d
        }

        fn warn_invalid(&mut self) {
            self.invalid_warnings += 1;
        }
    }

    // --- signature ---

    #[test]
    fn test_signature_normalizes_case_spacing_punctuation() {
        // Given: three spellings of the same paper
        let a = entry("r1", "Deep Learning", "A. Author", "2020");
        let b = entry("r2", "deep-learning", "A  Author", "2020");
        let c = entry("r3", "DEEP  LEARNING", "a.author", "2020");

        // Then: all three signatures agree
        assert_eq!(signature(&a), signature(&b));
        assert_eq!(signature(&b), signature(&c));
    }

    #[test]
    fn test_signature_year_is_exact_after_trim() {
        let a = entry("r1", "T", "A", "2023");
        let b = entry("r2", "T", "A", " 2023 ");
        let c = entry("r3", "T", "A", "");
        assert_eq!(signature(&a), signature(&b));
        assert_ne!(signature(&a), signature(&c));
    }

    #[test]
    fn test_signature_missing_fields_default_to_empty() {
        let e = Entry::new("bare", "misc");
        assert_eq!(signature(&e), (String::new(), String::new(), String::new()));
    }

    // --- find_duplicates ---

    #[test]
    fn test_find_duplicates_groups_matching_entries() {
        let entries = vec![
            entry("r1", "Deep Learning", "Smith", "2020"),
            entry("other", "Unrelated", "Jones", "2019"),
            entry("r2", "Deep  Learning", "Smith", "2020"),
        ];

        let groups = find_duplicates(&entries);

        assert_eq!(groups.len(), 1);
        let keys: Vec<_> = groups[0].entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["r1", "r2"], "first-seen order within the group");
    }

    #[test]
    fn test_find_duplicates_no_singleton_groups() {
        let entries = vec![
            entry("a", "One", "X", "2001"),
            entry("b", "Two", "Y", "2002"),
            entry("c", "Three", "Z", "2003"),
        ];
        assert!(find_duplicates(&entries).is_empty());
    }

    #[test]
    fn test_find_duplicates_distinct_year_not_grouped() {
        let entries = vec![
            entry("a", "Same Title", "Same Author", "2020"),
            entry("b", "Same Title", "Same Author", "2021"),
        ];
        assert!(find_duplicates(&entries).is_empty());
    }

    #[test]
    fn test_find_duplicates_group_of_three() {
        let entries = vec![
            entry("a", "T", "A", "2020"),
            entry("b", "T", "A", "2020"),
            entry("c", "T", "A", "2020"),
        ];
        let groups = find_duplicates(&entries);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entries.len(), 3);
    }

    #[test]
    fn test_find_duplicates_deterministic_group_order() {
        let entries = vec![
            entry("a1", "Alpha", "A", "2020"),
            entry("b1", "Beta", "B", "2021"),
            entry("b2", "Beta", "B", "2021"),
            entry("a2", "Alpha", "A", "2020"),
        ];
        let groups = find_duplicates(&entries);
        assert_eq!(groups.len(), 2);
        // Alpha was seen first, so its group comes first.
        assert_eq!(groups[0].entries[0].key, "a1");
        assert_eq!(groups[1].entries[0].key, "b1");
    }

    // --- resolve ---

    #[test]
    fn test_resolve_keep_one_discards_others() {
        // Given: a group of three, keep index 2
        let entries = vec![
            entry("a", "T", "A", "2020"),
            entry("b", "T", "A", "2020"),
            entry("c", "T", "A", "2020"),
        ];
        let groups = find_duplicates(&entries);
        let mut source = Scripted::new(vec![Decision::Keep(2)]);

        // When: we resolve
        let res = resolve(&entries, &groups, None, &mut source);

        // Then: k-1 replacement pairs all mapping to the kept key
        assert_eq!(
            res.replacements,
            vec![
                ("a".to_string(), "b".to_string()),
                ("c".to_string(), "b".to_string()),
            ]
        );
        let kept: Vec<_> = res.kept.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(kept, vec!["b"]);
    }

    #[test]
    fn test_resolve_skip_keeps_all_without_warning() {
        let entries = vec![entry("a", "T", "A", "2020"), entry("b", "T", "A", "2020")];
        let groups = find_duplicates(&entries);
        let mut source = Scripted::new(vec![Decision::Skip]);

        let res = resolve(&entries, &groups, None, &mut source);

        assert!(res.replacements.is_empty());
        assert_eq!(res.kept.len(), 2);
        assert_eq!(source.invalid_warnings, 0);
    }

    #[test]
    fn test_resolve_invalid_index_keeps_all_with_warning() {
        let entries = vec![entry("a", "T", "A", "2020"), entry("b", "T", "A", "2020")];
        let groups = find_duplicates(&entries);

        // Out of range (0 and 3) and unparsable answers all degrade the same way.
        for decision in [Decision::Keep(0), Decision::Keep(3), Decision::Invalid] {
            let mut source = Scripted::new(vec![decision]);
            let res = resolve(&entries, &groups, None, &mut source);
            assert!(res.replacements.is_empty());
            assert_eq!(res.kept.len(), 2);
            assert_eq!(source.invalid_warnings, 1, "{:?}", decision);
        }
    }

    #[test]
    fn test_resolve_untouched_entries_always_kept() {
        // Given: a duplicate pair and an unrelated singleton
        let entries = vec![
            entry("dup1", "T", "A", "2020"),
            entry("solo", "Unique", "B", "1999"),
            entry("dup2", "T", "A", "2020"),
        ];
        let groups = find_duplicates(&entries);
        let mut source = Scripted::new(vec![Decision::Keep(1)]);

        let res = resolve(&entries, &groups, None, &mut source);

        let kept: Vec<_> = res.kept.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(kept, vec!["dup1", "solo"]);
    }

    #[test]
    fn test_resolve_usage_filter_bypasses_uncited_groups() {
        // Given: two duplicate groups, only one has a cited member
        let entries = vec![
            entry("cited1", "T", "A", "2020"),
            entry("cited2", "T", "A", "2020"),
            entry("cold1", "U", "B", "2021"),
            entry("cold2", "U", "B", "2021"),
        ];
        let groups = find_duplicates(&entries);
        let used = used(&["cited2"]);
        let mut source = Scripted::new(vec![Decision::Keep(1)]);

        // When: we resolve with the filter active
        let res = resolve(&entries, &groups, Some(&used), &mut source);

        // Then: only the cited group was presented and resolved
        assert_eq!(source.next, 1, "exactly one group went through the prompt");
        assert_eq!(res.replacements, vec![("cited2".to_string(), "cited1".to_string())]);
        let kept: Vec<_> = res.kept.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(kept, vec!["cited1", "cold1", "cold2"]);
    }

    #[test]
    fn test_resolve_no_groups_is_identity() {
        let entries = vec![
            entry("a", "One", "X", "2001"),
            entry("b", "Two", "Y", "2002"),
        ];
        let groups = find_duplicates(&entries);
        let mut source = Scripted::new(vec![]);

        let res = resolve(&entries, &groups, None, &mut source);

        assert_eq!(res.kept.len(), 2);
        assert!(res.replacements.is_empty());
    }

    // --- parse_decision ---

    #[test]
    fn test_parse_decision_index() {
        assert_eq!(parse_decision("2"), Decision::Keep(2));
        assert_eq!(parse_decision(" 1 \n"), Decision::Keep(1));
    }

    #[test]
    fn test_parse_decision_skip() {
        assert_eq!(parse_decision("s"), Decision::Skip);
        assert_eq!(parse_decision("S"), Decision::Skip);
    }

    #[test]
    fn test_parse_decision_invalid() {
        assert_eq!(parse_decision("zero"), Decision::Invalid);
        assert_eq!(parse_decision("0"), Decision::Invalid);
        assert_eq!(parse_decision(""), Decision::Invalid);
    }

    // --- rendering ---

    #[test]
    fn test_render_report_no_duplicates() {
        assert_eq!(render_report(&[], None), "No duplicates found.\n");
    }

    #[test]
    fn test_render_report_lists_groups_with_count() {
        let entries = vec![
            entry("r1", "Deep Learning", "Smith", "2020"),
            entry("r2", "deep-learning", "Smith", "2020"),
        ];
        let groups = find_duplicates(&entries);

        let report = render_report(&groups, None);

        assert!(report.starts_with("Found 1 possible duplicate groups:"));
        assert!(report.contains("Title : Deep Learning"));
        assert!(report.contains("Key: r1 | DOI: N/A | Year: 2020"));
        assert!(report.contains("Key: r2"));
        assert!(!report.contains("(USED)"));
    }

    #[test]
    fn test_render_report_is_idempotent() {
        let entries = vec![
            entry("r1", "Deep Learning", "Smith", "2020"),
            entry("r2", "Deep  Learning", "Smith", "2020"),
        ];
        let groups = find_duplicates(&entries);
        assert_eq!(render_report(&groups, None), render_report(&groups, None));
    }

    #[test]
    fn test_render_report_marks_used_and_hides_uncited_groups() {
        let entries = vec![
            entry("hot1", "T", "A", "2020"),
            entry("hot2", "T", "A", "2020"),
            entry("cold1", "U", "B", "2021"),
            entry("cold2", "U", "B", "2021"),
        ];
        let groups = find_duplicates(&entries);
        let used = used(&["hot2"]);

        let report = render_report(&groups, Some(&used));

        // Count covers all groups; only the cited one is listed.
        assert!(report.starts_with("Found 2 possible duplicate groups:"));
        assert!(report.contains("Key: hot2 | DOI: N/A | Year: 2020 (USED)"));
        assert!(report.contains("Key: hot1 | DOI: N/A | Year: 2020\n"));
        assert!(!report.contains("cold1"));
    }

    #[test]
    fn test_render_group_numbered_indices_are_one_based() {
        let entries = vec![entry("a", "T", "A", "2020"), entry("b", "T", "A", "2020")];
        let groups = find_duplicates(&entries);
        let text = render_group_numbered(&groups[0], None);
        assert!(text.contains("1: Key: a"));
        assert!(text.contains("2: Key: b"));
    }

    #[test]
    fn test_member_line_shows_doi_when_present() {
        let mut e = entry("d1", "T", "A", "2020");
        e.set("doi", "10.1000/xyz");
        let group = DuplicateGroup {
            entries: vec![e, entry("d2", "T", "A", "2020")],
        };
        let text = render_group_numbered(&group, None);
        assert!(text.contains("DOI: 10.1000/xyz"));
    }

    // --- sed rules ---

    #[test]
    fn test_sed_rules_three_lines_per_pair() {
        let replacements = vec![("ref2".to_string(), "ref1".to_string())];

        let script = sed_rules(&replacements);

        let lines: Vec<_> = script.lines().collect();
        assert_eq!(
            lines,
            vec![
                "s/\\\\cite{ref2}/\\\\cite{ref1}/g",
                "s/\\\\citep{ref2}/\\\\citep{ref1}/g",
                "s/\\\\citet{ref2}/\\\\citet{ref1}/g",
            ]
        );
    }

    #[test]
    fn test_sed_rules_empty() {
        assert_eq!(sed_rules(&[]), "");
    }
}
