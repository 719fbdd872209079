//! Backfill of missing `pages` fields from the DOI.
//!
//! Physical Review DOIs encode the article number in their last
//! segment, so those are derived locally. Other DOIs go through the
//! doi.org content-negotiation API. Lookups are best effort: a failure
//! is reported for that entry and the run continues.

use serde_json::Value;
use thiserror::Error;

use crate::bibtex::Entry;

/// arXiv DOI prefix; preprints have no page numbers to fetch.
const ARXIV_PREFIX: &str = "10.48550";

/// Physical Review family prefix; the article number is the DOI tail.
const PHYS_REV_PREFIX: &str = "10.1103";

/// Errors from a metadata lookup.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] Box<ureq::Error>),

    #[error("invalid response: {0}")]
    Body(#[from] std::io::Error),
}

/// Resolves a DOI to its bibliographic metadata.
pub trait MetadataSource {
    fn lookup(&self, doi: &str) -> Result<Value, LookupError>;
}

/// Live lookup against `https://doi.org/<doi>` with JSON content
/// negotiation.
pub struct DoiOrg;

impl MetadataSource for DoiOrg {
    fn lookup(&self, doi: &str) -> Result<Value, LookupError> {
        let url = format!("https://doi.org/{}", doi);
        let response = ureq::get(&url)
            .set("Accept", "application/json")
            .call()
            .map_err(Box::new)?;
        Ok(response.into_json()?)
    }
}

/// What happened to one entry during a backfill pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `pages` was set to this value.
    Filled(String),
    /// Entry already had a `pages` field.
    AlreadyPresent,
    /// Entry has no DOI to resolve.
    NoDoi,
    /// arXiv preprint, skipped.
    ArxivSkipped,
    /// The metadata lookup failed.
    LookupFailed(String),
    /// Metadata arrived but carried neither `article-number` nor `page`.
    PagesNotInMetadata,
}

/// Fills missing `pages` fields in place, one entry at a time, and
/// returns what happened per entry (in input order).
pub fn backfill(entries: &mut [Entry], source: &dyn MetadataSource) -> Vec<(String, Outcome)> {
    let mut report = Vec::with_capacity(entries.len());

    for entry in entries.iter_mut() {
        let outcome = backfill_entry(entry, source);
        report.push((entry.key.clone(), outcome));
    }

    report
}

fn backfill_entry(entry: &mut Entry, source: &dyn MetadataSource) -> Outcome {
    if entry.get("pages").is_some() {
        return Outcome::AlreadyPresent;
    }
    let Some(doi) = entry.doi().map(str::to_string) else {
        return Outcome::NoDoi;
    };

    if doi.starts_with(ARXIV_PREFIX) {
        return Outcome::ArxivSkipped;
    }

    if doi.starts_with(PHYS_REV_PREFIX) {
        let pages = phys_rev_article_number(&doi);
        entry.set("pages", pages.clone());
        return Outcome::Filled(pages);
    }

    match source.lookup(&doi) {
        Ok(metadata) => match pages_from_metadata(&metadata) {
            Some(pages) => {
                entry.set("pages", pages.clone());
                Outcome::Filled(pages)
            }
            None => Outcome::PagesNotInMetadata,
        },
        Err(e) => Outcome::LookupFailed(e.to_string()),
    }
}

/// The article number of a Physical Review DOI: its last dot-separated
/// segment with the first character uppercased (e.g. `10.1103/…136.l041001`
/// → `L041001`).
fn phys_rev_article_number(doi: &str) -> String {
    let tail = doi.rsplit('.').next().unwrap_or(doi);
    let mut chars = tail.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Picks the page field out of a doi.org metadata object:
/// `article-number` is preferred, then `page`.
fn pages_from_metadata(metadata: &Value) -> Option<String> {
    for field in ["article-number", "page"] {
        if let Some(value) = metadata.get(field) {
            match value {
                Value::String(s) => return Some(s.clone()),
                Value::Number(n) => return Some(n.to_string()),
                _ => {}
            }
        }
    }
    None
}
