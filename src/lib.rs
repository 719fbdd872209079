//! bib-tools: CLI toolkit for maintaining BibTeX databases and their
//! LaTeX cross-references.
//!
//! This library provides functionality to:
//! - Parse and serialize BibTeX databases
//! - Find and resolve duplicate entries by normalized signature
//! - Extract citation keys and figure references from LaTeX sources
//! - Normalize journal names, protect title casing, backfill page numbers

pub mod bibtex;
pub mod dedupe;
pub mod figs;
pub mod journals;
pub mod pages;
pub mod tex;
pub mod title;

pub use bibtex::{parse, serialize, Database, Entry};
pub use dedupe::{
    find_duplicates, render_report, resolve, sed_rules, Decision, DecisionSource, DuplicateGroup,
};
pub use tex::{aux_keys, cited_keys, included_figures};
