//! Unused-figure audit: PDF files on disk that no `\includegraphics`
//! in the LaTeX source refers to.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use crate::tex::included_figures;

/// Lists the `.pdf` file names in `dir`, excluding `exclude` (the
/// PDF the LaTeX run itself produces).
pub fn pdf_files_in(dir: &Path, exclude: &str) -> io::Result<HashSet<String>> {
    let mut pdfs = HashSet::new();
    for item in std::fs::read_dir(dir)? {
        let item = item?;
        let name = item.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.ends_with(".pdf") && name != exclude {
            pdfs.insert(name.to_string());
        }
    }
    Ok(pdfs)
}

/// PDF files present on disk but never included by the source, sorted.
pub fn unused_figures(pdf_files: &HashSet<String>, tex: &str) -> Vec<String> {
    let used = included_figures(tex);
    let mut unused: Vec<String> = pdf_files.difference(&used).cloned().collect();
    unused.sort();
    unused
}

/// The name of the PDF a LaTeX file compiles to, e.g. `main.tex` →
/// `main.pdf`.
pub fn generated_pdf_name(tex_path: &Path) -> String {
    let stem = tex_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    format!("{}.pdf", stem)
}
