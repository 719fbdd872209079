//! CLI for bib-tools - Maintain BibTeX databases and their LaTeX cross-references.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgGroup, Parser, Subcommand};

use bib_tools::{
    bibtex::{self, Database},
    dedupe::{self, Decision, DecisionSource, DuplicateGroup},
    figs, journals,
    pages::{self, DoiOrg},
    tex, title,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Maintain BibTeX databases and their LaTeX cross-references
#[derive(Parser)]
#[command(name = "bib-tools")]
#[command(version)]
#[command(after_help = "\
Examples:
  bib-tools dedupe --bib refs.bib --show
  bib-tools dedupe --bib refs.bib --resolve --tex main.tex appendix.tex
  bib-tools prune --aux main.aux --bib refs.bib --output trimmed.bib
  bib-tools abbrev --input refs.bib --output refs-short.bib
  bib-tools figs main.tex")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find duplicate entries; show them or resolve them interactively
    #[command(group(ArgGroup::new("mode").required(true).args(["show", "resolve"])))]
    #[command(after_help = "\
Examples:
  bib-tools dedupe --bib refs.bib --show
  bib-tools dedupe --bib refs.bib --show --tex main.tex appendix.tex
  bib-tools dedupe --bib refs.bib --resolve --tex main.tex

Resolution writes the kept entries and a sed script of key rewrites.
Applying the sed script:
  sed -f replace_keys.sed main.tex              # dry run to stdout
  sed -i -f replace_keys.sed main.tex           # in place, one file
  find . -name '*.tex' -exec sed -i -f replace_keys.sed {} +")]
    Dedupe {
        /// BibTeX file to scan
        #[arg(short, long)]
        bib: PathBuf,

        /// Display duplicate groups without changing anything
        #[arg(long)]
        show: bool,

        /// Interactively choose which entry of each group to keep
        #[arg(long)]
        resolve: bool,

        /// LaTeX source(s); when given, only groups with a cited member
        /// are shown or resolved
        #[arg(short, long, num_args = 1..)]
        tex: Vec<PathBuf>,

        /// Where to write the deduplicated bibliography
        #[arg(short, long, default_value = "deduplicated.bib")]
        output: PathBuf,

        /// Where to write the citation-key rewrite rules
        #[arg(long, default_value = "replace_keys.sed")]
        sed: PathBuf,
    },

    /// List every citation key defined in a BibTeX file
    Keys {
        /// BibTeX file to read
        #[arg(short, long)]
        bib: PathBuf,
    },

    /// Write a BibTeX file containing only the entries cited in a LaTeX run
    Prune {
        /// Auxiliary file from the LaTeX run (e.g. main.aux)
        #[arg(short, long)]
        aux: PathBuf,

        /// BibTeX file with the full entry set
        #[arg(short, long)]
        bib: PathBuf,

        /// Output BibTeX file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the distinct journal names present in a BibTeX file
    Journals {
        /// BibTeX file to read
        #[arg(short, long)]
        bib: PathBuf,
    },

    /// Replace long journal names with their standard abbreviations
    Abbrev {
        /// Input BibTeX file
        #[arg(short, long)]
        input: PathBuf,

        /// Output BibTeX file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Brace every word of each title to protect its capitalization
    ProtectCase {
        /// Input BibTeX file
        #[arg(short, long)]
        input: PathBuf,

        /// Output BibTeX file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Backfill missing pages fields from the DOI
    Pages {
        /// Input BibTeX file
        #[arg(short, long)]
        input: PathBuf,

        /// Output BibTeX file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Report PDF figures not referenced by a LaTeX file
    Figs {
        /// LaTeX source to scan for \includegraphics
        tex: PathBuf,

        /// Directory holding the figure PDFs
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// AppError — semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10 — input file not found / unreadable
    InputFile(String),
    /// Exit 11 — bibliography file not found / unreadable
    BibFile(String),
    /// Exit 12 — cannot write output file
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::BibFile(_) => 11,
            AppError::OutputFile(_) => 12,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::BibFile(msg) => {
                write!(f, "{}\n  hint: pass a readable BibTeX (.bib) file", msg)
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Dedupe {
            bib,
            show,
            resolve: _,
            tex,
            output,
            sed,
        } => dedupe_command(&bib, show, &tex, &output, &sed),
        Commands::Keys { bib } => keys_command(&bib),
        Commands::Prune { aux, bib, output } => prune_command(&aux, &bib, &output),
        Commands::Journals { bib } => journals_command(&bib),
        Commands::Abbrev { input, output } => abbrev_command(&input, &output),
        Commands::ProtectCase { input, output } => protect_case_command(&input, &output),
        Commands::Pages { input, output } => pages_command(&input, &output),
        Commands::Figs { tex, dir } => figs_command(&tex, &dir),
    }
}

// ---------------------------------------------------------------------------
// Shared IO helpers
// ---------------------------------------------------------------------------

/// Reads and parses a bibliography, reporting recoverable parse
/// warnings on stderr.
fn read_bib(path: &Path) -> Result<Database, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::BibFile(format!("'{}': {}", path.display(), e)))?;
    let db = bibtex::parse(&text);
    for warning in &db.warnings {
        eprintln!(
            "warning: {}:{}: {}",
            path.display(),
            warning.line,
            warning.message
        );
    }
    Ok(db)
}

fn write_output(path: &Path, content: &str) -> Result<(), AppError> {
    fs::write(path, content).map_err(|e| AppError::OutputFile(format!("'{}': {}", path.display(), e)))
}

// ---------------------------------------------------------------------------
// dedupe
// ---------------------------------------------------------------------------

/// Blocking stdin prompt: presents the group and reads one answer.
struct ConsolePrompt {
    used: Option<HashSet<String>>,
}

impl DecisionSource for ConsolePrompt {
    fn choose(&mut self, group: &DuplicateGroup) -> Decision {
        print!("{}", dedupe::render_group_numbered(group, self.used.as_ref()));
        print!("Choose which entry to keep (1, 2, ...), or 's' to skip: ");
        io::stdout().flush().ok();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            // EOF means there is nobody to ask; leave the group alone.
            Ok(0) | Err(_) => Decision::Skip,
            Ok(_) => dedupe::parse_decision(&line),
        }
    }

    fn warn_invalid(&mut self) {
        println!("Invalid choice, keeping all entries in this group.");
    }
}

fn dedupe_command(
    bib: &Path,
    show: bool,
    tex_files: &[PathBuf],
    output: &Path,
    sed: &Path,
) -> Result<(), AppError> {
    let db = read_bib(bib)?;

    let used = if tex_files.is_empty() {
        None
    } else {
        let mut keys = HashSet::new();
        for path in tex_files {
            let text = fs::read_to_string(path)
                .map_err(|e| AppError::InputFile(format!("'{}': {}", path.display(), e)))?;
            keys.extend(tex::cited_keys(&text));
        }
        Some(keys)
    };

    let groups = dedupe::find_duplicates(&db.entries);

    if show {
        print!("{}", dedupe::render_report(&groups, used.as_ref()));
        return Ok(());
    }

    let mut prompt = ConsolePrompt { used: used.clone() };
    let resolution = dedupe::resolve(&db.entries, &groups, used.as_ref(), &mut prompt);

    // Both outputs are written only after every group is decided.
    write_output(output, &bibtex::serialize(&resolution.kept))?;
    write_output(sed, &dedupe::sed_rules(&resolution.replacements))?;

    println!(
        "\nSaved {} ({} entries) and {} ({} rewrite pairs)",
        output.display(),
        resolution.kept.len(),
        sed.display(),
        resolution.replacements.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Other commands
// ---------------------------------------------------------------------------

fn keys_command(bib: &Path) -> Result<(), AppError> {
    let db = read_bib(bib)?;
    for entry in &db.entries {
        println!("{}", entry.key);
    }
    Ok(())
}

fn prune_command(aux: &Path, bib: &Path, output: &Path) -> Result<(), AppError> {
    let aux_text = fs::read_to_string(aux)
        .map_err(|e| AppError::InputFile(format!("'{}': {}", aux.display(), e)))?;
    let cited = tex::aux_keys(&aux_text);
    println!("Citation keys in {}: {}", aux.display(), cited.len());

    let db = read_bib(bib)?;
    println!("Entries in {}: {}", bib.display(), db.entries.len());

    // Keys missing from the bibliography are silently ignored; BibTeX
    // itself already warned about those during the LaTeX run.
    let selected: Vec<_> = cited
        .iter()
        .filter_map(|key| db.entries.iter().find(|e| &e.key == key))
        .cloned()
        .collect();

    write_output(output, &bibtex::serialize(&selected))?;
    println!("Wrote {} entries to {}", selected.len(), output.display());
    Ok(())
}

fn journals_command(bib: &Path) -> Result<(), AppError> {
    let db = read_bib(bib)?;
    println!("Journal names:");
    for journal in journals::journal_names(&db.entries) {
        println!("- {}", journal);
    }
    Ok(())
}

fn abbrev_command(input: &Path, output: &Path) -> Result<(), AppError> {
    let mut db = read_bib(input)?;
    let changed = journals::abbreviate(&mut db.entries);
    write_output(output, &bibtex::serialize(&db.entries))?;
    eprintln!("abbreviated {} journal name(s), wrote {}", changed, output.display());
    Ok(())
}

fn protect_case_command(input: &Path, output: &Path) -> Result<(), AppError> {
    let mut db = read_bib(input)?;
    let changed = title::protect_titles(&mut db.entries);
    write_output(output, &bibtex::serialize(&db.entries))?;
    eprintln!("protected {} title(s), wrote {}", changed, output.display());
    Ok(())
}

fn pages_command(input: &Path, output: &Path) -> Result<(), AppError> {
    let mut db = read_bib(input)?;
    let report = pages::backfill(&mut db.entries, &DoiOrg);

    let mut filled = 0usize;
    for (key, outcome) in &report {
        match outcome {
            pages::Outcome::Filled(_) => filled += 1,
            pages::Outcome::ArxivSkipped => {
                eprintln!("ArXiv preprint: {}. Skipping...", key);
            }
            pages::Outcome::LookupFailed(msg) => {
                eprintln!("lookup failed for {}: {}", key, msg);
            }
            pages::Outcome::PagesNotInMetadata => {
                eprintln!("pages field not found in metadata for {}", key);
            }
            pages::Outcome::AlreadyPresent | pages::Outcome::NoDoi => {}
        }
    }

    write_output(output, &bibtex::serialize(&db.entries))?;
    eprintln!("filled {} pages field(s), wrote {}", filled, output.display());
    Ok(())
}

fn figs_command(tex_path: &Path, dir: &Path) -> Result<(), AppError> {
    let tex_text = fs::read_to_string(tex_path)
        .map_err(|e| AppError::InputFile(format!("'{}': {}", tex_path.display(), e)))?;

    let exclude = figs::generated_pdf_name(tex_path);
    let pdfs = figs::pdf_files_in(dir, &exclude)
        .map_err(|e| AppError::InputFile(format!("'{}': {}", dir.display(), e)))?;

    let unused = figs::unused_figures(&pdfs, &tex_text);
    if unused.is_empty() {
        println!("All PDF figures are used.");
    } else {
        for fig in unused {
            println!("{}", fig);
        }
    }
    Ok(())
}
