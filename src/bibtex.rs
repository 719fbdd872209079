//! BibTeX parsing and serialization.
//!
//! The parser accepts the usual shape of hand-maintained `.bib` files:
//! `@string` definitions (with `#` concatenation and macro references),
//! `@preamble`, `@comment`, braced values with nested braces, quoted
//! values, and bare numeric values. Entries that fail to parse are
//! recorded as warnings with a line number and skipped; the rest of the
//! file is still read.

use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::map,
    IResult,
};

/// One `field = value` pair of an entry, with original field-name casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// A single bibliography entry.
///
/// Field order is preserved from the source so that round-tripping a
/// file does not shuffle it. Field lookup is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The citation key, e.g. `Smith2020`.
    pub key: String,
    /// Lowercased entry type, e.g. `article` or `inproceedings`.
    pub kind: String,
    pub fields: Vec<Field>,
}

impl Entry {
    pub fn new(key: impl Into<String>, kind: impl Into<String>) -> Self {
        Entry {
            key: key.into(),
            kind: kind.into().to_lowercase(),
            fields: Vec::new(),
        }
    }

    /// Returns the value of `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// Sets `name` to `value`, replacing an existing field in place or
    /// appending a new one at the end.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            Some(field) => field.value = value,
            None => self.fields.push(Field {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title")
    }

    pub fn author(&self) -> Option<&str> {
        self.get("author")
    }

    pub fn year(&self) -> Option<&str> {
        self.get("year")
    }

    pub fn doi(&self) -> Option<&str> {
        self.get("doi")
    }

    pub fn journal(&self) -> Option<&str> {
        self.get("journal")
    }
}

/// A recoverable parse problem: the offending entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

/// The parsed contents of a `.bib` file.
#[derive(Debug, Clone, Default)]
pub struct Database {
    pub entries: Vec<Entry>,
    pub preambles: Vec<String>,
    pub strings: HashMap<String, String>,
    pub warnings: Vec<ParseWarning>,
}

/// Parses BibTeX text into a [`Database`].
///
/// Unparsable regions produce a [`ParseWarning`] and parsing resumes at
/// the next `@`; this mirrors how reference managers tolerate the
/// occasional hand-edited glitch.
pub fn parse(input: &str) -> Database {
    let mut db = Database::default();
    let mut rest = input;
    let mut line = 1usize;

    loop {
        let skipped = skip_junk(rest);
        line += count_lines(&rest[..rest.len() - skipped.len()]);
        rest = skipped;
        if rest.is_empty() {
            break;
        }

        match block(rest, &db.strings) {
            Ok((tail, item)) => {
                line += count_lines(&rest[..rest.len() - tail.len()]);
                match item {
                    Block::Entry(entry) => db.entries.push(entry),
                    Block::StringDef(name, value) => {
                        db.strings.insert(name, value);
                    }
                    Block::Preamble(text) => db.preambles.push(text),
                    Block::Comment => {}
                }
                rest = tail;
            }
            Err(_) => {
                db.warnings.push(ParseWarning {
                    line,
                    message: "could not parse entry, skipped".to_string(),
                });
                // Resume at the next @ past the one that failed.
                match rest[1..].find('@') {
                    Some(pos) => {
                        line += count_lines(&rest[..pos + 1]);
                        rest = &rest[pos + 1..];
                    }
                    None => break,
                }
            }
        }
    }

    db
}

/// Serializes entries back to BibTeX text, one blank line between
/// entries, preserving field order. Purely numeric values are written
/// without braces.
pub fn serialize(entries: &[Entry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push('@');
        out.push_str(&entry.kind);
        out.push('{');
        out.push_str(&entry.key);
        out.push_str(",\n");
        for field in &entry.fields {
            out.push_str("  ");
            out.push_str(&field.name);
            out.push_str(" = ");
            if !field.value.is_empty() && field.value.chars().all(|c| c.is_ascii_digit()) {
                out.push_str(&field.value);
            } else {
                out.push('{');
                out.push_str(&field.value);
                out.push('}');
            }
            out.push_str(",\n");
        }
        out.push_str("}\n");
    }
    out
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

enum Block {
    Entry(Entry),
    StringDef(String, String),
    Preamble(String),
    Comment,
}

/// Skips whitespace and `%` line comments between blocks.
fn skip_junk(input: &str) -> &str {
    let mut rest = input;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix('%') {
            rest = match after.find('\n') {
                Some(pos) => &after[pos + 1..],
                None => "",
            };
        } else if !trimmed.starts_with('@') && !trimmed.is_empty() {
            // Free text between entries is ignored, as BibTeX does.
            match trimmed.find('@') {
                Some(pos) => return &trimmed[pos..],
                None => return "",
            }
        } else {
            return trimmed;
        }
    }
}

fn count_lines(s: &str) -> usize {
    s.matches('\n').count()
}

fn block<'a>(input: &'a str, strings: &HashMap<String, String>) -> IResult<&'a str, Block> {
    let (rest, _) = char('@')(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, kind) = take_while1(|c: char| c.is_ascii_alphanumeric())(rest)?;

    match kind.to_lowercase().as_str() {
        "string" => {
            let (rest, (name, value)) = string_def(rest, strings)?;
            Ok((rest, Block::StringDef(name, value)))
        }
        "preamble" => {
            let (rest, text) = delimited_value(rest, strings)?;
            Ok((rest, Block::Preamble(text)))
        }
        "comment" => {
            let (rest, _) = comment_body(rest)?;
            Ok((rest, Block::Comment))
        }
        _ => {
            let (rest, entry) = entry_body(rest, kind, strings)?;
            Ok((rest, Block::Entry(entry)))
        }
    }
}

fn string_def<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, (String, String)> {
    let (rest, _) = multispace0(input)?;
    let (rest, _) = char('{')(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, name) = field_name(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('=')(rest)?;
    let (rest, value) = value(rest, strings)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('}')(rest)?;
    Ok((rest, (name.to_string(), value)))
}

/// `@preamble{ <value> }`
fn delimited_value<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, String> {
    let (rest, _) = multispace0(input)?;
    let (rest, _) = char('{')(rest)?;
    let (rest, text) = value(rest, strings)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('}')(rest)?;
    Ok((rest, text))
}

/// `@comment{...}` or a comment running to end of line.
fn comment_body(input: &str) -> IResult<&str, ()> {
    let (rest, _) = multispace0(input)?;
    if rest.starts_with('{') {
        let (rest, _) = braced(rest)?;
        Ok((rest, ()))
    } else {
        let pos = rest.find('\n').unwrap_or(rest.len());
        Ok((&rest[pos..], ()))
    }
}

fn entry_body<'a>(
    input: &'a str,
    kind: &str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, Entry> {
    let (rest, _) = multispace0(input)?;
    let (rest, _) = char('{')(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, key) =
        take_while1(|c: char| c.is_ascii_alphanumeric() || "_-:./+".contains(c))(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (mut rest, _) = char(',')(rest)?;

    let mut entry = Entry::new(key, kind);
    loop {
        let (r, _) = multispace0(rest)?;
        if let Ok((r, _)) = char::<_, nom::error::Error<&str>>('}')(r) {
            return Ok((r, entry));
        }
        let (r, name) = field_name(r)?;
        let (r, _) = multispace0(r)?;
        let (r, _) = char('=')(r)?;
        let (r, val) = value(r, strings)?;
        entry.fields.push(Field {
            name: name.to_string(),
            value: val,
        });
        let (r, _) = multispace0(r)?;
        // Trailing comma before the closing brace is optional.
        rest = r.strip_prefix(',').unwrap_or(r);
    }
}

fn field_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(input)
}

/// A field value: one or more parts joined by `#`.
fn value<'a>(input: &'a str, strings: &HashMap<String, String>) -> IResult<&'a str, String> {
    let mut out = String::new();
    let mut rest = input;
    loop {
        let (r, _) = multispace0(rest)?;
        let (r, part) = alt((
            map(braced, |s: &str| s[1..s.len() - 1].to_string()),
            quoted,
            map(take_while1(|c: char| c.is_ascii_digit()), str::to_string),
            map(field_name, |name| {
                strings
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| name.to_string())
            }),
        ))(r)?;
        out.push_str(&part);
        let (r, _) = multispace0(r)?;
        match r.strip_prefix('#') {
            Some(r) => rest = r,
            None => return Ok((r, out)),
        }
    }
}

/// `{...}` with nested braces; returns the text including the outer braces.
fn braced(input: &str) -> IResult<&str, &str> {
    if !input.starts_with('{') {
        return Err(nom_err(input));
    }
    let mut depth = 0usize;
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], &input[..i + 1]));
                }
            }
            b'\\' => i += 1,
            _ => {}
        }
        i += 1;
    }
    Err(nom_err(input))
}

/// `"..."`; braces inside protect quote characters, backslash escapes pass through.
fn quoted(input: &str) -> IResult<&str, String> {
    if !input.starts_with('"') {
        return Err(nom_err(input));
    }
    let mut out = String::new();
    let mut depth = 0usize;
    let mut chars = input[1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' if depth == 0 => return Ok((&input[i + 2..], out)),
            '{' => {
                depth += 1;
                out.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                out.push(c);
            }
            '\\' => {
                out.push('\\');
                if let Some((_, next)) = chars.next() {
                    out.push(next);
                }
            }
            _ => out.push(c),
        }
    }
    Err(nom_err(input))
}

fn nom_err(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char))
}
