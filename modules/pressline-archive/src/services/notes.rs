// Annotation export reader.
//
// The export is a set of `notes-NNNNN.tsv` parts per day, optionally gzipped.
// Each day's export is a full snapshot, so only the newest day is read.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{ArchiveError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The two columns the reference batch needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NoteRow {
    pub tweet_id: String,
    pub summary: String,
}

/// Notes parts to read: `notes-*` files directly in `dir`, or, when there are
/// none, those in the newest date subdirectory that has any.
pub(crate) fn note_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let direct = notes_in(dir)?;
    if !direct.is_empty() {
        return Ok(direct);
    }

    let mut days: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| ArchiveError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    days.sort();

    for day in days.iter().rev() {
        let files = notes_in(day)?;
        if !files.is_empty() {
            debug!(dir = %day.display(), parts = files.len(), "Using newest notes export");
            return Ok(files);
        }
    }
    Ok(Vec::new())
}

fn notes_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| ArchiveError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("notes-") && (n.ends_with(".tsv") || n.ends_with(".tsv.gz")))
        })
        .collect();
    // Sort for deterministic processing order
    files.sort();
    Ok(files)
}

/// Open a notes part for streaming, gunzipping it when it starts with the gzip magic.
pub(crate) fn open_part(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let is_gzip = reader
        .fill_buf()
        .map_err(|e| ArchiveError::io(path, e))?
        .starts_with(&GZIP_MAGIC);

    Ok(if is_gzip {
        Box::new(BufReader::new(GzDecoder::new(reader)))
    } else {
        Box::new(reader)
    })
}

/// Rows of every notes part, in file order.
pub(crate) fn load_notes(dir: &Path) -> Result<Vec<NoteRow>> {
    let mut rows = Vec::new();
    for path in note_files(dir)? {
        let parsed = parse_notes(open_part(&path)?, &path)?;
        debug!(file = %path.display(), rows = parsed.len(), "Read notes part");
        rows.extend(parsed);
    }
    Ok(rows)
}

/// Parse a notes TSV by its header. Double-quoted fields may contain tabs,
/// newlines and `""` escapes. Rows too short for either column are skipped.
/// Only the two needed columns are kept from each row.
pub(crate) fn parse_notes(reader: impl BufRead, path: &Path) -> Result<Vec<NoteRow>> {
    let io = |e: std::io::Error| ArchiveError::io(path, e);
    let mut records = Records::new(reader);
    let Some(header) = records.next_record().map_err(io)? else {
        return Ok(Vec::new());
    };

    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ArchiveError::malformed("notes", format!("no {name} column")))
    };
    let id_col = column("tweetId")?;
    let summary_col = column("summary")?;

    let mut rows = Vec::new();
    while let Some(mut fields) = records.next_record().map_err(io)? {
        if fields.len() <= id_col.max(summary_col) {
            continue;
        }
        let summary = std::mem::take(&mut fields[summary_col]);
        let tweet_id = std::mem::take(&mut fields[id_col]);
        if !tweet_id.is_empty() {
            rows.push(NoteRow { tweet_id, summary });
        }
    }
    Ok(rows)
}

/// Tab-separated records read line by line; a quoted field may span lines.
struct Records<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> Records<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }

    fn next_record(&mut self) -> std::io::Result<Option<Vec<String>>> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut quoted = false;
        let mut at_field_start = true;
        let mut started = false;

        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                if !started {
                    return Ok(None);
                }
                fields.push(field);
                return Ok(Some(fields));
            }
            started = true;

            let mut chars = self.line.chars().peekable();
            while let Some(c) = chars.next() {
                if quoted {
                    match c {
                        '"' if chars.peek() == Some(&'"') => {
                            chars.next();
                            field.push('"');
                        }
                        '"' => quoted = false,
                        _ => field.push(c),
                    }
                    continue;
                }
                match c {
                    '"' if at_field_start => {
                        quoted = true;
                        at_field_start = false;
                    }
                    '\t' => {
                        fields.push(std::mem::take(&mut field));
                        at_field_start = true;
                    }
                    '\r' if chars.peek() == Some(&'\n') => {}
                    '\n' => {
                        fields.push(field);
                        return Ok(Some(fields));
                    }
                    _ => {
                        field.push(c);
                        at_field_start = false;
                    }
                }
            }
        }
    }
}

/// True when the text contains hiragana, the marker for Japanese-language notes.
pub(crate) fn has_hiragana(text: &str) -> bool {
    text.chars().any(|c| ('\u{3041}'..='\u{309F}').contains(&c))
}
