use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};
use crate::matrix::{CharacterMatrix, State};

fn is_gz(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

/// Read a character matrix from a TSV file.
///
/// The first line is a header (its first cell is ignored, the rest name the
/// characters). Every following non-empty line is a sample name followed by
/// one integer state per character; `-` stands for the missing sentinel.
/// If `path` ends with `.gz`, the input is gzip-decompressed.
pub fn read_character_matrix<P: AsRef<Path>>(path: P, missing: State) -> Result<CharacterMatrix> {
    let p = path.as_ref();
    let file = File::open(p)?;
    let reader: Box<dyn Read> = if is_gz(p) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let matrix = parse_character_matrix(BufReader::new(reader), missing)?;
    log::info!(
        "read {} samples x {} characters from {}",
        matrix.n_samples(),
        matrix.n_characters(),
        p.display()
    );
    Ok(matrix)
}

/// Parse the TSV layout described in [`read_character_matrix`].
pub fn parse_character_matrix<R: BufRead>(reader: R, missing: State) -> Result<CharacterMatrix> {
    let mut lines = reader.lines().enumerate();

    let n_characters = match lines.next() {
        Some((_, header)) => header?.trim_end().split('\t').count().saturating_sub(1),
        None => return Err(Error::Matrix("empty input, expected a header line".to_string())),
    };

    let mut names = Vec::new();
    let mut rows = Vec::new();
    for (idx, line) in lines {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let name = fields.next().unwrap_or_default().to_string();
        let row = fields
            .map(|field| parse_state(field.trim(), missing))
            .collect::<Option<Vec<State>>>()
            .ok_or_else(|| Error::Matrix(format!("line {}: unparsable state for '{name}'", idx + 1)))?;

        if row.len() != n_characters {
            return Err(Error::Matrix(format!(
                "line {}: {} states, header has {n_characters} characters",
                idx + 1,
                row.len()
            )));
        }
        names.push(name);
        rows.push(row);
    }

    CharacterMatrix::new(names, rows, missing)
}

fn parse_state(field: &str, missing: State) -> Option<State> {
    match field {
        "-" => Some(missing),
        _ => field.parse().ok(),
    }
}

/// Write a Newick string (plus a trailing newline) to a file.
/// If `path` ends with `.gz`, the output is gzip-compressed.
pub fn write_newick<P: AsRef<Path>>(path: P, newick: &str) -> io::Result<()> {
    let p = path.as_ref();
    let mut out: Box<dyn Write> = if is_gz(p) {
        let f = File::create(p)?;
        let enc = GzEncoder::new(f, Compression::default());
        Box::new(BufWriter::new(enc))
    } else {
        Box::new(BufWriter::new(File::create(p)?))
    };

    writeln!(&mut out, "{newick}")?;
    out.flush()?;
    Ok(())
}
