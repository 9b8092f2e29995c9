pub mod decoy;
pub mod enzyme;
pub mod fasta;
pub mod generate;
pub mod report;

use std::path::Path;

#[derive(Debug)]
pub enum Error {
    /// Enzyme name could not be resolved against the rule table
    UnknownEnzyme(String),
    /// No valid protein records remained after parsing
    EmptySequenceSet,
    /// A reassembled decoy protein does not match the target length.
    /// This indicates an internal bug, not bad input.
    ReassemblyLengthMismatch {
        header: String,
        expected: usize,
        actual: usize,
    },
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEnzyme(name) => write!(f, "unknown enzyme `{}`", name),
            Self::EmptySequenceSet => write!(f, "no valid protein records in input"),
            Self::ReassemblyLengthMismatch {
                header,
                expected,
                actual,
            } => write!(
                f,
                "reassembled decoy for `{}` has length {}, expected {}",
                header, actual, expected
            ),
            Self::Io(e) => e.fmt(f),
            Self::Csv(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

/// Read one or more FASTA files and parse them as a single record stream,
/// so that duplicate sequences are counted across file boundaries
pub fn read_fasta<P>(paths: &[P]) -> Result<fasta::Fasta, Error>
where
    P: AsRef<Path>,
{
    let mut contents = String::new();
    for path in paths {
        contents.push_str(&std::fs::read_to_string(path)?);
        contents.push('\n');
    }
    Ok(fasta::Fasta::parse(&contents))
}
