use fnv::FnvHashMap;
use std::sync::Arc;

/// Residues accepted in input sequences: the 20 standard amino acids plus
/// selenocysteine (U) and pyrrolysine (O)
pub const VALID_AA: [u8; 22] = [
    b'A', b'C', b'D', b'E', b'F', b'G', b'H', b'I', b'K', b'L', b'M', b'N', b'P', b'Q', b'R', b'S',
    b'T', b'V', b'W', b'Y', b'U', b'O',
];

/// One input protein record. Records sharing a byte-identical sequence share
/// the same `Arc` and carry the total occurrence count for that sequence.
#[derive(Clone, Debug)]
pub struct ProteinRecord {
    pub header: String,
    pub sequence: Arc<String>,
    pub occurrences: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedRecord {
    pub header: String,
    pub reason: String,
}

pub struct Fasta {
    /// Valid records, in input order
    pub records: Vec<ProteinRecord>,
    /// Records rejected during parsing; surfaced in the final report
    pub skipped: Vec<MalformedRecord>,
}

impl Fasta {
    /// Parse FASTA text into protein records. Malformed records are skipped
    /// and collected rather than aborting the parse.
    pub fn parse(contents: &str) -> Fasta {
        let mut records: Vec<ProteinRecord> = Vec::new();
        let mut skipped = Vec::new();
        let mut counts: FnvHashMap<Arc<String>, usize> = FnvHashMap::default();

        let mut last_header: Option<String> = None;
        let mut s = String::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('>') {
                match last_header.take() {
                    Some(previous) => {
                        push_record(
                            previous,
                            std::mem::take(&mut s),
                            &mut records,
                            &mut skipped,
                            &mut counts,
                        );
                    }
                    None if !s.is_empty() => {
                        log::warn!("skipping sequence data before the first header");
                        skipped.push(MalformedRecord {
                            header: String::new(),
                            reason: "sequence data before first header".into(),
                        });
                        s.clear();
                    }
                    None => {}
                }
                last_header = Some(header.trim().to_string());
            } else {
                s.push_str(line);
            }
        }
        if let Some(header) = last_header {
            push_record(header, s, &mut records, &mut skipped, &mut counts);
        }

        for record in &mut records {
            record.occurrences = counts[&record.sequence];
        }

        Fasta { records, skipped }
    }
}

fn validate(sequence: &str) -> Result<(), String> {
    if sequence.is_empty() {
        return Err("empty sequence".into());
    }
    match sequence.bytes().find(|b| !VALID_AA.contains(b)) {
        Some(b) => Err(format!("unrecognized residue `{}`", b as char)),
        None => Ok(()),
    }
}

fn push_record(
    header: String,
    sequence: String,
    records: &mut Vec<ProteinRecord>,
    skipped: &mut Vec<MalformedRecord>,
    counts: &mut FnvHashMap<Arc<String>, usize>,
) {
    let sequence = sequence.to_ascii_uppercase();
    if let Err(reason) = validate(&sequence) {
        log::warn!("skipping record `{}`: {}", header, reason);
        skipped.push(MalformedRecord { header, reason });
        return;
    }
    let sequence = match counts.get_key_value(&sequence) {
        Some((existing, _)) => existing.clone(),
        None => Arc::new(sequence),
    };
    *counts.entry(sequence.clone()).or_insert(0) += 1;
    records.push(ProteinRecord {
        header,
        sequence,
        occurrences: 0,
    });
}
