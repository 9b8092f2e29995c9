use fnv::{FnvHashMap, FnvHashSet};
use rayon::prelude::*;
use std::sync::Arc;

use crate::decoy::{DecoyCache, DecoyMode, UnmutableReason};
use crate::enzyme::{CleavageSpecificity, EnzymeRule};
use crate::fasta::Fasta;
use crate::Error;

pub struct GeneratorParameters {
    pub rule: EnzymeRule,
    pub specificity: CleavageSpecificity,
    pub mode: DecoyMode,
    /// Prefix applied to decoy headers
    pub decoy_tag: String,
    /// Unmutable peptides below this length are omitted from the report
    pub min_len: usize,
    /// `Some` makes the decoy database reproducible across runs
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoyProteinRecord {
    pub header: String,
    pub sequence: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnmutablePeptide {
    pub sequence: String,
    pub reason: UnmutableReason,
    /// Number of input protein records containing this peptide
    pub proteins: usize,
}

pub struct DecoyDatabase {
    /// One decoy per input record, in input order
    pub decoys: Vec<DecoyProteinRecord>,
    pub unmutable: Vec<UnmutablePeptide>,
    /// Unique target peptides transformed
    pub unique_peptides: usize,
}

/// Generate a decoy protein for every record in `fasta`: digest each unique
/// sequence, resolve each peptide through the shared decoy cache, and
/// reassemble the decoy peptides in original order.
pub fn generate(fasta: &Fasta, params: &GeneratorParameters) -> Result<DecoyDatabase, Error> {
    if fasta.records.is_empty() {
        return Err(Error::EmptySequenceSet);
    }

    let cache = DecoyCache::new(params.mode, &params.rule, params.specificity, params.seed);

    // Duplicate sequences are digested and transformed once
    let mut seen = FnvHashSet::default();
    let unique = fasta
        .records
        .iter()
        .filter(|record| seen.insert(record.sequence.as_str()))
        .collect::<Vec<_>>();

    let results = unique
        .par_iter()
        .map(|record| {
            let peptides = params.rule.digest(&record.sequence, params.specificity);
            let mut decoy = String::with_capacity(record.sequence.len());
            let mut unmutable: FnvHashMap<String, UnmutableReason> = FnvHashMap::default();
            for peptide in &peptides {
                let (sequence, reason) = cache.resolve(peptide);
                if let Some(reason) = reason {
                    unmutable.entry(peptide.sequence.clone()).or_insert(reason);
                }
                decoy.push_str(&sequence);
            }
            if decoy.len() != record.sequence.len() {
                return Err(Error::ReassemblyLengthMismatch {
                    header: record.header.clone(),
                    expected: record.sequence.len(),
                    actual: decoy.len(),
                });
            }
            Ok((record.sequence.clone(), decoy, unmutable, record.occurrences))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut decoy_by_target: FnvHashMap<Arc<String>, String> = FnvHashMap::default();
    let mut unmutable: FnvHashMap<String, (UnmutableReason, usize)> = FnvHashMap::default();
    for (target, decoy, local, occurrences) in results {
        for (sequence, reason) in local {
            let entry = unmutable.entry(sequence).or_insert((reason, 0));
            entry.1 += occurrences;
        }
        decoy_by_target.insert(target, decoy);
    }

    let decoys = fasta
        .records
        .iter()
        .map(|record| DecoyProteinRecord {
            header: decoy_header(&record.header, &params.decoy_tag, record.occurrences),
            sequence: decoy_by_target[&record.sequence].clone(),
        })
        .collect::<Vec<_>>();

    let mut unmutable = unmutable
        .into_iter()
        .map(|(sequence, (reason, proteins))| UnmutablePeptide {
            sequence,
            reason,
            proteins,
        })
        .collect::<Vec<_>>();
    unmutable.sort_by(|a, b| a.sequence.cmp(&b.sequence));
    // min_len gates what the report lists, never what gets shuffled
    unmutable.retain(|u| u.sequence.len() >= params.min_len);

    log::info!(
        "generated {} decoy proteins ({} unique sequences), {} unique peptides, {} unmutable",
        decoys.len(),
        decoy_by_target.len(),
        cache.len(),
        unmutable.len()
    );

    Ok(DecoyDatabase {
        decoys,
        unmutable,
        unique_peptides: cache.len(),
    })
}

/// Tag the target header and mark duplicate-origin proteins so they remain
/// identifiable downstream
fn decoy_header(header: &str, tag: &str, occurrences: usize) -> String {
    if occurrences > 1 {
        format!("{}{} occurrences={}", tag, header, occurrences)
    } else {
        format!("{}{}", tag, header)
    }
}
