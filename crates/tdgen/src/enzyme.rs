use fnv::FnvHashSet;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Cleavage specificity patterns, keyed by enzyme name.
///
/// Pattern syntax follows the X!Tandem convention: `[KR]|{P}` cleaves
/// C-terminal of K or R unless the next residue is P; `[X]|[D]` cleaves
/// before D regardless of the preceding residue (an N-terminal cleaver);
/// comma-separated pairs form a composite rule evaluated in union.
const ENZYME_TABLE: &[(&str, &str)] = &[
    ("argc", "[R]|{P}"),
    ("aspn", "[X]|[D]"),
    ("chymotrypsin", "[FMWY]|{P}"),
    ("chymotrypsin_p", "[FMWY]|[X]"),
    ("clostripain", "[R]|[X]"),
    ("cnbr", "[M]|{P}"),
    ("elastase", "[AGILV]|{P}"),
    ("formic_acid", "[D]|{P}"),
    ("gluc", "[DE]|{P}"),
    ("gluc_bicarb", "[E]|{P}"),
    ("iodosobenzoate", "[W]|[X]"),
    ("lysc", "[K]|{P}"),
    ("lysc_p", "[K]|[X]"),
    ("lysn", "[X]|[K]"),
    ("lysn_promisc", "[X]|[AKRS]"),
    ("nonspecific", "[X]|[X]"),
    ("pepsina", "[FL]|[X]"),
    ("protein_endopeptidase", "[P]|[X]"),
    ("staph_protease", "[E]|[X]"),
    ("tca", "[FMWY]|{P},[KR]|{P},[X]|[D]"),
    ("trypsin", "[KR]|{P}"),
    ("trypsin_p", "[RK]|[X]"),
    ("trypsin_cnbr", "[KR]|{P},[M]|{P}"),
    ("trypsin_gluc", "[DEKR]|{P}"),
];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleavageSpecificity {
    /// Both the cleavage residue and the flanking constraint must match
    #[default]
    Full,
    /// Ignore the flanking (next-position) constraint
    Semi,
    /// Cut after every residue
    None,
}

enum Sites {
    /// Cleave after any residue (the `[X]` wildcard)
    Any,
    /// Cleave after residues matching this character class
    Of {
        pattern: Regex,
        residues: FnvHashSet<u8>,
    },
}

enum NextRule {
    Any,
    /// Suppress cleavage when the following residue is in the set
    Blocked(FnvHashSet<u8>),
    /// Cleave only when the following residue is in the set
    Required(FnvHashSet<u8>),
}

struct Specificity {
    sites: Sites,
    next: NextRule,
}

impl Specificity {
    fn matches_residue(&self, residue: u8) -> bool {
        match &self.sites {
            Sites::Any => true,
            Sites::Of { residues, .. } => residues.contains(&residue),
        }
    }

    fn allows_next(&self, next: u8) -> bool {
        match &self.next {
            NextRule::Any => true,
            NextRule::Blocked(set) => !set.contains(&next),
            NextRule::Required(set) => set.contains(&next),
        }
    }
}

fn parse_spec(pair: &str) -> Specificity {
    let (site_part, next_part) = pair.split_once('|').unwrap_or((pair, "[X]"));
    let residues = site_part.trim_start_matches('[').trim_end_matches(']');
    let sites = match residues {
        "X" => Sites::Any,
        _ => Sites::Of {
            pattern: Regex::new(&format!("[{}]", residues)).unwrap(),
            residues: residues.bytes().collect(),
        },
    };
    let next = match next_part.strip_prefix('{') {
        Some(blocked) => NextRule::Blocked(blocked.trim_end_matches('}').bytes().collect()),
        None => {
            let required = next_part.trim_start_matches('[').trim_end_matches(']');
            match required {
                "X" => NextRule::Any,
                _ => NextRule::Required(required.bytes().collect()),
            }
        }
    };
    Specificity { sites, next }
}

/// A peptide produced by enzymatic digestion, together with the residues
/// that define its cleavage boundaries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peptide {
    pub sequence: String,
    /// Residue immediately before the peptide, `None` at the protein N-terminus
    pub preceding: Option<u8>,
    /// Residue that triggered the cut ending this peptide, `None` when the
    /// peptide ends at the protein C-terminus without matching a cleavage site
    pub cleaving: Option<u8>,
    /// The first residue carries the enzyme's N-terminal specificity
    /// (e.g. the D of an Asp-N cut) and must stay fixed in a decoy
    pub nterm_fixed: bool,
}

pub struct EnzymeRule {
    pub name: String,
    specs: Vec<Specificity>,
}

impl EnzymeRule {
    /// Resolve an enzyme name against the rule table. Multiple names joined
    /// by `;` are unioned into a single composite rule.
    pub fn from_name(name: &str) -> Result<EnzymeRule, Error> {
        let mut specs = Vec::new();
        for part in name.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let part = part.to_ascii_lowercase();
            let pattern = ENZYME_TABLE
                .iter()
                .find(|(n, _)| *n == part)
                .map(|(_, p)| *p)
                .ok_or_else(|| Error::UnknownEnzyme(part.clone()))?;
            specs.extend(pattern.split(',').map(parse_spec));
        }
        if specs.is_empty() {
            return Err(Error::UnknownEnzyme(name.into()));
        }
        Ok(EnzymeRule {
            name: name.into(),
            specs,
        })
    }

    /// Positions `i` such that a cut occurs between residues `i` and `i + 1`.
    /// The final residue is never listed; the protein C-terminus always cuts.
    fn cut_sites(&self, sequence: &str, specificity: CleavageSpecificity) -> Vec<usize> {
        let seq = sequence.as_bytes();
        if seq.len() < 2 {
            return Vec::new();
        }
        if matches!(specificity, CleavageSpecificity::None) {
            return (0..seq.len() - 1).collect();
        }
        let relaxed = matches!(specificity, CleavageSpecificity::Semi);
        let mut sites = Vec::new();
        for spec in &self.specs {
            match &spec.sites {
                Sites::Of { pattern, .. } => {
                    for mat in pattern.find_iter(sequence) {
                        let i = mat.start();
                        if i + 1 < seq.len() && (relaxed || spec.allows_next(seq[i + 1])) {
                            sites.push(i);
                        }
                    }
                }
                Sites::Any => {
                    for i in 0..seq.len() - 1 {
                        if relaxed || spec.allows_next(seq[i + 1]) {
                            sites.push(i);
                        }
                    }
                }
            }
        }
        sites.sort_unstable();
        sites.dedup();
        sites
    }

    /// Does some C-terminal specificity (a restricted cleave-after set)
    /// justify a cut after position `i`?
    fn cterm_site(&self, sequence: &str, i: usize, specificity: CleavageSpecificity) -> bool {
        let seq = sequence.as_bytes();
        self.specs.iter().any(|spec| {
            matches!(spec.sites, Sites::Of { .. })
                && spec.matches_residue(seq[i])
                && (i + 1 == seq.len()
                    || matches!(specificity, CleavageSpecificity::Semi)
                    || spec.allows_next(seq[i + 1]))
        })
    }

    fn nterm_site(&self, residue: u8) -> bool {
        self.specs
            .iter()
            .any(|spec| matches!(&spec.next, NextRule::Required(set) if set.contains(&residue)))
    }

    /// Is this residue in some restricted cleave-after set? Such residues
    /// are held in place by the decoy transformer: relocating one would
    /// mint a new cut site in the decoy.
    pub fn is_cleavage_residue(&self, residue: u8) -> bool {
        self.specs.iter().any(|spec| match &spec.sites {
            Sites::Any => false,
            Sites::Of { residues, .. } => residues.contains(&residue),
        })
    }

    /// Would this peptide be cut anywhere in its interior?
    pub fn has_internal_cut(&self, sequence: &str, specificity: CleavageSpecificity) -> bool {
        !self.cut_sites(sequence, specificity).is_empty()
    }

    /// Does a cut occur between two adjacent residues?
    pub fn cuts_between(&self, prev: u8, next: u8, specificity: CleavageSpecificity) -> bool {
        match specificity {
            CleavageSpecificity::None => true,
            CleavageSpecificity::Semi => self.specs.iter().any(|spec| spec.matches_residue(prev)),
            CleavageSpecificity::Full => self
                .specs
                .iter()
                .any(|spec| spec.matches_residue(prev) && spec.allows_next(next)),
        }
    }

    /// Digest a protein sequence into the ordered list of peptides.
    /// Every peptide is emitted regardless of length; minimum-length policy
    /// belongs to downstream consumers.
    pub fn digest(&self, sequence: &str, specificity: CleavageSpecificity) -> Vec<Peptide> {
        let seq = sequence.as_bytes();
        if seq.is_empty() {
            return Vec::new();
        }
        let mut boundaries = self.cut_sites(sequence, specificity);
        if boundaries.last() != Some(&(seq.len() - 1)) {
            boundaries.push(seq.len() - 1);
        }

        let mut peptides = Vec::with_capacity(boundaries.len());
        let mut start = 0;
        for &end in &boundaries {
            peptides.push(Peptide {
                sequence: sequence[start..=end].into(),
                preceding: (start > 0).then(|| seq[start - 1]),
                cleaving: self
                    .cterm_site(sequence, end, specificity)
                    .then(|| seq[end]),
                nterm_fixed: start > 0 && self.nterm_site(seq[start]),
            });
            start = end + 1;
        }
        peptides
    }
}
