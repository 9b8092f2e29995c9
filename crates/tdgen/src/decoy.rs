use dashmap::DashMap;
use fnv::{FnvBuildHasher, FnvHasher};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

use crate::enzyme::{CleavageSpecificity, EnzymeRule, Peptide};

/// Shuffle retry budget before a peptide is declared unmutable
pub const MAX_SHUFFLE_ATTEMPTS: usize = 10;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoyMode {
    /// Permute the non-fixed residues of each peptide
    #[default]
    ShufflePeptide,
    /// Reverse the non-fixed residues of each peptide
    ReverseProtein,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnmutableReason {
    /// Fewer than two permutable positions
    TooShort,
    /// All permutable residues are identical
    Homopolymer,
    /// Every attempted permutation (or the reversal) equals the target or
    /// digests differently
    ExhaustedAttempts,
}

impl UnmutableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooShort => "too_short",
            Self::Homopolymer => "homopolymer",
            Self::ExhaustedAttempts => "exhausted_shuffle_attempts",
        }
    }
}

#[derive(Clone, Debug)]
enum CachedDecoy {
    Mutated(String),
    /// The peptide is its own decoy; the cache stays total
    Unmutable(UnmutableReason),
}

/// Memoized peptide -> decoy mapping, shared across workers for the lifetime
/// of one generation run.
///
/// `DashMap::entry` holds the shard write lock while the first worker
/// computes, so a peptide appearing simultaneously on several workers is
/// transformed exactly once and everyone else observes the published result.
pub struct DecoyCache<'a> {
    entries: DashMap<String, CachedDecoy, FnvBuildHasher>,
    mode: DecoyMode,
    rule: &'a EnzymeRule,
    specificity: CleavageSpecificity,
    seed: Option<u64>,
}

impl<'a> DecoyCache<'a> {
    pub fn new(
        mode: DecoyMode,
        rule: &'a EnzymeRule,
        specificity: CleavageSpecificity,
        seed: Option<u64>,
    ) -> Self {
        Self {
            entries: DashMap::with_hasher(FnvBuildHasher::default()),
            mode,
            rule,
            specificity,
            seed,
        }
    }

    /// Number of unique peptides transformed so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the decoy sequence for a peptide, computing it on first use.
    /// Unmutable peptides map to themselves and report their reason.
    pub fn resolve(&self, peptide: &Peptide) -> (String, Option<UnmutableReason>) {
        // Hits avoid the key clone that `entry` requires
        if let Some(cached) = self.entries.get(&peptide.sequence) {
            return self.answer(peptide, cached.value());
        }
        let entry = self
            .entries
            .entry(peptide.sequence.clone())
            .or_insert_with(|| {
                transform(
                    peptide,
                    self.mode,
                    self.rule,
                    self.specificity,
                    self.rng(&peptide.sequence),
                )
            });
        self.answer(peptide, entry.value())
    }

    fn answer(&self, peptide: &Peptide, cached: &CachedDecoy) -> (String, Option<UnmutableReason>) {
        match cached {
            CachedDecoy::Mutated(decoy) => (decoy.clone(), None),
            CachedDecoy::Unmutable(reason) => (peptide.sequence.clone(), Some(*reason)),
        }
    }

    /// When a run seed is set, each peptide's generator is seeded from the
    /// run seed mixed with a hash of the peptide sequence. Decoy databases
    /// are then byte-identical across runs, independent of which worker wins
    /// the cache race.
    fn rng(&self, peptide: &str) -> StdRng {
        match self.seed {
            Some(seed) => {
                let mut hasher = FnvHasher::default();
                hasher.write(peptide.as_bytes());
                StdRng::seed_from_u64(seed ^ hasher.finish())
            }
            None => StdRng::from_entropy(),
        }
    }
}

fn transform(
    peptide: &Peptide,
    mode: DecoyMode,
    rule: &EnzymeRule,
    specificity: CleavageSpecificity,
    mut rng: StdRng,
) -> CachedDecoy {
    let target = peptide.sequence.chars().collect::<Vec<char>>();

    // Residues defining the cleavage boundary stay in place, as does every
    // residue in a restricted cleave-after set: relocating one could mint a
    // new cut site and change how the decoy digests
    let lo = usize::from(peptide.nterm_fixed);
    let hi = target.len() - usize::from(peptide.cleaving.is_some());
    let eligible = (lo..hi.max(lo))
        .filter(|&i| !rule.is_cleavage_residue(target[i] as u8))
        .collect::<Vec<_>>();

    if eligible.len() < 2 {
        return CachedDecoy::Unmutable(UnmutableReason::TooShort);
    }
    if eligible.iter().all(|&i| target[i] == target[eligible[0]]) {
        return CachedDecoy::Unmutable(UnmutableReason::Homopolymer);
    }

    let mut decoy = target.clone();
    match mode {
        DecoyMode::ReverseProtein => {
            decoy[lo..hi].reverse();
            if decoy == target || !digests_identically(peptide, &decoy, rule, specificity) {
                CachedDecoy::Unmutable(UnmutableReason::ExhaustedAttempts)
            } else {
                CachedDecoy::Mutated(decoy.into_iter().collect())
            }
        }
        DecoyMode::ShufflePeptide => {
            let mut pool = eligible.iter().map(|&i| target[i]).collect::<Vec<char>>();
            for _ in 0..MAX_SHUFFLE_ATTEMPTS {
                pool.shuffle(&mut rng);
                for (&i, &residue) in eligible.iter().zip(&pool) {
                    decoy[i] = residue;
                }
                if decoy != target && digests_identically(peptide, &decoy, rule, specificity) {
                    return CachedDecoy::Mutated(decoy.into_iter().collect());
                }
            }
            CachedDecoy::Unmutable(UnmutableReason::ExhaustedAttempts)
        }
    }
}

/// A candidate decoy is accepted only if it digests exactly like the target:
/// no new cut site may appear in its interior, and the cut that produced the
/// peptide's N-terminus must survive the new first residue.
fn digests_identically(
    peptide: &Peptide,
    decoy: &[char],
    rule: &EnzymeRule,
    specificity: CleavageSpecificity,
) -> bool {
    let candidate = decoy.iter().collect::<String>();
    if rule.has_internal_cut(&candidate, specificity) {
        return false;
    }
    match peptide.preceding {
        Some(prev) => rule.cuts_between(prev, candidate.as_bytes()[0], specificity),
        None => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn trypsin() -> EnzymeRule {
        EnzymeRule::from_name("trypsin").unwrap()
    }

    fn cache(mode: DecoyMode, rule: &EnzymeRule, seed: Option<u64>) -> DecoyCache<'_> {
        DecoyCache::new(mode, rule, CleavageSpecificity::Full, seed)
    }

    fn peptide(sequence: &str, cleaving: Option<u8>) -> Peptide {
        Peptide {
            sequence: sequence.into(),
            preceding: None,
            cleaving,
            nterm_fixed: false,
        }
    }

    fn sorted(s: &str) -> Vec<char> {
        let mut v = s.chars().collect::<Vec<_>>();
        v.sort_unstable();
        v
    }

    #[test]
    fn shuffle_preserves_composition_and_boundary() {
        let rule = trypsin();
        let cache = cache(DecoyMode::ShufflePeptide, &rule, Some(42));
        let target = peptide("LPPGWEK", Some(b'K'));
        let (decoy, reason) = cache.resolve(&target);

        assert_eq!(reason, None);
        assert_ne!(decoy, target.sequence);
        assert_eq!(decoy.len(), target.sequence.len());
        assert_eq!(sorted(&decoy), sorted(&target.sequence));
        assert!(decoy.ends_with('K'));
    }

    #[test]
    fn cache_returns_identical_decoy() {
        let rule = trypsin();
        let cache = cache(DecoyMode::ShufflePeptide, &rule, None);
        let target = peptide("LPPGWEK", Some(b'K'));
        let (first, _) = cache.resolve(&target);
        let (second, _) = cache.resolve(&target);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let rule = trypsin();
        let target = peptide("VYYFNHITNASQWER", Some(b'R'));
        let a = cache(DecoyMode::ShufflePeptide, &rule, Some(7)).resolve(&target);
        let b = cache(DecoyMode::ShufflePeptide, &rule, Some(7)).resolve(&target);
        let c = cache(DecoyMode::ShufflePeptide, &rule, Some(8)).resolve(&target);
        assert_eq!(a.0, b.0);
        // a different seed is allowed to collide, but should not here
        assert_ne!(a.0, c.0);
    }

    #[test]
    fn single_residue_peptide_is_too_short() {
        let rule = trypsin();
        let cache = cache(DecoyMode::ShufflePeptide, &rule, Some(1));
        let (decoy, reason) = cache.resolve(&peptide("R", Some(b'R')));
        assert_eq!(decoy, "R");
        assert_eq!(reason, Some(UnmutableReason::TooShort));
    }

    #[test]
    fn short_peptides_are_still_shuffled() {
        let rule = trypsin();
        let cache = cache(DecoyMode::ShufflePeptide, &rule, Some(1));
        let (decoy, reason) = cache.resolve(&peptide("MSTR", Some(b'R')));
        assert_eq!(reason, None);
        assert_ne!(decoy, "MSTR");
        assert_eq!(sorted(&decoy), sorted("MSTR"));
        assert!(decoy.ends_with('R'));
    }

    #[test]
    fn homopolymer_is_unmutable() {
        let rule = trypsin();
        let cache = cache(DecoyMode::ShufflePeptide, &rule, Some(1));
        let (decoy, reason) = cache.resolve(&peptide("AAAAAK", Some(b'K')));
        assert_eq!(decoy, "AAAAAK");
        assert_eq!(reason, Some(UnmutableReason::Homopolymer));
    }

    #[test]
    fn shuffling_never_creates_new_cleavage_sites() {
        // the internal K is shielded by the following P; every decoy must
        // keep digesting as one tryptic peptide
        let rule = trypsin();
        let target = peptide("MKPADEGHWK", Some(b'K'));
        let mut mutated = 0;
        for seed in 0..50 {
            let cache = cache(DecoyMode::ShufflePeptide, &rule, Some(seed));
            let (decoy, reason) = cache.resolve(&target);
            assert_eq!(
                rule.digest(&decoy, CleavageSpecificity::Full).len(),
                1,
                "decoy {} digests into multiple peptides",
                decoy
            );
            assert_eq!(&decoy[1..2], "K");
            assert!(decoy.ends_with('K'));
            if reason.is_none() {
                mutated += 1;
            }
        }
        assert!(mutated > 0);
    }

    #[test]
    fn shuffling_preserves_the_upstream_boundary() {
        // the peptide follows a K cut; a decoy starting with P would
        // suppress that cut when the protein is reassembled
        let rule = trypsin();
        let target = Peptide {
            sequence: "LPPGWEK".into(),
            preceding: Some(b'K'),
            cleaving: Some(b'K'),
            nterm_fixed: false,
        };
        let mut mutated = 0;
        for seed in 0..30 {
            let cache = cache(DecoyMode::ShufflePeptide, &rule, Some(seed));
            let (decoy, reason) = cache.resolve(&target);
            assert!(!decoy.starts_with('P'), "decoy {} buries the K cut", decoy);
            if reason.is_none() {
                mutated += 1;
            }
        }
        assert!(mutated > 0);
    }

    #[test]
    fn reverse_keeps_cleaving_residue_fixed() {
        let rule = trypsin();
        let cache = cache(DecoyMode::ReverseProtein, &rule, None);
        let (decoy, reason) = cache.resolve(&peptide("ACDEFK", Some(b'K')));
        assert_eq!(decoy, "FEDCAK");
        assert_eq!(reason, None);
    }

    #[test]
    fn reverse_without_cleaving_residue_reverses_all() {
        let rule = trypsin();
        let cache = cache(DecoyMode::ReverseProtein, &rule, None);
        let (decoy, reason) = cache.resolve(&peptide("ACDEF", None));
        assert_eq!(decoy, "FEDCA");
        assert_eq!(reason, None);
    }

    #[test]
    fn palindromic_reversal_is_unmutable() {
        let rule = trypsin();
        let cache = cache(DecoyMode::ReverseProtein, &rule, None);
        let (decoy, reason) = cache.resolve(&peptide("ACAK", Some(b'K')));
        assert_eq!(decoy, "ACAK");
        assert_eq!(reason, Some(UnmutableReason::ExhaustedAttempts));
    }

    #[test]
    fn reversal_that_digests_differently_is_rejected() {
        // reversing would move the shielded K next to a non-proline residue
        let rule = trypsin();
        let cache = cache(DecoyMode::ReverseProtein, &rule, None);
        let (decoy, reason) = cache.resolve(&peptide("MKPADEGHWK", Some(b'K')));
        assert_eq!(decoy, "MKPADEGHWK");
        assert_eq!(reason, Some(UnmutableReason::ExhaustedAttempts));
    }

    #[test]
    fn nterm_fixed_residue_stays_in_place() {
        let rule = EnzymeRule::from_name("aspn").unwrap();
        let cache = cache(DecoyMode::ReverseProtein, &rule, None);
        let target = Peptide {
            sequence: "DACEF".into(),
            preceding: Some(b'M'),
            cleaving: None,
            nterm_fixed: true,
        };
        let (decoy, reason) = cache.resolve(&target);
        assert_eq!(decoy, "DFECA");
        assert_eq!(reason, None);
    }
}
