use anyhow::Context;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

use tdgen_core::enzyme::EnzymeRule;
use tdgen_core::generate::{generate, GeneratorParameters};
use tdgen_core::report;

use crate::input::Settings;

pub struct Runner {
    settings: Settings,
    parameters: GeneratorParameters,
    start: Instant,
}

impl Runner {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        // Resolve the enzyme before touching any input: an unknown name
        // aborts the run with no partial output
        let rule = EnzymeRule::from_name(&settings.enzyme)
            .with_context(|| format!("Failed to resolve enzyme `{}`", settings.enzyme))?;
        let parameters = GeneratorParameters {
            rule,
            specificity: settings.specificity,
            mode: settings.mode,
            decoy_tag: settings.decoy_tag.clone(),
            min_len: settings.min_len,
            seed: settings.seed,
        };
        Ok(Self {
            settings,
            parameters,
            start: Instant::now(),
        })
    }

    pub fn run(self) -> anyhow::Result<Vec<PathBuf>> {
        let fasta = tdgen_core::read_fasta(&self.settings.fasta)
            .with_context(|| format!("Failed to read FASTA from {:?}", self.settings.fasta))?;
        info!(
            "parsed {} protein records from {} file(s)",
            fasta.records.len(),
            self.settings.fasta.len()
        );
        if !fasta.skipped.is_empty() {
            warn!(
                "skipped {} malformed record(s); see the run report",
                fasta.skipped.len()
            );
        }
        if self.settings.seed.is_none() {
            info!("no seed configured: decoy databases will differ between runs");
        }

        let database = generate(&fasta, &self.parameters)?;

        let fasta_path = self.settings.output_directory.join("target_decoy.fasta");
        report::write_fasta(&fasta_path, &fasta, &database)
            .with_context(|| format!("Failed to write `{}`", fasta_path.display()))?;

        let report_path = self.settings.output_directory.join("decoy_report.tsv");
        report::write_report(&report_path, &fasta, &database)
            .with_context(|| format!("Failed to write `{}`", report_path.display()))?;

        let settings_path = self
            .settings
            .output_directory
            .join("decoy_generation.json");
        std::fs::write(&settings_path, serde_json::to_string_pretty(&self.settings)?)?;

        info!(
            "wrote {} targets + {} decoys ({} unique peptides, {} unmutable) in {:#?}",
            fasta.records.len(),
            database.decoys.len(),
            database.unique_peptides,
            database.unmutable.len(),
            self.start.elapsed()
        );

        Ok(vec![fasta_path, report_path, settings_path])
    }
}
