use anyhow::{ensure, Context};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tdgen_core::decoy::DecoyMode;
use tdgen_core::enzyme::CleavageSpecificity;

/// Input parameters deserialized from the JSON file; everything except the
/// input paths has a default
#[derive(Deserialize, Default)]
pub struct Input {
    fasta: Option<Vec<String>>,
    enzyme: Option<String>,
    mode: Option<DecoyMode>,
    decoy_tag: Option<String>,
    min_len: Option<usize>,
    specificity: Option<CleavageSpecificity>,
    seed: Option<u64>,
    output_directory: Option<String>,
}

/// Actual run settings - may include defaults not set by the user
#[derive(Serialize)]
pub struct Settings {
    pub version: String,
    pub fasta: Vec<String>,
    pub enzyme: String,
    pub mode: DecoyMode,
    pub decoy_tag: String,
    pub min_len: usize,
    pub specificity: CleavageSpecificity,
    pub seed: Option<u64>,
    pub output_directory: PathBuf,
}

impl Input {
    pub fn from_arguments(matches: ArgMatches) -> anyhow::Result<Self> {
        let path = matches
            .get_one::<String>("parameters")
            .expect("required parameters");
        let mut input = Input::load(path)
            .with_context(|| format!("Failed to read parameters from `{path}`"))?;

        // Handle JSON configuration overrides
        if let Some(fasta) = matches.get_many::<String>("fasta") {
            log::trace!("overriding `fasta` parameter.");
            input.fasta = Some(fasta.cloned().collect());
        }
        if let Some(output_directory) = matches.get_one::<String>("output_directory") {
            log::trace!("overriding `output_directory` parameter.");
            input.output_directory = Some(output_directory.into());
        }

        ensure!(
            input.fasta.as_ref().map(|f| !f.is_empty()).unwrap_or(false),
            "`fasta` must be set. For more information try '--help'"
        );

        Ok(input)
    }

    pub fn load<S: AsRef<str>>(path: S) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&contents).map_err(anyhow::Error::from)
    }

    pub fn build(self) -> anyhow::Result<Settings> {
        let fasta = self.fasta.unwrap_or_default();
        ensure!(!fasta.is_empty(), "`fasta` must be set");

        let decoy_tag = self.decoy_tag.unwrap_or_else(|| "decoy_".into());
        if decoy_tag.is_empty() {
            log::warn!("`decoy_tag` is empty: decoy headers will be indistinguishable from targets");
        }

        let output_directory = match self.output_directory {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&output_directory)?;

        Ok(Settings {
            version: clap::crate_version!().into(),
            fasta,
            enzyme: self.enzyme.unwrap_or_else(|| "trypsin".into()),
            mode: self.mode.unwrap_or_default(),
            decoy_tag,
            min_len: self.min_len.unwrap_or(6),
            specificity: self.specificity.unwrap_or_default(),
            seed: self.seed,
            output_directory,
        })
    }
}
