//! CLI surface and runtime configuration.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use dossier_core::{default_ignored_entities, PolicyTable};
use dossier_rules::recognizers::load_custom_recognizers;
use dossier_rules::{AllowList, AllowListConfig, DocumentTypeClassifier, PatternEngine};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Local pipeline: OCR plus pattern recognizers.
    Ocr,
    /// Remote vision model performs detection and typing.
    Vision,
}

/// Anonymisation de documents administratifs français (images et PDF).
#[derive(Debug, Parser)]
#[command(name = "dossier-redact", version, about)]
pub struct Cli {
    /// File or directory to process.
    #[arg(long, default_value = "input")]
    pub input: PathBuf,

    /// Directory receiving redacted files and audit records.
    #[arg(long, default_value = "output")]
    pub output: PathBuf,

    /// YAML file with additional pattern recognizers.
    #[arg(long, value_name = "FILE")]
    pub custom_recognizers: Option<PathBuf>,

    /// YAML file with additional protected terms.
    #[arg(long, value_name = "FILE")]
    pub allow_lists: Option<PathBuf>,

    /// Skip classification and force this document type.
    #[arg(long, value_name = "TYPE")]
    pub doc_type: Option<String>,

    /// Entity types to skip; replaces the default DATE_TIME,CARDINAL list.
    #[arg(long, value_delimiter = ',', value_name = "TYPES")]
    pub ignore_entities: Vec<String>,

    /// Detection backend.
    #[arg(long, value_enum, default_value_t = RunMode::Ocr)]
    pub mode: RunMode,

    /// Treat every PDF page as scanned, even when a text layer exists.
    #[arg(long)]
    pub force_image: bool,

    /// API key for the vision backend.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,
}

pub struct AppConfig {
    pub output_dir: PathBuf,
    pub mode: RunMode,
    pub force_image: bool,
    pub forced_doc_type: Option<String>,
    pub ignored_entities: BTreeSet<String>,
    pub allow_list: AllowList,
    pub engine: PatternEngine,
    pub classifier: DocumentTypeClassifier,
    pub policies: PolicyTable,
    pub api_key: Option<String>,
}

impl AppConfig {
    pub fn build(cli: &Cli) -> anyhow::Result<Self> {
        if cli.mode == RunMode::Vision && cli.google_api_key.is_none() {
            anyhow::bail!("--mode vision requires GOOGLE_API_KEY");
        }

        let mut allow_list = AllowList::builtin();
        if let Some(path) = &cli.allow_lists {
            let config = AllowListConfig::load(path)
                .with_context(|| format!("loading allow lists from {}", path.display()))?;
            allow_list = allow_list.merged_with(&config);
        }

        let mut engine = PatternEngine::new();
        if let Some(path) = &cli.custom_recognizers {
            let extra = load_custom_recognizers(path)
                .with_context(|| format!("loading recognizers from {}", path.display()))?;
            log::info!("[Config] {} custom recognizers loaded", extra.len());
            engine = engine.with_recognizers(extra);
        }

        // The built-in list is a default, not a floor: a supplied list
        // replaces it, so dates and cardinals can be opted back in.
        let ignored_entities: BTreeSet<String> = if cli.ignore_entities.is_empty() {
            default_ignored_entities().into_iter().collect()
        } else {
            cli.ignore_entities.iter().cloned().collect()
        };

        std::fs::create_dir_all(&cli.output)
            .with_context(|| format!("creating output directory {}", cli.output.display()))?;

        Ok(Self {
            output_dir: cli.output.clone(),
            mode: cli.mode,
            force_image: cli.force_image,
            forced_doc_type: cli.doc_type.clone(),
            ignored_entities,
            allow_list,
            engine,
            classifier: DocumentTypeClassifier::new(),
            policies: PolicyTable::builtin(),
            api_key: cli.google_api_key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dossier-redact").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_to_ocr_mode() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let cli = cli(&["--output", out.to_str().unwrap()]);
        let config = AppConfig::build(&cli).unwrap();
        assert_eq!(config.mode, RunMode::Ocr);
        assert!(!config.force_image);
        assert!(out.is_dir());
    }

    #[test]
    fn ignore_entities_replace_the_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli(&[
            "--output",
            dir.path().to_str().unwrap(),
            "--ignore-entities",
            "MONETARY_AMOUNT,PERSON",
        ]);
        let config = AppConfig::build(&cli).unwrap();
        assert!(config.ignored_entities.contains("MONETARY_AMOUNT"));
        assert!(config.ignored_entities.contains("PERSON"));
        // Supplying a list opts dates and cardinals back into redaction.
        assert!(!config.ignored_entities.contains("DATE_TIME"));
        assert!(!config.ignored_entities.contains("CARDINAL"));
    }

    #[test]
    fn default_ignore_list_applies_when_flag_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli(&["--output", dir.path().to_str().unwrap()]);
        let config = AppConfig::build(&cli).unwrap();
        assert!(config.ignored_entities.contains("DATE_TIME"));
        assert!(config.ignored_entities.contains("CARDINAL"));
        assert_eq!(config.ignored_entities.len(), 2);
    }

    #[test]
    fn vision_mode_without_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut cli = cli(&["--output", dir.path().to_str().unwrap(), "--mode", "vision"]);
        cli.google_api_key = None;
        assert!(AppConfig::build(&cli).is_err());
    }
}
