mod analysis;
mod config;
mod orchestrator;
mod pipeline;

use clap::Parser;
use config::{AppConfig, Cli};
use pipeline::Pipeline;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            log::error!("{} file(s) failed", failed);
            ExitCode::FAILURE
        }
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<usize> {
    let config = AppConfig::build(cli)?;
    let pipeline = Pipeline::new(config)?;

    let files = collect_input_files(&cli.input)?;
    if files.is_empty() {
        log::warn!("no files to process in {}", cli.input.display());
        return Ok(0);
    }

    let mut failed = 0usize;
    for file in &files {
        match pipeline.process_file(file) {
            Ok(outcome) => log::info!(
                "{} -> {} ({} detections, audit: {})",
                file.display(),
                outcome.output_path.display(),
                outcome.detections,
                outcome.audit_path.display()
            ),
            Err(err) => {
                failed += 1;
                log::error!("{}: {:#}", file.display(), err);
            }
        }
    }

    log::info!("processed {} file(s), {} failed", files.len(), failed);
    Ok(failed)
}

fn collect_input_files(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        anyhow::bail!("input path {} does not exist", input.display());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_files_in_stable_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = collect_input_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.png"));
        assert!(files[1].ends_with("b.pdf"));
    }

    #[test]
    fn single_file_input_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.pdf");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(collect_input_files(&file).unwrap(), vec![file]);
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(collect_input_files(Path::new("/nonexistent/dir")).is_err());
    }
}
