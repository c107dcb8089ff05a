use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BuildResult, FetchResult, MergeResult, ProgressEvent, ProgressSink, RunResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_build(result: &BuildResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_merge(result: &MergeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => {
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message)
            }
            None => tracing::info!("{}", event.message),
        }
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_fetch(result: &FetchResult) {
        print!("{}", result.report);
        println!(
            "{} of {} files OK, extracted to {}",
            result
                .report
                .count(crate::archive::FileStatus::Ok),
            result.requested,
            result.directory
        );
    }

    pub fn print_build(result: &BuildResult) {
        println!(
            "{} mutations from {} files -> {} features x {} samples ({})",
            result.mutations,
            result.input_files,
            result.features,
            result.samples,
            if result.binary { "binary" } else { "counts" }
        );
        println!("assay data:   {}", result.data_path);
        println!("feature data: {}", result.featuredata_path);
        println!("pheno data:   {}", result.pheno_path);
    }

    pub fn print_merge(result: &MergeResult) {
        println!(
            "phenotype data: {} cases, {} columns -> {}",
            result.cases, result.columns, result.phenodata_path
        );
    }

    pub fn print_run(result: &RunResult) {
        Self::print_fetch(&result.fetch);
        Self::print_build(&result.build);
        if let Some(merge) = &result.merge {
            Self::print_merge(merge);
        }
    }
}
