use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::archive::{self, DownloadReport};
use crate::config::ResolvedConfig;
use crate::error::EsetError;
use crate::eset::{self, EsetLayout};
use crate::gdc::{self, GdcClient};
use crate::maf;
use crate::pheno;

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub project: String,
    pub format: String,
    pub requested: usize,
    pub report: DownloadReport,
    pub directory: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub input_files: usize,
    pub mutations: usize,
    pub features: usize,
    pub samples: usize,
    pub binary: bool,
    pub output_dir: String,
    pub data_path: String,
    pub featuredata_path: String,
    pub pheno_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeResult {
    pub cases: usize,
    pub columns: usize,
    pub phenodata_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub fetch: FetchResult,
    pub build: BuildResult,
    pub merge: Option<MergeResult>,
    pub finished_at: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn phase(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

fn finished(sink: &dyn ProgressSink, message: String, start: Instant) {
    sink.event(ProgressEvent {
        message,
        elapsed: Some(start.elapsed()),
    });
}

pub struct App<G: GdcClient> {
    gdc: G,
}

impl<G: GdcClient> App<G> {
    pub fn new(gdc: G) -> Self {
        Self { gdc }
    }

    pub fn fetch(
        &self,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, EsetError> {
        let project = config.require_project()?;

        phase(sink, format!("phase=Request; {project} {}", config.format));
        let start = Instant::now();
        let fetched = gdc::download_data(&self.gdc, project, config.format, &config.download_dir)?;
        finished(
            sink,
            format!(
                "phase=Download; {} files into {}",
                fetched.ids.len(),
                fetched.archive.display()
            ),
            start,
        );

        phase(sink, "phase=Verify; checking archive".to_string());
        let report = archive::check(&fetched.ids, &fetched.archive)?;
        if !report.is_complete() {
            tracing::warn!(
                missing = report.count(archive::FileStatus::Missing),
                empty = report.count(archive::FileStatus::Empty),
                "download is incomplete"
            );
        }

        phase(sink, "phase=Extract; unpacking archive".to_string());
        let directory = archive::extract(&fetched.archive)?;

        Ok(FetchResult {
            project: project.to_string(),
            format: config.format.to_string(),
            requested: fetched.ids.len(),
            report,
            directory: directory.display().to_string(),
        })
    }

    pub fn build(
        &self,
        maf_dir: &Path,
        out_dir: &Path,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<BuildResult, EsetError> {
        let files = maf::maf_files_in(maf_dir)?;
        if files.is_empty() {
            return Err(EsetError::NoInputFiles(maf_dir.to_path_buf()));
        }

        phase(sink, format!("phase=Load; {} MAF files", files.len()));
        let start = Instant::now();
        let mutations = maf::prepare(&files, &config.columns)?;
        finished(
            sink,
            format!("phase=Load; {} mutations", mutations.len()),
            start,
        );

        phase(sink, "phase=Assemble; writing eset files".to_string());
        let esets = eset::write_eset_files(&mutations, out_dir, config.binary)?;
        let layout = EsetLayout::new(out_dir)?;
        let (features, samples) = esets.data.shape();

        Ok(BuildResult {
            input_files: files.len(),
            mutations: mutations.len(),
            features,
            samples,
            binary: esets.data.is_binary(),
            output_dir: layout.root().to_string(),
            data_path: layout.data_path().to_string(),
            featuredata_path: layout.featuredata_path().to_string(),
            pheno_path: layout.pheno_path().to_string(),
        })
    }

    pub fn merge(
        &self,
        pheno_path: &Path,
        reference: &Path,
        out_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<MergeResult, EsetError> {
        phase(
            sink,
            format!("phase=Merge; joining {}", reference.display()),
        );
        let merged = pheno::merge_pheno_data(pheno_path, reference, out_path)?;
        Ok(MergeResult {
            cases: merged.len(),
            columns: merged.columns().len(),
            phenodata_path: out_path.display().to_string(),
        })
    }

    pub fn run(
        &self,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, EsetError> {
        let fetch = self.fetch(config, sink)?;
        let maf_dir = PathBuf::from(&fetch.directory);
        let out_dir = maf_dir.join("eset");
        let build = self.build(&maf_dir, &out_dir, config, sink)?;

        let merge = match &config.pheno_reference {
            Some(reference) => {
                let layout = EsetLayout::new(&out_dir)?;
                Some(self.merge(
                    layout.pheno_path().as_std_path(),
                    reference,
                    layout.phenodata_path().as_std_path(),
                    sink,
                )?)
            }
            None => {
                tracing::info!("no phenotype reference configured, keeping pheno.csv");
                None
            }
        };

        Ok(RunResult {
            fetch,
            build,
            merge,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
