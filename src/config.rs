use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{DataFormat, ProjectId};
use crate::error::EsetError;

pub const DEFAULT_API_BASE: &str = "https://api.gdc.cancer.gov";
pub const DEFAULT_PAGE_SIZE: u32 = 2000;
pub const DEFAULT_DOWNLOAD_DIR: &str = "GDC_Downloads";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub format: Option<DataFormat>,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub binary: Option<bool>,
    #[serde(default)]
    pub pheno_reference: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub project: Option<ProjectId>,
    pub format: DataFormat,
    pub download_dir: PathBuf,
    pub columns: Vec<String>,
    pub binary: bool,
    pub pheno_reference: Option<PathBuf>,
    pub api_base: String,
    pub page_size: u32,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            project: None,
            format: DataFormat::Maf,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            columns: default_columns(),
            binary: true,
            pheno_reference: None,
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project: Option<ProjectId>,
    pub format: Option<DataFormat>,
    pub download_dir: Option<PathBuf>,
    pub binary: Option<bool>,
    pub pheno_reference: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(project) = overrides.project {
            self.project = Some(project);
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if let Some(dir) = overrides.download_dir {
            self.download_dir = dir;
        }
        if let Some(binary) = overrides.binary {
            self.binary = binary;
        }
        if let Some(reference) = overrides.pheno_reference {
            self.pheno_reference = Some(reference);
        }
        self
    }

    pub fn require_project(&self) -> Result<&ProjectId, EsetError> {
        self.project.as_ref().ok_or(EsetError::MissingProject)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, EsetError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("maf-eset.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| EsetError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| EsetError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, EsetError> {
        let defaults = ResolvedConfig::default();

        let project = config
            .project
            .map(|value| value.parse::<ProjectId>())
            .transpose()?;

        let columns = match config.columns {
            Some(columns) if columns.is_empty() => {
                return Err(EsetError::ConfigParse(
                    "column selection must not be empty".to_string(),
                ));
            }
            Some(columns) => columns,
            None => defaults.columns,
        };

        Ok(ResolvedConfig {
            project,
            format: config.format.unwrap_or(defaults.format),
            download_dir: config
                .download_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            columns,
            binary: config.binary.unwrap_or(defaults.binary),
            pheno_reference: config.pheno_reference.map(PathBuf::from),
            api_base: config
                .api_base
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            page_size: config.page_size.unwrap_or(defaults.page_size),
        })
    }
}

pub fn default_columns() -> Vec<String> {
    [
        "NCBI_Build",
        "Chromosome",
        "Start_Position",
        "End_Position",
        "Strand",
        "Reference_Allele",
        "Tumor_Seq_Allele1",
        "Tumor_Seq_Allele2",
        "Transcript_ID",
        "case_id",
        "COSMIC",
        "Existing_variation",
        "t_ref_count",
        "t_alt_count",
        "Variant_Type",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
