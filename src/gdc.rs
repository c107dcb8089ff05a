use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::{DEFAULT_API_BASE, DEFAULT_PAGE_SIZE};
use crate::domain::{DataFormat, FileId, ProjectId};
use crate::error::EsetError;

pub trait GdcClient {
    fn search_files(
        &self,
        project: &ProjectId,
        format: DataFormat,
    ) -> Result<Vec<FileId>, EsetError>;

    /// Downloads the bundle for `ids` into `download_dir`, returning the absolute archive path.
    fn download_bulk(&self, ids: &[FileId], download_dir: &Path) -> Result<PathBuf, EsetError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchedArchive {
    pub ids: Vec<FileId>,
    pub archive: PathBuf,
}

pub fn download_data<C: GdcClient + ?Sized>(
    client: &C,
    project: &ProjectId,
    format: DataFormat,
    download_dir: &Path,
) -> Result<FetchedArchive, EsetError> {
    tracing::info!(project = %project, format = %format, "requesting file list");
    let ids = client.search_files(project, format)?;
    tracing::info!(files = ids.len(), "request complete");
    let archive = client.download_bulk(&ids, download_dir)?;
    tracing::info!(archive = %archive.display(), "download complete");
    Ok(FetchedArchive { ids, archive })
}

#[derive(Clone)]
pub struct GdcHttpClient {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl GdcHttpClient {
    pub fn new() -> Result<Self, EsetError> {
        Self::with_base_url(DEFAULT_API_BASE, DEFAULT_PAGE_SIZE)
    }

    pub fn with_base_url(base_url: &str, page_size: u32) -> Result<Self, EsetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("maf-eset/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| EsetError::GdcHttp(err.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| EsetError::GdcHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.base_url)
    }

    fn data_url(&self) -> String {
        format!("{}/data", self.base_url)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, EsetError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "GDC request failed".to_string());
        Err(EsetError::GdcStatus { status, message })
    }
}

impl GdcClient for GdcHttpClient {
    fn search_files(
        &self,
        project: &ProjectId,
        format: DataFormat,
    ) -> Result<Vec<FileId>, EsetError> {
        let body = build_files_query(project, format, self.page_size);
        let response = self
            .client
            .post(self.files_url())
            .json(&body)
            .send()
            .map_err(|err| EsetError::GdcHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let payload: Value = response
            .json()
            .map_err(|err| EsetError::GdcResponse(err.to_string()))?;
        parse_file_ids(&payload)
    }

    fn download_bulk(&self, ids: &[FileId], download_dir: &Path) -> Result<PathBuf, EsetError> {
        let response = self
            .client
            .post(self.data_url())
            .json(&json!({ "ids": ids }))
            .send()
            .map_err(|err| EsetError::GdcHttp(err.to_string()))?;
        let mut response = Self::handle_status(response)?;

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let file_name = filename_from_disposition(&disposition)?;

        fs::create_dir_all(download_dir).map_err(|err| EsetError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".maf-eset-download")
            .tempfile_in(download_dir)
            .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut temp)
            .map_err(|err| EsetError::GdcHttp(err.to_string()))?;
        temp.flush()
            .map_err(|err| EsetError::Filesystem(err.to_string()))?;

        let destination = download_dir.join(&file_name);
        temp.persist(&destination)
            .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        tracing::debug!(path = %destination.display(), "archive written");
        fs::canonicalize(&destination).map_err(|err| EsetError::Filesystem(err.to_string()))
    }
}

pub fn build_files_query(project: &ProjectId, format: DataFormat, size: u32) -> Value {
    json!({
        "filters": {
            "op": "and",
            "content": [
                {
                    "op": "in",
                    "content": {
                        "field": "cases.project.project_id",
                        "value": [project.as_str()]
                    }
                },
                {
                    "op": "in",
                    "content": {
                        "field": "files.access",
                        "value": ["open"]
                    }
                },
                {
                    "op": "in",
                    "content": {
                        "field": "files.data_format",
                        "value": [format.as_api_str()]
                    }
                }
            ]
        },
        "fields": "file_id",
        "format": "JSON",
        "size": size.to_string()
    })
}

pub fn parse_file_ids(payload: &Value) -> Result<Vec<FileId>, EsetError> {
    let hits = payload
        .get("data")
        .and_then(|data| data.get("hits"))
        .and_then(|hits| hits.as_array())
        .ok_or_else(|| EsetError::GdcResponse("missing data.hits array".to_string()))?;

    hits.iter()
        .map(|hit| {
            hit.get("file_id")
                .and_then(|value| value.as_str())
                .map(FileId::new)
                .ok_or_else(|| EsetError::GdcResponse(format!("hit without file_id: {hit}")))
        })
        .collect()
}

pub fn filename_from_disposition(header: &str) -> Result<String, EsetError> {
    let re = Regex::new(r"filename=(.+)").map_err(|err| EsetError::GdcResponse(err.to_string()))?;
    let raw = re
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| EsetError::MissingFilename(header.to_string()))?;
    let name = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"');
    let name = Path::new(name)
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or_default();
    if name.is_empty() {
        return Err(EsetError::MissingFilename(header.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_with_plain_filename() {
        let name = filename_from_disposition("attachment; filename=gdc_download_20191105.tar.gz")
            .unwrap();
        assert_eq!(name, "gdc_download_20191105.tar.gz");
    }

    #[test]
    fn disposition_with_quoted_filename() {
        let name = filename_from_disposition(r#"attachment; filename="bundle.tar.gz"; size=12"#)
            .unwrap();
        assert_eq!(name, "bundle.tar.gz");
    }

    #[test]
    fn disposition_cannot_escape_download_dir() {
        let name = filename_from_disposition("attachment; filename=../../etc/x.tar.gz").unwrap();
        assert_eq!(name, "x.tar.gz");
    }
}
