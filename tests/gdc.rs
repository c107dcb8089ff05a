use std::cell::RefCell;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use assert_matches::assert_matches;
use serde_json::json;

use maf_eset::domain::{DataFormat, FileId, ProjectId};
use maf_eset::error::EsetError;
use maf_eset::gdc::{
    GdcClient, GdcHttpClient, build_files_query, download_data, parse_file_ids,
};

#[test]
fn files_query_filters_project_access_and_format() {
    let project: ProjectId = "TCGA-GBM".parse().unwrap();
    let query = build_files_query(&project, DataFormat::Maf, 2000);

    assert_eq!(query["filters"]["op"], "and");
    let filters = query["filters"]["content"].as_array().unwrap();
    assert_eq!(filters.len(), 3);
    assert_eq!(filters[0]["content"]["field"], "cases.project.project_id");
    assert_eq!(filters[0]["content"]["value"], json!(["TCGA-GBM"]));
    assert_eq!(filters[1]["content"]["field"], "files.access");
    assert_eq!(filters[1]["content"]["value"], json!(["open"]));
    assert_eq!(filters[2]["content"]["field"], "files.data_format");
    assert_eq!(filters[2]["content"]["value"], json!(["MAF"]));
    assert_eq!(query["format"], "JSON");
    assert_eq!(query["size"], "2000");
}

#[test]
fn parse_hits_in_order() {
    let payload = json!({
        "data": {
            "hits": [
                {"id": "a", "file_id": "a"},
                {"id": "b", "file_id": "b"}
            ],
            "pagination": {"count": 2}
        },
        "warnings": {}
    });
    let ids = parse_file_ids(&payload).unwrap();
    assert_eq!(ids, vec![FileId::new("a"), FileId::new("b")]);
}

#[test]
fn parse_hits_rejects_malformed_payload() {
    let err = parse_file_ids(&json!({"data": {}})).unwrap_err();
    assert_matches!(err, EsetError::GdcResponse(_));

    let err = parse_file_ids(&json!({"data": {"hits": [{"id": "x"}]}})).unwrap_err();
    assert_matches!(err, EsetError::GdcResponse(_));
}

struct RecordingClient {
    downloaded: RefCell<Vec<FileId>>,
}

impl GdcClient for RecordingClient {
    fn search_files(
        &self,
        project: &ProjectId,
        format: DataFormat,
    ) -> Result<Vec<FileId>, EsetError> {
        assert_eq!(project.as_str(), "TCGA-GBM");
        assert_eq!(format, DataFormat::Maf);
        Ok(vec![FileId::new("u1"), FileId::new("u2")])
    }

    fn download_bulk(&self, ids: &[FileId], download_dir: &Path) -> Result<PathBuf, EsetError> {
        self.downloaded.borrow_mut().extend_from_slice(ids);
        Ok(download_dir.join("bundle.tar.gz"))
    }
}

#[test]
fn download_data_passes_search_hits_to_bulk_download() {
    let client = RecordingClient {
        downloaded: RefCell::new(Vec::new()),
    };
    let project: ProjectId = "TCGA-GBM".parse().unwrap();

    let fetched = download_data(&client, &project, DataFormat::Maf, Path::new("dl")).unwrap();

    assert_eq!(fetched.ids, vec![FileId::new("u1"), FileId::new("u2")]);
    assert_eq!(fetched.archive, PathBuf::from("dl/bundle.tar.gz"));
    assert_eq!(*client.downloaded.borrow(), fetched.ids);
}

struct FailingClient;

impl GdcClient for FailingClient {
    fn search_files(
        &self,
        _project: &ProjectId,
        _format: DataFormat,
    ) -> Result<Vec<FileId>, EsetError> {
        Err(EsetError::GdcStatus {
            status: 503,
            message: "unavailable".to_string(),
        })
    }

    fn download_bulk(&self, _ids: &[FileId], _download_dir: &Path) -> Result<PathBuf, EsetError> {
        panic!("download must not run after a failed search");
    }
}

#[test]
fn search_failure_propagates() {
    let project: ProjectId = "TCGA-GBM".parse().unwrap();
    let err = download_data(&FailingClient, &project, DataFormat::Maf, Path::new("dl")).unwrap_err();
    assert_matches!(err, EsetError::GdcStatus { status: 503, .. });
}

/// Answers a single request with a canned response and hands back the request it saw.
fn serve_once(
    status_line: &'static str,
    headers: &'static str,
    body: &'static [u8],
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request = String::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            request.push_str(&line);
        }
        let mut request_body = vec![0; content_length];
        reader.read_exact(&mut request_body).unwrap();
        request.push_str(&String::from_utf8_lossy(&request_body));

        let head = format!(
            "{status_line}\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(body).unwrap();
        stream.flush().unwrap();
        request
    });
    (base_url, handle)
}

#[test]
fn bulk_download_writes_named_archive_into_new_directory() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 200 OK",
        "Content-Type: application/octet-stream\r\nContent-Disposition: attachment; filename=x.tar.gz\r\n",
        b"archive bytes",
    );
    let dir = tempfile::tempdir().unwrap();
    let download_dir = dir.path().join("downloads").join("nested");
    let client = GdcHttpClient::with_base_url(&base_url, 2000).unwrap();

    let path = client
        .download_bulk(&[FileId::new("u1"), FileId::new("u2")], &download_dir)
        .unwrap();

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /data "));
    assert!(request.contains(r#""ids":["u1","u2"]"#));

    assert!(download_dir.is_dir());
    assert!(path.is_absolute());
    assert_eq!(path.file_name().unwrap(), "x.tar.gz");
    assert_eq!(fs::read(&path).unwrap(), b"archive bytes");
    let entries: Vec<_> = fs::read_dir(&download_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("x.tar.gz")]);
}

#[test]
fn bulk_download_error_status_is_reported() {
    let (base_url, server) = serve_once("HTTP/1.1 404 Not Found", "", b"no such files");
    let dir = tempfile::tempdir().unwrap();
    let client = GdcHttpClient::with_base_url(&base_url, 2000).unwrap();

    let err = client
        .download_bulk(&[FileId::new("u1")], dir.path())
        .unwrap_err();
    server.join().unwrap();

    assert_matches!(
        err,
        EsetError::GdcStatus { status: 404, message } if message == "no such files"
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn search_reads_hits_from_files_endpoint() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 200 OK",
        "Content-Type: application/json\r\n",
        br#"{"data": {"hits": [{"file_id": "f1"}, {"file_id": "f2"}]}, "warnings": {}}"#,
    );
    let client = GdcHttpClient::with_base_url(&base_url, 50).unwrap();
    let project: ProjectId = "TCGA-GBM".parse().unwrap();

    let ids = client.search_files(&project, DataFormat::Maf).unwrap();

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /files "));
    assert!(request.contains(r#""size":"50""#));
    assert_eq!(ids, vec![FileId::new("f1"), FileId::new("f2")]);
}
