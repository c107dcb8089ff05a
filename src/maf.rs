use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::domain::FeatureKey;
use crate::error::EsetError;
use crate::table::Table;

pub const COUNTS: &str = "counts";
pub const FEATURENAME: &str = "featurename";
pub const CASE_ID: &str = "case_id";
pub const T_REF_COUNT: &str = "t_ref_count";
pub const T_ALT_COUNT: &str = "t_alt_count";

pub const FEATURE_COLUMNS: [&str; 7] = [
    "Chromosome",
    "Start_Position",
    "End_Position",
    "Strand",
    "Reference_Allele",
    "Tumor_Seq_Allele1",
    "Tumor_Seq_Allele2",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationTable {
    columns: Vec<String>,
    features: Vec<FeatureKey>,
    rows: Vec<Vec<String>>,
}

impl MutationTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn features(&self) -> &[FeatureKey] {
        &self.features
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureKey, &[String])> {
        self.features
            .iter()
            .zip(self.rows.iter().map(Vec::as_slice))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, EsetError> {
        self.column_index(name)
            .ok_or_else(|| EsetError::MissingColumns {
                file: "mutation table".to_string(),
                columns: vec![name.to_string()],
            })
    }
}

fn is_gzipped(path: &Path) -> Result<bool, EsetError> {
    let mut file = File::open(path)
        .map_err(|err| EsetError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == [0x1f, 0x8b]),
        Err(_) => Ok(false),
    }
}

pub fn load(path: &Path, columns: &[String]) -> Result<Table, EsetError> {
    let file = File::open(path)
        .map_err(|err| EsetError::Filesystem(format!("open {}: {err}", path.display())))?;
    let reader: Box<dyn Read> = if is_gzipped(path)? {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .quoting(false)
        .flexible(true)
        .from_reader(reader);
    Table::from_csv(csv_reader, &path.display().to_string(), Some(columns))
}

pub fn combine(paths: &[PathBuf], columns: &[String]) -> Result<Table, EsetError> {
    let mut combined = Table::new(columns.to_vec());
    for path in paths {
        let table = load(path, columns)?;
        let (rows, cols) = table.shape();
        tracing::info!(file = %path.display(), rows, columns = cols, "read MAF");
        combined.append(table)?;
    }
    let (rows, cols) = combined.shape();
    tracing::info!(rows, columns = cols, "combined MAF table");
    Ok(combined)
}

pub fn maf_files_in(dir: &Path) -> Result<Vec<PathBuf>, EsetError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| EsetError::Filesystem(format!("read {}: {err}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| EsetError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "gz") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn add_counts(table: &mut Table) -> Result<(), EsetError> {
    let ref_idx = table.require_column(T_REF_COUNT)?;
    let alt_idx = table.require_column(T_ALT_COUNT)?;
    let counts = table
        .rows()
        .iter()
        .map(|row| format!("{}:{}", row[ref_idx], row[alt_idx]))
        .collect();
    table.insert_column(0, COUNTS, counts)
}

/// With `drop == false` the key is also kept as a leading `featurename` column.
pub fn add_featurename(mut table: Table, drop: bool) -> Result<MutationTable, EsetError> {
    let indices = FEATURE_COLUMNS
        .iter()
        .map(|name| table.require_column(name))
        .collect::<Result<Vec<_>, _>>()?;

    let features: Vec<FeatureKey> = table
        .rows()
        .iter()
        .map(|row| {
            let parts: [&str; 7] = std::array::from_fn(|i| row[indices[i]].as_str());
            FeatureKey::from_parts(parts)
        })
        .collect();

    if !drop {
        let values = features.iter().map(|key| key.to_string()).collect();
        table.insert_column(0, FEATURENAME, values)?;
    }

    let columns = table.columns().to_vec();
    Ok(MutationTable {
        columns,
        features,
        rows: table.into_rows(),
    })
}

pub fn prepare(paths: &[PathBuf], columns: &[String]) -> Result<MutationTable, EsetError> {
    let mut table = combine(paths, columns)?;
    add_counts(&mut table)?;
    add_featurename(table, true)
}
