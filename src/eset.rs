use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{CountPair, FeatureKey};
use crate::error::EsetError;
use crate::maf::{CASE_ID, COUNTS, FEATURENAME, MutationTable, T_ALT_COUNT, T_REF_COUNT};
use crate::table::{KeyedTable, tsv_writer};

pub const DATA_FILE: &str = "data.csv";
pub const FEATUREDATA_FILE: &str = "featuredata.csv";
pub const PHENO_FILE: &str = "pheno.csv";
pub const PHENODATA_FILE: &str = "phenodata.csv";

pub const VALUE_SEPARATOR: &str = ";";

pub const MISSING_VALUE: &str = "NA";

const NON_FEATURE_COLUMNS: [&str; 5] = [COUNTS, CASE_ID, T_REF_COUNT, T_ALT_COUNT, FEATURENAME];

#[derive(Debug, Clone)]
pub struct EsetLayout {
    root: Utf8PathBuf,
}

impl EsetLayout {
    pub fn new(root: &Path) -> Result<Self, EsetError> {
        let root = Utf8PathBuf::from_path_buf(root.to_path_buf())
            .map_err(|path| EsetError::Filesystem(format!("non-utf8 path {}", path.display())))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn data_path(&self) -> Utf8PathBuf {
        self.root.join(DATA_FILE)
    }

    pub fn featuredata_path(&self) -> Utf8PathBuf {
        self.root.join(FEATUREDATA_FILE)
    }

    pub fn pheno_path(&self) -> Utf8PathBuf {
        self.root.join(PHENO_FILE)
    }

    pub fn phenodata_path(&self) -> Utf8PathBuf {
        self.root.join(PHENODATA_FILE)
    }

    pub fn ensure_root(&self) -> Result<(), EsetError> {
        if !self.root.as_std_path().exists() {
            tracing::info!(path = %self.root, "new directory for eset files");
            fs::create_dir_all(self.root.as_std_path())
                .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

/// Groups records by key and collapses every value column into the `;`-joined
/// set of its distinct values, sorted. An empty value next to real ones is kept
/// as `NA` so partially annotated features stay visible.
pub fn collapse_unique<I>(records: I) -> Vec<(Vec<String>, Vec<String>)>
where
    I: IntoIterator<Item = (Vec<String>, Vec<String>)>,
{
    let mut groups: BTreeMap<Vec<String>, Vec<BTreeSet<String>>> = BTreeMap::new();
    for (key, values) in records {
        let sets = groups
            .entry(key)
            .or_insert_with(|| vec![BTreeSet::new(); values.len()]);
        if sets.len() < values.len() {
            sets.resize_with(values.len(), BTreeSet::new);
        }
        for (set, value) in sets.iter_mut().zip(values) {
            set.insert(value);
        }
    }

    groups
        .into_iter()
        .map(|(key, sets)| (key, sets.into_iter().map(join_distinct).collect()))
        .collect()
}

fn join_distinct(set: BTreeSet<String>) -> String {
    if set.len() == 1 {
        return set.into_iter().next().unwrap_or_default();
    }
    set.into_iter()
        .map(|value| {
            if value.is_empty() {
                MISSING_VALUE.to_string()
            } else {
                value
            }
        })
        .collect::<Vec<_>>()
        .join(VALUE_SEPARATOR)
}

pub fn sum_counts(joined: &str) -> Result<CountPair, EsetError> {
    joined
        .split(VALUE_SEPARATOR)
        .map(str::parse::<CountPair>)
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssayValue {
    Counts(CountPair),
    Present(bool),
}

impl fmt::Display for AssayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssayValue::Counts(pair) => write!(f, "{pair}"),
            AssayValue::Present(present) => write!(f, "{}", u8::from(*present)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssayMatrix {
    features: Vec<FeatureKey>,
    samples: Vec<String>,
    cells: Vec<Vec<AssayValue>>,
    binary: bool,
}

impl AssayMatrix {
    pub fn features(&self) -> &[FeatureKey] {
        &self.features
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.features.len(), self.samples.len())
    }

    pub fn get(&self, feature: &str, sample: &str) -> Option<AssayValue> {
        let row = self.features.iter().position(|key| key.as_str() == feature)?;
        let col = self.samples.iter().position(|name| name == sample)?;
        Some(self.cells[row][col])
    }

    pub fn rows(&self) -> impl Iterator<Item = (&FeatureKey, &[AssayValue])> {
        self.features
            .iter()
            .zip(self.cells.iter().map(Vec::as_slice))
    }

    pub fn write_tsv(&self, path: &Path) -> Result<(), EsetError> {
        let mut writer = tsv_writer(path)?;
        let header =
            std::iter::once(FEATURENAME).chain(self.samples.iter().map(String::as_str));
        writer
            .write_record(header)
            .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        for (feature, cells) in self.rows() {
            let record = std::iter::once(feature.to_string())
                .chain(cells.iter().map(AssayValue::to_string));
            writer
                .write_record(record)
                .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| EsetError::Filesystem(err.to_string()))
    }
}

pub fn build_data(table: &MutationTable, binary: bool) -> Result<AssayMatrix, EsetError> {
    let counts_idx = table.require_column(COUNTS)?;
    let case_idx = table.require_column(CASE_ID)?;

    let records = table.iter().map(|(feature, row)| {
        (
            vec![feature.to_string(), row[case_idx].clone()],
            vec![row[counts_idx].clone()],
        )
    });

    let mut sums: BTreeMap<(String, String), CountPair> = BTreeMap::new();
    for (key, values) in collapse_unique(records) {
        let [feature, case]: [String; 2] = key
            .try_into()
            .map_err(|_| EsetError::MisalignedTables("malformed group key".to_string()))?;
        let total = sum_counts(&values[0])?;
        sums.insert((feature, case), total);
    }

    let features: Vec<FeatureKey> = sums
        .keys()
        .map(|(feature, _)| feature.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(FeatureKey::from)
        .collect();
    let samples: Vec<String> = sums
        .keys()
        .map(|(_, case)| case.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let cells = features
        .iter()
        .map(|feature| {
            samples
                .iter()
                .map(|sample| {
                    let found = sums.get(&(feature.to_string(), sample.clone()));
                    if binary {
                        AssayValue::Present(found.is_some())
                    } else {
                        AssayValue::Counts(found.copied().unwrap_or(CountPair::ZERO))
                    }
                })
                .collect()
        })
        .collect();

    let matrix = AssayMatrix {
        features,
        samples,
        cells,
        binary,
    };
    let (rows, cols) = matrix.shape();
    tracing::info!(features = rows, samples = cols, binary, "assay data built");
    Ok(matrix)
}

pub fn collapse_featuredata(table: &MutationTable) -> Result<KeyedTable, EsetError> {
    let kept: Vec<(usize, String)> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| !NON_FEATURE_COLUMNS.contains(&name.as_str()))
        .map(|(idx, name)| (idx, name.clone()))
        .collect();

    let columns = kept.iter().map(|(_, name)| name.clone()).collect();
    let records = table.iter().map(|(feature, row)| {
        (
            vec![feature.to_string()],
            kept.iter().map(|(idx, _)| row[*idx].clone()).collect(),
        )
    });

    let mut featuredata = KeyedTable::new(FEATURENAME, columns);
    for (mut key, values) in collapse_unique(records) {
        featuredata.insert(key.remove(0), values)?;
    }
    Ok(featuredata)
}

pub fn build_featuredata(
    featuredata: &KeyedTable,
    matrix: &AssayMatrix,
) -> Result<KeyedTable, EsetError> {
    let mut joined = KeyedTable::new(FEATURENAME, featuredata.columns().to_vec());
    for feature in matrix.features() {
        if let Some(values) = featuredata.get(feature.as_str()) {
            joined.insert(feature.as_str(), values.to_vec())?;
        }
    }
    tracing::info!(
        features = joined.len(),
        columns = joined.columns().len(),
        "feature data built"
    );
    Ok(joined)
}

pub fn build_pheno(matrix: &AssayMatrix) -> Result<KeyedTable, EsetError> {
    let mut pheno = KeyedTable::new(CASE_ID, Vec::new());
    for sample in matrix.samples() {
        pheno.insert(sample.as_str(), Vec::new())?;
    }
    Ok(pheno)
}

#[derive(Debug, Clone)]
pub struct EsetFiles {
    pub data: AssayMatrix,
    pub featuredata: KeyedTable,
    pub pheno: KeyedTable,
}

impl EsetFiles {
    pub fn new(
        data: AssayMatrix,
        featuredata: KeyedTable,
        pheno: KeyedTable,
    ) -> Result<Self, EsetError> {
        let features_match = featuredata.len() == data.features().len()
            && featuredata
                .keys()
                .zip(data.features())
                .all(|(key, feature)| key == feature.as_str());
        if !features_match {
            return Err(EsetError::MisalignedTables(format!(
                "feature data has {} rows, assay data has {} features",
                featuredata.len(),
                data.features().len()
            )));
        }

        let samples_match = pheno.len() == data.samples().len()
            && pheno
                .keys()
                .zip(data.samples())
                .all(|(key, sample)| key == sample);
        if !samples_match {
            return Err(EsetError::MisalignedTables(format!(
                "phenotype data has {} rows, assay data has {} samples",
                pheno.len(),
                data.samples().len()
            )));
        }

        Ok(Self {
            data,
            featuredata,
            pheno,
        })
    }
}

pub fn write_eset_files(
    table: &MutationTable,
    out_dir: &Path,
    binary: bool,
) -> Result<EsetFiles, EsetError> {
    let layout = EsetLayout::new(out_dir)?;
    layout.ensure_root()?;

    let data = build_data(table, binary)?;
    data.write_tsv(layout.data_path().as_std_path())?;
    tracing::info!(path = %layout.data_path(), "written assay data");

    let all_features = collapse_featuredata(table)?;
    let featuredata = build_featuredata(&all_features, &data)?;
    featuredata.write_tsv(layout.featuredata_path().as_std_path())?;
    tracing::info!(path = %layout.featuredata_path(), "written feature data");

    let pheno = build_pheno(&data)?;
    pheno.write_tsv(layout.pheno_path().as_std_path())?;
    tracing::info!(path = %layout.pheno_path(), "written pheno data");

    EsetFiles::new(data, featuredata, pheno)
}
