use std::io::Read;
use std::path::Path;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::EsetError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_csv<R: Read>(
        mut reader: csv::Reader<R>,
        source: &str,
        columns: Option<&[String]>,
    ) -> Result<Self, EsetError> {
        let parse_err = |err: csv::Error| EsetError::TableParse {
            file: source.to_string(),
            message: err.to_string(),
        };

        let header = reader.headers().map_err(parse_err)?.clone();
        let (names, indices): (Vec<String>, Vec<usize>) = match columns {
            Some(columns) => {
                let mut missing = Vec::new();
                let mut indices = Vec::with_capacity(columns.len());
                for name in columns {
                    match header.iter().position(|field| field == name) {
                        Some(idx) => indices.push(idx),
                        None => missing.push(name.clone()),
                    }
                }
                if !missing.is_empty() {
                    return Err(EsetError::MissingColumns {
                        file: source.to_string(),
                        columns: missing,
                    });
                }
                (columns.to_vec(), indices)
            }
            None => header
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.to_string(), idx))
                .unzip(),
        };

        let mut table = Table::new(names);
        for record in reader.records() {
            let record = record.map_err(parse_err)?;
            let row = indices
                .iter()
                .map(|&idx| record.get(idx).unwrap_or_default().to_string())
                .collect();
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn read_tsv(path: &Path) -> Result<Self, EsetError> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .map_err(|err| EsetError::TableParse {
                file: path.display().to_string(),
                message: err.to_string(),
            })?;
        Self::from_csv(reader, &path.display().to_string(), None)
    }

    pub fn write_tsv(&self, path: &Path) -> Result<(), EsetError> {
        let mut writer = tsv_writer(path)?;
        writer
            .write_record(&self.columns)
            .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| EsetError::Filesystem(err.to_string()))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, EsetError> {
        self.column_index(name)
            .ok_or_else(|| EsetError::MissingColumns {
                file: "combined table".to_string(),
                columns: vec![name.to_string()],
            })
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), EsetError> {
        if row.len() != self.columns.len() {
            return Err(EsetError::TableParse {
                file: "in-memory table".to_string(),
                message: format!(
                    "row has {} values, expected {}",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn append(&mut self, other: Table) -> Result<(), EsetError> {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.columns != other.columns {
            return Err(EsetError::MisalignedTables(format!(
                "cannot concatenate columns [{}] with [{}]",
                other.columns.join(", "),
                self.columns.join(", ")
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    pub fn insert_column(
        &mut self,
        position: usize,
        name: &str,
        values: Vec<String>,
    ) -> Result<(), EsetError> {
        if values.len() != self.rows.len() {
            return Err(EsetError::MisalignedTables(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        let position = position.min(self.columns.len());
        self.columns.insert(position, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(position, value);
        }
        Ok(())
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedTable {
    index_name: String,
    columns: Vec<String>,
    rows: IndexMap<String, Vec<String>>,
}

impl KeyedTable {
    pub fn new(index_name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            index_name: index_name.into(),
            columns,
            rows: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) -> Result<(), EsetError> {
        let key = key.into();
        if values.len() != self.columns.len() {
            return Err(EsetError::MisalignedTables(format!(
                "row {key} has {} values, expected {}",
                values.len(),
                self.columns.len()
            )));
        }
        match self.rows.entry(key) {
            Entry::Occupied(entry) => Err(EsetError::MisalignedTables(format!(
                "duplicate {} {}",
                self.index_name,
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(values);
                Ok(())
            }
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.rows
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn value(&self, key: &str, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|name| name == column)?;
        self.rows.get(key).map(|values| values[idx].as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_tsv(&self, path: &Path) -> Result<(), EsetError> {
        let mut writer = tsv_writer(path)?;
        let header = std::iter::once(self.index_name.as_str())
            .chain(self.columns.iter().map(String::as_str));
        writer
            .write_record(header)
            .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        for (key, values) in &self.rows {
            let record = std::iter::once(key.as_str()).chain(values.iter().map(String::as_str));
            writer
                .write_record(record)
                .map_err(|err| EsetError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| EsetError::Filesystem(err.to_string()))
    }
}

pub(crate) fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, EsetError> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|err| EsetError::Filesystem(format!("create {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn from_csv_selects_requested_columns_in_order() {
        let data = "a\tb\tc\n1\t2\t3\n4\t5\t6\n";
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(data.as_bytes());
        let columns = strings(&["c", "a"]);
        let table = Table::from_csv(reader, "inline", Some(&columns)).unwrap();
        assert_eq!(table.columns(), columns.as_slice());
        assert_eq!(table.rows(), &[strings(&["3", "1"]), strings(&["6", "4"])]);
    }

    #[test]
    fn from_csv_reports_every_missing_column() {
        let data = "a\tb\n1\t2\n";
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(data.as_bytes());
        let columns = strings(&["a", "x", "y"]);
        let err = Table::from_csv(reader, "inline", Some(&columns)).unwrap_err();
        assert_matches!(err, EsetError::MissingColumns { columns, .. } if columns == strings(&["x", "y"]));
    }

    #[test]
    fn append_rejects_different_columns() {
        let mut left = Table::new(strings(&["a"]));
        left.push_row(strings(&["1"])).unwrap();
        let right = Table::new(strings(&["b"]));
        assert_matches!(left.append(right), Err(EsetError::MisalignedTables(_)));
    }

    #[test]
    fn keyed_table_rejects_duplicate_keys() {
        let mut table = KeyedTable::new("case_id", Vec::new());
        table.insert("c1", Vec::new()).unwrap();
        assert_matches!(
            table.insert("c1", Vec::new()),
            Err(EsetError::MisalignedTables(_))
        );
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["c1"]);
    }
}
