use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::EsetError;
use crate::maf::CASE_ID;
use crate::table::Table;

fn occurrence_counters(table: &Table, key_idx: usize) -> Vec<usize> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    table
        .rows()
        .iter()
        .map(|row| {
            let counter = seen.entry(row[key_idx].as_str()).or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        })
        .collect()
}

fn require_case_id(table: &Table, source: &Path) -> Result<usize, EsetError> {
    table
        .column_index(CASE_ID)
        .ok_or_else(|| EsetError::MissingColumns {
            file: source.display().to_string(),
            columns: vec![CASE_ID.to_string()],
        })
}

/// Duplicate case ids pair by position, so both sides must list them in the same order.
pub fn join_pheno(pheno: &Table, reference: &Table) -> Result<Table, EsetError> {
    let left_key = pheno.require_column(CASE_ID)?;
    let right_key = reference.require_column(CASE_ID)?;

    let shared: Vec<(usize, usize)> = pheno
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != left_key)
        .filter_map(|(idx, name)| {
            reference
                .column_index(name)
                .filter(|&other| other != right_key)
                .map(|other| (idx, other))
        })
        .collect();
    let right_extra: Vec<usize> = (0..reference.columns().len())
        .filter(|idx| *idx != right_key && !shared.iter().any(|(_, other)| other == idx))
        .collect();

    let mut columns = vec![CASE_ID.to_string()];
    columns.extend(
        pheno
            .columns()
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != left_key)
            .map(|(_, name)| name.clone()),
    );
    columns.extend(
        right_extra
            .iter()
            .map(|&idx| reference.columns()[idx].clone()),
    );

    let right_counters = occurrence_counters(reference, right_key);
    let mut lookup: HashMap<(&str, usize), usize> = HashMap::new();
    for (row_idx, (row, counter)) in reference.rows().iter().zip(&right_counters).enumerate() {
        lookup.insert((row[right_key].as_str(), *counter), row_idx);
    }

    let left_counters = occurrence_counters(pheno, left_key);
    let mut merged = Table::new(columns);
    for (row, counter) in pheno.rows().iter().zip(left_counters) {
        let Some(&right_idx) = lookup.get(&(row[left_key].as_str(), counter)) else {
            continue;
        };
        let other = &reference.rows()[right_idx];
        if shared.iter().any(|&(l, r)| row[l] != other[r]) {
            continue;
        }
        let mut values = vec![row[left_key].clone()];
        values.extend(
            row.iter()
                .enumerate()
                .filter(|(idx, _)| *idx != left_key)
                .map(|(_, value)| value.clone()),
        );
        values.extend(right_extra.iter().map(|&idx| other[idx].clone()));
        merged.push_row(values)?;
    }
    Ok(merged)
}

pub fn merge_pheno_data(
    pheno_path: &Path,
    reference_path: &Path,
    out_path: &Path,
) -> Result<Table, EsetError> {
    let pheno = Table::read_tsv(pheno_path)?;
    require_case_id(&pheno, pheno_path)?;
    let reference = Table::read_tsv(reference_path)?;
    require_case_id(&reference, reference_path)?;

    let merged = join_pheno(&pheno, &reference)?;
    tracing::info!(
        cases = pheno.len(),
        reference_rows = reference.len(),
        merged = merged.len(),
        "merged phenotype data"
    );
    merged.write_tsv(out_path)?;

    fs::remove_file(pheno_path).map_err(|err| EsetError::Filesystem(err.to_string()))?;
    tracing::info!(path = %pheno_path.display(), "removed pheno placeholder");
    Ok(merged)
}
