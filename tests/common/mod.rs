//! Fixture builders for MAF files and GDC-style tar.gz bundles.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

use maf_eset::config::default_columns;

/// One MAF observation; the remaining selected columns are filled with fixed values.
pub struct Observation<'a> {
    pub case_id: &'a str,
    pub chromosome: &'a str,
    pub start: u64,
    pub reference: &'a str,
    pub alternate: &'a str,
    pub ref_count: u64,
    pub alt_count: u64,
    pub existing_variation: &'a str,
}

impl Observation<'_> {
    pub fn feature_key(&self) -> String {
        format!(
            "{}.{}.{}.+.{}.{}.{}",
            self.chromosome, self.start, self.start, self.reference, self.reference, self.alternate
        )
    }

    fn field(&self, column: &str) -> String {
        match column {
            "NCBI_Build" => "GRCh38".to_string(),
            "Chromosome" => self.chromosome.to_string(),
            "Start_Position" | "End_Position" => self.start.to_string(),
            "Strand" => "+".to_string(),
            "Reference_Allele" | "Tumor_Seq_Allele1" => self.reference.to_string(),
            "Tumor_Seq_Allele2" => self.alternate.to_string(),
            "Transcript_ID" => "ENST00000000001".to_string(),
            "case_id" => self.case_id.to_string(),
            "COSMIC" => String::new(),
            "Existing_variation" => self.existing_variation.to_string(),
            "t_ref_count" => self.ref_count.to_string(),
            "t_alt_count" => self.alt_count.to_string(),
            "Variant_Type" => "SNP".to_string(),
            _ => "x".to_string(),
        }
    }
}

/// Renders a MAF with a version comment, an unselected leading column and the default columns.
pub fn maf_text(observations: &[Observation<'_>]) -> String {
    let columns = default_columns();
    let mut text = String::from("#version gdc-1.0.0\n#annotation.spec gdc-1.0.1-public\n");
    text.push_str("Hugo_Symbol\t");
    text.push_str(&columns.join("\t"));
    text.push('\n');
    for obs in observations {
        text.push_str("GENE1\t");
        let fields: Vec<String> = columns.iter().map(|column| obs.field(column)).collect();
        text.push_str(&fields.join("\t"));
        text.push('\n');
    }
    text
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub fn write_maf_gz(path: &Path, observations: &[Observation<'_>]) {
    std::fs::write(path, gzip(maf_text(observations).as_bytes())).unwrap();
}

/// Writes a tar.gz archive with the given `(path, contents)` entries.
pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

pub fn write_tsv(path: &Path, lines: &[&str]) {
    let mut text = lines.join("\n");
    text.push('\n');
    std::fs::write(path, text).unwrap();
}
