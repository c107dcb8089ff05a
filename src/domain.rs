use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::EsetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataFormat {
    Maf,
    Vcf,
    Txt,
    Tsv,
    Bam,
    Svs,
}

impl DataFormat {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            DataFormat::Maf => "MAF",
            DataFormat::Vcf => "VCF",
            DataFormat::Txt => "TXT",
            DataFormat::Tsv => "TSV",
            DataFormat::Bam => "BAM",
            DataFormat::Svs => "SVS",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

impl FromStr for DataFormat {
    type Err = EsetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MAF" => Ok(DataFormat::Maf),
            "VCF" => Ok(DataFormat::Vcf),
            "TXT" => Ok(DataFormat::Txt),
            "TSV" => Ok(DataFormat::Tsv),
            "BAM" => Ok(DataFormat::Bam),
            "SVS" => Ok(DataFormat::Svs),
            _ => Err(EsetError::InvalidFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = EsetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid = !normalized.is_empty()
            && normalized.contains('-')
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(EsetError::InvalidProjectId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variant identifier:
/// `Chromosome.Start_Position.End_Position.Strand.Reference_Allele.Tumor_Seq_Allele1.Tumor_Seq_Allele2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureKey(String);

impl FeatureKey {
    pub const SEPARATOR: char = '.';

    pub fn from_parts(parts: [&str; 7]) -> Self {
        let mut key = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
        for (idx, part) in parts.iter().enumerate() {
            if idx > 0 {
                key.push(Self::SEPARATOR);
            }
            key.push_str(part);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FeatureKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CountPair {
    pub reference: u64,
    pub alternate: u64,
}

impl CountPair {
    pub const ZERO: CountPair = CountPair {
        reference: 0,
        alternate: 0,
    };

    pub fn new(reference: u64, alternate: u64) -> Self {
        Self {
            reference,
            alternate,
        }
    }
}

impl Add for CountPair {
    type Output = CountPair;

    fn add(self, rhs: CountPair) -> CountPair {
        CountPair {
            reference: self.reference + rhs.reference,
            alternate: self.alternate + rhs.alternate,
        }
    }
}

impl Sum for CountPair {
    fn sum<I: Iterator<Item = CountPair>>(iter: I) -> Self {
        iter.fold(CountPair::ZERO, Add::add)
    }
}

impl fmt::Display for CountPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.reference, self.alternate)
    }
}

impl FromStr for CountPair {
    type Err = EsetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (reference, alternate) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| EsetError::InvalidCounts(value.to_string()))?;
        let reference = reference
            .trim()
            .parse::<u64>()
            .map_err(|_| EsetError::InvalidCounts(value.to_string()))?;
        let alternate = alternate
            .trim()
            .parse::<u64>()
            .map_err(|_| EsetError::InvalidCounts(value.to_string()))?;
        Ok(Self {
            reference,
            alternate,
        })
    }
}
