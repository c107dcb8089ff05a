pub mod app;
pub mod archive;
pub mod config;
pub mod domain;
pub mod error;
pub mod eset;
pub mod gdc;
pub mod maf;
pub mod output;
pub mod pheno;
pub mod table;
