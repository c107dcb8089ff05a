use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use maf_eset::app::App;
use maf_eset::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use maf_eset::domain::{DataFormat, ProjectId};
use maf_eset::error::EsetError;
use maf_eset::eset::EsetLayout;
use maf_eset::gdc::GdcHttpClient;
use maf_eset::output::{JsonOutput, OutputMode, TextOutput, TracingSink};

#[derive(Parser)]
#[command(name = "maf-eset")]
#[command(about = "Download GDC MAF files and convert them into expression-set tables")]
#[command(version, author)]
struct Cli {
    /// Config file (defaults to ./maf-eset.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Request, download, check and extract a project's files")]
    Fetch(FetchArgs),
    #[command(about = "Write data.csv, featuredata.csv and pheno.csv from a folder of MAFs")]
    Build(BuildArgs),
    #[command(about = "Merge a reference phenotype table onto pheno.csv (deletes pheno.csv)")]
    MergePheno(MergeArgs),
    #[command(about = "Fetch, build and merge in one go")]
    Run(RunArgs),
}

#[derive(Args, Clone, Default)]
struct FetchArgs {
    #[arg(long)]
    project: Option<String>,

    #[arg(long)]
    format: Option<DataFormat>,

    #[arg(long)]
    download_dir: Option<PathBuf>,
}

#[derive(Args)]
struct BuildArgs {
    maf_dir: PathBuf,

    /// Output directory (defaults to <maf_dir>/eset)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write summed read counts instead of a 0/1 matrix
    #[arg(long)]
    counts: bool,
}

#[derive(Args)]
struct MergeArgs {
    pheno: PathBuf,

    reference: PathBuf,

    /// Output file (defaults to phenodata.csv next to the pheno file)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    fetch: FetchArgs,

    /// Reference phenotype table with a case_id column
    #[arg(long)]
    reference: Option<PathBuf>,

    #[arg(long)]
    counts: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<EsetError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EsetError) -> u8 {
    match error {
        EsetError::ConfigRead(_)
        | EsetError::MissingProject
        | EsetError::NoInputFiles(_) => 2,
        EsetError::GdcHttp(_)
        | EsetError::GdcStatus { .. }
        | EsetError::GdcResponse(_)
        | EsetError::MissingFilename(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch(args) => {
            let config = config.with_overrides(fetch_overrides(&args)?);
            let app = App::new(http_client(&config)?);
            let result = app.fetch(&config, &TracingSink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_fetch(&result).into_diagnostic()?,
                OutputMode::Text => TextOutput::print_fetch(&result),
            }
        }
        Command::Build(args) => {
            let config = config.with_overrides(ConfigOverrides {
                binary: args.counts.then_some(false),
                ..ConfigOverrides::default()
            });
            let out_dir = args.out.unwrap_or_else(|| args.maf_dir.join("eset"));
            let app = App::new(http_client(&config)?);
            let result = app.build(&args.maf_dir, &out_dir, &config, &TracingSink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_build(&result).into_diagnostic()?,
                OutputMode::Text => TextOutput::print_build(&result),
            }
        }
        Command::MergePheno(args) => {
            let out = match args.out {
                Some(out) => out,
                None => {
                    let parent = args
                        .pheno
                        .parent()
                        .map(|dir| dir.to_path_buf())
                        .unwrap_or_default();
                    EsetLayout::new(&parent)?
                        .phenodata_path()
                        .into_std_path_buf()
                }
            };
            let app = App::new(http_client(&config)?);
            let result = app.merge(&args.pheno, &args.reference, &out, &TracingSink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_merge(&result).into_diagnostic()?,
                OutputMode::Text => TextOutput::print_merge(&result),
            }
        }
        Command::Run(args) => {
            let mut overrides = fetch_overrides(&args.fetch)?;
            overrides.binary = args.counts.then_some(false);
            overrides.pheno_reference = args.reference;
            let config = config.with_overrides(overrides);
            let app = App::new(http_client(&config)?);
            let result = app.run(&config, &TracingSink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_run(&result).into_diagnostic()?,
                OutputMode::Text => TextOutput::print_run(&result),
            }
        }
    }
    Ok(())
}

fn fetch_overrides(args: &FetchArgs) -> Result<ConfigOverrides, EsetError> {
    Ok(ConfigOverrides {
        project: args
            .project
            .as_deref()
            .map(str::parse::<ProjectId>)
            .transpose()?,
        format: args.format,
        download_dir: args.download_dir.clone(),
        ..ConfigOverrides::default()
    })
}

fn http_client(config: &ResolvedConfig) -> Result<GdcHttpClient, EsetError> {
    GdcHttpClient::with_base_url(&config.api_base, config.page_size)
}
