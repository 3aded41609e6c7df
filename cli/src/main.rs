use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use facility_import_client::{FacilityClient, HttpTokenRefresher, Session, TokenPair};
use facility_import_core::{ImportConfig, ImportError, TargetField, UploadReport};
use facility_import_csv::{
    build_report, merge_rejections, remap_rows, template_csv, ImportPreview,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "facility-import",
    version,
    about = "Bulk-import health facilities from a CSV export."
)]
struct Cli {
    /// TOML file overriding the default import settings.
    #[arg(short, long, global = true, env = "FACILITY_IMPORT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show detected headers, row count and the proposed column mapping.
    Inspect {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Transform the file into the upload payload without sending it.
    Prepare {
        #[command(flatten)]
        source: SourceArgs,
        /// Write the payload JSON here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Transform the file and submit it to the facility API.
    Upload {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, env = "FACILITY_API_URL")]
        api_url: Option<String>,
        #[arg(long, env = "FACILITY_API_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, env = "FACILITY_API_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
    /// Print a starter CSV with every supported column.
    Template {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// CSV file to import.
    #[arg(short, long)]
    input: PathBuf,

    /// Override a detected column, e.g. `--map "facilityCode=HF Code"`.
    /// An empty header (`--map region=`) unmaps the field.
    #[arg(short, long = "map", value_parser = parse_override)]
    overrides: Vec<(TargetField, String)>,
}

fn parse_override(raw: &str) -> Result<(TargetField, String), String> {
    let (field, header) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=HEADER, got {raw:?}"))?;
    let field = field.parse::<TargetField>().map_err(|err| err.to_string())?;
    Ok((field, header.trim().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facility_import=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Inspect { input } => inspect(&input),
        Command::Prepare { source, output } => prepare(&source, output.as_deref(), &config),
        Command::Upload {
            source,
            api_url,
            access_token,
            refresh_token,
        } => {
            let mut config = config;
            if let Some(url) = api_url {
                config.api_base_url = url;
            }
            let tokens = TokenPair {
                access_token,
                refresh_token,
            };
            upload(&source, tokens, &config).await
        }
        Command::Template { output } => {
            let template = template_csv()?;
            write_output(output.as_deref(), &template)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ImportConfig> {
    let Some(path) = path else {
        return Ok(ImportConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read config file {path:?}"))?;
    parse_config(&text).with_context(|| format!("Invalid config file {path:?}"))
}

fn parse_config(text: &str) -> Result<ImportConfig, ImportError> {
    toml::from_str(text).map_err(|err| ImportError::Config(err.message().to_string()))
}

fn read_preview(input: &Path) -> anyhow::Result<ImportPreview> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Could not read file {input:?}"))?;
    let preview = ImportPreview::from_csv_str(&text);
    if preview.table.is_empty() {
        bail!("{input:?} contains no rows");
    }
    Ok(preview)
}

/// Read, auto-map, apply overrides and check that required fields are mapped.
fn load_source(source: &SourceArgs) -> anyhow::Result<ImportPreview> {
    let mut preview = read_preview(&source.input)?;

    for (field, header) in &source.overrides {
        if header.is_empty() {
            preview.mapping.clear(*field);
        } else if preview.table.headers.contains(header) {
            preview.mapping.set(*field, header.clone());
        } else {
            bail!("Column {header:?} not found in {:?}", source.input);
        }
    }

    let missing = preview.mapping.missing_required();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|field| field.as_str()).collect();
        bail!(
            "Required fields not mapped: {}. Use --map FIELD=HEADER.",
            names.join(", ")
        );
    }

    Ok(preview)
}

fn inspect(input: &Path) -> anyhow::Result<()> {
    let preview = read_preview(input)?;

    println!(
        "Columns: {}\nData rows: {}\n",
        preview.table.headers.len(),
        preview.table.rows.len()
    );
    print_mapping(&preview);
    Ok(())
}

fn prepare(
    source: &SourceArgs,
    output: Option<&Path>,
    config: &ImportConfig,
) -> anyhow::Result<()> {
    let preview = load_source(source)?;
    let batch = preview.prepare(config);

    for rejected in &batch.rejected {
        eprintln!("Skipping row {}: {}", rejected.row, rejected.message);
    }
    info!(
        items = batch.items.len(),
        rejected = batch.rejected.len(),
        "Prepared upload payload"
    );

    let payload = serde_json::to_string_pretty(&batch.items)?;
    write_output(output, &payload)
}

async fn upload(
    source: &SourceArgs,
    tokens: TokenPair,
    config: &ImportConfig,
) -> anyhow::Result<()> {
    let preview = load_source(source)?;
    let batch = preview.prepare(config);
    if batch.is_empty() {
        bail!(
            "No valid facilities to upload ({} rows rejected)",
            batch.rejected.len()
        );
    }

    let refresher = Arc::new(HttpTokenRefresher::new(config)?);
    let session = Arc::new(Session::with_tokens(refresher, tokens));
    let client = FacilityClient::new(config, session)?;

    match client.submit(&batch.items).await {
        Ok(result) => {
            let result = merge_rejections(remap_rows(result, &batch), &batch);
            print_report(&build_report(&result, config));
            Ok(())
        }
        Err(err) => {
            print_report(&UploadReport::failed(&err));
            Err(err.into())
        }
    }
}

fn print_mapping(preview: &ImportPreview) {
    println!("{:<20} Source column", "Field");
    for (field, header) in preview.mapping.iter() {
        let marker = if field.is_required() { "*" } else { " " };
        let header = if header.is_empty() {
            "-- Not mapped --"
        } else {
            header
        };
        println!("{marker}{:<19} {header}", field.label());
    }
}

fn print_report(report: &UploadReport) {
    println!("{}", report.summary);
    for line in &report.error_lines {
        println!("  {line}");
    }
    if report.hidden_errors > 0 {
        println!("  ... and {} more", report.hidden_errors);
    }
    if report.can_retry {
        println!("Run the same command again to retry the full batch.");
    }
}

fn write_output(path: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => std::fs::write(path, contents)
            .with_context(|| format!("Could not write {path:?}")),
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}
