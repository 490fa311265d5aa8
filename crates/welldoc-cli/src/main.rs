mod display;
mod export;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use welldoc_client::{
    DocumentJob, Extractor, HttpExtractionService, ObjectLocation, ServiceConfig,
};
use welldoc_core::{ExtractionResult, Registry};

#[derive(Parser)]
#[command(name = "welldoc")]
#[command(about = "Blueprint-driven extraction of well report data into tables")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate blueprints and check they can be registered together
    Validate {
        /// Blueprint JSON files
        #[arg(required = true)]
        blueprints: Vec<PathBuf>,
    },
    /// Normalise one group of a stored result into a table
    Table {
        #[arg(long = "blueprint", required = true)]
        blueprints: Vec<PathBuf>,
        /// Custom-output JSON for one document segment
        #[arg(long)]
        result: PathBuf,
        /// Root property to tabulate
        #[arg(long)]
        group: String,
        /// Column to sort rows by
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
        /// Output file (required for parquet)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the document-level fields of a stored result
    Form {
        #[arg(long = "blueprint", required = true)]
        blueprints: Vec<PathBuf>,
        #[arg(long)]
        result: PathBuf,
    },
    /// Summarise stored results: matched blueprint, confidence, pages
    Summary {
        #[arg(required = true)]
        results: Vec<PathBuf>,
    },
    /// Run documents through the extraction service
    Extract {
        #[arg(long = "blueprint", required = true)]
        blueprints: Vec<PathBuf>,
        /// `s3://` URIs, or local files when --upload-prefix is set
        #[arg(required = true)]
        documents: Vec<String>,
        /// Object-store prefix local documents are uploaded under
        #[arg(long)]
        upload_prefix: Option<String>,
        /// Blueprint every document is expected to match
        #[arg(long)]
        expect: Option<String>,
        /// Per-document time budget in seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
        /// Print this group of each result as a table
        #[arg(long)]
        group: Option<String>,
        #[command(flatten)]
        service: ServiceArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Csv,
    Parquet,
}

#[derive(Args)]
struct ServiceArgs {
    /// JSON service config; flags and environment override its values
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, env = "WELLDOC_ENDPOINT")]
    endpoint: Option<String>,
    #[arg(long, env = "WELLDOC_STORAGE_ENDPOINT")]
    storage_endpoint: Option<String>,
    #[arg(long, env = "WELLDOC_REGION")]
    region: Option<String>,
    #[arg(long, env = "WELLDOC_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[arg(long, env = "WELLDOC_OUTPUT_PREFIX")]
    output_prefix: Option<String>,
    /// Resolve the project by name before submitting; with blueprint ARNs
    /// a missing project is created
    #[arg(long)]
    project_name: Option<String>,
    /// Blueprint ARN to match documents against (repeatable)
    #[arg(long = "blueprint-arn")]
    blueprint_arns: Vec<String>,
    /// Register every --blueprint with the service before submitting
    #[arg(long)]
    create_blueprints: bool,
}

impl ServiceArgs {
    fn load(&self) -> anyhow::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_path(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => ServiceConfig::default(),
        };
        if let Some(v) = &self.endpoint {
            config.endpoint = v.clone();
        }
        if let Some(v) = &self.storage_endpoint {
            config.storage_endpoint = v.clone();
        }
        if let Some(v) = &self.region {
            config.region = v.clone();
        }
        if let Some(v) = &self.token {
            config.auth_token = Some(v.clone());
        }
        if let Some(v) = &self.output_prefix {
            config.output_prefix = v.clone();
        }
        config.blueprint_arns.extend(self.blueprint_arns.iter().cloned());
        if config.endpoint.is_empty() {
            bail!("no service endpoint: set --endpoint, WELLDOC_ENDPOINT, or `endpoint` in --config");
        }
        if config.output_prefix.is_empty() {
            bail!("no output prefix: set --output-prefix or `outputPrefix` in --config");
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::debug!("welldoc v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { blueprints } => validate(&blueprints),
        Commands::Table {
            blueprints,
            result,
            group,
            sort_by,
            format,
            output,
        } => table(
            &blueprints,
            &result,
            &group,
            sort_by.as_deref(),
            format,
            output.as_deref(),
        ),
        Commands::Form { blueprints, result } => form(&blueprints, &result),
        Commands::Summary { results } => summary(&results),
        Commands::Extract {
            blueprints,
            documents,
            upload_prefix,
            expect,
            timeout_secs,
            group,
            service,
        } => {
            extract(
                &blueprints,
                documents,
                upload_prefix.as_deref(),
                expect.as_deref(),
                Duration::from_secs(timeout_secs),
                group.as_deref(),
                &service,
            )
            .await
        }
    }
}

// ── Commands ──

fn validate(paths: &[PathBuf]) -> anyhow::Result<()> {
    let registry = Registry::load_paths(paths)?;
    for schema in registry.schemas() {
        println!("{} [{}]", schema.name(), schema.document_class());
        for field in schema.fields() {
            println!("  {:<26} {}", field.name, field.value_type.as_str());
        }
        for property in schema.root_properties() {
            println!(
                "  {:<26} {} ({:?})",
                property.name, property.group, property.cardinality
            );
        }
    }
    eprintln!("{} blueprint(s) valid", registry.schemas().len());
    Ok(())
}

fn table(
    blueprints: &[PathBuf],
    result: &Path,
    group: &str,
    sort_by: Option<&str>,
    format: Format,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let registry = Registry::load_paths(blueprints)?;
    let result = ExtractionResult::from_path(result)?;
    let view = registry.to_table(&result, group, sort_by)?;
    let batch = view.to_record_batch()?;

    match (format, output) {
        (Format::Pretty, _) => display::print_table(group, &batch)?,
        (Format::Csv, Some(path)) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            export::write_csv(&batch, file)?;
            eprintln!("Wrote {} rows to {}", batch.num_rows(), path.display());
        }
        (Format::Csv, None) => export::write_csv(&batch, std::io::stdout().lock())?,
        (Format::Parquet, Some(path)) => {
            export::write_parquet(&batch, path)?;
            eprintln!("Wrote {} rows to {}", batch.num_rows(), path.display());
        }
        (Format::Parquet, None) => bail!("--format parquet needs --output"),
    }
    Ok(())
}

fn form(blueprints: &[PathBuf], result: &Path) -> anyhow::Result<()> {
    let registry = Registry::load_paths(blueprints)?;
    let result = ExtractionResult::from_path(result)?;
    let batch = registry.to_form(&result)?.to_record_batch()?;
    display::print_card(&result.matched_schema, &batch)
}

fn summary(paths: &[PathBuf]) -> anyhow::Result<()> {
    for path in paths {
        let result = ExtractionResult::from_path(path)?;
        display::print_summary(&path.display().to_string(), &result.summary())?;
    }
    Ok(())
}

async fn extract(
    blueprints: &[PathBuf],
    documents: Vec<String>,
    upload_prefix: Option<&str>,
    expect: Option<&str>,
    timeout: Duration,
    group: Option<&str>,
    args: &ServiceArgs,
) -> anyhow::Result<()> {
    // Blueprint errors stop the run before anything is submitted.
    let registry = Registry::load_paths(blueprints)?;
    let mut config = args.load()?;
    let service = Arc::new(HttpExtractionService::new(&config)?);

    if args.create_blueprints {
        for schema in registry.schemas() {
            let arn = service.create_blueprint(schema).await?;
            config.blueprint_arns.push(arn);
        }
    }
    if let Some(name) = &args.project_name {
        let arn = if config.blueprint_arns.is_empty() {
            match service.find_project(name).await? {
                Some(arn) => arn,
                None => bail!("no project named {name}; pass --blueprint-arn or --create-blueprints to create it"),
            }
        } else {
            service.ensure_project(name, &config.blueprint_arns).await?
        };
        config.project = Some(arn);
    }
    if config.project.is_none() && config.blueprint_arns.is_empty() {
        bail!("nothing to match against: pass --project-name, --blueprint-arn, or --create-blueprints");
    }

    let mut jobs = Vec::with_capacity(documents.len());
    for document in documents {
        let uri = if document.starts_with("s3://") {
            document
        } else {
            let Some(prefix) = upload_prefix else {
                bail!("{document} is a local file; pass --upload-prefix to upload it");
            };
            let path = PathBuf::from(&document);
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("no file name in {document}"))?;
            let location = ObjectLocation::parse(prefix)?.join(name);
            service.upload_document(&path, &location).await?;
            location.to_string()
        };
        let job = DocumentJob::new(uri);
        jobs.push(match expect {
            Some(schema) => job.expecting(schema),
            None => job,
        });
    }

    eprintln!("Extracting {} document(s)...", jobs.len());
    let extractor = Extractor::new(service, config);
    let outcomes = extractor.run_batch(&jobs, &registry, timeout).await;

    let mut failed = 0;
    for outcome in outcomes {
        let results = match outcome.results {
            Ok(results) => results,
            Err(e) => {
                failed += 1;
                eprintln!("FAILED {}: {e}", outcome.document);
                continue;
            }
        };
        for mismatch in &outcome.mismatches {
            eprintln!("WARNING {}: {mismatch:?}", outcome.document);
        }
        for result in &results {
            display::print_summary(&outcome.document, &result.summary())?;
            if let Some(group) = group {
                match registry.to_table(result, group, None) {
                    Ok(view) => display::print_table(group, &view.to_record_batch()?)?,
                    Err(e) => eprintln!("  {group}: {e}"),
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} document(s) failed", jobs.len());
    }
    Ok(())
}
