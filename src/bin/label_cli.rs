use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use label_printer::{
    config::{self, AppConfig},
    db,
    models::{FieldSet, LabelTemplate, SerialNumber},
    services::{printer_from_config, LabelDataService, LabelMaker},
    ServiceError,
};
use serde::Serialize;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let context = CliContext::initialize(cli.config_dir.as_deref())?;

    if let Commands::InitDb = cli.command {
        return handle_init_db(&context).await;
    }

    let service = context.label_service().await?;
    let result = match cli.command {
        Commands::Lines => handle_lines(&service, cli.json).await,
        Commands::Lookup(args) => handle_lookup(&service, args, cli.json).await,
        Commands::Templates(args) => handle_templates(&service, args, cli.json).await,
        Commands::Print(args) => handle_print(&context, &service, args, cli.json).await,
        Commands::InitDb => Ok(()),
    };

    if let Err(e) = service.close().await {
        warn!(error = %e, "Failed to close database connections");
    }

    result
}

/// Exit status taken from the first service error in the chain
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ServiceError>())
        .map(|e| e.exit_code())
        .unwrap_or(1)
        .clamp(1, 255) as u8
}

#[derive(Parser)]
#[command(
    name = "label-cli",
    about = "Look up unit label data and print BarTender labels",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(
        long,
        global = true,
        help = "Directory holding default.toml and environment overrides"
    )]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List production lines
    Lines,
    /// Show the model, display data and label data of a serial number
    Lookup(UnitArgs),
    /// List the label templates of a serial number's model
    Templates(UnitArgs),
    /// Write a template's CSV data source and print it
    Print(PrintArgs),
    /// Create the label database tables
    InitDb,
}

#[derive(Args)]
struct UnitArgs {
    #[arg(long, help = "Serial number of the unit")]
    sn: String,
    #[arg(long, help = "Production line the unit was built on")]
    line: String,
}

#[derive(Args)]
struct PrintArgs {
    #[command(flatten)]
    unit: UnitArgs,
    #[arg(long, help = "Label name of the template to print; defaults to the primary label")]
    template: Option<String>,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Write the CSV data source but do not send the job to the printer"
    )]
    dry_run: bool,
}

struct CliContext {
    config: AppConfig,
}

impl CliContext {
    fn initialize(config_dir: Option<&std::path::Path>) -> Result<Self> {
        let config = match config_dir {
            Some(dir) => config::load_config_from(dir),
            None => config::load_config(),
        }
        .context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        Ok(Self { config })
    }

    async fn label_service(&self) -> Result<LabelDataService> {
        LabelDataService::from_config(&self.config)
            .await
            .context("failed to connect to label database")
    }
}

async fn handle_init_db(context: &CliContext) -> Result<()> {
    let pool = db::establish_connection_from_app_config(&context.config)
        .await
        .context("failed to connect to label database")?;
    db::run_migrations(&pool)
        .await
        .context("failed to create label tables")?;
    db::close_pool(pool).await?;

    println!("Label database is up to date");
    Ok(())
}

async fn handle_lines(service: &LabelDataService, json: bool) -> Result<()> {
    let lines = service
        .production_lines()
        .await
        .context("failed to list production lines")?;

    if json {
        print_json(&lines)?;
    } else if lines.is_empty() {
        println!("No production lines configured");
    } else {
        for line in &lines {
            println!("- {}", line);
        }
    }

    Ok(())
}

async fn handle_lookup(service: &LabelDataService, args: UnitArgs, json: bool) -> Result<()> {
    let sn = SerialNumber::parse(&args.sn)?;
    let data = service
        .field_data(&sn, &args.line)
        .await
        .with_context(|| format!("failed to look up serial number {}", sn))?;

    if json {
        print_json(&data)?;
    } else {
        println!("Serial {} • line {} • model {}", sn, args.line, data.model_id);
        println!("Display data:");
        render_fields(&data.display);
        println!("Label data:");
        render_fields(&data.label);
    }

    Ok(())
}

async fn handle_templates(service: &LabelDataService, args: UnitArgs, json: bool) -> Result<()> {
    let sn = SerialNumber::parse(&args.sn)?;
    let model_id = service
        .model_id(&sn, &args.line)
        .await
        .with_context(|| format!("failed to resolve model of {}", sn))?;
    let templates = service
        .templates(&model_id)
        .await
        .with_context(|| format!("failed to list templates of model {}", model_id))?;

    if json {
        print_json(&templates)?;
    } else if templates.is_empty() {
        println!("Model {} has no label templates", model_id);
    } else {
        for template in &templates {
            render_template(template);
        }
    }

    Ok(())
}

async fn handle_print(
    context: &CliContext,
    service: &LabelDataService,
    args: PrintArgs,
    json: bool,
) -> Result<()> {
    let sn = SerialNumber::parse(&args.unit.sn)?;
    let data = service
        .field_data(&sn, &args.unit.line)
        .await
        .with_context(|| format!("failed to look up serial number {}", sn))?;

    let template = match &args.template {
        Some(label_name) => service.template(&data.model_id, label_name).await,
        None => service.primary_template(&data.model_id).await,
    }
    .with_context(|| format!("failed to find a label template for model {}", data.model_id))?;

    let mut printer_config = context.config.printer.clone();
    if args.dry_run {
        printer_config.backend = "dry-run".to_string();
    }
    let printer = printer_from_config(&printer_config);

    info!(sn = %sn, template = %template.name, printer = printer.name(), "Printing label");
    let outcome = LabelMaker::new(data.label, template, printer)
        .run()
        .await
        .with_context(|| format!("failed to print label for {}", sn))?;

    if json {
        print_json(&outcome)?;
    } else {
        println!("Wrote {}", outcome.csv_path.display());
        println!(
            "Job {} sent to {} ({} ms)",
            outcome.receipt.job_id, outcome.receipt.printer, outcome.receipt.elapsed_ms
        );
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_fields(fields: &FieldSet) {
    for (name, value) in fields.iter() {
        println!("  {}: {}", name, value);
    }
}

fn render_template(template: &LabelTemplate) {
    println!(
        "- {} • {} • {}",
        template.label_name,
        template.name,
        template.template_file().display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_comes_from_service_error() {
        let err = anyhow::Error::new(ServiceError::NotFound("line".into())).context("lookup failed");
        assert_eq!(exit_code_for(&err), 3);
    }

    #[test]
    fn unknown_errors_exit_with_one() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&err), 1);
    }

    #[test]
    fn parses_print_arguments() {
        let cli = Cli::try_parse_from([
            "label-cli", "--json", "print", "--sn", "AB123", "--line", "Line 1", "--template",
            "Rating", "--dry-run",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Print(args) => {
                assert_eq!(args.unit.sn, "AB123");
                assert_eq!(args.unit.line, "Line 1");
                assert_eq!(args.template.as_deref(), Some("Rating"));
                assert!(args.dry_run);
            }
            _ => panic!("expected print command"),
        }
    }
}
