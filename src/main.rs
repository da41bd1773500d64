use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use commission_docs::archive;
use commission_docs::config::DEFAULT_ARCHIVE_NAME;
use commission_docs::generate::{self, GenerateRequest};
use commission_docs::{GeneratorConfig, Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => execute_generate(args),
    }
}

fn execute_generate(args: GenerateArgs) -> Result<()> {
    require_file(&args.sales_data)?;
    require_directory(&args.workbook_templates)?;
    require_directory(&args.doc_templates)?;

    let config = match &args.config {
        Some(path) => {
            require_file(path)?;
            GeneratorConfig::from_json_file(path)?
        }
        None => GeneratorConfig::default(),
    };

    let request = GenerateRequest {
        sales_data: args.sales_data,
        workbook_templates: args.workbook_templates,
        document_templates: args.doc_templates,
        config,
    };
    let report = generate::generate(&request)?;

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    archive::write_archive_file(&report.bundle, &args.output)?;
    println!(
        "Generated {} files into {}",
        report.bundle.len(),
        args.output.display()
    );
    Ok(())
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ToolError::MissingInput(path.to_path_buf()))
    }
}

fn require_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ToolError::MissingInput(path.to_path_buf()))
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Generate per-recipient commission workbooks and documents."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build every recipient's workbook and document into one zip archive.
    Generate(GenerateArgs),
}

#[derive(clap::Args)]
struct GenerateArgs {
    /// Sales dataset workbook containing the "Target Summary" sheet.
    #[arg(long)]
    sales_data: PathBuf,

    /// Directory holding the workbook templates.
    #[arg(long)]
    workbook_templates: PathBuf,

    /// Directory holding the word-processing templates.
    #[arg(long)]
    doc_templates: PathBuf,

    /// Archive file to write.
    #[arg(long, default_value = DEFAULT_ARCHIVE_NAME)]
    output: PathBuf,

    /// Optional JSON file overriding sheet, column and formatting conventions.
    #[arg(long)]
    config: Option<PathBuf>,
}
