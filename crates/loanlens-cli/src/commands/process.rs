//! Process command - extract loan fields from a single agreement.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use loanlens_core::{Document, ExtractionResult, FieldKind, FieldOrigin, LoanRecord, Pipeline};

use super::{load_config, ModelArgs};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or DOCX)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(flatten)]
    models: ModelArgs,

    /// Emit every field with its raw span text instead of the flat record
    #[arg(long)]
    raw: bool,

    /// Report missing or suspicious fields
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    // Reject unsupported formats before loading any model
    let document = Document::from_path(&args.input)?;
    if !document.path.exists() {
        anyhow::bail!("Input file not found: {}", document.path.display());
    }

    let mut config = load_config(config_path)?;
    args.models.apply(&mut config);

    info!("Processing file: {}", document.path.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    pb.set_message("Loading models...");
    let result = Pipeline::from_config(&config).and_then(|pipeline| {
        debug!("Pipeline ready (OCR: {})", pipeline.has_ocr());
        pb.set_message("Extracting fields...");
        pipeline.extract(&document.path)
    });
    pb.finish_and_clear();
    let result = result?;

    if args.validate {
        let issues = result.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_result(&result, args.format, args.raw)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Render one extraction result.
///
/// `raw` only affects JSON: the full result with raw span text instead of the
/// flat record.
pub fn format_result(result: &ExtractionResult, format: OutputFormat, raw: bool) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json if raw => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&result.to_record())?),
        OutputFormat::Csv => format_csv(&result.to_record()),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(record: &LoanRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(LoanRecord::COLUMNS)?;
    wtr.write_record(record.values())?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ExtractionResult) -> String {
    if result.is_empty() {
        return "No fields found".to_string();
    }

    let mut lines = Vec::with_capacity(FieldKind::ALL.len());
    for kind in FieldKind::ALL {
        match result.get(kind) {
            Some(field) => {
                let mut line = format!("{}: {} (raw: '{}')", kind, field.value, field.raw);
                if field.origin == FieldOrigin::Recovered {
                    line.push_str(" [recovered]");
                }
                lines.push(line);
            }
            None => lines.push(format!("{}: -", kind)),
        }
    }
    lines.join("\n")
}
