//! Models command - download OCR models and check recognizer artifacts.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use console::style;
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use loanlens_core::LoanLensConfig;

use super::load_config;

/// Download attempts per file.
const DOWNLOAD_ATTEMPTS: u32 = 2;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List available OCR model variants
    List,

    /// Download OCR models
    Download(DownloadArgs),

    /// Check OCR model and recognizer artifact status
    Status(StatusArgs),

    /// Remove downloaded OCR models
    Clean(CleanArgs),

    /// Set the active OCR model variant
    Use(UseArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelVariant {
    /// Mobile models - smaller, faster (~12MB)
    Mobile,
    /// Server models - better detection on dense scans (~92MB)
    Server,
}

impl ModelVariant {
    const ALL: [ModelVariant; 2] = [ModelVariant::Mobile, ModelVariant::Server];
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelVariant::Mobile => write!(f, "mobile"),
            ModelVariant::Server => write!(f, "server"),
        }
    }
}

#[derive(Args)]
struct DownloadArgs {
    /// Model variant to download
    #[arg(short, long, value_enum, default_value = "mobile")]
    variant: ModelVariant,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force re-download even if files exist
    #[arg(long)]
    force: bool,

    /// Base URL to download from; files are fetched from <url>/<variant>/<file>
    /// (default: models.ocr_download_url)
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args)]
struct StatusArgs {
    /// Check specific variant only
    #[arg(short, long, value_enum)]
    variant: Option<ModelVariant>,
}

#[derive(Args)]
struct CleanArgs {
    /// Clean specific variant only
    #[arg(short, long, value_enum)]
    variant: Option<ModelVariant>,

    /// Clean all variants
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct UseArgs {
    /// Variant to set as active
    #[arg(value_enum)]
    variant: ModelVariant,
}

/// One downloadable model file.
struct ModelFile {
    filename: &'static str,
    size_bytes: u64,
    description: &'static str,
}

fn variant_files(variant: ModelVariant) -> [ModelFile; 3] {
    let (det_size, det_description) = match variant {
        ModelVariant::Mobile => (4_500_000, "PP-OCRv3 mobile detection"),
        ModelVariant::Server => (84_000_000, "PP-OCRv5 server detection"),
    };

    [
        ModelFile {
            filename: "det.onnx",
            size_bytes: det_size,
            description: det_description,
        },
        ModelFile {
            filename: "latin_rec.onnx",
            size_bytes: 7_500_000,
            description: "Latin recognition",
        },
        ModelFile {
            filename: "latin_dict.txt",
            size_bytes: 2_000,
            description: "Latin character dictionary",
        },
    ]
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loanlens")
}

/// Directory holding the downloaded files of a variant.
pub fn get_variant_dir(variant: ModelVariant) -> PathBuf {
    data_dir().join("models").join(variant.to_string())
}

/// The variant selected with `models use`, mobile by default.
pub fn get_active_variant() -> ModelVariant {
    match fs::read_to_string(data_dir().join("active_variant")) {
        Ok(content) if content.trim() == "server" => ModelVariant::Server,
        _ => ModelVariant::Mobile,
    }
}

fn set_active_variant(variant: ModelVariant) -> anyhow::Result<()> {
    let dir = data_dir();
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("active_variant"), variant.to_string())?;
    Ok(())
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::List => list_models(),
        ModelsCommand::Download(download_args) => {
            let config = load_config(config_path)?;
            download_models(download_args, &config).await
        }
        ModelsCommand::Status(status_args) => {
            let config = load_config(config_path)?;
            check_status(status_args, &config)
        }
        ModelsCommand::Clean(clean_args) => clean_models(clean_args),
        ModelsCommand::Use(use_args) => use_variant(use_args),
    }
}

fn list_models() -> anyhow::Result<()> {
    println!("{}", style("Available OCR Model Variants").bold());
    println!();

    let active = get_active_variant();

    for variant in ModelVariant::ALL {
        let files = variant_files(variant);
        let total_size: u64 = files.iter().map(|f| f.size_bytes).sum();
        let active_marker = if variant == active { " (active)" } else { "" };

        println!(
            "{} {}{}",
            style(format!("▸ {}", variant)).bold().cyan(),
            format_size(total_size),
            style(active_marker).green().bold()
        );
        for file in &files {
            println!(
                "    {:<20} {:>10}  {}",
                file.filename,
                format_size(file.size_bytes),
                file.description
            );
        }
        println!();
    }

    println!("OCR is only used for PDFs without a text layer.");
    println!("The entity recognizer is trained separately; point --model-dir or");
    println!("models.ner_dir at a directory with model.onnx, tokenizer.json and config.json.");

    Ok(())
}

fn use_variant(args: UseArgs) -> anyhow::Result<()> {
    let variant_dir = get_variant_dir(args.variant);
    let missing = variant_files(args.variant)
        .iter()
        .any(|f| !variant_dir.join(f.filename).exists());

    if missing {
        println!(
            "{} {} models not downloaded yet.",
            style("⚠").yellow(),
            args.variant
        );
        println!("Run: loanlens models download -v {}", args.variant);
        return Ok(());
    }

    set_active_variant(args.variant)?;
    println!(
        "{} Switched to {} OCR models",
        style("✓").green(),
        style(args.variant.to_string()).cyan().bold()
    );

    Ok(())
}

async fn download_models(args: DownloadArgs, config: &LoanLensConfig) -> anyhow::Result<()> {
    let variant = args.variant;
    let mut models = config.models.clone();
    if let Some(base_url) = args.base_url.clone() {
        models.ocr_download_url = base_url;
    }
    debug!("Downloading from {}", models.ocr_download_url);
    let output_dir = args.output.clone().unwrap_or_else(|| get_variant_dir(variant));
    fs::create_dir_all(&output_dir)?;

    println!(
        "{} Downloading {} OCR models to {}",
        style("ℹ").blue(),
        style(variant.to_string()).cyan().bold(),
        output_dir.display()
    );
    println!();

    let client = reqwest::Client::builder()
        .user_agent(concat!("loanlens-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(300))
        .build()?;

    let multi_progress = MultiProgress::new();
    let mut success_count = 0;
    let mut skip_count = 0;
    let mut failures: Vec<String> = Vec::new();

    for file in variant_files(variant) {
        let path = output_dir.join(file.filename);

        if !args.force {
            if let Ok(metadata) = fs::metadata(&path) {
                // At least half the expected size counts as complete
                if metadata.len() > file.size_bytes / 2 {
                    println!(
                        "  {} {} (already exists, {})",
                        style("✓").green(),
                        file.filename,
                        format_size(metadata.len())
                    );
                    skip_count += 1;
                    continue;
                }
            }
        }

        let url = models.ocr_file_url(&variant.to_string(), file.filename);

        let pb = multi_progress.add(ProgressBar::new(file.size_bytes));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_message(file.filename.to_string());

        let mut last_error = None;
        for attempt in 1..=DOWNLOAD_ATTEMPTS {
            match download_file(&client, &url, &path, &pb).await {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    warn!("Download of {} failed (attempt {}): {}", url, attempt, e);
                    pb.set_position(0);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            None => {
                pb.finish_with_message(format!("{} {}", style("✓").green(), file.filename));
                success_count += 1;
            }
            Some(e) => {
                pb.finish_with_message(format!("{} {} - {}", style("✗").red(), file.filename, e));
                failures.push(file.filename.to_string());
            }
        }
    }

    println!();

    if failures.is_empty() {
        println!(
            "{} {} OCR models ready",
            style("✓").green().bold(),
            variant
        );
        println!(
            "   {} downloaded, {} already present",
            success_count, skip_count
        );

        if args.output.is_none() && get_active_variant() != variant {
            println!();
            println!(
                "{} To use these models, run: loanlens models use {}",
                style("ℹ").blue(),
                variant
            );
        }
    } else {
        println!(
            "{} Download completed with errors",
            style("⚠").yellow().bold()
        );
        println!(
            "   {} downloaded, {} skipped, {} failed ({})",
            success_count,
            skip_count,
            failures.len(),
            failures.join(", ")
        );
        println!();
        println!("Retry with: loanlens models download -v {} --force", variant);
        anyhow::bail!("{} model files could not be downloaded", failures.len());
    }

    Ok(())
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<()> {
    debug!("GET {}", url);
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    // Stream into a temp file so an interrupted download never looks complete
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

fn check_status(args: StatusArgs, config: &LoanLensConfig) -> anyhow::Result<()> {
    let active = get_active_variant();

    println!("{}", style("Model Status").bold());
    println!();

    println!("{}", style("▸ entity recognizer").bold());
    let (model, tokenizer, labels) = config.models.ner_paths();
    let ner_ready = print_files(&[model, tokenizer, labels], None)?;
    if ner_ready {
        println!("    {} Ready", style("✓").green());
    } else {
        println!(
            "    {} Set models.ner_dir or pass --model-dir to a trained model export",
            style("⚠").yellow()
        );
    }
    println!();

    let (detection, _, _) = config.models.ocr_paths();
    if detection.exists() {
        println!(
            "{} {}",
            style("▸ configured OCR").bold(),
            config.models.ocr_dir.display()
        );
        let (det, rec, dict) = config.models.ocr_paths();
        print_files(&[det, rec, dict], None)?;
        println!();
    }

    println!("Active OCR variant: {}", style(active.to_string()).cyan().bold());
    println!();

    let variants: Vec<ModelVariant> = match args.variant {
        Some(v) => vec![v],
        None => ModelVariant::ALL.to_vec(),
    };

    for variant in variants {
        let model_dir = get_variant_dir(variant);
        let active_marker = if variant == active {
            style(" ◀ active").green().to_string()
        } else {
            String::new()
        };

        println!(
            "{} {}{}",
            style(format!("▸ {}", variant)).bold(),
            model_dir.display(),
            active_marker
        );

        let files = variant_files(variant);
        let paths: Vec<PathBuf> = files.iter().map(|f| model_dir.join(f.filename)).collect();
        let expected: Vec<u64> = files.iter().map(|f| f.size_bytes).collect();

        if print_files(&paths, Some(expected.as_slice()))? {
            println!("    {} Ready", style("✓").green());
        } else {
            println!(
                "    {} Run 'loanlens models download -v {}' to download",
                style("⚠").yellow(),
                variant
            );
        }
        println!();
    }

    Ok(())
}

/// Print one status line per file; `true` when all are present and, where an
/// expected size is given, at least half that size.
fn print_files(paths: &[PathBuf], expected: Option<&[u64]>) -> anyhow::Result<bool> {
    let mut all_present = true;

    for (idx, path) in paths.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let (status, size_str) = match fs::metadata(path) {
            Ok(metadata) => {
                let size = metadata.len();
                let complete = expected
                    .and_then(|sizes| sizes.get(idx))
                    .is_none_or(|&want| size > want / 2);
                if complete {
                    (style("✓").green(), format_size(size))
                } else {
                    all_present = false;
                    (style("⚠").yellow(), format!("{} (incomplete?)", format_size(size)))
                }
            }
            Err(_) => {
                all_present = false;
                (style("✗").red(), "missing".to_string())
            }
        };

        println!("    {} {:<25} {:>10}", status, name, size_str);
    }

    Ok(all_present)
}

fn clean_models(args: CleanArgs) -> anyhow::Result<()> {
    let variants: Vec<ModelVariant> = if args.all {
        ModelVariant::ALL.to_vec()
    } else if let Some(v) = args.variant {
        vec![v]
    } else {
        println!(
            "{} Specify --all to remove all models or -v <variant> for a specific variant",
            style("ℹ").blue()
        );
        return Ok(());
    };

    let mut total_removed = 0;
    let mut total_freed: u64 = 0;

    for variant in variants {
        let model_dir = get_variant_dir(variant);
        if !model_dir.exists() {
            continue;
        }

        println!("{} Cleaning {} models...", style("⚠").yellow(), variant);

        for file in variant_files(variant) {
            let path = model_dir.join(file.filename);
            if let Ok(metadata) = fs::metadata(&path) {
                fs::remove_file(&path)?;
                total_removed += 1;
                total_freed += metadata.len();
                println!("  {} Removed {}", style("✓").green(), file.filename);
            }
        }

        // Leftovers of interrupted downloads
        if let Ok(entries) = fs::read_dir(&model_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "tmp") {
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    if total_removed > 0 {
        println!();
        println!(
            "{} Removed {} files, freed {}",
            style("✓").green(),
            total_removed,
            format_size(total_freed)
        );
    } else {
        println!("{} No model files to remove.", style("ℹ").blue());
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}
