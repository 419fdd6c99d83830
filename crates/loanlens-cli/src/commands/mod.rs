//! CLI subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod evaluate;
pub mod inspect;
pub mod models;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tracing::{debug, warn};

use loanlens_core::{LoanLensConfig, PageOcr, PureOcrEngine};

use models::{get_active_variant, get_variant_dir};

/// Model location flags shared by the extraction commands.
#[derive(Args, Clone, Default)]
pub struct ModelArgs {
    /// Entity recognizer directory (model.onnx, tokenizer.json, config.json)
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// OCR model directory (default: configured directory, else the active downloaded variant)
    #[arg(long)]
    pub ocr_model_dir: Option<PathBuf>,

    /// Never OCR; scanned PDFs yield whatever text layer they have
    #[arg(long)]
    pub no_ocr: bool,
}

impl ModelArgs {
    /// Apply the flags on top of a loaded configuration.
    pub fn apply(&self, config: &mut LoanLensConfig) {
        if let Some(dir) = &self.model_dir {
            config.models.ner_dir = dir.clone();
        }

        if let Some(dir) = &self.ocr_model_dir {
            config.models.ocr_dir = dir.clone();
        } else {
            let (detection, _, _) = config.models.ocr_paths();
            if !detection.exists() {
                let variant_dir = get_variant_dir(get_active_variant());
                if variant_dir.join(&config.models.detection_model).exists() {
                    debug!("Using downloaded OCR models from {}", variant_dir.display());
                    config.models.ocr_dir = variant_dir;
                }
            }
        }

        if self.no_ocr {
            config.pdf.ocr_fallback = false;
        }
    }
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loanlens")
        .join("config.json")
}

/// The config file in effect: the `--config` flag, else the default location.
pub fn resolve_config_path(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the configuration in effect.
///
/// An explicit `--config` file must exist; the default file is optional.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<LoanLensConfig> {
    match config_path {
        Some(path) => load_file(Path::new(path)),
        None => {
            let path = default_config_path();
            if path.exists() {
                load_file(&path)
            } else {
                Ok(LoanLensConfig::default())
            }
        }
    }
}

fn load_file(path: &Path) -> anyhow::Result<LoanLensConfig> {
    debug!("Loading configuration from {}", path.display());
    LoanLensConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))
}

/// Load the OCR engine if fallback is enabled and its models are present.
pub fn load_ocr(config: &LoanLensConfig) -> Option<Arc<dyn PageOcr>> {
    if !config.pdf.ocr_fallback {
        return None;
    }

    match PureOcrEngine::from_config(&config.models, config.ocr.clone()) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            warn!("OCR disabled: {}", e);
            None
        }
    }
}
