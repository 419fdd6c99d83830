//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LoanLensError, Result};
use crate::ner::SpanSelection;

/// Main configuration for the loanlens pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanLensConfig {
    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Entity recognizer configuration.
    pub ner: NerConfig,

    /// Model configuration.
    pub models: ModelConfig,
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// OCR pages when the text layer is blank.
    pub ocr_fallback: bool,

    /// Maximum pages to OCR (0 = unlimited).
    pub ocr_max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            ocr_fallback: true,
            ocr_max_pages: 0,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Keep `[UNK]` markers the recognizer emits for unknown glyphs.
    pub keep_unk: bool,
}

/// What to do with a model label that is not a known field kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownLabelPolicy {
    /// Drop spans carrying the label and log a warning at load time.
    #[default]
    Ignore,
    /// Refuse to load the model.
    Reject,
}

/// Entity recognizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerConfig {
    /// Maximum sequence length the model accepts, special tokens included.
    pub max_tokens: usize,

    /// Token prepended to every window, if the tokenizer knows it.
    pub cls_token: String,

    /// Token appended to every window, if the tokenizer knows it.
    pub sep_token: String,

    /// Handling of labels outside the known field kinds.
    pub unknown_labels: UnknownLabelPolicy,

    /// Which span wins when a kind is recognized more than once.
    pub selection: SpanSelection,

    /// Number of CPU threads for the ONNX session.
    pub intra_threads: usize,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            cls_token: "[CLS]".to_string(),
            sep_token: "[SEP]".to_string(),
            unknown_labels: UnknownLabelPolicy::Ignore,
            selection: SpanSelection::FirstMatch,
            intra_threads: 4,
        }
    }
}

/// Third-party mirror of the PaddleOCR ONNX exports, one directory per
/// variant. Not affiliated with this project; override with
/// `models.ocr_download_url` to use another host.
pub const DEFAULT_OCR_DOWNLOAD_URL: &str = "https://github.com/jakubmatias/incr/raw/main/models";

/// Model file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing the entity recognizer artifacts.
    pub ner_dir: PathBuf,

    /// Token classification model file name.
    pub ner_model: String,

    /// Tokenizer file name (HuggingFace `tokenizer.json`).
    pub tokenizer: String,

    /// Label configuration file name (holds `id2label`).
    pub label_config: String,

    /// Directory containing OCR models.
    pub ocr_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Base URL for OCR model downloads; files live at `<url>/<variant>/<file>`.
    pub ocr_download_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ner_dir: PathBuf::from("models/ner"),
            ner_model: "model.onnx".to_string(),
            tokenizer: "tokenizer.json".to_string(),
            label_config: "config.json".to_string(),
            ocr_dir: PathBuf::from("models/ocr"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            ocr_download_url: DEFAULT_OCR_DOWNLOAD_URL.to_string(),
        }
    }
}

impl ModelConfig {
    /// Full paths to the recognizer artifacts: model, tokenizer, label config.
    pub fn ner_paths(&self) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.ner_dir.join(&self.ner_model),
            self.ner_dir.join(&self.tokenizer),
            self.ner_dir.join(&self.label_config),
        )
    }

    /// Full paths to the OCR files: detection, recognition, dictionary.
    pub fn ocr_paths(&self) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.ocr_dir.join(&self.detection_model),
            self.ocr_dir.join(&self.recognition_model),
            self.ocr_dir.join(&self.dictionary),
        )
    }

    /// Download URL of one OCR model file.
    pub fn ocr_file_url(&self, variant: &str, file: &str) -> String {
        format!("{}/{}/{}", self.ocr_download_url.trim_end_matches('/'), variant, file)
    }
}

impl LoanLensConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| LoanLensError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| LoanLensError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: LoanLensConfig =
            serde_json::from_str(r#"{"ner": {"selection": "highest_confidence"}}"#).unwrap();
        assert_eq!(config.ner.selection, SpanSelection::HighestConfidence);
        assert_eq!(config.ner.max_tokens, 512);
        assert!(config.pdf.ocr_fallback);
        assert_eq!(config.models.ner_model, "model.onnx");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = LoanLensConfig::default();
        config.pdf.ocr_max_pages = 3;
        config.ner.unknown_labels = UnknownLabelPolicy::Reject;
        config.save(&path).unwrap();

        let loaded = LoanLensConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pdf.ocr_max_pages, 3);
        assert_eq!(loaded.ner.unknown_labels, UnknownLabelPolicy::Reject);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = LoanLensConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, LoanLensError::Config(_)));
        assert!(matches!(
            LoanLensConfig::from_file(&dir.path().join("absent.json")),
            Err(LoanLensError::Io(_))
        ));
    }

    #[test]
    fn test_model_paths() {
        let models = ModelConfig {
            ner_dir: PathBuf::from("/opt/ner"),
            ..Default::default()
        };
        let (model, tokenizer, labels) = models.ner_paths();
        assert_eq!(model, PathBuf::from("/opt/ner/model.onnx"));
        assert_eq!(tokenizer, PathBuf::from("/opt/ner/tokenizer.json"));
        assert_eq!(labels, PathBuf::from("/opt/ner/config.json"));
    }

    #[test]
    fn test_ocr_download_url() {
        let defaults = ModelConfig::default();
        assert_eq!(defaults.ocr_download_url, DEFAULT_OCR_DOWNLOAD_URL);
        assert_eq!(
            defaults.ocr_file_url("mobile", "det.onnx"),
            format!("{}/mobile/det.onnx", DEFAULT_OCR_DOWNLOAD_URL)
        );

        let config: LoanLensConfig = serde_json::from_str(
            r#"{"models": {"ocr_download_url": "https://models.example.org/ocr/"}}"#,
        )
        .unwrap();
        assert_eq!(
            config.models.ocr_file_url("server", "latin_rec.onnx"),
            "https://models.example.org/ocr/server/latin_rec.onnx"
        );
        assert_eq!(config.models.detection_model, "det.onnx");
    }
}
