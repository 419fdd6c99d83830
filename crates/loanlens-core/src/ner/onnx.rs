//! Token classification model run through an [`InferenceBackend`].

use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use loanlens_inference::{InferenceBackend, InputTensor, OrtBackend, OrtOptions};

use crate::error::NerError;
use crate::models::{EntitySpan, ModelConfig, NerConfig};

use super::decode::{argmax_softmax, decode_spans, TokenTag};
use super::labels::LabelMap;
use super::EntityRecognizer;

/// Entity recognizer backed by an ONNX token classification model.
pub struct OnnxEntityRecognizer<B: InferenceBackend> {
    backend: B,
    tokenizer: Tokenizer,
    labels: LabelMap,
    /// Content tokens per model call, special tokens excluded.
    window: usize,
    cls_id: Option<u32>,
    sep_id: Option<u32>,
}

impl OnnxEntityRecognizer<OrtBackend> {
    /// Load the model, tokenizer and label map from the configured directory.
    pub fn from_config(models: &ModelConfig, config: &NerConfig) -> Result<Self, NerError> {
        let (model_path, tokenizer_path, labels_path) = models.ner_paths();

        let labels = LabelMap::from_file(&labels_path, config.unknown_labels)?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            NerError::ModelLoad(format!("failed to load tokenizer {}: {}", tokenizer_path.display(), e))
        })?;

        let options = OrtOptions {
            intra_threads: config.intra_threads,
            ..Default::default()
        };
        let backend = OrtBackend::from_file_with(&model_path, options)?;

        info!(
            "Loaded entity recognizer from {} ({} labels)",
            models.ner_dir.display(),
            labels.len()
        );

        Ok(Self::new(backend, tokenizer, labels, config))
    }
}

impl<B: InferenceBackend> OnnxEntityRecognizer<B> {
    /// Assemble a recognizer from loaded parts.
    pub fn new(backend: B, mut tokenizer: Tokenizer, labels: LabelMap, config: &NerConfig) -> Self {
        // Long agreements are windowed here, not cut by the tokenizer
        if let Err(e) = tokenizer.with_truncation(None) {
            warn!("Could not disable tokenizer truncation: {}", e);
        }
        tokenizer.with_padding(None);

        let cls_id = tokenizer.token_to_id(&config.cls_token);
        let sep_id = tokenizer.token_to_id(&config.sep_token);
        let specials = cls_id.is_some() as usize + sep_id.is_some() as usize;
        let window = config.max_tokens.saturating_sub(specials).max(1);

        debug!(
            "Recognizer window: {} tokens (cls={:?}, sep={:?})",
            window, cls_id, sep_id
        );

        Self {
            backend,
            tokenizer,
            labels,
            window,
            cls_id,
            sep_id,
        }
    }

    /// The model's label map.
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Best label and its probability for each content token of one window.
    fn run_window(&self, ids: &[u32]) -> Result<Vec<(usize, f32)>, NerError> {
        let mut input_ids: Vec<i64> = Vec::with_capacity(ids.len() + 2);
        input_ids.extend(self.cls_id.map(i64::from));
        input_ids.extend(ids.iter().map(|&id| i64::from(id)));
        input_ids.extend(self.sep_id.map(i64::from));
        let seq_len = input_ids.len();
        let lead = self.cls_id.is_some() as usize;

        let mut inputs = vec![
            ("input_ids", InputTensor::token_row(input_ids)?),
            ("attention_mask", InputTensor::token_row(vec![1; seq_len])?),
        ];
        if self.backend.has_input("token_type_ids") {
            inputs.push(("token_type_ids", InputTensor::token_row(vec![0; seq_len])?));
        }

        let outputs = self.backend.run(&inputs)?;
        let (_, output) = outputs
            .iter()
            .find(|(name, _)| name == "logits")
            .or_else(|| outputs.first())
            .ok_or_else(|| NerError::Output("model produced no outputs".to_string()))?;

        let logits = output
            .as_f32()
            .ok_or_else(|| NerError::Output("logits are not float32".to_string()))?;
        let shape = logits.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] != seq_len || shape[2] == 0 {
            return Err(NerError::Output(format!(
                "expected logits of shape [1, {}, labels], got {:?}",
                seq_len, shape
            )));
        }
        let num_labels = shape[2];
        if num_labels != self.labels.len() {
            debug!(
                "Model emits {} labels, label map has {}",
                num_labels,
                self.labels.len()
            );
        }

        let data = logits
            .as_slice()
            .ok_or_else(|| NerError::Output("logits are not contiguous".to_string()))?;

        data.chunks(num_labels)
            .skip(lead)
            .take(ids.len())
            .map(|row| {
                argmax_softmax(row).ok_or_else(|| NerError::Output("empty logits row".to_string()))
            })
            .collect()
    }
}

impl<B: InferenceBackend> EntityRecognizer for OnnxEntityRecognizer<B> {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, NerError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| NerError::Tokenize(e.to_string()))?;

        let ids = encoding.get_ids();
        let offsets = encoding.get_offsets();
        let word_ids = encoding.get_word_ids();
        debug!("Tokenized {} bytes into {} tokens", text.len(), ids.len());

        let mut tokens = Vec::with_capacity(ids.len());
        let mut prev_word: Option<u32> = None;

        for ((chunk, chunk_offsets), chunk_words) in ids
            .chunks(self.window)
            .zip(offsets.chunks(self.window))
            .zip(word_ids.chunks(self.window))
        {
            let predictions = self.run_window(chunk)?;

            for (((label, score), &(start, end)), &word) in predictions
                .into_iter()
                .zip(chunk_offsets)
                .zip(chunk_words)
            {
                tokens.push(TokenTag {
                    tag: self.labels.tag(label),
                    score,
                    start,
                    end,
                    continues_word: word.is_some() && word == prev_word,
                });
                prev_word = word;
            }
        }

        let spans = decode_spans(text, &tokens);
        debug!("Recognized {} entity spans", spans.len());
        Ok(spans)
    }
}
