//! Inspect command - show acquired text and the recognizer's raw spans.

use std::path::PathBuf;

use clap::Args;
use console::style;
use serde::Serialize;

use loanlens_core::{
    Document, DocumentType, EntitySpan, Pipeline, RawText, SpanSelection, TextAcquirer,
};

use super::{load_config, load_ocr, ModelArgs};

/// Characters of text shown without `--text`.
const PREVIEW_CHARS: usize = 600;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Input file (PDF or DOCX)
    #[arg(required = true)]
    input: PathBuf,

    /// Print the full acquired text instead of a preview
    #[arg(long)]
    text: bool,

    /// Only acquire text, do not load the recognizer
    #[arg(long)]
    no_ner: bool,

    /// Print a JSON report
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    file: String,
    raw: &'a RawText,
    #[serde(skip_serializing_if = "Option::is_none")]
    spans: Option<&'a [EntitySpan]>,
}

pub async fn run(args: InspectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let document = Document::from_path(&args.input)?;
    if !document.path.exists() {
        anyhow::bail!("Input file not found: {}", document.path.display());
    }

    let mut config = load_config(config_path)?;
    args.models.apply(&mut config);

    let (raw, spans, selection) = if args.no_ner {
        let mut acquirer = TextAcquirer::new(config.pdf.clone());
        if document.doc_type == DocumentType::Pdf {
            if let Some(ocr) = load_ocr(&config) {
                acquirer = acquirer.with_ocr(ocr);
            }
        }
        (acquirer.acquire_document(&document)?, None, config.ner.selection)
    } else {
        let pipeline = Pipeline::from_config(&config)?;
        let raw = pipeline.acquire(&document.path)?;
        let spans = pipeline.recognizer().recognize(&raw.text)?;
        (raw, Some(spans), pipeline.selection())
    };

    if args.json {
        let report = InspectReport {
            file: document.path.display().to_string(),
            raw: &raw,
            spans: spans.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", style("File:").bold(), document.path.display());
    println!(
        "{} {:?} ({} chars)",
        style("Source:").bold(),
        raw.source,
        raw.text.chars().count()
    );
    println!();

    if raw.is_blank() {
        println!("{} No text acquired.", style("⚠").yellow());
    } else if args.text {
        println!("{}", raw.text);
    } else {
        println!("{}", preview(&raw.text, PREVIEW_CHARS));
    }

    if let Some(spans) = &spans {
        println!();
        print_spans(spans, selection);
    }

    Ok(())
}

fn print_spans(spans: &[EntitySpan], selection: SpanSelection) {
    println!("{} ({})", style("Recognized spans").bold(), spans.len());

    if spans.is_empty() {
        println!("  none");
        return;
    }

    let kept = selection.select(spans);
    for span in spans {
        let marker = if kept.iter().any(|k| std::ptr::eq(*k, span)) {
            style("●").green()
        } else {
            style("○").dim()
        };
        let score = span
            .score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {:<14} {:>6}..{:<6} {:>5}  {}",
            marker, span.kind, span.start, span.end, score, span.text
        );
    }
}

/// First `max_chars` characters, with an ellipsis when cut.
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        assert_eq!(preview("Zürich Bank", 3), "Zür…");
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exact", 5), "exact");
    }
}
