//! Evaluate command - score the recognizer against Doccano annotations.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::info;

use loanlens_core::annotations::{evaluate, load_doccano, Evaluation, SpanCounts};
use loanlens_core::OnnxEntityRecognizer;

use super::{load_config, ModelArgs};

/// Arguments for the evaluate command.
#[derive(Args)]
pub struct EvaluateArgs {
    /// Doccano JSONL export
    #[arg(required = true)]
    annotations: PathBuf,

    /// Print a JSON report
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Serialize)]
struct EvaluationReport<'a> {
    #[serde(flatten)]
    evaluation: &'a Evaluation,
    micro: Scores,
}

#[derive(Serialize)]
struct Scores {
    #[serde(flatten)]
    counts: SpanCounts,
    precision: f64,
    recall: f64,
    f1: f64,
}

impl From<SpanCounts> for Scores {
    fn from(counts: SpanCounts) -> Self {
        Self {
            counts,
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
        }
    }
}

pub async fn run(args: EvaluateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let docs = load_doccano(&args.annotations)?;
    if docs.is_empty() {
        anyhow::bail!("No annotated documents in {}", args.annotations.display());
    }

    let mut config = load_config(config_path)?;
    args.models.apply(&mut config);

    let recognizer = OnnxEntityRecognizer::from_config(&config.models, &config.ner)?;
    let evaluation = evaluate(&recognizer, &docs)?;
    info!(
        "Evaluated {} documents in {:?}",
        evaluation.documents,
        start.elapsed()
    );

    if args.json {
        let report = EvaluationReport {
            evaluation: &evaluation,
            micro: evaluation.micro().into(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_table(&evaluation));
    }

    Ok(())
}

fn format_table(evaluation: &Evaluation) -> String {
    let mut out = format!(
        "{:<15} {:>6} {:>6} {:>6} {:>9} {:>7} {:>6}\n",
        "kind", "tp", "pred", "gold", "precision", "recall", "f1"
    );

    let mut row = |name: &str, counts: &SpanCounts| {
        out.push_str(&format!(
            "{:<15} {:>6} {:>6} {:>6} {:>9.3} {:>7.3} {:>6.3}\n",
            name,
            counts.true_positives,
            counts.predicted,
            counts.gold,
            counts.precision(),
            counts.recall(),
            counts.f1()
        ));
    };

    for (kind, counts) in &evaluation.per_kind {
        row(kind.as_str(), counts);
    }
    row("micro", &evaluation.micro());

    out.push_str(&format!(
        "\n{} {} documents",
        style("ℹ").blue(),
        evaluation.documents
    ));
    if evaluation.unknown_labels > 0 {
        out.push_str(&format!(
            ", {} gold spans with unknown labels skipped",
            evaluation.unknown_labels
        ));
    }
    out.push('\n');
    out
}
