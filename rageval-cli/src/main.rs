// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rageval CLI
//!
//! Scores a JSONL file of evaluation cases with one metric.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rageval_core::EvalCase;
use rageval_evals::{
    ClientFactory, ContextPrecisionRecallF1, EvalSettings, JudgedAnswerCorrectness,
    JudgedAnswerFaithfulness, JudgedAnswerRelevance, JudgedContextCoverage,
    JudgedContextPrecision, LLMClient, LexicalAnswerCorrectness, LexicalAnswerFaithfulness,
    LexicalMeasure, Metric, ProviderClientFactory, DEFAULT_LCS_THRESHOLD,
};
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "rageval")]
#[command(about = "Rageval - metrics for retrieval-augmented generation", long_about = None)]
struct Cli {
    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every case of a JSONL file
    Score {
        /// Metric to run
        #[arg(long, value_enum)]
        metric: MetricName,

        /// One JSON case per line
        #[arg(long)]
        input: PathBuf,

        /// Settings file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Results file, stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        matching: ContextMatchArgs,
    },
}

/// Options of the `context-prf1` metric
#[derive(Args, Debug, Clone, PartialEq)]
struct ContextMatchArgs {
    /// Snippet matching: exact, lcs or rouge
    #[arg(long, default_value = "exact")]
    match_strategy: String,

    /// Minimum LCS recall for an lcs/rouge match
    #[arg(long, default_value_t = DEFAULT_LCS_THRESHOLD)]
    threshold: f64,

    /// Split snippets into sentences before matching
    #[arg(long)]
    split_sentences: bool,
}

impl Default for ContextMatchArgs {
    fn default() -> Self {
        Self {
            match_strategy: "exact".to_string(),
            threshold: DEFAULT_LCS_THRESHOLD,
            split_sentences: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricName {
    #[value(name = "context-prf1")]
    ContextPrf1,
    #[value(name = "word-overlap-correctness")]
    WordOverlapCorrectness,
    #[value(name = "lcs-correctness")]
    LcsCorrectness,
    #[value(name = "word-overlap-faithfulness")]
    WordOverlapFaithfulness,
    #[value(name = "lcs-faithfulness")]
    LcsFaithfulness,
    #[value(name = "judged-correctness")]
    JudgedCorrectness,
    #[value(name = "judged-faithfulness")]
    JudgedFaithfulness,
    #[value(name = "judged-relevance")]
    JudgedRelevance,
    #[value(name = "judged-coverage")]
    JudgedCoverage,
    #[value(name = "judged-context-precision")]
    JudgedContextPrecision,
}

impl MetricName {
    fn needs_model(&self) -> bool {
        matches!(
            self,
            MetricName::JudgedCorrectness
                | MetricName::JudgedFaithfulness
                | MetricName::JudgedRelevance
                | MetricName::JudgedCoverage
                | MetricName::JudgedContextPrecision
        )
    }
}

/// Totals reported once a file is scored
#[derive(Debug, Default, PartialEq, Eq)]
struct ScoreSummary {
    scored: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "rageval_cli=debug,rageval_evals=debug"
    } else {
        "rageval_cli=info,rageval_evals=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match cli.command {
        Commands::Score {
            metric,
            input,
            config,
            output,
            matching,
        } => {
            let settings = EvalSettings::load(config.as_deref())?;
            let cases = read_cases(&input)?;
            info!(cases = cases.len(), metric = ?metric, "Scoring {}", input.display());

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                )),
                None => Box::new(BufWriter::new(io::stdout())),
            };

            let summary = run(metric, &matching, &settings, &cases, &mut out).await?;
            out.flush()?;
            info!(
                scored = summary.scored,
                failed = summary.failed,
                "Finished scoring"
            );
        }
    }

    Ok(())
}

/// Parse the input file, one case per non-blank line
///
/// A malformed line is kept as an error so it still gets an output record.
fn read_cases(path: &Path) -> Result<Vec<Result<EvalCase, String>>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_cases(&contents))
}

fn parse_cases(contents: &str) -> Vec<Result<EvalCase, String>> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| format!("Invalid case: {e}")))
        .collect()
}

async fn run(
    metric: MetricName,
    matching: &ContextMatchArgs,
    settings: &EvalSettings,
    cases: &[Result<EvalCase, String>],
    out: &mut dyn Write,
) -> Result<ScoreSummary> {
    let client: Option<Arc<dyn LLMClient>> = if metric.needs_model() {
        let factory = ProviderClientFactory::new(settings.llm.clone());
        Some(
            factory
                .build(&settings.model.model_id)
                .with_context(|| format!("Failed to create client for {}", settings.model.model_id))?,
        )
    } else {
        None
    };
    let client = || {
        client
            .clone()
            .context("Metric needs a model client but none was configured")
    };

    match metric {
        MetricName::ContextPrf1 => {
            let metric = ContextPrecisionRecallF1::from_parameters(
                matching.split_sentences,
                &matching.match_strategy,
                matching.threshold,
            )?;
            score_cases(&metric, cases, out).await
        }
        MetricName::WordOverlapCorrectness => {
            let metric = LexicalAnswerCorrectness::new(LexicalMeasure::WordOverlap);
            score_cases(&metric, cases, out).await
        }
        MetricName::LcsCorrectness => {
            score_cases(&LexicalAnswerCorrectness::new(LexicalMeasure::Lcs), cases, out).await
        }
        MetricName::WordOverlapFaithfulness => {
            let metric = LexicalAnswerFaithfulness::new(LexicalMeasure::WordOverlap);
            score_cases(&metric, cases, out).await
        }
        MetricName::LcsFaithfulness => {
            score_cases(&LexicalAnswerFaithfulness::new(LexicalMeasure::Lcs), cases, out).await
        }
        MetricName::JudgedCorrectness => {
            let metric = JudgedAnswerCorrectness::from_settings(settings, client()?)?;
            score_cases(&metric, cases, out).await
        }
        MetricName::JudgedFaithfulness => {
            let metric = JudgedAnswerFaithfulness::from_settings(settings, client()?)?;
            score_cases(&metric, cases, out).await
        }
        MetricName::JudgedRelevance => {
            let metric = JudgedAnswerRelevance::from_settings(settings, client()?)?;
            score_cases(&metric, cases, out).await
        }
        MetricName::JudgedCoverage => {
            let metric = JudgedContextCoverage::from_settings(settings, client()?)?;
            score_cases(&metric, cases, out).await
        }
        MetricName::JudgedContextPrecision => {
            let metric = JudgedContextPrecision::from_settings(settings, client()?)?;
            score_cases(&metric, cases, out).await
        }
    }
}

/// Evaluate cases one at a time, writing a JSON record per case
async fn score_cases<M>(
    metric: &M,
    cases: &[Result<EvalCase, String>],
    out: &mut dyn Write,
) -> Result<ScoreSummary>
where
    M: Metric,
    M::Output: Serialize,
{
    let mut summary = ScoreSummary::default();
    for (index, case) in cases.iter().enumerate() {
        let outcome = match case {
            Ok(case) => metric.evaluate(case).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.clone()),
        };

        let record = match outcome {
            Ok(result) => {
                summary.scored += 1;
                json!({
                    "index": index,
                    "metric": metric.id(),
                    "result": serde_json::to_value(&result)?,
                })
            }
            Err(error) => {
                summary.failed += 1;
                warn!(index, metric = metric.id(), error = %error, "Case failed");
                json!({
                    "index": index,
                    "metric": metric.id(),
                    "error": error,
                })
            }
        };
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn records(buffer: &[u8]) -> Vec<Value> {
        std::str::from_utf8(buffer)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_cases_skips_blank_lines() {
        let contents = "{\"question\": \"q\"}\n\n   \nnot json\n{\"answer\": \"Paris\"}\n";
        let cases = parse_cases(contents);
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].as_ref().unwrap().question, "q");
        assert!(cases[1].is_err());
        assert_eq!(cases[2].as_ref().unwrap().reference_answer, "Paris");
    }

    #[tokio::test]
    async fn test_deterministic_metric_writes_one_record_per_case() {
        let cases = parse_cases(concat!(
            "{\"reference_answer\": \"Paris is the capital\", \"generated_answer\": \"Paris is the capital\"}\n",
            "{\"generated_answer\": \"no reference\"}\n",
        ));
        let mut buffer = Vec::new();

        let summary = run(
            MetricName::WordOverlapCorrectness,
            &ContextMatchArgs::default(),
            &EvalSettings::default(),
            &cases,
            &mut buffer,
        )
        .await
        .unwrap();

        assert_eq!(summary, ScoreSummary { scored: 1, failed: 1 });
        let records = records(&buffer);
        assert_eq!(records[0]["index"], 0);
        assert_eq!(records[0]["metric"], "word_overlap_answer_correctness");
        assert_eq!(records[0]["result"]["correctness"], 1.0);
        assert_eq!(records[1]["index"], 1);
        assert!(records[1]["error"]
            .as_str()
            .unwrap()
            .contains("reference_answer"));
    }

    #[tokio::test]
    async fn test_judged_metric_without_key_fails_up_front() {
        let mut settings = EvalSettings::default();
        settings.llm.openai_api_key = None;
        let cases = parse_cases("{\"question\": \"q\"}\n");
        let mut buffer = Vec::new();

        let result = run(
            MetricName::JudgedRelevance,
            &ContextMatchArgs::default(),
            &settings,
            &cases,
            &mut buffer,
        )
        .await;
        assert!(result.is_err());
        assert!(buffer.is_empty());
    }

    const PARIS_LYON: &str = concat!(
        "{\"retrieved_contexts\": [\"Paris is the capital of France and the largest city.\", ",
        "\"Lyon is a city in France.\"], ",
        "\"reference_contexts\": [\"Paris is the capital of France.\"]}\n",
    );

    async fn context_prf1(matching: &ContextMatchArgs) -> Result<Vec<Value>> {
        let cases = parse_cases(PARIS_LYON);
        let mut buffer = Vec::new();
        run(
            MetricName::ContextPrf1,
            matching,
            &EvalSettings::default(),
            &cases,
            &mut buffer,
        )
        .await?;
        Ok(records(&buffer))
    }

    #[tokio::test]
    async fn test_context_prf1_match_flags() {
        let exact = context_prf1(&ContextMatchArgs::default()).await.unwrap();
        assert_eq!(exact[0]["result"]["recall"], 0.0);

        let lcs = ContextMatchArgs {
            match_strategy: "lcs".to_string(),
            threshold: 0.3,
            split_sentences: false,
        };
        let records = context_prf1(&lcs).await.unwrap();
        assert_eq!(records[0]["result"]["precision"], 1.0);
        assert_eq!(records[0]["result"]["recall"], 1.0);
    }

    #[tokio::test]
    async fn test_context_prf1_bad_flags_fail_up_front() {
        let unknown = ContextMatchArgs {
            match_strategy: "fuzzy".to_string(),
            ..ContextMatchArgs::default()
        };
        assert!(context_prf1(&unknown).await.is_err());

        let out_of_range = ContextMatchArgs {
            match_strategy: "rouge".to_string(),
            threshold: 1.5,
            split_sentences: false,
        };
        assert!(context_prf1(&out_of_range).await.is_err());
    }

    #[test]
    fn test_score_flags_parse() {
        let cli = Cli::try_parse_from([
            "rageval",
            "score",
            "--metric",
            "context-prf1",
            "--input",
            "cases.jsonl",
            "--match-strategy",
            "lcs",
            "--threshold",
            "0.3",
            "--split-sentences",
        ])
        .unwrap();
        let Commands::Score { metric, matching, .. } = cli.command;
        assert_eq!(metric, MetricName::ContextPrf1);
        assert_eq!(
            matching,
            ContextMatchArgs {
                match_strategy: "lcs".to_string(),
                threshold: 0.3,
                split_sentences: true,
            }
        );

        let cli = Cli::try_parse_from([
            "rageval", "score", "--metric", "context-prf1", "--input", "cases.jsonl",
        ])
        .unwrap();
        let Commands::Score { matching, .. } = cli.command;
        assert_eq!(matching, ContextMatchArgs::default());
    }

    #[test]
    fn test_metric_names() {
        let name = MetricName::from_str("judged-context-precision", false).unwrap();
        assert_eq!(name, MetricName::JudgedContextPrecision);
        assert!(name.needs_model());
        assert!(!MetricName::ContextPrf1.needs_model());
        assert_eq!(
            MetricName::ContextPrf1.to_possible_value().unwrap().get_name(),
            "context-prf1"
        );
    }
}
