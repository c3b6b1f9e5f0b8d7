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

//! Context precision, recall and F1 by string matching
//!
//! Retrieved snippets are matched against ground-truth snippets, either by
//! exact equality or by ROUGE-L recall above a threshold:
//!
//! - **precision** = matching (retrieved, reference) pairs / retrieved snippets
//! - **recall** = distinct matched references / distinct references
//! - **f1** = harmonic mean, 0 when both are 0
//!
//! Every matching pair counts toward precision, so a retrieved snippet that
//! matches two references counts twice.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rageval_evals::evaluators::context_match::ContextPrecisionRecallF1;
//!
//! let metric = ContextPrecisionRecallF1::from_parameters(true, "lcs", 0.3)?;
//! let result = metric.compute(&case)?;
//! ```

use async_trait::async_trait;
use rageval_core::{
    lcs_overlap_with, split_sentences, CaseField, EvalCase, Extra, LcsScorer, MetricValue,
    PrecisionRecallF1Result, RougeL,
};
use std::collections::HashSet;
use std::fmt;

use crate::{EvalError, Metric};

pub const DEFAULT_LCS_THRESHOLD: f64 = 0.8;

const REQUIRED_FIELDS: &[CaseField] = &[CaseField::RetrievedContexts, CaseField::ReferenceContexts];

/// How a retrieved snippet is matched against a reference snippet
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MatchStrategy {
    /// Byte-for-byte equality
    #[default]
    Exact,
    /// ROUGE-L recall of the retrieved snippet against the reference >= threshold
    Lcs { threshold: f64 },
}

impl MatchStrategy {
    pub fn lcs() -> Self {
        MatchStrategy::Lcs {
            threshold: DEFAULT_LCS_THRESHOLD,
        }
    }
}

/// Precision/recall/F1 of retrieved contexts against reference contexts
pub struct ContextPrecisionRecallF1 {
    split_to_sentence: bool,
    strategy: MatchStrategy,
    scorer: Box<dyn LcsScorer>,
}

impl fmt::Debug for ContextPrecisionRecallF1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPrecisionRecallF1")
            .field("split_to_sentence", &self.split_to_sentence)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Default for ContextPrecisionRecallF1 {
    fn default() -> Self {
        Self::new(false, MatchStrategy::Exact)
    }
}

impl ContextPrecisionRecallF1 {
    pub fn new(split_to_sentence: bool, strategy: MatchStrategy) -> Self {
        Self {
            split_to_sentence,
            strategy,
            scorer: Box::new(RougeL::new()),
        }
    }

    /// Build from a strategy name: `"exact"`, or `"lcs"` / `"rouge"`
    pub fn from_parameters(
        split_to_sentence: bool,
        strategy: &str,
        threshold: f64,
    ) -> Result<Self, EvalError> {
        let strategy = match strategy {
            "exact" => MatchStrategy::Exact,
            "lcs" | "rouge" => {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(EvalError::Configuration(format!(
                        "LCS threshold {threshold} is outside [0, 1]"
                    )));
                }
                MatchStrategy::Lcs { threshold }
            }
            other => {
                return Err(EvalError::Configuration(format!(
                    "Invalid match strategy: {other}"
                )))
            }
        };
        Ok(Self::new(split_to_sentence, strategy))
    }

    /// Replace the LCS scorer used by [`MatchStrategy::Lcs`]
    pub fn with_scorer(mut self, scorer: Box<dyn LcsScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    fn is_match(&self, retrieved: &str, reference: &str) -> bool {
        match self.strategy {
            MatchStrategy::Exact => retrieved == reference,
            MatchStrategy::Lcs { threshold } => {
                lcs_overlap_with(self.scorer.as_ref(), retrieved, reference).recall >= threshold
            }
        }
    }

    fn units(&self, contexts: &[String]) -> Vec<String> {
        if self.split_to_sentence {
            contexts.iter().flat_map(|c| split_sentences(c)).collect()
        } else {
            contexts.to_vec()
        }
    }

    pub fn compute(&self, case: &EvalCase) -> Result<PrecisionRecallF1Result, EvalError> {
        let case = self.refine_case(case)?;
        let retrieved = self.units(&case.retrieved_contexts);
        let references = self.units(&case.reference_contexts);

        let mut num_matches = 0usize;
        let mut matched: HashSet<&str> = HashSet::new();
        for retrieved_context in &retrieved {
            for reference in &references {
                if self.is_match(retrieved_context, reference) {
                    num_matches += 1;
                    matched.insert(reference.as_str());
                }
            }
        }

        let distinct_references: HashSet<&str> = references.iter().map(String::as_str).collect();

        // Sentence splitting can leave either side empty
        let precision = if retrieved.is_empty() {
            0.0
        } else {
            num_matches as f64 / retrieved.len() as f64
        };
        let recall = if distinct_references.is_empty() {
            0.0
        } else {
            matched.len() as f64 / distinct_references.len() as f64
        };
        let f1 = if precision == 0.0 && recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        let mut matched_references: Vec<String> = matched.into_iter().map(str::to_string).collect();
        matched_references.sort();

        let mut extra = Extra::new();
        extra.insert("num_matches".to_string(), MetricValue::Int(num_matches as i64));
        extra.insert(
            "matched_references".to_string(),
            MetricValue::from(matched_references),
        );

        Ok(PrecisionRecallF1Result {
            precision,
            recall,
            f1,
            extra,
        })
    }
}

#[async_trait]
impl Metric for ContextPrecisionRecallF1 {
    type Output = PrecisionRecallF1Result;

    fn id(&self) -> &str {
        "context_precision_recall_f1"
    }

    fn required_fields(&self) -> &[CaseField] {
        REQUIRED_FIELDS
    }

    async fn evaluate(&self, case: &EvalCase) -> Result<PrecisionRecallF1Result, EvalError> {
        self.compute(case)
    }
}
