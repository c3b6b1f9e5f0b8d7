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

//! Lexical answer metrics
//!
//! Deterministic answer correctness and faithfulness from word overlap or
//! ROUGE-L. Cheap and reproducible, suitable for regression suites where a
//! judge model is too slow or too noisy.

use async_trait::async_trait;
use rageval_core::{
    lcs_overlap, split_sentences, word_overlap, CaseField, CorrectnessResult, EvalCase, Extra,
    FaithfulnessResult, MetricValue, OverlapScore,
};
use std::collections::HashMap;

use crate::{EvalError, Metric};

pub const DEFAULT_FAITHFULNESS_THRESHOLD: f64 = 0.5;

/// Similarity primitive behind a lexical metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexicalMeasure {
    #[default]
    WordOverlap,
    /// ROUGE-L
    Lcs,
}

impl LexicalMeasure {
    pub fn score(&self, text: &str, reference: &str) -> OverlapScore {
        match self {
            LexicalMeasure::WordOverlap => word_overlap(text, reference),
            LexicalMeasure::Lcs => lcs_overlap(text, reference),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LexicalMeasure::WordOverlap => "word_overlap",
            LexicalMeasure::Lcs => "lcs",
        }
    }
}

/// Answer correctness as the F1 of the generated answer against the reference
#[derive(Debug, Clone)]
pub struct LexicalAnswerCorrectness {
    measure: LexicalMeasure,
    id: String,
}

impl LexicalAnswerCorrectness {
    pub fn new(measure: LexicalMeasure) -> Self {
        Self {
            measure,
            id: format!("{}_answer_correctness", measure.as_str()),
        }
    }

    pub fn compute(&self, case: &EvalCase) -> Result<CorrectnessResult, EvalError> {
        let case = self.refine_case(case)?;
        let score = self.measure.score(&case.generated_answer, &case.reference_answer);

        let mut extra = Extra::new();
        extra.insert("precision".to_string(), MetricValue::Float(score.precision));
        extra.insert("recall".to_string(), MetricValue::Float(score.recall));

        Ok(CorrectnessResult {
            correctness: score.f1,
            extra,
        })
    }
}

#[async_trait]
impl Metric for LexicalAnswerCorrectness {
    type Output = CorrectnessResult;

    fn id(&self) -> &str {
        &self.id
    }

    fn required_fields(&self) -> &[CaseField] {
        &[CaseField::ReferenceAnswer, CaseField::GeneratedAnswer]
    }

    async fn evaluate(&self, case: &EvalCase) -> Result<CorrectnessResult, EvalError> {
        self.compute(case)
    }
}

/// Share of generated-answer sentences lexically supported by the retrieved
/// contexts.
///
/// A sentence is faithful when its precision against all retrieved contexts
/// joined by newlines is strictly above the threshold.
#[derive(Debug, Clone)]
pub struct LexicalAnswerFaithfulness {
    measure: LexicalMeasure,
    threshold: f64,
    id: String,
}

impl LexicalAnswerFaithfulness {
    pub fn new(measure: LexicalMeasure) -> Self {
        Self {
            measure,
            threshold: DEFAULT_FAITHFULNESS_THRESHOLD,
            id: format!("{}_answer_faithfulness", measure.as_str()),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn compute(&self, case: &EvalCase) -> Result<FaithfulnessResult, EvalError> {
        let case = self.refine_case(case)?;
        let context = case.retrieved_contexts.join("\n");
        let sentences = split_sentences(&case.generated_answer);

        let mut faithful = Vec::new();
        let mut non_faithful = Vec::new();
        let mut sentence_scores = Vec::with_capacity(sentences.len());
        for sentence in &sentences {
            let precision = self.measure.score(sentence, &context).precision;
            if precision > self.threshold {
                faithful.push(sentence.clone());
            } else {
                non_faithful.push(sentence.clone());
            }

            let mut entry = HashMap::new();
            entry.insert("sentence".to_string(), MetricValue::from(sentence.as_str()));
            entry.insert("score".to_string(), MetricValue::Float(precision));
            sentence_scores.push(MetricValue::Object(entry));
        }

        let faithfulness = if sentences.is_empty() {
            0.0
        } else {
            faithful.len() as f64 / sentences.len() as f64
        };

        let mut extra = Extra::new();
        extra.insert("faithful_sentences".to_string(), MetricValue::from(faithful));
        extra.insert(
            "non_faithful_sentences".to_string(),
            MetricValue::from(non_faithful),
        );
        extra.insert("sentence_scores".to_string(), MetricValue::Array(sentence_scores));

        Ok(FaithfulnessResult {
            faithfulness,
            extra,
        })
    }
}

#[async_trait]
impl Metric for LexicalAnswerFaithfulness {
    type Output = FaithfulnessResult;

    fn id(&self) -> &str {
        &self.id
    }

    fn required_fields(&self) -> &[CaseField] {
        &[CaseField::GeneratedAnswer, CaseField::RetrievedContexts]
    }

    async fn evaluate(&self, case: &EvalCase) -> Result<FaithfulnessResult, EvalError> {
        self.compute(case)
    }
}
