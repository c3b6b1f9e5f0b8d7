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

//! Scorer, classifier and extractor presets
//!
//! | Preset       | Output          | Extra validation                     |
//! |--------------|-----------------|--------------------------------------|
//! | `Scorer`     | `ScoreOutput`   | range well-formed, examples in range |
//! | `Classifier` | `LabelOutput`   | non-empty labels, examples in set    |
//!
//! Scorer and classifier examples may leave out `reason` even in
//! chain-of-thought mode.
//! | `Extractor`  | caller-defined  | examples match the schema            |

use rageval_core::{EvalCase, FewShotExample};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::schema::{FieldSpec, OutputSchema, Shape};
use super::{ModelSettings, StructuredModel};
use crate::llm_client::LLMClient;
use crate::EvalError;

pub const COT_REASON_DESCRIPTION: &str =
    "Think step by step. First write your reason, then give the final answer.";

fn reason_field() -> FieldSpec {
    FieldSpec::new("reason", Shape::Text).with_description(COT_REASON_DESCRIPTION)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub score: f64,
}

impl ScoreOutput {
    pub fn new(score: f64) -> Self {
        Self {
            reason: None,
            score,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub label: String,
}

impl LabelOutput {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            reason: None,
            label: label.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerOptions {
    pub range: (f64, f64),
    /// Map scores onto [0, 1]
    pub normalize: bool,
    /// Ask for a reason before the score
    pub cot: bool,
}

impl ScorerOptions {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self {
            range: (lo, hi),
            normalize: true,
            cot: false,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_cot(mut self, cot: bool) -> Self {
        self.cot = cot;
        self
    }
}

/// Numeric judgment within a declared range
pub struct Scorer {
    model: StructuredModel<ScoreOutput>,
    options: ScorerOptions,
}

impl Scorer {
    pub fn new(
        settings: ModelSettings,
        options: ScorerOptions,
        examples: Vec<FewShotExample<ScoreOutput>>,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        let (lo, hi) = options.range;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(EvalError::Configuration(format!(
                "Score range ({lo}, {hi}) must satisfy lo < hi"
            )));
        }
        for example in &examples {
            let score = example.expected_output.score;
            if !(lo..=hi).contains(&score) {
                return Err(EvalError::Configuration(format!(
                    "Score {score} is not in the range ({lo}, {hi})"
                )));
            }
        }

        let mut fields = Vec::with_capacity(2);
        if options.cot {
            fields.push(reason_field());
        }
        fields.push(FieldSpec::new("score", Shape::bounded(lo, hi)));
        let schema = OutputSchema::record("ScoreOutput", fields);

        Ok(Self {
            model: StructuredModel::with_checked_examples(settings, schema, examples, client),
            options,
        })
    }

    pub fn options(&self) -> &ScorerOptions {
        &self.options
    }

    pub fn model(&self) -> &StructuredModel<ScoreOutput> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut StructuredModel<ScoreOutput> {
        &mut self.model
    }

    /// `(score - lo) / (hi - lo)` when normalization is on, else `score`
    pub fn normalize(&self, score: f64) -> f64 {
        if !self.options.normalize {
            return score;
        }
        let (lo, hi) = self.options.range;
        (score - lo) / (hi - lo)
    }

    pub async fn score(&self, case: &EvalCase) -> Result<ScoreOutput, EvalError> {
        let mut output = self.model.infer(case).await?;
        output.score = self.normalize(output.score);
        Ok(output)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOptions {
    pub labels: Vec<String>,
    pub cot: bool,
}

impl ClassifierOptions {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            cot: false,
        }
    }

    pub fn with_cot(mut self, cot: bool) -> Self {
        self.cot = cot;
        self
    }
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self::new(["Yes", "No"])
    }
}

/// Label from a closed set
pub struct Classifier {
    model: StructuredModel<LabelOutput>,
    labels: Vec<String>,
}

impl Classifier {
    pub fn new(
        settings: ModelSettings,
        options: ClassifierOptions,
        examples: Vec<FewShotExample<LabelOutput>>,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        let mut labels: Vec<String> = Vec::with_capacity(options.labels.len());
        for label in options.labels {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        if labels.is_empty() {
            return Err(EvalError::Configuration(
                "Label set must not be empty".to_string(),
            ));
        }
        for example in &examples {
            if !labels.contains(&example.expected_output.label) {
                return Err(EvalError::Configuration(format!(
                    "Label '{}' is not in the label set",
                    example.expected_output.label
                )));
            }
        }

        let mut fields = Vec::with_capacity(2);
        if options.cot {
            fields.push(reason_field());
        }
        fields.push(FieldSpec::new("label", Shape::OneOf(labels.clone())));
        let schema = OutputSchema::record("LabelOutput", fields);

        Ok(Self {
            model: StructuredModel::with_checked_examples(settings, schema, examples, client),
            labels,
        })
    }

    /// Distinct labels in declaration order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn model(&self) -> &StructuredModel<LabelOutput> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut StructuredModel<LabelOutput> {
        &mut self.model
    }

    pub async fn classify(&self, case: &EvalCase) -> Result<LabelOutput, EvalError> {
        self.model.infer(case).await
    }
}

/// Arbitrary structured extraction
pub struct Extractor<T> {
    model: StructuredModel<T>,
}

impl<T> Extractor<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(
        settings: ModelSettings,
        schema: OutputSchema,
        examples: Vec<FewShotExample<T>>,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        Ok(Self {
            model: StructuredModel::new(settings, schema, examples, client)?,
        })
    }

    pub fn model(&self) -> &StructuredModel<T> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut StructuredModel<T> {
        &mut self.model
    }

    pub async fn extract(&self, case: &EvalCase) -> Result<T, EvalError> {
        self.model.infer(case).await
    }
}
