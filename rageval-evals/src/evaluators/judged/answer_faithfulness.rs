// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Answer faithfulness judged as a label, mapped to a score

use async_trait::async_trait;
use rageval_core::{CaseField, EvalCase, Extra, FaithfulnessResult, MetricValue};
use std::collections::HashMap;
use std::sync::Arc;

use super::reason_value;
use crate::config::EvalSettings;
use crate::llm_client::LLMClient;
use crate::model::{Classifier, ClassifierOptions, ModelSettings};
use crate::{EvalError, Metric};

pub const DEFAULT_FAITHFULNESS_INSTRUCTION: &str =
    "You are tasked to evaluate whether the generated answer is fully supported by the retrieved context.";

const REQUIRED_FIELDS: &[CaseField] = &[
    CaseField::Question,
    CaseField::RetrievedContexts,
    CaseField::GeneratedAnswer,
];

fn default_label_scores() -> HashMap<String, f64> {
    HashMap::from([("Yes".to_string(), 1.0), ("No".to_string(), 0.0)])
}

/// Classifies whether the answer is supported by the retrieved context.
///
/// Every label the classifier can produce must have a score.
pub struct JudgedAnswerFaithfulness {
    classifier: Classifier,
    label_scores: HashMap<String, f64>,
}

impl JudgedAnswerFaithfulness {
    pub fn new(
        mut classifier: Classifier,
        label_scores: HashMap<String, f64>,
    ) -> Result<Self, EvalError> {
        for label in classifier.labels() {
            if !label_scores.contains_key(label) {
                return Err(EvalError::Configuration(format!(
                    "Label '{label}' has no score mapping"
                )));
            }
        }
        for example in classifier.model().examples() {
            let label = &example.expected_output.label;
            if !label_scores.contains_key(label) {
                return Err(EvalError::Configuration(format!(
                    "Few-shot label '{label}' has no score mapping"
                )));
            }
        }

        classifier.model_mut().refine_examples(REQUIRED_FIELDS, &[])?;
        Ok(Self {
            classifier,
            label_scores,
        })
    }

    pub fn defaults(client: Arc<dyn LLMClient>) -> Result<Self, EvalError> {
        let classifier = Classifier::new(
            ModelSettings::new(DEFAULT_FAITHFULNESS_INSTRUCTION),
            ClassifierOptions::default(),
            vec![],
            client,
        )?;
        Self::new(classifier, default_label_scores())
    }

    pub fn from_settings(
        settings: &EvalSettings,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        let classifier = Classifier::new(
            settings.model_settings(DEFAULT_FAITHFULNESS_INSTRUCTION),
            ClassifierOptions::default(),
            vec![],
            client,
        )?;
        Self::new(classifier, default_label_scores())
    }

    pub fn label_scores(&self) -> &HashMap<String, f64> {
        &self.label_scores
    }

    pub fn classifier_mut(&mut self) -> &mut Classifier {
        &mut self.classifier
    }
}

#[async_trait]
impl Metric for JudgedAnswerFaithfulness {
    type Output = FaithfulnessResult;

    fn id(&self) -> &str {
        "judged_answer_faithfulness"
    }

    fn required_fields(&self) -> &[CaseField] {
        REQUIRED_FIELDS
    }

    async fn evaluate(&self, case: &EvalCase) -> Result<FaithfulnessResult, EvalError> {
        let case = self.refine_case(case)?;
        let output = self.classifier.classify(&case).await?;

        // decoded labels are always members of the label set
        let faithfulness = *self.label_scores.get(&output.label).ok_or_else(|| {
            EvalError::Internal(format!("Label '{}' has no score mapping", output.label))
        })?;

        let mut extra = Extra::new();
        extra.insert("label".to_string(), MetricValue::String(output.label));
        extra.insert("reason".to_string(), reason_value(output.reason));
        Ok(FaithfulnessResult {
            faithfulness,
            extra,
        })
    }
}
