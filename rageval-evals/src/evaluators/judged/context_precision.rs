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

//! Ranked context precision
//!
//! Each retrieved context is judged useful or not, one classifier call per
//! context in rank order. The judgments aggregate into precision@k and
//! average precision.

use async_trait::async_trait;
use rageval_core::{CaseField, EvalCase, Extra, MetricValue, PrecisionResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::reason_value;
use crate::config::EvalSettings;
use crate::llm_client::LLMClient;
use crate::model::{Classifier, ClassifierOptions, ModelSettings};
use crate::{EvalError, Metric};

pub const DEFAULT_CONTEXT_PRECISION_INSTRUCTION: &str = "\
Verify if the information in the given context is useful in answering the question.
if the information is useful, label is \"Yes\", otherwise \"No\".
";

const REQUIRED_FIELDS: &[CaseField] = &[CaseField::Question, CaseField::RetrievedContexts];

const POSITIVE_LABEL: &str = "Yes";

pub struct JudgedContextPrecision {
    classifier: Classifier,
}

impl JudgedContextPrecision {
    /// The classifier's label set must be exactly {Yes, No}
    pub fn new(mut classifier: Classifier) -> Result<Self, EvalError> {
        let labels = classifier.labels();
        let is_binary = labels.len() == 2
            && labels.iter().any(|l| l == "Yes")
            && labels.iter().any(|l| l == "No");
        if !is_binary {
            return Err(EvalError::Configuration(
                "The label set of the model must be {Yes, No}".to_string(),
            ));
        }
        classifier.model_mut().refine_examples(REQUIRED_FIELDS, &[])?;
        Ok(Self { classifier })
    }

    pub fn defaults(client: Arc<dyn LLMClient>) -> Result<Self, EvalError> {
        Self::new(Classifier::new(
            ModelSettings::new(DEFAULT_CONTEXT_PRECISION_INSTRUCTION),
            ClassifierOptions::default(),
            vec![],
            client,
        )?)
    }

    pub fn from_settings(
        settings: &EvalSettings,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        Self::new(Classifier::new(
            settings.model_settings(DEFAULT_CONTEXT_PRECISION_INSTRUCTION),
            ClassifierOptions::default(),
            vec![],
            client,
        )?)
    }

    pub fn classifier_mut(&mut self) -> &mut Classifier {
        &mut self.classifier
    }
}

#[async_trait]
impl Metric for JudgedContextPrecision {
    type Output = PrecisionResult;

    fn id(&self) -> &str {
        "judged_context_precision"
    }

    fn required_fields(&self) -> &[CaseField] {
        REQUIRED_FIELDS
    }

    async fn evaluate(&self, case: &EvalCase) -> Result<PrecisionResult, EvalError> {
        let case = self.refine_case(case)?;

        let mut judgments = Vec::with_capacity(case.retrieved_contexts.len());
        let mut verifications = Vec::with_capacity(case.retrieved_contexts.len());
        for (rank, context) in case.retrieved_contexts.iter().enumerate() {
            let output = self
                .classifier
                .classify(&case.with_single_retrieved_context(context))
                .await?;
            debug!(rank = rank + 1, label = %output.label, "Context judged");

            judgments.push(output.label == POSITIVE_LABEL);

            let mut verification = HashMap::new();
            verification.insert("label".to_string(), MetricValue::String(output.label));
            verification.insert("reason".to_string(), reason_value(output.reason));
            verifications.push(MetricValue::Object(verification));
        }

        let mut extra = Extra::new();
        extra.insert("verifications".to_string(), MetricValue::Array(verifications));
        Ok(PrecisionResult::from_judgments(&judgments, extra))
    }
}
