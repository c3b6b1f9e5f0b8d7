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

//! Context coverage
//!
//! The generated answer is broken into statements, each attributed to the
//! retrieved context or not. Coverage is the share of supported statements.

use async_trait::async_trait;
use rageval_core::{CaseField, CoverageResult, EvalCase, Extra, MetricValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::EvalSettings;
use crate::llm_client::LLMClient;
use crate::model::{Extractor, FieldSpec, ModelSettings, OutputSchema, Shape};
use crate::{EvalError, Metric};

pub const DEFAULT_COVERAGE_INSTRUCTION: &str = "Given a question, context, and answer, analyze each statement in the answer and classify if the statement can be attributed to the given context or not.";

const REQUIRED_FIELDS: &[CaseField] = &[
    CaseField::Question,
    CaseField::RetrievedContexts,
    CaseField::GeneratedAnswer,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Support {
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerStatement {
    pub statement: String,
    pub reason: String,
    pub supported: Support,
}

/// Array of `{statement, reason, supported}` records
pub fn answer_statements_schema() -> OutputSchema {
    OutputSchema::new(
        "AnswerStatements",
        Shape::list_of(Shape::Record(vec![
            FieldSpec::new("statement", Shape::Text),
            FieldSpec::new("reason", Shape::Text),
            FieldSpec::new("supported", Shape::one_of(["Yes", "No"])),
        ])),
    )
}

pub struct JudgedContextCoverage {
    extractor: Extractor<Vec<AnswerStatement>>,
}

impl JudgedContextCoverage {
    /// The extractor must use [`answer_statements_schema`]
    pub fn new(mut extractor: Extractor<Vec<AnswerStatement>>) -> Result<Self, EvalError> {
        if extractor.model().schema() != &answer_statements_schema() {
            return Err(EvalError::Configuration(
                "Context coverage needs the AnswerStatements output format".to_string(),
            ));
        }
        extractor.model_mut().refine_examples(REQUIRED_FIELDS, &[])?;
        Ok(Self { extractor })
    }

    pub fn defaults(client: Arc<dyn LLMClient>) -> Result<Self, EvalError> {
        Self::new(Extractor::new(
            ModelSettings::new(DEFAULT_COVERAGE_INSTRUCTION),
            answer_statements_schema(),
            vec![],
            client,
        )?)
    }

    pub fn from_settings(
        settings: &EvalSettings,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        Self::new(Extractor::new(
            settings.model_settings(DEFAULT_COVERAGE_INSTRUCTION),
            answer_statements_schema(),
            vec![],
            client,
        )?)
    }

    pub fn extractor_mut(&mut self) -> &mut Extractor<Vec<AnswerStatement>> {
        &mut self.extractor
    }

    fn result(coverage: f64, statements: &[AnswerStatement]) -> Result<CoverageResult, EvalError> {
        let mut extra = Extra::new();
        extra.insert(
            "answer_statements".to_string(),
            MetricValue::Json(serde_json::to_value(statements)?),
        );
        Ok(CoverageResult { coverage, extra })
    }
}

#[async_trait]
impl Metric for JudgedContextCoverage {
    type Output = CoverageResult;

    fn id(&self) -> &str {
        "judged_context_coverage"
    }

    fn required_fields(&self) -> &[CaseField] {
        REQUIRED_FIELDS
    }

    async fn evaluate(&self, case: &EvalCase) -> Result<CoverageResult, EvalError> {
        if case.retrieved_contexts.is_empty() {
            return Self::result(0.0, &[]);
        }
        let case = self.refine_case(case)?;
        let statements = self.extractor.extract(&case).await?;
        if statements.is_empty() {
            return Self::result(0.0, &statements);
        }

        let supported = statements
            .iter()
            .filter(|s| s.supported == Support::Yes)
            .count();
        Self::result(supported as f64 / statements.len() as f64, &statements)
    }
}
