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

use async_trait::async_trait;
use rageval_core::{CaseField, EvalCase, Extra, RelevanceResult};
use std::sync::Arc;

use super::reason_value;
use crate::config::EvalSettings;
use crate::llm_client::LLMClient;
use crate::model::{ModelSettings, Scorer, ScorerOptions};
use crate::{EvalError, Metric};

pub const DEFAULT_RELEVANCE_INSTRUCTION: &str = "\
You are an expert evaluator system for a question answering system.
You need to evaluate the relevance and completeness of the generated answer based on the question.
Use the following guidelines for evaluation:
* score between 1 to 3.
* 1 means that the answer is completely irrelevant to the question.
* 2 means that the answer is partially relevant to the question or it only partially answers the question.
* 3 means that the answer is relevant to the question and completely answers the question.
";

const REQUIRED_FIELDS: &[CaseField] = &[CaseField::Question, CaseField::GeneratedAnswer];

/// Relevance of the generated answer to the question, 1-3 normalized
pub struct JudgedAnswerRelevance {
    scorer: Scorer,
}

impl JudgedAnswerRelevance {
    pub fn new(mut scorer: Scorer) -> Result<Self, EvalError> {
        scorer.model_mut().refine_examples(REQUIRED_FIELDS, &[])?;
        Ok(Self { scorer })
    }

    pub fn defaults(client: Arc<dyn LLMClient>) -> Result<Self, EvalError> {
        Self::new(Scorer::new(
            ModelSettings::new(DEFAULT_RELEVANCE_INSTRUCTION),
            ScorerOptions::new(1.0, 3.0),
            vec![],
            client,
        )?)
    }

    pub fn from_settings(
        settings: &EvalSettings,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        Self::new(Scorer::new(
            settings.model_settings(DEFAULT_RELEVANCE_INSTRUCTION),
            ScorerOptions::new(1.0, 3.0),
            vec![],
            client,
        )?)
    }

    pub fn scorer_mut(&mut self) -> &mut Scorer {
        &mut self.scorer
    }
}

#[async_trait]
impl Metric for JudgedAnswerRelevance {
    type Output = RelevanceResult;

    fn id(&self) -> &str {
        "judged_answer_relevance"
    }

    fn required_fields(&self) -> &[CaseField] {
        REQUIRED_FIELDS
    }

    async fn evaluate(&self, case: &EvalCase) -> Result<RelevanceResult, EvalError> {
        let case = self.refine_case(case)?;
        let output = self.scorer.score(&case).await?;

        let mut extra = Extra::new();
        extra.insert("reason".to_string(), reason_value(output.reason));
        Ok(RelevanceResult {
            relevance: output.score,
            extra,
        })
    }
}
