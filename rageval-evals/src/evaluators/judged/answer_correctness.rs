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

//! Answer correctness judged against the reference answer

use async_trait::async_trait;
use rageval_core::{CaseField, CorrectnessResult, EvalCase, Extra};
use std::sync::Arc;

use super::reason_value;
use crate::config::EvalSettings;
use crate::llm_client::LLMClient;
use crate::model::{ModelSettings, Scorer, ScorerOptions};
use crate::{EvalError, Metric};

pub const DEFAULT_CORRECTNESS_INSTRUCTION: &str = "\
You are an expert evaluator system for a question answering system.
You need to evaluate the quality of the generated answer based on the question and reference ground truth answer.
Output concise reasons and scores.
Use the following guidelines for evaluation:
* You should output a single score between 1 to 5.
* 1 means that the answer is completely irrelevant to the question.
* 2 means that the answer is relevant to the question but contains major errors.
* 3 means that the answer is relevant to the question and is partially correct.
* 4 means that the answer is relevant to the question and is correct.
* 5 means that the answer is relevant to the question and is correct and complete.
";

const REQUIRED_FIELDS: &[CaseField] = &[
    CaseField::Question,
    CaseField::ReferenceAnswer,
    CaseField::GeneratedAnswer,
];

/// Scores the generated answer on a 1-5 scale, normalized to [0, 1]
pub struct JudgedAnswerCorrectness {
    scorer: Scorer,
}

impl JudgedAnswerCorrectness {
    pub fn new(mut scorer: Scorer) -> Result<Self, EvalError> {
        scorer.model_mut().refine_examples(REQUIRED_FIELDS, &[])?;
        Ok(Self { scorer })
    }

    pub fn defaults(client: Arc<dyn LLMClient>) -> Result<Self, EvalError> {
        Self::with_model_settings(ModelSettings::new(DEFAULT_CORRECTNESS_INSTRUCTION), client)
    }

    pub fn from_settings(
        settings: &EvalSettings,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        Self::with_model_settings(settings.model_settings(DEFAULT_CORRECTNESS_INSTRUCTION), client)
    }

    fn with_model_settings(
        settings: ModelSettings,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        Self::new(Scorer::new(settings, ScorerOptions::new(1.0, 5.0), vec![], client)?)
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn scorer_mut(&mut self) -> &mut Scorer {
        &mut self.scorer
    }
}

#[async_trait]
impl Metric for JudgedAnswerCorrectness {
    type Output = CorrectnessResult;

    fn id(&self) -> &str {
        "judged_answer_correctness"
    }

    fn required_fields(&self) -> &[CaseField] {
        REQUIRED_FIELDS
    }

    async fn evaluate(&self, case: &EvalCase) -> Result<CorrectnessResult, EvalError> {
        let case = self.refine_case(case)?;
        let output = self.scorer.score(&case).await?;

        let mut extra = Extra::new();
        extra.insert("reason".to_string(), reason_value(output.reason));
        Ok(CorrectnessResult {
            correctness: output.score,
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::ScriptedClient;
    use crate::model::ScoreOutput;
    use rageval_core::{FewShotExample, MetricValue};

    fn case() -> EvalCase {
        EvalCase::new()
            .with_question("What is the capital of France?")
            .with_reference_answer("Paris")
            .with_retrieved_contexts(["ignored"])
            .with_generated_answer("Paris.")
    }

    #[tokio::test]
    async fn test_correctness_normalized() {
        let client = Arc::new(ScriptedClient::new(["{\"score\": 4}"]));
        let metric = JudgedAnswerCorrectness::defaults(client.clone()).unwrap();

        let result = metric.evaluate(&case()).await.unwrap();
        assert!((result.correctness - 0.75).abs() < 1e-12);
        assert_eq!(
            result.extra["reason"],
            MetricValue::Json(serde_json::Value::Null)
        );

        // retrieved contexts are not part of the prompt
        let calls = client.calls.lock().unwrap();
        assert!(!calls[0].last().unwrap().content.contains("ignored"));
    }

    #[tokio::test]
    async fn test_correctness_with_reason() {
        let client = Arc::new(ScriptedClient::new([
            "{\"reason\": \"matches the reference\", \"score\": 5}",
        ]));
        let scorer = Scorer::new(
            ModelSettings::new(DEFAULT_CORRECTNESS_INSTRUCTION),
            ScorerOptions::new(1.0, 5.0).with_cot(true),
            vec![],
            client,
        )
        .unwrap();
        let metric = JudgedAnswerCorrectness::new(scorer).unwrap();

        let result = metric.evaluate(&case()).await.unwrap();
        assert_eq!(result.correctness, 1.0);
        assert_eq!(
            result.extra["reason"],
            MetricValue::String("matches the reference".to_string())
        );
    }

    #[test]
    fn test_example_missing_field_is_configuration_error() {
        let example = FewShotExample::new(
            EvalCase::new().with_question("q").with_generated_answer("a"),
            ScoreOutput::new(3.0),
        );
        let scorer = Scorer::new(
            ModelSettings::new("x"),
            ScorerOptions::new(1.0, 5.0),
            vec![example],
            Arc::new(ScriptedClient::new(Vec::<String>::new())),
        )
        .unwrap();

        assert!(matches!(
            JudgedAnswerCorrectness::new(scorer),
            Err(EvalError::Configuration(_))
        ));
    }
}
