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

//! # Rageval Metrics
//!
//! Metrics for retrieval-augmented question answering.
//!
//! ## Features
//!
//! - **Trait-based metric system**: every metric implements [`Metric`]
//! - **Deterministic metrics**: context precision/recall/F1, lexical answer
//!   correctness and faithfulness
//! - **Model-judged metrics**: answer correctness, relevance and faithfulness,
//!   context coverage and ranked context precision
//! - **Structured decoding**: schema-checked replies with a bounded reask loop
//!
//! ## Example
//!
//! ```rust,ignore
//! use rageval_core::EvalCase;
//! use rageval_evals::evaluators::judged::JudgedAnswerCorrectness;
//! use rageval_evals::llm_client::OpenAIClient;
//! use rageval_evals::Metric;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(OpenAIClient::new(
//!         std::env::var("OPENAI_API_KEY")?,
//!         "gpt-4-turbo-preview".to_string(),
//!     ));
//!     let metric = JudgedAnswerCorrectness::defaults(client)?;
//!
//!     let case = EvalCase::new()
//!         .with_question("What is the capital of France?")
//!         .with_reference_answer("Paris")
//!         .with_generated_answer("The capital of France is Paris.");
//!     let result = metric.evaluate(&case).await?;
//!     println!("correctness = {}", result.correctness);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use rageval_core::{CaseField, EvalCase, MissingFieldError};
use thiserror::Error;

pub mod config;
pub mod evaluators;
pub mod llm_client;
pub mod model;

pub use config::{EvalSettings, LlmSettings, ModelDefaults};
pub use evaluators::context_match::{
    ContextPrecisionRecallF1, MatchStrategy, DEFAULT_LCS_THRESHOLD,
};
pub use evaluators::judged::{
    JudgedAnswerCorrectness, JudgedAnswerFaithfulness, JudgedAnswerRelevance,
    JudgedContextCoverage, JudgedContextPrecision,
};
pub use evaluators::lexical::{LexicalAnswerCorrectness, LexicalAnswerFaithfulness, LexicalMeasure};
pub use llm_client::{
    AnthropicClient, ClientFactory, GenerationParams, LLMClient, LLMError, LLMResponse,
    OpenAIClient, ProviderClientFactory, TokenUsage,
};
pub use model::{
    Classifier, Extractor, FieldSpec, LabelOutput, ModelSettings, OutputSchema, ReaskEvent,
    ReaskLoop, ReaskState, ScoreOutput, Scorer, Shape, StructuredModel,
};

/// Core trait that all metrics implement
#[async_trait]
pub trait Metric: Send + Sync {
    /// Typed result produced by this metric
    type Output: Send;

    /// Stable identifier (e.g., "context_precision_recall_f1")
    fn id(&self) -> &str;

    /// Fields that must be non-empty for the metric to run
    fn required_fields(&self) -> &[CaseField];

    /// Fields copied into the refined case when present
    fn optional_fields(&self) -> &[CaseField] {
        &[]
    }

    /// Narrow `case` down to the declared fields
    fn refine_case(&self, case: &EvalCase) -> Result<EvalCase, EvalError> {
        Ok(case.refine(self.required_fields(), self.optional_fields())?)
    }

    /// Evaluate a single case
    async fn evaluate(&self, case: &EvalCase) -> Result<Self::Output, EvalError>;
}

/// Errors that can occur during evaluation
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("No valid structured output after {attempts} attempt(s): {message}")]
    StructuredOutput {
        attempts: usize,
        last_reply: String,
        message: String,
    },

    #[error("LLM client error: {0}")]
    Llm(#[from] llm_client::LLMError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeedsQuestion;

    #[async_trait]
    impl Metric for NeedsQuestion {
        type Output = usize;

        fn id(&self) -> &str {
            "needs_question"
        }

        fn required_fields(&self) -> &[CaseField] {
            &[CaseField::Question]
        }

        fn optional_fields(&self) -> &[CaseField] {
            &[CaseField::GeneratedAnswer]
        }

        async fn evaluate(&self, case: &EvalCase) -> Result<usize, EvalError> {
            let case = self.refine_case(case)?;
            Ok(case.question.len())
        }
    }

    #[tokio::test]
    async fn test_refine_case_maps_missing_field() {
        let err = NeedsQuestion.evaluate(&EvalCase::new()).await.unwrap_err();
        match err {
            EvalError::MissingField(e) => assert_eq!(e.field, CaseField::Question),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refine_case_drops_undeclared_fields() {
        let case = EvalCase::new()
            .with_question("q")
            .with_reference_answer("dropped");
        let refined = NeedsQuestion.refine_case(&case).unwrap();
        assert!(refined.reference_answer.is_empty());
        assert_eq!(NeedsQuestion.evaluate(&case).await.unwrap(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = EvalError::StructuredOutput {
            attempts: 3,
            last_reply: "nope".to_string(),
            message: "expected value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No valid structured output after 3 attempt(s): expected value"
        );
    }
}
