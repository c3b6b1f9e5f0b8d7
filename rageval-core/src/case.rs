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

//! Evaluation cases
//!
//! An [`EvalCase`] is a snapshot of one question-answering interaction. Every
//! field is optional; metrics declare which ones they need and narrow the case
//! down to exactly those fields before computing anything (see
//! [`EvalCase::refine`]).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MissingFieldError;

/// One QA interaction: question, ground truth, retrieval and generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalCase {
    /// The user question
    pub question: String,

    /// Ground-truth context snippets
    #[serde(alias = "contexts")]
    pub reference_contexts: Vec<String>,

    /// Ground-truth answer
    #[serde(alias = "answer")]
    pub reference_answer: String,

    /// Context snippets returned by the retriever, in rank order
    pub retrieved_contexts: Vec<String>,

    /// Answer produced by the pipeline under evaluation
    pub generated_answer: String,
}

/// Names of the fields of an [`EvalCase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseField {
    Question,
    ReferenceContexts,
    ReferenceAnswer,
    RetrievedContexts,
    GeneratedAnswer,
}

impl CaseField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseField::Question => "question",
            CaseField::ReferenceContexts => "reference_contexts",
            CaseField::ReferenceAnswer => "reference_answer",
            CaseField::RetrievedContexts => "retrieved_contexts",
            CaseField::GeneratedAnswer => "generated_answer",
        }
    }
}

impl fmt::Display for CaseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EvalCase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }

    pub fn with_reference_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reference_contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reference_answer(mut self, answer: impl Into<String>) -> Self {
        self.reference_answer = answer.into();
        self
    }

    pub fn with_retrieved_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retrieved_contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_generated_answer(mut self, answer: impl Into<String>) -> Self {
        self.generated_answer = answer.into();
        self
    }

    /// Whether `field` carries a value. Blank strings and empty lists do not.
    pub fn has(&self, field: CaseField) -> bool {
        match field {
            CaseField::Question => !self.question.trim().is_empty(),
            CaseField::ReferenceContexts => !self.reference_contexts.is_empty(),
            CaseField::ReferenceAnswer => !self.reference_answer.trim().is_empty(),
            CaseField::RetrievedContexts => !self.retrieved_contexts.is_empty(),
            CaseField::GeneratedAnswer => !self.generated_answer.trim().is_empty(),
        }
    }

    fn copy_field(&self, target: &mut EvalCase, field: CaseField) {
        match field {
            CaseField::Question => target.question = self.question.clone(),
            CaseField::ReferenceContexts => {
                target.reference_contexts = self.reference_contexts.clone()
            }
            CaseField::ReferenceAnswer => target.reference_answer = self.reference_answer.clone(),
            CaseField::RetrievedContexts => {
                target.retrieved_contexts = self.retrieved_contexts.clone()
            }
            CaseField::GeneratedAnswer => target.generated_answer = self.generated_answer.clone(),
        }
    }

    /// Build a narrowed copy holding only `required` and `optional` fields.
    ///
    /// Fails on the first required field that is empty. Optional fields are
    /// copied as they are, empty or not.
    pub fn refine(
        &self,
        required: &[CaseField],
        optional: &[CaseField],
    ) -> Result<EvalCase, MissingFieldError> {
        let mut refined = EvalCase::default();
        for &field in required {
            if !self.has(field) {
                return Err(MissingFieldError::new(field));
            }
            self.copy_field(&mut refined, field);
        }
        for &field in optional {
            self.copy_field(&mut refined, field);
        }
        Ok(refined)
    }

    /// Copy of this case whose retrieved contexts are exactly `[context]`
    pub fn with_single_retrieved_context(&self, context: &str) -> EvalCase {
        EvalCase {
            retrieved_contexts: vec![context.to_string()],
            ..self.clone()
        }
    }
}

/// Few-shot demonstration: a case and the output the model should produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample<T> {
    pub case: EvalCase,
    pub expected_output: T,
}

impl<T> FewShotExample<T> {
    pub fn new(case: EvalCase, expected_output: T) -> Self {
        Self {
            case,
            expected_output,
        }
    }
}
