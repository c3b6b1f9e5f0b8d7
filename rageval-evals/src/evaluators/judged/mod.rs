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

//! Model-judged metrics
//!
//! Each metric wraps one scoring model preset. Few-shot example cases are
//! narrowed to the metric's fields at construction, so a demonstration that
//! lacks a required field is a configuration error rather than a runtime one.
//!
//! The client given to `defaults` or `from_settings` must have been built for
//! the configured model id, since that id becomes the bound one.

pub mod answer_correctness;
pub mod answer_faithfulness;
pub mod answer_relevance;
pub mod context_coverage;
pub mod context_precision;

pub use answer_correctness::{JudgedAnswerCorrectness, DEFAULT_CORRECTNESS_INSTRUCTION};
pub use answer_faithfulness::{JudgedAnswerFaithfulness, DEFAULT_FAITHFULNESS_INSTRUCTION};
pub use answer_relevance::{JudgedAnswerRelevance, DEFAULT_RELEVANCE_INSTRUCTION};
pub use context_coverage::{
    answer_statements_schema, AnswerStatement, JudgedContextCoverage, Support,
    DEFAULT_COVERAGE_INSTRUCTION,
};
pub use context_precision::{JudgedContextPrecision, DEFAULT_CONTEXT_PRECISION_INSTRUCTION};

use rageval_core::MetricValue;

/// `reason` extra: the text, or null when the model gave none
pub(crate) fn reason_value(reason: Option<String>) -> MetricValue {
    match reason {
        Some(reason) => MetricValue::String(reason),
        None => MetricValue::Json(serde_json::Value::Null),
    }
}
