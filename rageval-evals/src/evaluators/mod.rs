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

//! Built-in RAG metrics
//!
//! `context_match` and `lexical` are deterministic string metrics. The
//! `judged` metrics ask a language model through a structured output model.

pub mod context_match;
pub mod judged;
pub mod lexical;

pub use context_match::{ContextPrecisionRecallF1, MatchStrategy, DEFAULT_LCS_THRESHOLD};
pub use judged::{
    AnswerStatement, JudgedAnswerCorrectness, JudgedAnswerFaithfulness, JudgedAnswerRelevance,
    JudgedContextCoverage, JudgedContextPrecision, Support,
};
pub use lexical::{LexicalAnswerCorrectness, LexicalAnswerFaithfulness, LexicalMeasure};
