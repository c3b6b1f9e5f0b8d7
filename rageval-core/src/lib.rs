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

//! Rageval Core
//!
//! Data model shared by the RAG evaluation metrics: evaluation cases, typed
//! metric results, chat messages, case templates and the deterministic
//! lexical primitives (word overlap, ROUGE-L, sentence splitting).

pub mod case;
pub mod error;
pub mod lexical;
pub mod prompt;
pub mod results;
pub mod template;

pub use case::{CaseField, EvalCase, FewShotExample};
pub use error::MissingFieldError;
pub use lexical::{
    lcs_overlap, lcs_overlap_with, split_sentences, word_overlap, word_overlap_with, LcsScorer,
    OverlapScore, RougeL, Segmenter, UnicodeWordSegmenter,
};
pub use prompt::{ChatMessage, PromptRole};
pub use results::{
    CorrectnessResult, CoverageResult, Extra, FaithfulnessResult, MetricValue, PrecisionRecallF1Result,
    PrecisionResult, RelevanceResult,
};
pub use template::{CaseTemplate, SimpleCaseTemplate};
