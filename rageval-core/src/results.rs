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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type-safe values for the diagnostic side channel of a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
    Array(Vec<MetricValue>),
    Object(HashMap<String, MetricValue>),
    Json(serde_json::Value),
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::String(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::String(value.to_string())
    }
}

impl From<Vec<String>> for MetricValue {
    fn from(values: Vec<String>) -> Self {
        MetricValue::Array(values.into_iter().map(MetricValue::String).collect())
    }
}

/// Diagnostic payloads attached to a result (matched spans, reasons, ...)
pub type Extra = HashMap<String, MetricValue>;

/// Context precision, recall and F1 from string matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallF1Result {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    #[serde(default)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectnessResult {
    pub correctness: f64,
    #[serde(default)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaithfulnessResult {
    pub faithfulness: f64,
    #[serde(default)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceResult {
    pub relevance: f64,
    #[serde(default)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub coverage: f64,
    #[serde(default)]
    pub extra: Extra,
}

/// Ranked context precision from per-context relevance judgments
///
/// `precision_at_k[i]` is the share of relevant contexts among the first
/// `i + 1` retrieved contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionResult {
    pub precision: f64,
    pub average_precision: f64,
    pub precision_at_k: Vec<f64>,
    #[serde(default)]
    pub extra: Extra,
}

impl PrecisionResult {
    /// Aggregate ordered binary judgments into precision@k and their mean.
    ///
    /// Returns all zeros for an empty sequence.
    pub fn from_judgments(judgments: &[bool], extra: Extra) -> Self {
        let mut positives = 0usize;
        let precision_at_k: Vec<f64> = judgments
            .iter()
            .enumerate()
            .map(|(i, &relevant)| {
                if relevant {
                    positives += 1;
                }
                positives as f64 / (i + 1) as f64
            })
            .collect();

        let (precision, average_precision) = if judgments.is_empty() {
            (0.0, 0.0)
        } else {
            (
                positives as f64 / judgments.len() as f64,
                precision_at_k.iter().sum::<f64>() / precision_at_k.len() as f64,
            )
        };

        Self {
            precision,
            average_precision,
            precision_at_k,
            extra,
        }
    }
}
