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

//! Decoding of raw model replies into typed outputs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use super::schema::OutputSchema;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)```").expect("json fence pattern is valid"));
static ANY_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`\r\n]+)`").expect("inline code pattern is valid"));

/// Parse, validate and deserialize one candidate text
fn decode_candidate<T: DeserializeOwned>(text: &str, schema: &OutputSchema) -> Result<T, String> {
    let value: serde_json::Value =
        serde_json::from_str(text.trim()).map_err(|e| format!("invalid JSON: {e}"))?;
    schema.validate(&value)?;
    serde_json::from_value(value).map_err(|e| format!("unexpected structure: {e}"))
}

/// First embedded code block, by priority: ```json fence, any fence, inline span
fn embedded_block(reply: &str) -> Option<&str> {
    [&*JSON_FENCE, &*ANY_FENCE, &*INLINE_CODE]
        .into_iter()
        .find_map(|re| re.captures(reply).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
}

/// Decode `reply` against `schema`.
///
/// The whole reply is tried first. When that fails, the first embedded code
/// block found is decoded instead, and its error is the one reported.
pub fn decode_reply<T: DeserializeOwned>(reply: &str, schema: &OutputSchema) -> Result<T, String> {
    match decode_candidate(reply, schema) {
        Ok(value) => Ok(value),
        Err(whole_err) => match embedded_block(reply) {
            Some(block) => decode_candidate(block, schema),
            None => Err(whole_err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schema::{FieldSpec, Shape};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        label: String,
    }

    fn schema() -> OutputSchema {
        OutputSchema::record(
            "Verdict",
            vec![FieldSpec::new("label", Shape::one_of(["Yes", "No"]))],
        )
    }

    fn yes() -> Verdict {
        Verdict {
            label: "Yes".to_string(),
        }
    }

    #[test]
    fn test_plain_json() {
        let out: Verdict = decode_reply("  {\"label\": \"Yes\"}\n", &schema()).unwrap();
        assert_eq!(out, yes());
    }

    #[test]
    fn test_json_fence() {
        let reply = "Here you go:\n```json\n{\"label\": \"Yes\"}\n```\nHope this helps.";
        let out: Verdict = decode_reply(reply, &schema()).unwrap();
        assert_eq!(out, yes());
    }

    #[test]
    fn test_json_fence_preferred_over_earlier_generic_fence() {
        let reply = "```\nnot json\n```\n```json\n{\"label\": \"Yes\"}\n```";
        let out: Verdict = decode_reply(reply, &schema()).unwrap();
        assert_eq!(out, yes());
    }

    #[test]
    fn test_generic_fence_and_inline_span() {
        let out: Verdict = decode_reply("```\n{\"label\": \"Yes\"}\n```", &schema()).unwrap();
        assert_eq!(out, yes());

        let out: Verdict = decode_reply("The answer is `{\"label\": \"Yes\"}`.", &schema()).unwrap();
        assert_eq!(out, yes());
    }

    #[test]
    fn test_schema_violation_is_rejected() {
        let err = decode_reply::<Verdict>("{\"label\": \"Maybe\"}", &schema()).unwrap_err();
        assert!(err.contains("'Maybe' is not one of"));
    }

    #[test]
    fn test_no_json_anywhere() {
        let err = decode_reply::<Verdict>("I think the answer is yes.", &schema()).unwrap_err();
        assert!(err.starts_with("invalid JSON"));
    }
}
