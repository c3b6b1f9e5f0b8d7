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

//! Rendering of evaluation cases into prompt text

use crate::case::EvalCase;

/// Renders an [`EvalCase`] as the user message shown to a scoring model
pub trait CaseTemplate: Send + Sync {
    fn format(&self, case: &EvalCase) -> String;
}

/// Labeled lines in a fixed order; empty fields are left out entirely.
///
/// ```text
/// Question: ...
/// Ground Truth Context: ...
/// Ground Truth Answer: ...
/// Retrieved Context: ...
/// Generated Answer: ...
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCaseTemplate;

impl CaseTemplate for SimpleCaseTemplate {
    fn format(&self, case: &EvalCase) -> String {
        let mut text = String::new();
        if !case.question.is_empty() {
            text.push_str(&format!("Question: {}\n", case.question));
        }
        if !case.reference_contexts.is_empty() {
            text.push_str(&format!(
                "Ground Truth Context: {}\n",
                case.reference_contexts.join("\n")
            ));
        }
        if !case.reference_answer.is_empty() {
            text.push_str(&format!("Ground Truth Answer: {}\n", case.reference_answer));
        }
        if !case.retrieved_contexts.is_empty() {
            text.push_str(&format!(
                "Retrieved Context: {}\n",
                case.retrieved_contexts.join("\n")
            ));
        }
        if !case.generated_answer.is_empty() {
            text.push_str(&format!("Generated Answer: {}\n", case.generated_answer));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_template_field_order() {
        let case = EvalCase::new()
            .with_generated_answer("Paris")
            .with_question("Capital of France?")
            .with_retrieved_contexts(["a", "b"])
            .with_reference_answer("Paris")
            .with_reference_contexts(["Paris is the capital of France."]);

        assert_eq!(
            SimpleCaseTemplate.format(&case),
            "Question: Capital of France?\n\
             Ground Truth Context: Paris is the capital of France.\n\
             Ground Truth Answer: Paris\n\
             Retrieved Context: a\nb\n\
             Generated Answer: Paris\n"
        );
    }

    #[test]
    fn test_simple_template_omits_empty_fields() {
        let case = EvalCase::new().with_question("Q?").with_generated_answer("A.");
        let text = SimpleCaseTemplate.format(&case);
        assert_eq!(text, "Question: Q?\nGenerated Answer: A.\n");
        assert!(!text.contains("Retrieved Context"));
    }

    #[test]
    fn test_simple_template_empty_case() {
        assert_eq!(SimpleCaseTemplate.format(&EvalCase::default()), "");
    }
}
