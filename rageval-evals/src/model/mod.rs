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

//! Generative scoring model
//!
//! [`StructuredModel`] turns an evaluation case into a typed judgment:
//!
//! 1. system prompt from the instruction and the rendered [`OutputSchema`]
//! 2. one user/assistant pair per few-shot example
//! 3. the target case as the final user message
//! 4. reply decoding with a bounded validate-and-reask loop ([`ReaskLoop`])
//!
//! [`Scorer`], [`Classifier`] and [`Extractor`] are thin presets over it.

mod decode;
mod presets;
mod reask;
mod schema;

pub use decode::decode_reply;
pub use presets::{
    Classifier, ClassifierOptions, Extractor, LabelOutput, ScoreOutput, Scorer, ScorerOptions,
    COT_REASON_DESCRIPTION,
};
pub use reask::{InvalidTransition, ReaskEvent, ReaskLoop, ReaskState};
pub use schema::{FieldSpec, OutputSchema, Shape};

use rageval_core::{
    CaseField, CaseTemplate, ChatMessage, EvalCase, FewShotExample, SimpleCaseTemplate,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::llm_client::{ClientFactory, GenerationParams, LLMClient};
use crate::EvalError;

pub const DEFAULT_MODEL_ID: &str = "openai/gpt-4-turbo-preview";

pub const DEFAULT_SYSTEM_TEMPLATE: &str =
    "# Instruction\n{instruction}\n# Output Format\n{output_format_description}\n";

/// Prompting and sampling configuration of a scoring model
#[derive(Clone)]
pub struct ModelSettings {
    pub instruction: String,
    /// `provider/model` identifier the client is built for
    pub model_id: String,
    pub temperature: f64,
    pub timeout: Duration,
    pub max_reask: usize,
    pub case_template: Arc<dyn CaseTemplate>,
    /// Must contain `{instruction}` and `{output_format_description}`
    pub system_template: String,
}

impl ModelSettings {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Self::default()
        }
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }

    pub fn render_system_prompt(&self, schema: &OutputSchema) -> String {
        self.system_template
            .replace("{instruction}", &self.instruction)
            .replace("{output_format_description}", &schema.describe())
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            instruction: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            temperature: 0.01,
            timeout: Duration::from_secs(120),
            max_reask: 2,
            case_template: Arc::new(SimpleCaseTemplate),
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
        }
    }
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("instruction", &self.instruction)
            .field("model_id", &self.model_id)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("max_reask", &self.max_reask)
            .finish_non_exhaustive()
    }
}

/// Schema-constrained generation over a completion client
pub struct StructuredModel<T> {
    settings: ModelSettings,
    schema: OutputSchema,
    examples: Vec<FewShotExample<T>>,
    client: Arc<dyn LLMClient>,
    bound_model_id: String,
}

impl<T> StructuredModel<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Build a model bound to `client`.
    ///
    /// `client` must talk to `settings.model_id`: that id is recorded as the
    /// bound one, and [`rebind`](Self::rebind) only rebuilds once it changes.
    /// Use [`connect`](Self::connect) to have the client built from the id.
    /// Every few-shot output must conform to `schema`.
    pub fn new(
        settings: ModelSettings,
        schema: OutputSchema,
        examples: Vec<FewShotExample<T>>,
        client: Arc<dyn LLMClient>,
    ) -> Result<Self, EvalError> {
        for (i, example) in examples.iter().enumerate() {
            let value = serde_json::to_value(&example.expected_output)?;
            schema.validate(&value).map_err(|e| {
                EvalError::Configuration(format!(
                    "Few-shot example {i} does not match the output format: {e}"
                ))
            })?;
        }

        Ok(Self::with_checked_examples(settings, schema, examples, client))
    }

    /// Build a model whose client comes from `factory` for `settings.model_id`
    pub fn connect(
        settings: ModelSettings,
        schema: OutputSchema,
        examples: Vec<FewShotExample<T>>,
        factory: &dyn ClientFactory,
    ) -> Result<Self, EvalError> {
        let client = factory.build(&settings.model_id)?;
        Self::new(settings, schema, examples, client)
    }

    /// Build without validating the few-shot outputs against `schema`.
    ///
    /// The Scorer and Classifier check their examples on range and label
    /// membership only, so a reason-less example is valid in chain-of-thought
    /// mode.
    pub(crate) fn with_checked_examples(
        settings: ModelSettings,
        schema: OutputSchema,
        examples: Vec<FewShotExample<T>>,
        client: Arc<dyn LLMClient>,
    ) -> Self {
        let bound_model_id = settings.model_id.clone();
        Self {
            settings,
            schema,
            examples,
            client,
            bound_model_id,
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Changing `model_id` here takes effect on the next [`rebind`](Self::rebind)
    pub fn settings_mut(&mut self) -> &mut ModelSettings {
        &mut self.settings
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn examples(&self) -> &[FewShotExample<T>] {
        &self.examples
    }

    pub fn client(&self) -> &Arc<dyn LLMClient> {
        &self.client
    }

    pub fn bound_model_id(&self) -> &str {
        &self.bound_model_id
    }

    /// Rebuild the client when `settings.model_id` moved away from the bound
    /// id. Returns whether a new client was built.
    pub fn rebind(&mut self, factory: &dyn ClientFactory) -> Result<bool, EvalError> {
        if self.settings.model_id == self.bound_model_id {
            return Ok(false);
        }
        self.client = factory.build(&self.settings.model_id)?;
        self.bound_model_id = self.settings.model_id.clone();
        debug!(model_id = %self.bound_model_id, "Rebound scoring model");
        Ok(true)
    }

    pub fn set_model_id(
        &mut self,
        model_id: impl Into<String>,
        factory: &dyn ClientFactory,
    ) -> Result<(), EvalError> {
        self.settings.model_id = model_id.into();
        self.rebind(factory).map(|_| ())
    }

    /// Narrow every few-shot case to the given fields
    pub fn refine_examples(
        &mut self,
        required: &[CaseField],
        optional: &[CaseField],
    ) -> Result<(), EvalError> {
        for (i, example) in self.examples.iter_mut().enumerate() {
            example.case = example.case.refine(required, optional).map_err(|e| {
                EvalError::Configuration(format!("Few-shot example {i}: {e}"))
            })?;
        }
        Ok(())
    }

    /// The conversation sent for `case`, before any reask
    pub fn build_messages(&self, case: &EvalCase) -> Result<Vec<ChatMessage>, EvalError> {
        let template = &self.settings.case_template;
        let mut messages = Vec::with_capacity(2 + 2 * self.examples.len());
        messages.push(ChatMessage::system(
            self.settings.render_system_prompt(&self.schema),
        ));
        for example in &self.examples {
            messages.push(ChatMessage::user(template.format(&example.case)));
            messages.push(ChatMessage::assistant(serde_json::to_string(
                &example.expected_output,
            )?));
        }
        messages.push(ChatMessage::user(template.format(case)));
        Ok(messages)
    }

    /// Generate and decode a judgment for `case`.
    ///
    /// Client errors propagate immediately. Undecodable replies are fed back
    /// with the decoding error, at most `max_reask` times.
    pub async fn infer(&self, case: &EvalCase) -> Result<T, EvalError> {
        let mut messages = self.build_messages(case)?;
        let params = self.settings.generation_params();
        let mut reask = ReaskLoop::new(self.settings.max_reask);

        loop {
            let response = self.client.complete(&messages, &params).await?;
            reask.advance(ReaskEvent::ReplyReceived)?;
            debug!(
                schema = %self.schema.name,
                model = %response.model,
                attempt = reask.attempts(),
                "Decoding reply"
            );

            let error = match decode_reply::<T>(&response.content, &self.schema) {
                Ok(output) => {
                    reask.advance(ReaskEvent::Accepted)?;
                    return Ok(output);
                }
                Err(error) => error,
            };

            match reask.advance(ReaskEvent::Rejected)? {
                ReaskState::Reasking => {
                    warn!(
                        schema = %self.schema.name,
                        attempt = reask.attempts(),
                        error = %error,
                        "Reply rejected, reasking"
                    );
                    messages.push(ChatMessage::assistant(response.content));
                    messages.push(ChatMessage::user(reask_prompt(&error)));
                    reask.advance(ReaskEvent::Reasked)?;
                }
                _ => {
                    warn!(
                        schema = %self.schema.name,
                        attempts = reask.attempts(),
                        error = %error,
                        "No valid structured output"
                    );
                    return Err(EvalError::StructuredOutput {
                        attempts: reask.attempts(),
                        last_reply: response.content,
                        message: error,
                    });
                }
            }
        }
    }
}

fn reask_prompt(error: &str) -> String {
    format!(
        "Your previous reply could not be used: {error}\n\
         Reply again with only the JSON value described in the output format."
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use rageval_core::ChatMessage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::llm_client::{GenerationParams, LLMClient, LLMError, LLMResponse, TokenUsage};

    /// Replays canned replies and records every conversation it receives
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        pub fn new<I, S>(replies: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedClient {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<LLMResponse, LLMError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("script exhausted".to_string()));
            match reply {
                Ok(content) => Ok(LLMResponse {
                    content,
                    usage: TokenUsage::default(),
                    model: "scripted".to_string(),
                }),
                Err(message) => Err(LLMError::ApiError(message)),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
