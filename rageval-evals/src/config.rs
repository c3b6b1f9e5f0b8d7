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

//! Evaluation settings
//!
//! Layered in order: built-in defaults, an optional TOML file, then
//! environment variables.
//!
//! ```toml
//! [model]
//! model_id = "anthropic/claude-3-5-haiku-20241022"
//! temperature = 0.0
//! timeout_secs = 60
//! max_reask = 1
//!
//! [llm]
//! anthropic_api_key = "..."
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::model::ModelSettings;

/// Defaults applied to every scoring model built from these settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDefaults {
    /// `provider/model` identifier
    pub model_id: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    /// Corrective retries after an unparsable reply
    pub max_reask: usize,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            model_id: "openai/gpt-4-turbo-preview".to_string(),
            temperature: 0.01,
            timeout_secs: 120,
            max_reask: 2,
        }
    }
}

/// Provider credentials and endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub ollama_base_url: Option<String>,
    /// Overrides the OpenAI endpoint (proxies, Azure-style gateways)
    pub openai_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalSettings {
    pub model: ModelDefaults,
    pub llm: LlmSettings,
}

impl EvalSettings {
    /// Parse a TOML settings file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                tracing::info!("Loading settings from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model_id) = lookup("RAGEVAL_MODEL_ID") {
            self.model.model_id = model_id;
        }
        if let Some(value) = lookup("RAGEVAL_TEMPERATURE") {
            self.model.temperature = value
                .trim()
                .parse()
                .with_context(|| format!("RAGEVAL_TEMPERATURE is not a number: {value}"))?;
        }
        if let Some(value) = lookup("RAGEVAL_TIMEOUT_SECS") {
            self.model.timeout_secs = value
                .trim()
                .parse()
                .with_context(|| format!("RAGEVAL_TIMEOUT_SECS is not an integer: {value}"))?;
        }
        if let Some(value) = lookup("RAGEVAL_MAX_REASK") {
            self.model.max_reask = value
                .trim()
                .parse()
                .with_context(|| format!("RAGEVAL_MAX_REASK is not an integer: {value}"))?;
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.llm.anthropic_api_key = Some(key);
        }
        if let Some(key) = lookup("DEEPSEEK_API_KEY") {
            self.llm.deepseek_api_key = Some(key);
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.llm.ollama_base_url = Some(url);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(url);
        }
        Ok(())
    }

    /// Scoring model settings with these defaults and `instruction`
    pub fn model_settings(&self, instruction: impl Into<String>) -> ModelSettings {
        ModelSettings {
            instruction: instruction.into(),
            model_id: self.model.model_id.clone(),
            temperature: self.model.temperature,
            timeout: Duration::from_secs(self.model.timeout_secs),
            max_reask: self.model.max_reask,
            ..ModelSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = EvalSettings::default();
        assert_eq!(settings.model.model_id, "openai/gpt-4-turbo-preview");
        assert_eq!(settings.model.max_reask, 2);
        assert!(settings.llm.openai_api_key.is_none());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[model]\nmodel_id = \"ollama/llama3\"\nmax_reask = 0\n\n[llm]\nollama_base_url = \"http://gpu-box:11434/v1\""
        )
        .unwrap();

        let settings = EvalSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.model.model_id, "ollama/llama3");
        assert_eq!(settings.model.max_reask, 0);
        assert_eq!(settings.model.timeout_secs, 120);
        assert_eq!(
            settings.llm.ollama_base_url.as_deref(),
            Some("http://gpu-box:11434/v1")
        );
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = EvalSettings::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read settings file"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("RAGEVAL_MODEL_ID", "anthropic/claude-3-5-haiku-20241022"),
            ("RAGEVAL_TIMEOUT_SECS", "30"),
            ("ANTHROPIC_API_KEY", "ak"),
            ("OPENAI_API_KEY", "  "),
        ]
        .into_iter()
        .collect();

        let mut settings = EvalSettings::default();
        settings
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.model.model_id, "anthropic/claude-3-5-haiku-20241022");
        assert_eq!(settings.model.timeout_secs, 30);
        assert_eq!(settings.llm.anthropic_api_key.as_deref(), Some("ak"));
        assert!(settings.llm.openai_api_key.is_none());
    }

    #[test]
    fn test_invalid_override() {
        let mut settings = EvalSettings::default();
        let err = settings
            .apply_overrides(|key| (key == "RAGEVAL_MAX_REASK").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("RAGEVAL_MAX_REASK"));
    }

    #[test]
    fn test_model_settings() {
        let mut settings = EvalSettings::default();
        settings.model.timeout_secs = 5;
        let model = settings.model_settings("Rate the answer.");
        assert_eq!(model.instruction, "Rate the answer.");
        assert_eq!(model.timeout, Duration::from_secs(5));
        assert_eq!(model.model_id, "openai/gpt-4-turbo-preview");
    }
}
