//! Scripted generation backend for deterministic testing.
//!
//! Responses are configured per stage. The stage of an incoming call is
//! recognised by its system prompt, so the mock must be paired with the same
//! [`StagePrompts`] as the oracle (by default [`StagePrompts::placeholder`]).
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use tagnorm_inference::mock::MockGenerationBackend;
//! use tagnorm_inference::{Stage, StagePrompts, TagOracle};
//!
//! let backend = MockGenerationBackend::new().with_records(
//!     Stage::Classify,
//!     vec![json!({"source": "rock", "class": "genre"})],
//! );
//! let oracle = TagOracle::new(Arc::new(backend), StagePrompts::placeholder());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use tagnorm_core::{normalize, Error, GenerationBackend, Result};

use crate::prompts::{Stage, StagePrompts};

/// Scripted reply for one stage.
#[derive(Debug, Clone)]
enum StageScript {
    /// Reply with the records whose `source` was requested.
    Records(Vec<JsonValue>),
    /// Reply with fixed text regardless of input.
    Raw(String),
    /// Fail every call with a transport error.
    Failure(String),
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub stage: Option<Stage>,
    /// Tags decoded from the `{"tags": [...]}` user payload.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model: String,
    prompts: StagePrompts,
    scripts: HashMap<Stage, StageScript>,
    /// Any call whose payload contains one of these (normalized) tags fails.
    failing_tags: HashSet<String>,
}

/// Mock generation backend for testing.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockGenerationBackend {
    /// Create a mock that answers `[]` for every stage.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig {
                model: "mock-model".to_string(),
                prompts: StagePrompts::placeholder(),
                scripts: HashMap::new(),
                failing_tags: HashSet::new(),
            }),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Recognise stages by these prompts instead of the placeholders.
    pub fn with_prompts(mut self, prompts: StagePrompts) -> Self {
        Arc::make_mut(&mut self.config).prompts = prompts;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    /// Answer a stage with the subset of `records` whose source was asked for.
    pub fn with_records(mut self, stage: Stage, records: Vec<JsonValue>) -> Self {
        Arc::make_mut(&mut self.config)
            .scripts
            .insert(stage, StageScript::Records(records));
        self
    }

    /// Answer a stage with fixed text.
    pub fn with_raw_response(mut self, stage: Stage, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .scripts
            .insert(stage, StageScript::Raw(text.into()));
        self
    }

    /// Fail every call to a stage with an inference error.
    pub fn with_failure(mut self, stage: Stage, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .scripts
            .insert(stage, StageScript::Failure(message.into()));
        self
    }

    /// Fail any call whose payload includes `tag`.
    pub fn with_failing_tag(mut self, tag: &str) -> Self {
        Arc::make_mut(&mut self.config)
            .failing_tags
            .insert(normalize(tag));
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Calls that reached a given stage.
    pub fn calls_for(&self, stage: Stage) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == Some(stage))
            .collect()
    }

    fn respond(&self, stage: Option<Stage>, tags: &[String]) -> Result<String> {
        let requested: HashSet<String> = tags.iter().map(|t| normalize(t)).collect();

        if requested
            .iter()
            .any(|t| self.config.failing_tags.contains(t))
        {
            return Err(Error::Inference("Ollama returned 500: scripted failure".to_string()));
        }

        let script = stage.and_then(|s| self.config.scripts.get(&s));
        match script {
            None => Ok("[]".to_string()),
            Some(StageScript::Raw(text)) => Ok(text.clone()),
            Some(StageScript::Failure(message)) => Err(Error::Inference(message.clone())),
            Some(StageScript::Records(records)) => {
                let selected: Vec<&JsonValue> = records
                    .iter()
                    .filter(|r| {
                        r.get("source")
                            .and_then(JsonValue::as_str)
                            .map(|s| requested.contains(&normalize(s)))
                            .unwrap_or(false)
                    })
                    .collect();
                Ok(serde_json::to_string(&selected)?)
            }
        }
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let stage = self.config.prompts.stage_for(system);
        let tags: Vec<String> = serde_json::from_str::<JsonValue>(prompt)
            .ok()
            .and_then(|v| v.get("tags").cloned())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        self.call_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockCall {
                system: system.to_string(),
                stage,
                tags: tags.clone(),
            });

        self.respond(stage, &tags)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
