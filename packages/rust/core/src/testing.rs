//! Test double for [`LlmClient`].

use std::collections::VecDeque;
use std::sync::Mutex;

use outliner_llm::LlmClient;
use outliner_shared::{LlmResponse, ModelType, OutlinerError, Result};

/// Replies with scripted answers in order and records every prompt.
pub(crate) struct ScriptedClient {
    model: String,
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub(crate) fn new(model: &str, replies: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            model: model.to_string(),
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(String::from).map_err(String::from))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LlmClient for ScriptedClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &str) -> Result<LlmResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted reply left".to_string()));

        match reply {
            Ok(answer) => Ok(LlmResponse {
                prompt: prompt.to_string(),
                thinking: String::new(),
                answer,
                used_model: self.model.clone(),
                model_type: ModelType::Primary,
            }),
            Err(msg) => Err(OutlinerError::Llm(msg)),
        }
    }
}
