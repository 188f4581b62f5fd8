//! LLM invocation with call logging.

use std::time::Instant;

use chrono::Utc;
use outliner_llm::LlmClient;
use outliner_shared::{BlockSnapshot, LlmResponse, Result};
use outliner_storage::{CallLogRecord, CallLogger};
use tracing::{debug, warn};

/// What the log record for one call needs beyond the call itself.
///
/// Built per batch and consumed by [`invoke_logged`]; nothing outlives the
/// call.
#[derive(Debug, Clone)]
pub struct CallContext<'a> {
    pub batch: Vec<BlockSnapshot>,
    pub history_context: &'a str,
    pub current_batch_content: &'a str,
    pub file_key: Option<&'a str>,
}

/// Invoke `client` and append one record describing the call to `logger`.
///
/// The call's own result is returned unchanged. Failing to write the log is
/// only a warning.
pub async fn invoke_logged<C: LlmClient>(
    client: &C,
    logger: &CallLogger,
    prompt: &str,
    ctx: CallContext<'_>,
) -> Result<LlmResponse> {
    let started = Instant::now();
    let outcome = client.invoke(prompt).await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (model_name, response, error) = match &outcome {
        Ok(resp) => (resp.used_model.clone(), Some(resp.clone()), None),
        Err(e) => (client.model_name().to_string(), None, Some(e.to_string())),
    };

    let record = CallLogRecord {
        timestamp: Utc::now(),
        model_name,
        batch: ctx.batch,
        history_context: ctx.history_context.to_string(),
        current_batch_content: ctx.current_batch_content.to_string(),
        response,
        success: outcome.is_ok(),
        error,
        latency_ms,
        file_key: ctx.file_key.map(String::from),
    };

    match logger.log_call(&record) {
        Ok(path) => debug!(path = %path.display(), success = record.success, latency_ms, "logged LLM call"),
        Err(e) => warn!(error = %e, "failed to write LLM call log"),
    }

    outcome
}
