use crate::client::types::{ApiEnvelope, Task, TaskOutcome, TaskResult, TaskStatus};
use crate::error::{ClientError, ClientResult};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RawTask {
    task_id: Option<String>,
    status: TaskStatus,
    progress: Option<f64>,
    message: Option<String>,
    result: Option<Value>,
    error: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

/// Map a status payload onto a [`Task`] snapshot.
///
/// Accepts the bare task object as well as a `{success, data}` envelope
/// around it. `task_id` is used when the payload does not name the task.
pub fn map_status_payload(task_id: &str, payload: Value) -> ClientResult<Task> {
    let payload = unwrap_envelope(payload)?;
    let raw: RawTask =
        serde_json::from_value(payload).map_err(|e| ClientError::Decode(format!("task status: {}", e)))?;
    map_raw(task_id, raw)
}

fn unwrap_envelope(payload: Value) -> ClientResult<Value> {
    if payload.get("status").is_none() && payload.get("success").is_some() {
        let envelope: ApiEnvelope<Value> =
            serde_json::from_value(payload).map_err(|e| ClientError::Decode(e.to_string()))?;
        return envelope.into_data("Failed to fetch task status");
    }
    Ok(payload)
}

fn map_raw(task_id: &str, raw: RawTask) -> ClientResult<Task> {
    let outcome = match raw.status {
        TaskStatus::Completed => {
            let result = match raw.result {
                Some(value @ Value::Object(_)) => serde_json::from_value::<TaskResult>(value)
                    .map_err(|e| ClientError::Decode(format!("task result: {}", e)))?,
                _ => {
                    return Err(ClientError::Decode(
                        "completed task has no result".to_string(),
                    ))
                }
            };
            TaskOutcome::Completed(result)
        }
        TaskStatus::Failed => {
            // Tender tasks report the failure reason in `message` only
            let error = non_empty(raw.error)
                .or_else(|| non_empty(raw.message.clone()))
                .unwrap_or_else(|| "Unknown error".to_string());
            TaskOutcome::Failed(error)
        }
        TaskStatus::Pending | TaskStatus::Processing => TaskOutcome::InProgress,
    };

    Ok(Task {
        task_id: non_empty(raw.task_id).unwrap_or_else(|| task_id.to_string()),
        status: raw.status,
        progress: raw.progress.map(|p| p.clamp(0.0, 100.0).round() as u8),
        message: non_empty(raw.message),
        outcome,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
