//! Durable scheduler
//!
//! Work lives in the task table; a single worker claims due tasks, runs
//! them to completion and acks. Recurring tasks re-schedule themselves on
//! ack; a claim that is never acked goes stale and becomes due again.

pub mod jobs;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::app::AppState;
use crate::Result;

/// Job name: delete one message
pub const TASK_DELETE_MESSAGE: &str = "delete_message";
/// Job name: refresh metadata of every managed group
pub const TASK_REFRESH_GROUP_INFO: &str = "refresh_group_info";
/// Job name: pull the external blocklist
pub const TASK_SYNC_BLOCKLIST: &str = "sync_external_blocklist";

/// Default delay before a scheduled message deletion fires
pub const DELETE_MESSAGE_DELAY_SECS: i64 = 90;

/// Claims older than this are assumed crashed and released
const STALE_CLAIM_MINUTES: i64 = 10;

/// Idle poll interval of the worker loop
const IDLE_POLL: StdDuration = StdDuration::from_secs(1);

/// Schedule a message deletion after the default delay
///
/// # Errors
///
/// Returns error if the task cannot be stored
pub fn schedule_message_deletion(state: &Arc<AppState>, chat_id: i64, message_id: i64) -> Result<()> {
    schedule_message_deletion_after(state, chat_id, message_id, DELETE_MESSAGE_DELAY_SECS)
}

/// Schedule a message deletion after a custom delay
///
/// # Errors
///
/// Returns error if the task cannot be stored
pub fn schedule_message_deletion_after(
    state: &Arc<AppState>,
    chat_id: i64,
    message_id: i64,
    delay_secs: i64,
) -> Result<()> {
    state.tasks().enqueue(
        TASK_DELETE_MESSAGE,
        &serde_json::json!({ "chat_id": chat_id, "message_id": message_id }),
        Utc::now() + Duration::seconds(delay_secs),
    )?;
    Ok(())
}

/// Seed the standing recurring jobs
///
/// # Errors
///
/// Returns error if the task table cannot be written
pub fn seed_recurring(state: &Arc<AppState>) -> Result<()> {
    let tasks = state.tasks();
    tasks.ensure_recurring(TASK_REFRESH_GROUP_INFO, Duration::hours(1))?;
    if state.config.external_blocklist_url.is_some() {
        tasks.ensure_recurring(TASK_SYNC_BLOCKLIST, Duration::days(1))?;
    }
    Ok(())
}

/// Worker loop: claim, execute, ack
///
/// A job failure is logged and acked anyway; the alternative is a
/// poison-pill task blocking the queue forever. Individual jobs swallow
/// their own transient errors and re-enqueue where it makes sense.
pub async fn run_worker(state: Arc<AppState>) {
    tracing::info!("scheduler worker started");
    loop {
        let tasks = state.tasks();
        let now = Utc::now();

        if let Err(e) = tasks.release_stale(now, Duration::minutes(STALE_CLAIM_MINUTES)) {
            tracing::error!(error = %e, "stale claim release failed");
        }

        let claimed = match tasks.claim_next(now) {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(error = %e, "task claim failed");
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }
        };

        let Some(task) = claimed else {
            tokio::time::sleep(IDLE_POLL).await;
            continue;
        };

        tracing::debug!(task = %task.name, id = task.id, "running task");
        if let Err(e) = jobs::run(&state, &task).await {
            tracing::error!(task = %task.name, id = task.id, error = %e, "task failed");
        }
        if let Err(e) = tasks.ack(&task, Utc::now()) {
            tracing::error!(task = %task.name, id = task.id, error = %e, "task ack failed");
        }
    }
}
