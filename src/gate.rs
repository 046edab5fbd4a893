//! The poll gate. Two conditions, both required: the per-task cooldown has
//! elapsed AND the previous alert (if any) has been acknowledged. A cooldown
//! alone would re-notify on a schedule while the last alert is still open;
//! the acknowledgement half keeps a task quiet until a human dismisses it.

use crate::store::StateStore;
use crate::task::SearchTask;

/// Returns whether `task` is due for a poll at `now_unix`. A store read
/// failure means "not due": skipping a poll is always safe, polling blind
/// is not.
pub async fn should_poll(
    store: &dyn StateStore,
    task: &SearchTask,
    now_unix: u64,
    poll_interval_secs: u64,
) -> bool {
    let time_due = match store.last_poll(task).await {
        Ok(None) => true,
        Ok(Some(last)) => now_unix.saturating_sub(last) >= poll_interval_secs,
        Err(e) => {
            tracing::warn!(
                target: "gate",
                query = %task.query,
                location = %task.location,
                error = ?e,
                "last-poll read failed, treating as not due"
            );
            return false;
        }
    };

    let state_due = match store.acknowledged(task).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                target: "gate",
                query = %task.query,
                location = %task.location,
                error = ?e,
                "acknowledged read failed, treating as not due"
            );
            return false;
        }
    };

    tracing::debug!(
        target: "gate",
        query = %task.query,
        location = %task.location,
        time_due,
        state_due,
        "gate evaluated"
    );
    time_due && state_due
}
