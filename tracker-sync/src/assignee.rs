use crate::state::PersistentState;
use crate::tracker::IssueTracker;
use tracing::{debug, warn};

/// Tracker account id for an assignee email, consulting the persisted cache
/// first. Lookups that fail or find nobody yield `None` and are not cached,
/// so the next run asks again.
pub async fn resolve_assignee(
    tracker: &dyn IssueTracker,
    state: &mut PersistentState,
    email: &str
) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        return None;
    }
    if let Some(account_id) = state.cached_account(email) {
        return Some(account_id.to_string());
    }

    match tracker.find_user_by_email(email).await {
        Ok(Some(user)) => {
            debug!(email = %email, account_id = %user.account_id, "Resolved assignee");
            state.cache_account(email, &user.account_id);
            Some(user.account_id)
        }
        Ok(None) => {
            warn!(email = %email, "No tracker user for assignee");
            None
        }
        Err(e) => {
            warn!(email = %email, error = %e, "Assignee lookup failed");
            None
        }
    }
}
