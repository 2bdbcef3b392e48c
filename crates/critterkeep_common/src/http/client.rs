// --- File: crates/critterkeep_common/src/http/client.rs ---
use reqwest::{redirect::Policy, Client, Error as ReqwestError};
use std::time::Duration;

/// Outbound HTTP client with a whole-request timeout.
///
/// Push services answer directly; callers pass `follow_redirects = false`
/// so a redirect surfaces as a non-2xx status instead of a second POST.
pub fn create_client(timeout_secs: u64, follow_redirects: bool) -> Result<Client, ReqwestError> {
    let redirect = if follow_redirects {
        Policy::default()
    } else {
        Policy::none()
    };
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(redirect)
        .build()
}
