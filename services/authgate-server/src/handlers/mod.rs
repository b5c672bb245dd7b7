//! API Handlers

pub mod auth;
pub mod health;
pub mod oauth2;

/// Count a login attempt by method and outcome
pub(crate) fn record_login(method: &'static str, outcome: &'static str) {
    metrics::counter!("authgate_logins_total", "method" => method, "outcome" => outcome)
        .increment(1);
}
