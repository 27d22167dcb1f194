//! OCSF (Open Cybersecurity Schema Framework) structured event logging.
//!
//! Events are emitted via `tracing::info!` on the `ocsf` target as
//! structured JSON. Never panics.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

// OCSF event class UIDs
pub const CLASS_AUTHENTICATION: u32 = 3001;

// Status IDs
pub const STATUS_SUCCESS: u32 = 1;
pub const STATUS_FAILURE: u32 = 2;

// Severity IDs
pub const SEVERITY_INFORMATIONAL: u32 = 1;
pub const SEVERITY_LOW: u32 = 2;
pub const SEVERITY_MEDIUM: u32 = 3;

// Auth protocol IDs
pub const AUTH_PROTOCOL_PASSWORD: u32 = 2;

/// Authentication activities this service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthActivity {
    Logon,
    Logoff,
    /// Session checks and route guard denials.
    Other,
}

impl AuthActivity {
    pub fn id(self) -> u32 {
        match self {
            AuthActivity::Logon => 1,
            AuthActivity::Logoff => 2,
            AuthActivity::Other => 99,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AuthActivity::Logon => "Logon",
            AuthActivity::Logoff => "Logoff",
            AuthActivity::Other => "Other",
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn severity_name(id: u32) -> &'static str {
    match id {
        SEVERITY_INFORMATIONAL => "Informational",
        SEVERITY_LOW => "Low",
        SEVERITY_MEDIUM => "Medium",
        _ => "Unknown",
    }
}

fn status_name(id: u32) -> &'static str {
    match id {
        STATUS_SUCCESS => "Success",
        _ => "Failure",
    }
}

/// Build an OCSF Authentication (3001) event.
///
/// Failed logons are Medium severity, other failures Low.
pub fn build_authentication_event(
    activity: AuthActivity,
    success: bool,
    user_email: Option<&str>,
    message: &str,
) -> serde_json::Value {
    let status_id = if success { STATUS_SUCCESS } else { STATUS_FAILURE };
    let severity_id = match (success, activity) {
        (true, _) => SEVERITY_INFORMATIONAL,
        (false, AuthActivity::Logon) => SEVERITY_MEDIUM,
        (false, _) => SEVERITY_LOW,
    };

    let mut event = json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": activity.id(),
        "activity_name": activity.name(),
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status_name(status_id),
        "time": now_millis(),
        "metadata": {
            "product": {
                "name": "tstack-auth",
                "version": env!("CARGO_PKG_VERSION"),
                "vendor_name": "TStack"
            }
        },
        "auth_protocol_id": AUTH_PROTOCOL_PASSWORD,
        "auth_protocol": "Password",
        "message": message,
    });

    if let Some(email) = user_email {
        event["actor"] = json!({
            "user": {
                "email_addr": email,
                "type_id": 1,
                "type": "User"
            }
        });
    }

    event
}

/// Emit an OCSF Authentication (3001) event.
pub fn authentication_event(
    activity: AuthActivity,
    success: bool,
    user_email: Option<&str>,
    message: &str,
) {
    let event = build_authentication_event(activity, success, user_email, message);
    if let Ok(json) = serde_json::to_string(&event) {
        tracing::info!(target: "ocsf", "{}", json);
    }
}
