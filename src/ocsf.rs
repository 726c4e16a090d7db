//! OCSF (Open Cybersecurity Schema Framework) structured audit events.
//!
//! Events are emitted via `tracing::info!` on the `ocsf` target as one JSON
//! string each. Tokens and passwords never appear in an event.

use serde_json::{Value, json};

use crate::session::{AuthMethod, now_millis};

// OCSF event class UIDs
pub const CLASS_AUTHENTICATION: u32 = 3001;

// Activity IDs
pub const ACTIVITY_LOGON: u32 = 1;
pub const ACTIVITY_LOGOFF: u32 = 2;
pub const ACTIVITY_AUTH_TICKET: u32 = 3; // Code / password exchange
pub const ACTIVITY_SERVICE_TICKET: u32 = 4; // Token refresh
pub const ACTIVITY_OTHER: u32 = 99; // Route guard access decisions

// Status IDs
pub const STATUS_SUCCESS: u32 = 1;
pub const STATUS_FAILURE: u32 = 2;

// Severity IDs
pub const SEVERITY_INFORMATIONAL: u32 = 1;
pub const SEVERITY_LOW: u32 = 2;
pub const SEVERITY_MEDIUM: u32 = 3;
pub const SEVERITY_HIGH: u32 = 4;

// Auth protocol IDs
pub const AUTH_PROTOCOL_UNKNOWN: u32 = 0;
pub const AUTH_PROTOCOL_PASSWORD: u32 = 2;
pub const AUTH_PROTOCOL_OAUTH2: u32 = 10;

fn severity_name(id: u32) -> &'static str {
    match id {
        SEVERITY_INFORMATIONAL => "Informational",
        SEVERITY_LOW => "Low",
        SEVERITY_MEDIUM => "Medium",
        SEVERITY_HIGH => "High",
        5 => "Critical",
        _ => "Unknown",
    }
}

fn status_name(id: u32) -> &'static str {
    match id {
        STATUS_SUCCESS => "Success",
        _ => "Failure",
    }
}

fn product() -> Value {
    json!({
        "name": "storefront-auth",
        "version": env!("CARGO_PKG_VERSION"),
        "vendor_name": "Storefront"
    })
}

fn actor(subject: Option<&str>, email: Option<&str>) -> Option<Value> {
    if subject.is_none() && email.is_none() {
        return None;
    }
    let mut user = json!({ "type_id": 1, "type": "User" });
    if let Some(uid) = subject {
        user["uid"] = json!(uid);
    }
    if let Some(email) = email {
        user["email_addr"] = json!(email);
    }
    Some(json!({ "user": user }))
}

/// Emit an OCSF event as structured JSON via tracing. Never panics.
fn emit(event: &Value) {
    if let Ok(json) = serde_json::to_string(event) {
        tracing::info!(target: "ocsf", "{}", json);
    }
}

/// Who an event is about.
#[derive(Debug, Clone, Copy, Default)]
pub struct Actor<'a> {
    pub subject: Option<&'a str>,
    pub email: Option<&'a str>,
}

impl<'a> Actor<'a> {
    pub fn of(session: &'a crate::session::Session) -> Self {
        Self {
            subject: Some(session.subject.as_str()).filter(|s| !s.is_empty()),
            email: session.email.as_deref(),
        }
    }
}

/// Build an OCSF Authentication (3001) event.
pub fn build_authentication_event(
    activity_id: u32,
    activity_name: &str,
    status_id: u32,
    severity_id: u32,
    who: Actor<'_>,
    method: Option<AuthMethod>,
    message: &str,
) -> Value {
    let (auth_protocol_id, auth_protocol) = method.map_or((AUTH_PROTOCOL_UNKNOWN, "Unknown"), auth_protocol);
    let mut event = json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": activity_id,
        "activity_name": activity_name,
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status_name(status_id),
        "time": now_millis(),
        "metadata": { "product": product() },
        "auth_protocol_id": auth_protocol_id,
        "auth_protocol": auth_protocol,
        "message": message,
    });
    if let Some(actor) = actor(who.subject, who.email) {
        event["actor"] = actor;
    }
    event
}

/// Emit an OCSF Authentication (3001) event.
pub fn authentication_event(
    activity_id: u32,
    activity_name: &str,
    status_id: u32,
    severity_id: u32,
    who: Actor<'_>,
    method: Option<AuthMethod>,
    message: &str,
) {
    emit(&build_authentication_event(
        activity_id,
        activity_name,
        status_id,
        severity_id,
        who,
        method,
        message,
    ));
}

/// Build a route guard access decision event (class 3001, activity 99/Other).
pub fn build_access_event(path: &str, decision: &str, reason: &str, who: Actor<'_>) -> Value {
    let (status_id, severity_id) = if decision == "allow" {
        (STATUS_SUCCESS, SEVERITY_INFORMATIONAL)
    } else {
        (STATUS_FAILURE, SEVERITY_MEDIUM)
    };

    let mut event = json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": ACTIVITY_OTHER,
        "activity_name": "Other",
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status_name(status_id),
        "time": now_millis(),
        "metadata": {
            "product": product(),
            "authorization": {
                "resource": path,
                "decision": decision,
                "reason": reason,
            }
        },
        "message": format!("Route guard: {decision} for {path}"),
    });
    if let Some(actor) = actor(who.subject, who.email) {
        event["actor"] = actor;
    }
    event
}

/// Emit a route guard access decision event.
pub fn access_event(path: &str, decision: &str, reason: &str, who: Actor<'_>) {
    emit(&build_access_event(path, decision, reason, who));
}

pub fn auth_protocol(method: AuthMethod) -> (u32, &'static str) {
    match method {
        AuthMethod::Oauth => (AUTH_PROTOCOL_OAUTH2, "OAuth 2.0/OIDC"),
        AuthMethod::Credentials => (AUTH_PROTOCOL_PASSWORD, "Password"),
    }
}
