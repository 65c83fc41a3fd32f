//! Response envelope and pluggable response adapters.
//!
//! The core only resolves outcomes; a [`Responder`] decides how they are rendered.

use crate::lifecycle::Outcome;
use crate::routes::Action;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::Value;

pub fn success_body(doc: Value) -> Value {
    serde_json::json!({
        "success": true,
        "response": doc
    })
}

pub fn error_body(message: String) -> Value {
    serde_json::json!({
        "success": false,
        "error": message
    })
}

fn success_status(action: Action) -> StatusCode {
    match action {
        Action::Create => StatusCode::CREATED,
        _ => StatusCode::OK,
    }
}

/// Renders a resolved outcome for one action.
pub trait Responder: Send + Sync {
    fn respond(&self, action: Action, outcome: Outcome) -> Response;
}

/// `{success: true, response}` / `{success: false, error}` as JSON. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonEnvelope;

impl Responder for JsonEnvelope {
    fn respond(&self, action: Action, outcome: Outcome) -> Response {
        match outcome {
            Ok(doc) => (success_status(action), Json(success_body(doc))).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// The same envelope wrapped in a minimal HTML page.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlEnvelope;

impl Responder for HtmlEnvelope {
    fn respond(&self, action: Action, outcome: Outcome) -> Response {
        let (status, body) = match outcome {
            Ok(doc) => (success_status(action), success_body(doc)),
            Err(e) => (e.status(), error_body(e.to_string())),
        };
        let pretty = serde_json::to_string_pretty(&body).unwrap_or_default();
        let page = format!(
            "<!DOCTYPE html><html><body><pre>{}</pre></body></html>",
            escape_html(&pretty)
        );
        (status, Html(page)).into_response()
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
