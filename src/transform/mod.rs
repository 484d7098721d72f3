//! Message Transformation
//!
//! Turns a matched message into the outbound text payload. With a
//! template configured and an object body, `{field}` placeholders are
//! substituted with the field's string rendering; substitution is
//! token-aware, so a field name that is a substring of another
//! placeholder's name cannot corrupt it. Unknown placeholders are left
//! verbatim. Without a template the body's default rendering is used.

use serde_json::{Map, Value};

use crate::config::RouteConfig;
use crate::message::MessageBody;

/// Produce the outbound text for a matched route.
pub fn transform(route: &RouteConfig, body: &MessageBody) -> String {
    match &route.transform_template {
        Some(template) => match body.as_object() {
            Some(object) => render_template(template, object),
            // Non-object bodies cannot provide fields; the template is
            // emitted with placeholders intact.
            None => template.clone(),
        },
        None => body.render(),
    }
}

/// Substitute `{name}` tokens in a template with values from an object.
///
/// Only complete tokens are replaced: the scanner matches a `{`, the
/// placeholder name, and the closing `}` as one unit. Braces that do not
/// form a token pass through unchanged.
pub fn render_template(template: &str, fields: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];

        match tail.find(['{', '}']) {
            // A complete `{name}` token
            Some(close) if tail.as_bytes()[close] == b'}' => {
                let name = &tail[..close];
                match fields.get(name) {
                    Some(value) => out.push_str(&render_value(value)),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &tail[close + 1..];
            }
            // Nested or unclosed brace: emit it literally and rescan
            _ => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// String rendering of a field value: strings bare, scalars via their
/// JSON form, nested structures as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
