//! Request payloads accepted by the HTTP surface

use serde::Deserialize;

use crate::errors::AgentError;

/// Batch service action posted to `/compose` and `/docker`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceActionRequest {
    #[serde(rename = "selectedServices")]
    pub selected_services: Vec<String>,
    pub select_action: String,
}

/// Wifi credentials posted to `/wifi`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WifiRequest {
    #[serde(rename = "selectedWifi", default)]
    pub selected_wifi: String,
    #[serde(default)]
    pub password: String,
}

/// Form field carrying the key posted to `/ssh-setkey`
pub const SSH_KEY_FIELD: &str = "userkey";

/// First value of `field` in a urlencoded body or query string
pub fn form_value(encoded: &[u8], field: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(key, _)| key == field)
        .map(|(_, value)| value.into_owned())
}

/// Decode a service action request.
///
/// Accepts a JSON body, or the form encoding used by the web frontend where
/// the JSON document is the single form key (or its value).
pub fn parse_service_action(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<ServiceActionRequest, AgentError> {
    let is_json = content_type
        .map(|ct| ct.trim_start().starts_with("application/json"))
        .unwrap_or(false);
    if is_json || body.trim_ascii_start().starts_with(b"{") {
        return decode_json(body);
    }

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    match pairs.as_slice() {
        [(key, value)] => {
            let document = if value.trim_start().starts_with('{') {
                value
            } else {
                key
            };
            decode_json(document.as_bytes())
        }
        [] => Err(AgentError::ValidationError(
            "service action payload is empty".to_string(),
        )),
        _ => Err(AgentError::ValidationError(format!(
            "expected a single form field, got {}",
            pairs.len()
        ))),
    }
}

fn decode_json(document: &[u8]) -> Result<ServiceActionRequest, AgentError> {
    serde_json::from_slice(document).map_err(|e| {
        AgentError::ValidationError(format!("malformed service action payload: {}", e))
    })
}
