//! Response validation

use serde_json::{Map, Value};

use super::DeliveryError;

/// Accept only status 200 with a JSON object body.
///
/// Failure statuses carry the server's `error` string when the body has one.
pub fn check_response(status: u16, body: &[u8]) -> Result<Map<String, Value>, DeliveryError> {
    let parsed = serde_json::from_slice::<Value>(body);

    if status != 200 {
        let message = parsed
            .ok()
            .as_ref()
            .and_then(|json| json.get("error"))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("upload rejected with status {}", status));
        return Err(DeliveryError::Status { status, message });
    }

    match parsed {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(_) => Err(DeliveryError::MalformedResponse(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(DeliveryError::MalformedResponse(format!(
            "invalid JSON: {}",
            e
        ))),
    }
}
