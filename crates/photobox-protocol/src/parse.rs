//! Decoding of client frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::message::ActionRequest;

/// Actions the hub understands.
const KNOWN_ACTIONS: [&str; 3] = ["capture", "list", "print"];

/// Decodes one text frame into an [`ActionRequest`].
///
/// Decoding is two-staged so a bad frame is reported precisely: first the
/// discriminator is checked, then the fields of the named action.
pub fn decode_action(text: &str) -> Result<ActionRequest, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

    let action = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingAction)?
        .to_string();

    if !KNOWN_ACTIONS.contains(&action.as_str()) {
        return Err(ProtocolError::UnknownAction(action));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidRequest {
        action,
        reason: e.to_string(),
    })
}

/// Decodes a print payload into raw image bytes.
///
/// Accepts plain base64 or a `data:<mime>;base64,<payload>` URL, which is
/// what browser canvases produce.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, ProtocolError> {
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| ProtocolError::InvalidImage("data URL without payload".into()))?;
            if !header.ends_with(";base64") {
                return Err(ProtocolError::InvalidImage(format!(
                    "unsupported data URL encoding: {header}"
                )));
            }
            data
        }
        None => payload,
    };

    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(ProtocolError::InvalidImage("empty payload".into()));
    }

    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ProtocolError::InvalidImage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_actions() {
        assert_eq!(decode_action(r#"{"action":"capture"}"#), Ok(ActionRequest::Capture));
        assert_eq!(decode_action(r#"{"action":"list"}"#), Ok(ActionRequest::List));
    }

    #[test]
    fn test_decode_print() {
        let request = decode_action(r#"{"action":"print","image":"aGk="}"#).unwrap();
        assert_eq!(
            request,
            ActionRequest::Print {
                image: "aGk=".to_string()
            }
        );
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let request = decode_action(r#"{"action":"list","client":"kiosk"}"#).unwrap();
        assert_eq!(request, ActionRequest::List);
    }

    #[test]
    fn test_decode_missing_action() {
        assert_eq!(decode_action(r#"{"image":"x"}"#), Err(ProtocolError::MissingAction));
        assert_eq!(decode_action(r#"{"action":7}"#), Err(ProtocolError::MissingAction));
        assert_eq!(decode_action("[1,2]"), Err(ProtocolError::MissingAction));
    }

    #[test]
    fn test_decode_unknown_action() {
        assert_eq!(
            decode_action(r#"{"action":"reboot"}"#),
            Err(ProtocolError::UnknownAction("reboot".to_string()))
        );
    }

    #[test]
    fn test_decode_print_without_image() {
        let err = decode_action(r#"{"action":"print"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest { ref action, .. } if action == "print"));
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(matches!(
            decode_action("{not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_image_payload_plain_base64() {
        assert_eq!(decode_image_payload("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_image_payload_data_url() {
        let bytes = decode_image_payload("data:image/jpeg;base64,aGVs\nbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_image_payload_rejects_garbage() {
        assert!(decode_image_payload("").is_err());
        assert!(decode_image_payload("data:image/png,rawbytes").is_err());
        assert!(decode_image_payload("data:image/png;base64").is_err());
        assert!(decode_image_payload("!!not base64!!").is_err());
    }
}
