//! # QR Payload
//!
//! The document embedded in a ticket's QR code: JSON, then base64 (standard
//! alphabet).
//!
//! ```text
//! { "type": "ticket", "code": "TKT-…", "user_id": 42, "product_code": "SIMPLE",
//!   "route_code": "12", "issued_at": "2025-01-01T12:00:00Z" }
//!        │
//!        ▼  serde_json + base64::STANDARD
//! "eyJ0eXBlIjoidGlja2V0Iiwi…"
//! ```
//!
//! The payload is unsigned. A validator only uses it to recover the ticket
//! code; every decision is made against the stored ticket.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QrError;

/// Value of the `type` discriminator for ticket payloads.
pub const TICKET_PAYLOAD_KIND: &str = "ticket";

/// Decoded QR document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub user_id: Option<i64>,
    pub product_code: String,
    pub route_code: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl QrPayload {
    pub fn new(
        code: impl Into<String>,
        user_id: Option<i64>,
        product_code: impl Into<String>,
        route_code: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        QrPayload {
            kind: TICKET_PAYLOAD_KIND.to_string(),
            code: code.into(),
            user_id,
            product_code: product_code.into(),
            route_code,
            issued_at,
        }
    }

    /// Serializes to JSON and base64-encodes.
    pub fn encode(&self) -> Result<String, QrError> {
        let json = serde_json::to_vec(self).map_err(|e| QrError::Malformed(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Reverses [`QrPayload::encode`], rejecting documents that are not tickets.
    pub fn decode(encoded: &str) -> Result<Self, QrError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| QrError::NotBase64)?;
        let payload: QrPayload =
            serde_json::from_slice(&bytes).map_err(|e| QrError::Malformed(e.to_string()))?;

        if payload.kind != TICKET_PAYLOAD_KIND {
            return Err(QrError::WrongKind(payload.kind));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_payload_is_base64_json() {
        let issued_at = Utc::now();
        let payload = QrPayload::new(
            "TKT-20250101120000-1A2B3C4D",
            Some(42),
            "SIMPLE",
            Some("12".to_string()),
            issued_at,
        );

        let encoded = payload.encode().unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(&encoded).unwrap()).unwrap();
        assert_eq!(json["type"], "ticket");
        assert_eq!(json["code"], "TKT-20250101120000-1A2B3C4D");
        assert_eq!(json["user_id"], 42);
        assert_eq!(json["route_code"], "12");

        assert_eq!(QrPayload::decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_unassigned_ticket_has_null_user() {
        let encoded = QrPayload::new("TKT-X", None, "DAY_PASS", None, Utc::now())
            .encode()
            .unwrap();
        let decoded = QrPayload::decode(&encoded).unwrap();
        assert_eq!(decoded.user_id, None);
        assert_eq!(decoded.route_code, None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            QrPayload::decode("not base64 !!"),
            Err(QrError::NotBase64)
        ));
        assert!(matches!(
            QrPayload::decode(&STANDARD.encode("{\"hello\":1}")),
            Err(QrError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_other_kinds() {
        let doc = serde_json::json!({
            "type": "receipt",
            "code": "TKT-X",
            "user_id": 1,
            "product_code": "SIMPLE",
            "route_code": null,
            "issued_at": "2025-01-01T12:00:00Z",
        });
        let encoded = STANDARD.encode(doc.to_string());
        assert!(matches!(
            QrPayload::decode(&encoded),
            Err(QrError::WrongKind(kind)) if kind == "receipt"
        ));
    }
}
