//! # QR Validation Engine
//!
//! Redeems a trip when a validator scans a ticket.
//!
//! ## Scan Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  code (typed, or recovered from the QR payload)                        │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  read ticket ──(absent)──► Rejected(not_found)                         │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  decide(ticket, now)                                                   │
//! │     ├── Reject ─────────────────────────────► Rejected(...)           │
//! │     ├── Expire ── BEGIN; CAS → expired; COMMIT ► Rejected(expired)     │
//! │     └── Redeem ── BEGIN; CAS trips/status;                             │
//! │                   INSERT validation; COMMIT ► Validated                │
//! │                                                                         │
//! │  CAS lost or database busy: ROLLBACK, re-read, decide again            │
//! │  (at most MAX_SCAN_ATTEMPTS times, then ScanContention)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The QR payload is never trusted: it only yields a code, and every
//! decision is made on the row read from the store.

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};
use transit_core::scan::{decide, ScanDecision, ScanRejection};
use transit_core::validation::validate_ticket_code;
use transit_core::{QrPayload, Ticket, TicketValidation, ValidationError, ValidationMethod};
use transit_db::{Database, DbError, NewValidation};

use crate::error::{EngineError, EngineResult};

/// Scan attempts before giving up on a contended ticket.
pub const MAX_SCAN_ATTEMPTS: u32 = 5;

/// One scan from a validator device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    pub ticket_code: Option<String>,
    /// Base64 QR payload; used when no code is typed in.
    pub qr_payload: Option<String>,
    pub line_id: Option<i64>,
    pub stop_id: Option<i64>,
    pub validator_device_id: Option<String>,
    /// Defaults to `qr_scan` for payloads and `manual_code` for typed codes.
    pub method: Option<ValidationMethod>,
    /// Authenticated operator, filled in by the caller.
    #[serde(skip)]
    pub validated_by: Option<i64>,
}

/// Result of a scan. Rejections are normal outcomes, not errors.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Validated {
        ticket: Ticket,
        validation: TicketValidation,
    },
    Rejected {
        rejection: ScanRejection,
        /// The ticket as stored, when one was found.
        ticket: Option<Ticket>,
    },
}

impl ScanOutcome {
    fn rejected(rejection: ScanRejection, ticket: Option<Ticket>) -> Self {
        ScanOutcome::Rejected { rejection, ticket }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, ScanOutcome::Validated { .. })
    }

    pub fn rejection(&self) -> Option<ScanRejection> {
        match self {
            ScanOutcome::Validated { .. } => None,
            ScanOutcome::Rejected { rejection, .. } => Some(*rejection),
        }
    }
}

/// Where the scanned code came from.
enum ScannedCode {
    Code(String, ValidationMethod),
    Unreadable,
}

/// Validates scans against the ticket store.
#[derive(Debug, Clone)]
pub struct ScanValidator {
    db: Database,
}

impl ScanValidator {
    pub fn new(db: Database) -> Self {
        ScanValidator { db }
    }

    /// Runs one scan to a terminal outcome.
    ///
    /// Errors only on store failure, a request with neither code nor payload,
    /// or persistent contention on the same ticket.
    pub async fn validate(&self, request: ScanRequest) -> EngineResult<ScanOutcome> {
        let (code, method) = match scanned_code(&request)? {
            ScannedCode::Code(code, method) => (code, method),
            ScannedCode::Unreadable => {
                info!(device = ?request.validator_device_id, "Unreadable ticket presented");
                return Ok(ScanOutcome::rejected(ScanRejection::NotFound, None));
            }
        };

        let repo = self.db.tickets();
        let Some(mut ticket) = repo.find_by_code(&code).await? else {
            info!(code = %code, "Scan of unknown ticket");
            return Ok(ScanOutcome::rejected(ScanRejection::NotFound, None));
        };

        let validation = NewValidation {
            line_id: request.line_id,
            stop_id: request.stop_id,
            validator_device_id: request.validator_device_id.clone(),
            validated_by: request.validated_by,
            method,
        };

        for attempt in 1..=MAX_SCAN_ATTEMPTS {
            match self.attempt(&ticket, &validation).await {
                Ok(Some(outcome)) => {
                    match &outcome {
                        ScanOutcome::Validated { ticket, .. } => info!(
                            code = %code,
                            trips_remaining = ticket.trips_remaining,
                            status = ticket.status.as_str(),
                            line_id = ?validation.line_id,
                            "Ticket validated"
                        ),
                        ScanOutcome::Rejected { rejection, .. } => {
                            info!(code = %code, reason = rejection.code(), "Scan rejected")
                        }
                    }
                    return Ok(outcome);
                }
                Ok(None) => {
                    debug!(code = %code, attempt, "Ticket changed during scan, re-reading");
                }
                Err(EngineError::Db(DbError::Busy)) => {
                    warn!(code = %code, attempt, "Database busy during scan, retrying");
                }
                Err(e) => return Err(e),
            }

            ticket = match repo.get_by_id(&ticket.id).await? {
                Some(ticket) => ticket,
                None => return Ok(ScanOutcome::rejected(ScanRejection::NotFound, None)),
            };
        }

        warn!(code = %code, attempts = MAX_SCAN_ATTEMPTS, "Scan gave up under contention");
        Err(EngineError::ScanContention {
            code,
            attempts: MAX_SCAN_ATTEMPTS,
        })
    }

    /// Decides on `ticket` and persists the decision.
    ///
    /// `None` means the row no longer matched what was read.
    async fn attempt(
        &self,
        ticket: &Ticket,
        validation: &NewValidation,
    ) -> EngineResult<Option<ScanOutcome>> {
        let repo = self.db.tickets();

        match decide(ticket, Utc::now()) {
            ScanDecision::Reject(rejection) => {
                Ok(Some(ScanOutcome::rejected(rejection, Some(ticket.clone()))))
            }

            ScanDecision::Expire => {
                let mut tx = self.db.begin().await?;
                if !repo.mark_expired(&mut tx, &ticket.id).await? {
                    tx.rollback().await.map_err(DbError::from)?;
                    return Ok(None);
                }
                let expired = repo.get_by_id_in(&mut tx, &ticket.id).await?;
                tx.commit().await.map_err(DbError::from)?;

                info!(code = %ticket.code, "Ticket expired at scan");
                Ok(Some(ScanOutcome::rejected(ScanRejection::Expired, expired)))
            }

            ScanDecision::Redeem {
                trips_remaining,
                status,
            } => {
                let mut tx = self.db.begin().await?;
                let swapped = repo
                    .update_on_validation(
                        &mut tx,
                        &ticket.id,
                        ticket.trips_remaining,
                        trips_remaining,
                        status,
                    )
                    .await?;
                if !swapped {
                    tx.rollback().await.map_err(DbError::from)?;
                    return Ok(None);
                }

                let audit = repo.record_validation(&mut tx, &ticket.id, validation).await?;
                let updated = repo
                    .get_by_id_in(&mut tx, &ticket.id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Ticket", &ticket.id))?;
                tx.commit().await.map_err(DbError::from)?;

                Ok(Some(ScanOutcome::Validated {
                    ticket: updated,
                    validation: audit,
                }))
            }
        }
    }
}

/// Extracts the ticket code from a scan request.
fn scanned_code(request: &ScanRequest) -> EngineResult<ScannedCode> {
    let typed = request
        .ticket_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    if let Some(code) = typed {
        let method = request.method.unwrap_or(ValidationMethod::ManualCode);
        return Ok(match validate_ticket_code(code) {
            Ok(code) => ScannedCode::Code(code, method),
            Err(_) => ScannedCode::Unreadable,
        });
    }

    let payload = request
        .qr_payload
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ValidationError::required("ticket_code"))?;

    let method = request.method.unwrap_or(ValidationMethod::QrScan);
    Ok(match QrPayload::decode(payload) {
        Ok(decoded) => match validate_ticket_code(&decoded.code) {
            Ok(code) => ScannedCode::Code(code, method),
            Err(_) => ScannedCode::Unreadable,
        },
        Err(e) => {
            debug!(error = %e, "QR payload could not be decoded");
            ScannedCode::Unreadable
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ScanRequest {
        ScanRequest::default()
    }

    #[test]
    fn test_typed_code_defaults_to_manual() {
        let req = ScanRequest {
            ticket_code: Some("  TKT-20250101120000-1A2B3C4D ".into()),
            ..request()
        };
        match scanned_code(&req).unwrap() {
            ScannedCode::Code(code, method) => {
                assert_eq!(code, "TKT-20250101120000-1A2B3C4D");
                assert_eq!(method, ValidationMethod::ManualCode);
            }
            ScannedCode::Unreadable => panic!("expected a code"),
        }
    }

    #[test]
    fn test_payload_defaults_to_qr_scan() {
        let payload = QrPayload::new(
            "TKT-20250101120000-1A2B3C4D",
            Some(7),
            "SIMPLE",
            Some("12".into()),
            Utc::now(),
        )
        .encode()
        .unwrap();

        let req = ScanRequest {
            qr_payload: Some(payload),
            ..request()
        };
        match scanned_code(&req).unwrap() {
            ScannedCode::Code(code, method) => {
                assert_eq!(code, "TKT-20250101120000-1A2B3C4D");
                assert_eq!(method, ValidationMethod::QrScan);
            }
            ScannedCode::Unreadable => panic!("expected a code"),
        }
    }

    #[test]
    fn test_unreadable_inputs() {
        let garbage = ScanRequest {
            qr_payload: Some("%%%not-base64%%%".into()),
            ..request()
        };
        assert!(matches!(scanned_code(&garbage).unwrap(), ScannedCode::Unreadable));

        let bad_code = ScanRequest {
            ticket_code: Some("TKT 1".into()),
            ..request()
        };
        assert!(matches!(scanned_code(&bad_code).unwrap(), ScannedCode::Unreadable));
    }

    #[test]
    fn test_missing_code_is_a_validation_error() {
        assert!(matches!(
            scanned_code(&request()),
            Err(EngineError::Core(_))
        ));
    }
}
