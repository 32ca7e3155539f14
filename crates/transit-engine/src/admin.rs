//! Administrative ticket lifecycle: cancellation and assignment of bulk stock.

use tracing::info;
use transit_core::validation::validate_ticket_code;
use transit_core::{Ticket, TicketStatus};
use transit_db::Database;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct TicketAdmin {
    db: Database,
}

impl TicketAdmin {
    pub fn new(db: Database) -> Self {
        TicketAdmin { db }
    }

    async fn load(&self, code: &str) -> EngineResult<(String, Ticket)> {
        let code = validate_ticket_code(code)?;
        let ticket = self
            .db
            .tickets()
            .find_by_code(&code)
            .await?
            .ok_or_else(|| EngineError::TicketNotFound(code.clone()))?;
        Ok((code, ticket))
    }

    /// Cancels an active ticket so later scans are rejected.
    pub async fn cancel_ticket(&self, code: &str) -> EngineResult<Ticket> {
        let (code, ticket) = self.load(code).await?;
        let repo = self.db.tickets();

        if ticket.status != TicketStatus::Active || !repo.cancel(&code).await? {
            let status = current_status(&repo.find_by_code(&code).await?, ticket.status);
            return Err(EngineError::TicketNotActive { code, status });
        }

        info!(code = %code, "Ticket cancelled");
        repo.find_by_code(&code)
            .await?
            .ok_or(EngineError::TicketNotFound(code))
    }

    /// Hands an unassigned ticket to `user_id`.
    pub async fn assign_ticket(&self, code: &str, user_id: i64) -> EngineResult<Ticket> {
        let (code, ticket) = self.load(code).await?;
        let repo = self.db.tickets();

        if ticket.is_assigned() {
            return Err(EngineError::TicketAlreadyAssigned(code));
        }
        if ticket.status != TicketStatus::Active {
            return Err(EngineError::TicketNotActive {
                code,
                status: ticket.status,
            });
        }

        if !repo.assign(&code, user_id).await? {
            // Lost a race with another admin action; report what is stored now.
            return match repo.find_by_code(&code).await? {
                Some(current) if current.is_assigned() => {
                    Err(EngineError::TicketAlreadyAssigned(code))
                }
                Some(current) => Err(EngineError::TicketNotActive {
                    code,
                    status: current.status,
                }),
                None => Err(EngineError::TicketNotFound(code)),
            };
        }

        info!(code = %code, user_id, "Ticket assigned");
        repo.find_by_code(&code)
            .await?
            .ok_or(EngineError::TicketNotFound(code))
    }
}

fn current_status(current: &Option<Ticket>, fallback: TicketStatus) -> TicketStatus {
    current.as_ref().map(|t| t.status).unwrap_or(fallback)
}
