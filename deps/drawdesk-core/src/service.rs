//! Boundary with the external raffle service.
//!
//! The service owns durable state: the ticket pool, prizes, categories, owners and the draw
//! history. The engine only mirrors it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ServiceError,
    model::{Category, DrawRequest, DrawResult, Prize, PrizeId, Ticket, TicketOwner},
};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One winning pair computed by the service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWinner {
    pub ticket_number: Ticket,
    pub prize_id: PrizeId,
    pub prize_name: String,
    pub category: Category,
}

/// One persisted row of the draw history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub ticket_number: Ticket,
    pub prize_id: PrizeId,
    pub prize_name: String,
    pub category: Category,
    pub assigned_to: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&DrawResult> for HistoryRecord {
    fn from(result: &DrawResult) -> Self {
        Self {
            ticket_number: result.ticket.clone(),
            prize_id: result.prize.id.clone(),
            prize_name: result.prize.name.clone(),
            category: result.category.clone(),
            assigned_to: result.owner_name.clone(),
            timestamp: result.timestamp,
        }
    }
}

#[async_trait]
pub trait RaffleService: Send + Sync {
    /// False when the service can't be trusted as the source of truth. Refreshes are skipped.
    fn is_authoritative(&self) -> bool {
        true
    }

    async fn fetch_tickets(&self) -> ServiceResult<Vec<Ticket>>;
    async fn fetch_prizes(&self) -> ServiceResult<Vec<Prize>>;
    async fn fetch_categories(&self) -> ServiceResult<Vec<Category>>;
    async fn fetch_owners(&self) -> ServiceResult<Vec<TicketOwner>>;

    async fn create_ticket(&self, ticket: &Ticket) -> ServiceResult<()>;
    async fn delete_ticket(&self, ticket: &Ticket) -> ServiceResult<()>;
    /// Bulk reset of the ticket pool
    async fn clear_tickets(&self) -> ServiceResult<()>;

    async fn create_category(&self, category: &Category) -> ServiceResult<()>;
    async fn delete_category(&self, category: &Category) -> ServiceResult<()>;

    /// Creates a prize and returns it with its authoritative id.
    async fn create_prize(&self, name: &str, category: &Category) -> ServiceResult<Prize>;
    async fn update_prize(&self, prize: &Prize) -> ServiceResult<()>;
    async fn delete_prize(&self, id: &PrizeId) -> ServiceResult<()>;
    /// Marks a prize consumed. Safe to call again for the same prize.
    async fn mark_prize_drawn(&self, id: &PrizeId) -> ServiceResult<()>;

    /// Creates an owner and returns it with its authoritative id.
    async fn create_owner(&self, owner: &TicketOwner) -> ServiceResult<TicketOwner>;
    async fn update_owner(&self, owner: &TicketOwner) -> ServiceResult<()>;
    async fn delete_owner(&self, id: &str) -> ServiceResult<()>;

    /// Server-side draw.
    async fn draw(&self, request: &DrawRequest) -> ServiceResult<Vec<RemoteWinner>>;
    async fn record_result(&self, record: &HistoryRecord) -> ServiceResult<()>;
    /// Bulk reset of the draw history
    async fn clear_history(&self) -> ServiceResult<()>;
}

/// Service used without a backend.
///
/// Every write is accepted, reads are empty, and server-side draws are refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineService;

#[async_trait]
impl RaffleService for OfflineService {
    fn is_authoritative(&self) -> bool {
        false
    }
    async fn fetch_tickets(&self) -> ServiceResult<Vec<Ticket>> {
        Ok(Vec::new())
    }
    async fn fetch_prizes(&self) -> ServiceResult<Vec<Prize>> {
        Ok(Vec::new())
    }
    async fn fetch_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(Vec::new())
    }
    async fn fetch_owners(&self) -> ServiceResult<Vec<TicketOwner>> {
        Ok(Vec::new())
    }
    async fn create_ticket(&self, _: &Ticket) -> ServiceResult<()> {
        Ok(())
    }
    async fn delete_ticket(&self, _: &Ticket) -> ServiceResult<()> {
        Ok(())
    }
    async fn clear_tickets(&self) -> ServiceResult<()> {
        Ok(())
    }
    async fn create_category(&self, _: &Category) -> ServiceResult<()> {
        Ok(())
    }
    async fn delete_category(&self, _: &Category) -> ServiceResult<()> {
        Ok(())
    }
    async fn create_prize(&self, name: &str, category: &Category) -> ServiceResult<Prize> {
        Ok(Prize::new(PrizeId::new(uuid::Uuid::new_v4().to_string()), name, category.clone()))
    }
    async fn update_prize(&self, _: &Prize) -> ServiceResult<()> {
        Ok(())
    }
    async fn delete_prize(&self, _: &PrizeId) -> ServiceResult<()> {
        Ok(())
    }
    async fn mark_prize_drawn(&self, _: &PrizeId) -> ServiceResult<()> {
        Ok(())
    }
    async fn create_owner(&self, owner: &TicketOwner) -> ServiceResult<TicketOwner> {
        Ok(TicketOwner {
            id: uuid::Uuid::new_v4().to_string(),
            ..owner.clone()
        })
    }
    async fn update_owner(&self, _: &TicketOwner) -> ServiceResult<()> {
        Ok(())
    }
    async fn delete_owner(&self, _: &str) -> ServiceResult<()> {
        Ok(())
    }
    async fn draw(&self, _: &DrawRequest) -> ServiceResult<Vec<RemoteWinner>> {
        Err(ServiceError::Unsupported("draw"))
    }
    async fn record_result(&self, _: &HistoryRecord) -> ServiceResult<()> {
        Ok(())
    }
    async fn clear_history(&self) -> ServiceResult<()> {
        Ok(())
    }
}
