//! REST client of the raffle service

mod wire;

use async_trait::async_trait;
use drawdesk_core::{
    service::{HistoryRecord, RemoteWinner, ServiceResult},
    Category, DrawRequest, Prize, PrizeId, RaffleService, ServiceError, Ticket, TicketOwner,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::log_warn;
use wire::{CategoryRow, DrawTicketRow, EmployeeRow, Envelope, OwnedTicketRow, PrizeRow};

pub struct RestService {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct NewTicket<'a> {
    ticket_number: &'a str,
}
#[derive(Serialize)]
struct NewCategory<'a> {
    name: &'a str,
}
#[derive(Serialize)]
struct PrizeInput<'a> {
    name: &'a str,
    category_id: u64,
    is_drawn: bool,
}
#[derive(Serialize)]
struct OwnerInput<'a> {
    name: &'a str,
    email: Option<&'a str>,
    ticket_numbers: Vec<&'a str>,
}
impl<'a> From<&'a TicketOwner> for OwnerInput<'a> {
    fn from(owner: &'a TicketOwner) -> Self {
        Self {
            name: &owner.name,
            email: owner.email.as_deref(),
            ticket_numbers: owner.ticket_numbers.iter().map(Ticket::as_str).collect(),
        }
    }
}

impl RestService {
    pub fn new<S: Into<String>>(base_url: S, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.url(path))
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
    async fn send(req: RequestBuilder) -> ServiceResult<Response> {
        let res = req.send().await.map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = res.status();
        if status.is_success() {
            Ok(res)
        } else {
            let message = res.text().await.unwrap_or_default();
            Err(ServiceError::Http { status: status.as_u16(), message })
        }
    }
    /// Sends the request and unwraps the data of the envelope.
    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> ServiceResult<T> {
        let res = Self::send(req).await?;
        let status = res.status().as_u16();
        let envelope: Envelope<T> = res.json().await.map_err(|e| ServiceError::Decode(e.to_string()))?;
        if !envelope.status {
            return Err(ServiceError::Http { status, message: "request refused by the service".to_string() });
        }
        Ok(envelope.data)
    }
    async fn execute(&self, req: RequestBuilder) -> ServiceResult<()> {
        Self::send(req).await.map(|_| ())
    }

    async fn ticket_rows(&self) -> ServiceResult<Vec<DrawTicketRow>> {
        self.fetch(self.request(Method::GET, "draw-tickets")).await
    }
    async fn category_rows(&self) -> ServiceResult<Vec<CategoryRow>> {
        self.fetch(self.request(Method::GET, "categories")).await
    }
    async fn category_id(&self, category: &Category) -> ServiceResult<u64> {
        let rows = self.category_rows().await?;
        wire::category_id(&rows, category).ok_or_else(|| ServiceError::Http {
            status: 404,
            message: format!("unknown category {}", category),
        })
    }
    async fn prize_row(&self, id: &PrizeId) -> ServiceResult<PrizeRow> {
        self.fetch(self.request(Method::GET, &format!("prizes/{}", id))).await
    }
    fn prize(row: PrizeRow, categories: &[CategoryRow]) -> ServiceResult<Prize> {
        let category_id = row.category_id;
        wire::prize_from_row(row, categories)
            .ok_or_else(|| ServiceError::Decode(format!("prize with unknown category id {}", category_id)))
    }
}

#[async_trait]
impl RaffleService for RestService {
    async fn fetch_tickets(&self) -> ServiceResult<Vec<Ticket>> {
        Ok(wire::pool_from_rows(self.ticket_rows().await?))
    }
    async fn fetch_prizes(&self) -> ServiceResult<Vec<Prize>> {
        let categories = self.category_rows().await?;
        let rows: Vec<PrizeRow> = self.fetch(self.request(Method::GET, "prizes")).await?;
        let mut prizes = Vec::with_capacity(rows.len());
        for row in rows {
            match Self::prize(row, &categories) {
                Ok(prize) => prizes.push(prize),
                Err(e) => log_warn!("Prize skipped: {}", e),
            }
        }
        Ok(prizes)
    }
    async fn fetch_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(wire::categories_from_rows(&self.category_rows().await?))
    }
    async fn fetch_owners(&self) -> ServiceResult<Vec<TicketOwner>> {
        let employees: Vec<EmployeeRow> = self.fetch(self.request(Method::GET, "employees")).await?;
        let tickets: Vec<OwnedTicketRow> = self.fetch(self.request(Method::GET, "tickets")).await?;
        Ok(wire::owners_from_rows(employees, tickets))
    }

    async fn create_owner(&self, owner: &TicketOwner) -> ServiceResult<TicketOwner> {
        let req = self.request(Method::POST, "employees").json(&OwnerInput::from(owner));
        let row: EmployeeRow = self.fetch(req).await?;
        Ok(TicketOwner {
            id: row.id.to_string(),
            name: row.name,
            email: row.email,
            ticket_numbers: owner.ticket_numbers.clone(),
        })
    }
    async fn update_owner(&self, owner: &TicketOwner) -> ServiceResult<()> {
        let req = self.request(Method::PUT, &format!("employees/{}", owner.id))
            .json(&OwnerInput::from(owner));
        self.execute(req).await
    }
    async fn delete_owner(&self, id: &str) -> ServiceResult<()> {
        self.execute(self.request(Method::DELETE, &format!("employees/{}", id))).await
    }

    async fn create_ticket(&self, ticket: &Ticket) -> ServiceResult<()> {
        let req = self.request(Method::POST, "draw-tickets")
            .json(&NewTicket { ticket_number: ticket.as_str() });
        self.execute(req).await
    }
    async fn delete_ticket(&self, ticket: &Ticket) -> ServiceResult<()> {
        let rows = self.ticket_rows().await?;
        let ids: Vec<u64> = rows.iter()
            .filter(|r| r.ticket_number.trim() == ticket.as_str())
            .map(|r| r.id)
            .collect();
        if ids.is_empty() {
            log_warn!("Ticket {} already absent from the service", ticket);
        }
        for id in ids {
            self.execute(self.request(Method::DELETE, &format!("draw-tickets/{}", id))).await?;
        }
        Ok(())
    }
    async fn clear_tickets(&self) -> ServiceResult<()> {
        self.execute(self.request(Method::DELETE, "draw-tickets")).await
    }

    async fn create_category(&self, category: &Category) -> ServiceResult<()> {
        let req = self.request(Method::POST, "categories")
            .json(&NewCategory { name: category.as_str() });
        self.execute(req).await
    }
    async fn delete_category(&self, category: &Category) -> ServiceResult<()> {
        let id = self.category_id(category).await?;
        self.execute(self.request(Method::DELETE, &format!("categories/{}", id))).await
    }

    async fn create_prize(&self, name: &str, category: &Category) -> ServiceResult<Prize> {
        let categories = self.category_rows().await?;
        let category_id = wire::category_id(&categories, category).ok_or_else(|| ServiceError::Http {
            status: 404,
            message: format!("unknown category {}", category),
        })?;
        let req = self.request(Method::POST, "prizes")
            .json(&PrizeInput { name, category_id, is_drawn: false });
        let row: PrizeRow = self.fetch(req).await?;
        Self::prize(row, &categories)
    }
    async fn update_prize(&self, prize: &Prize) -> ServiceResult<()> {
        let category_id = self.category_id(&prize.category).await?;
        let req = self.request(Method::PUT, &format!("prizes/{}", prize.id))
            .json(&PrizeInput { name: &prize.name, category_id, is_drawn: prize.is_assigned });
        self.execute(req).await
    }
    async fn delete_prize(&self, id: &PrizeId) -> ServiceResult<()> {
        self.execute(self.request(Method::DELETE, &format!("prizes/{}", id))).await
    }
    async fn mark_prize_drawn(&self, id: &PrizeId) -> ServiceResult<()> {
        let row = self.prize_row(id).await?;
        if row.is_drawn {
            return Ok(());
        }
        let req = self.request(Method::PUT, &format!("prizes/{}", id))
            .json(&PrizeInput { name: &row.name, category_id: row.category_id, is_drawn: true });
        self.execute(req).await
    }

    async fn draw(&self, request: &DrawRequest) -> ServiceResult<Vec<RemoteWinner>> {
        self.fetch(self.request(Method::POST, "draw").json(request)).await
    }
    async fn record_result(&self, record: &HistoryRecord) -> ServiceResult<()> {
        self.execute(self.request(Method::POST, "result-histories").json(record)).await
    }
    async fn clear_history(&self) -> ServiceResult<()> {
        self.execute(self.request(Method::DELETE, "result-histories")).await
    }
}
