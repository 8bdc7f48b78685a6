//! Rows exchanged with the raffle service
//!
//! Every answer is wrapped in an envelope `{ "status": bool, "data": ... }`.

use std::collections::BTreeMap;

use drawdesk_core::{Category, Prize, PrizeId, Ticket, TicketOwner};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug)]
pub struct Envelope<T> {
    #[serde(default = "default_status")]
    pub status: bool,
    pub data: T,
}
fn default_status() -> bool {
    true
}

/// A ticket of the draw pool
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DrawTicketRow {
    #[serde(default)]
    pub id: u64,
    pub ticket_number: String,
    #[serde(default)]
    pub is_winner: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CategoryRow {
    #[serde(default)]
    pub id: u64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrizeRow {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub category_id: u64,
    #[serde(default)]
    pub is_drawn: bool,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct EmployeeRow {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A ticket sold to an employee
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct OwnedTicketRow {
    pub employee_id: u64,
    pub ticket_no: String,
}

/// Undrawn tickets of the pool, in service order.
pub fn pool_from_rows(rows: Vec<DrawTicketRow>) -> Vec<Ticket> {
    rows.into_iter()
        .filter(|r| !r.is_winner)
        .filter_map(|r| Ticket::new(r.ticket_number))
        .collect()
}

pub fn categories_from_rows(rows: &[CategoryRow]) -> Vec<Category> {
    rows.iter().filter_map(|r| Category::new(&r.name)).collect()
}

pub fn category_id(rows: &[CategoryRow], category: &Category) -> Option<u64> {
    rows.iter()
        .find(|r| Category::new(&r.name).as_ref() == Some(category))
        .map(|r| r.id)
}

/// Resolves the category of a prize row. None if the category is unknown.
pub fn prize_from_row(row: PrizeRow, categories: &[CategoryRow]) -> Option<Prize> {
    let category = categories.iter()
        .find(|c| c.id == row.category_id)
        .and_then(|c| Category::new(&c.name))?;
    let mut prize = Prize::new(PrizeId::new(row.id.to_string()), row.name, category);
    prize.is_assigned = row.is_drawn;
    Some(prize)
}

/// Groups the sold tickets by employee. Employees without tickets are kept.
pub fn owners_from_rows(employees: Vec<EmployeeRow>, tickets: Vec<OwnedTicketRow>) -> Vec<TicketOwner> {
    let mut by_employee: BTreeMap<u64, Vec<Ticket>> = BTreeMap::new();
    for row in tickets {
        if let Some(ticket) = Ticket::new(row.ticket_no) {
            by_employee.entry(row.employee_id).or_default().push(ticket);
        }
    }
    employees.into_iter()
        .map(|e| TicketOwner {
            id: e.id.to_string(),
            ticket_numbers: by_employee.remove(&e.id).unwrap_or_default(),
            name: e.name,
            email: e.email,
        })
        .collect()
}
