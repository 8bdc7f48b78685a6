//! Raffle data model

use std::{fmt, num::NonZeroUsize};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DrawError;

const TEMPORARY_PREFIX: &str = "tmp-";

/// A ticket identifier, e.g. `0042`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Ticket(String);

impl Ticket {
    /// Trimmed ticket identifier. None if nothing is left.
    pub fn new<S: AsRef<str>>(value: S) -> Option<Ticket> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            None
        } else {
            Some(Ticket(value.to_string()))
        }
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category label of prizes and draws.
///
/// Categories are operator-defined at runtime, so this stays an opaque label instead of an enum.
/// Labels are trimmed and upper-cased: `" b "` and `"B"` are the same category.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new<S: AsRef<str>>(label: S) -> Option<Category> {
        let label = label.as_ref().trim().to_uppercase();
        if label.is_empty() {
            None
        } else {
            Some(Category(label))
        }
    }
    /// Categories available after a full reset.
    pub fn defaults() -> Vec<Category> {
        ["A", "B", "C"].iter().map(|c| Category(c.to_string())).collect()
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prize identifier.
///
/// Authoritative ids are given by the service. While a creation is pending, the prize
/// carries a temporary id generated locally.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PrizeId(String);

impl PrizeId {
    pub fn new<S: Into<String>>(id: S) -> PrizeId {
        PrizeId(id.into())
    }
    pub fn temporary() -> PrizeId {
        PrizeId(format!("{}{}", TEMPORARY_PREFIX, Uuid::new_v4()))
    }
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for PrizeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Prize {
    pub id: PrizeId,
    pub name: String,
    pub category: Category,
    pub is_assigned: bool,
    pub assigned_to: Option<Ticket>,
}

impl Prize {
    pub fn new<S: Into<String>>(id: PrizeId, name: S, category: Category) -> Prize {
        Prize {
            id,
            name: name.into(),
            category,
            is_assigned: false,
            assigned_to: None,
        }
    }
    /// Awards the prize to a ticket. Assignment is one-way: an assigned prize is frozen.
    pub fn assign(&mut self, ticket: &Ticket) -> Result<(), DrawError> {
        if self.is_assigned {
            return Err(DrawError::Invariant(format!("prize {} is already assigned", self.id)));
        }
        self.is_assigned = true;
        self.assigned_to = Some(ticket.clone());
        Ok(())
    }
    #[inline]
    pub fn is_available_in(&self, category: &Category) -> bool {
        !self.is_assigned && &self.category == category
    }
}

/// One ticket paired with one prize.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DrawResult {
    pub id: Uuid,
    pub ticket: Ticket,
    pub prize: Prize,
    pub category: Category,
    pub owner_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The batch of results of a single draw. The history ledger keeps them most recent first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DrawHistoryEntry {
    pub id: Uuid,
    pub results: Vec<DrawResult>,
    pub category: Category,
    pub group_size: GroupSize,
    pub timestamp: DateTime<Utc>,
}

/// A person holding tickets. Shown beside a drawn ticket, never used to pick winners.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TicketOwner {
    pub id: String,
    pub name: String,
    pub ticket_numbers: Vec<Ticket>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TicketOwner {
    pub fn owns(&self, ticket: &Ticket) -> bool {
        self.ticket_numbers.contains(ticket)
    }
}

/// Number of winners of one draw. Always at least 1.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct GroupSize(NonZeroUsize);

impl GroupSize {
    pub fn new(size: usize) -> Result<GroupSize, DrawError> {
        NonZeroUsize::new(size)
            .map(GroupSize)
            .ok_or_else(|| DrawError::Invariant("group size must be at least 1".to_string()))
    }
    #[inline]
    pub fn get(self) -> usize {
        self.0.get()
    }
}
impl fmt::Display for GroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the operator asked for.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DrawRequest {
    pub category: Category,
    pub group_size: GroupSize,
    /// Explicit prize, only honoured for single-winner draws.
    pub prize_id: Option<PrizeId>,
}

impl DrawRequest {
    pub fn new(category: Category, group_size: GroupSize) -> Self {
        Self { category, group_size, prize_id: None }
    }
    pub fn with_prize(mut self, prize_id: PrizeId) -> Self {
        self.prize_id = Some(prize_id);
        self
    }
}

/// Persisted subset of the raffle state.
///
/// Only a warm-start cache: the service stays the source of truth.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    #[serde(default)]
    pub prizes: Vec<Prize>,
    #[serde(default = "Category::defaults")]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub owners: Vec<TicketOwner>,
    #[serde(default)]
    pub history: Vec<DrawHistoryEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            tickets: Vec::new(),
            prizes: Vec::new(),
            categories: Category::defaults(),
            owners: Vec::new(),
            history: Vec::new(),
        }
    }
}
