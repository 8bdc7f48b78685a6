//! Raffle state owned by the draw engine.

use std::collections::HashSet;

use crate::{
    error::DrawError,
    model::{Category, DrawHistoryEntry, DrawResult, Prize, PrizeId, Snapshot, Ticket, TicketOwner},
};

#[derive(Debug, Clone, Default)]
pub struct RaffleState {
    /// Ticket pool. Never holds the same ticket twice.
    pub tickets: Vec<Ticket>,
    pub prizes: Vec<Prize>,
    pub categories: Vec<Category>,
    /// Read-only context, used to name the owner of a drawn ticket
    pub owners: Vec<TicketOwner>,
    pub current_results: Vec<DrawResult>,
    /// Most recent first
    pub history: Vec<DrawHistoryEntry>,
}

/// Copy of everything a draw mutates, restored when the draw fails.
#[derive(Debug, Clone)]
pub(crate) struct DrawBackup {
    tickets: Vec<Ticket>,
    prizes: Vec<Prize>,
    current_results: Vec<DrawResult>,
    history: Vec<DrawHistoryEntry>,
}

impl RaffleState {
    /// Prizes of the category that can still be won.
    ///
    /// Prizes whose creation is still pending on the service are left out.
    pub fn available_prizes(&self, category: &Category) -> Vec<Prize> {
        self.prizes.iter()
            .filter(|p| p.is_available_in(category) && !p.id.is_temporary())
            .cloned()
            .collect()
    }
    pub fn prizes_by_category(&self, category: &Category) -> Vec<Prize> {
        self.prizes.iter()
            .filter(|p| &p.category == category)
            .cloned()
            .collect()
    }
    pub fn prize(&self, id: &PrizeId) -> Option<&Prize> {
        self.prizes.iter().find(|p| &p.id == id)
    }
    pub fn owner_of(&self, ticket: &Ticket) -> Option<&TicketOwner> {
        self.owners.iter().find(|o| o.owns(ticket))
    }
    pub fn has_ticket(&self, ticket: &Ticket) -> bool {
        self.tickets.contains(ticket)
    }

    pub(crate) fn backup(&self) -> DrawBackup {
        DrawBackup {
            tickets: self.tickets.clone(),
            prizes: self.prizes.clone(),
            current_results: self.current_results.clone(),
            history: self.history.clone(),
        }
    }
    pub(crate) fn restore(&mut self, backup: DrawBackup) {
        self.tickets = backup.tickets;
        self.prizes = backup.prizes;
        self.current_results = backup.current_results;
        self.history = backup.history;
    }

    /// Applies a settled draw: winners leave the pool, prizes get assigned, the results
    /// become the current ones and the entry is prepended to the history.
    ///
    /// Nothing is changed if any winner or prize doesn't match the state.
    pub(crate) fn apply_draw(&mut self, entry: DrawHistoryEntry) -> Result<(), DrawError> {
        let mut seen_prizes = HashSet::new();
        for result in &entry.results {
            if !self.has_ticket(&result.ticket) {
                return Err(DrawError::Invariant(format!("ticket {} is not in the pool", result.ticket)));
            }
            match self.prize(&result.prize.id) {
                Some(prize) if prize.is_assigned => return Err(DrawError::PrizeFrozen(prize.id.clone())),
                Some(_) => (),
                None => return Err(DrawError::UnknownPrize(result.prize.id.clone())),
            }
            if !seen_prizes.insert(&result.prize.id) {
                return Err(DrawError::Invariant(format!("prize {} is awarded twice", result.prize.id)));
            }
        }
        let winners: HashSet<&Ticket> = entry.results.iter().map(|r| &r.ticket).collect();
        self.tickets.retain(|t| !winners.contains(t));
        for result in &entry.results {
            if let Some(prize) = self.prizes.iter_mut().find(|p| p.id == result.prize.id) {
                prize.assign(&result.ticket)?;
            }
        }
        self.current_results = entry.results.clone();
        self.history.insert(0, entry);
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tickets: self.tickets.clone(),
            prizes: self.prizes.clone(),
            categories: self.categories.clone(),
            owners: self.owners.clone(),
            history: self.history.clone(),
        }
    }
}

impl From<Snapshot> for RaffleState {
    fn from(snapshot: Snapshot) -> Self {
        let mut seen = HashSet::new();
        let tickets = snapshot.tickets.into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        Self {
            tickets,
            prizes: snapshot.prizes,
            categories: snapshot.categories,
            owners: snapshot.owners,
            current_results: Vec::new(),
            history: snapshot.history,
        }
    }
}
