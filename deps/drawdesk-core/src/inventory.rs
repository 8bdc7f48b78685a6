//! Inventory management outside of draws.
//!
//! Every operation applies its change locally first, then calls the service. When the call
//! fails the local change is undone and the error returned. Prizes created this way carry a
//! temporary id until the service gives the real one.
//!
//! Each one holds the engine in `Editing` until the service answered, so a draw can't start
//! in between, and all of them are refused while a draw or a sync is running.

use std::collections::HashSet;

use crate::{
    engine::DrawEngine,
    error::{DrawError, MultiResult, ServiceError},
    model::{Category, Prize, PrizeId, Ticket, TicketOwner},
};

/// Largest span accepted by [`DrawEngine::add_ticket_range`]
pub const MAX_TICKET_RANGE: u64 = 10_000;

/// Outcome of a ticket import.
#[derive(Debug, Default)]
pub struct AddedTickets {
    pub added: Vec<Ticket>,
    /// Already in the pool, or repeated in the input
    pub duplicates: Vec<Ticket>,
    /// Refused by the service, not in the pool
    pub failed: Vec<(Ticket, ServiceError)>,
}

impl DrawEngine {
    /// Adds tickets to the pool, skipping the ones already present.
    pub async fn add_tickets(&self, tickets: Vec<Ticket>) -> Result<AddedTickets, DrawError> {
        let _edit = self.begin_edit()?;
        let mut duplicates = Vec::new();
        let fresh: Vec<Ticket> = {
            let mut state = self.state.write().await;
            let mut seen: HashSet<Ticket> = state.tickets.iter().cloned().collect();
            let mut fresh = Vec::new();
            for ticket in tickets {
                if seen.insert(ticket.clone()) {
                    fresh.push(ticket);
                } else {
                    duplicates.push(ticket);
                }
            }
            state.tickets.extend(fresh.iter().cloned());
            fresh
        };
        let mut created = MultiResult::new();
        for ticket in fresh {
            created.push(match self.service.create_ticket(&ticket).await {
                Ok(()) => Ok(ticket),
                Err(e) => Err((ticket, e)),
            });
        }
        if created.has_err() {
            let failed: HashSet<&Ticket> = created.errs().iter().map(|(t, _)| t).collect();
            log_warn!("{} ticket(s) refused by the service", failed.len());
            self.state.write().await.tickets.retain(|t| !failed.contains(t));
        }
        let (added, failed) = created.extract();
        Ok(AddedTickets { added, duplicates, failed })
    }

    /// Adds every ticket from `start` to `end` included.
    pub async fn add_ticket_range(&self, start: u64, end: u64) -> Result<AddedTickets, DrawError> {
        if start > end {
            return Err(DrawError::InvalidInput("Start must be less than or equal to end".to_string()));
        }
        if end - start > MAX_TICKET_RANGE {
            return Err(DrawError::InvalidInput(format!("Maximum {} tickets at once", MAX_TICKET_RANGE)));
        }
        let tickets = (start..=end)
            .filter_map(|n| Ticket::new(n.to_string()))
            .collect();
        self.add_tickets(tickets).await
    }

    /// Removes tickets from the pool. Tickets the service refuses to delete stay in the pool.
    pub async fn remove_tickets(&self, tickets: &[Ticket]) -> Result<MultiResult<Ticket, (Ticket, ServiceError)>, DrawError> {
        let _edit = self.begin_edit()?;
        let (previous, removed): (Vec<Ticket>, Vec<Ticket>) = {
            let mut state = self.state.write().await;
            let previous = state.tickets.clone();
            let removed = previous.iter()
                .filter(|t| tickets.contains(t))
                .cloned()
                .collect();
            state.tickets.retain(|t| !tickets.contains(t));
            (previous, removed)
        };
        let mut result = MultiResult::new();
        let mut restore = HashSet::new();
        for ticket in removed {
            match self.service.delete_ticket(&ticket).await {
                Ok(()) => result.push_ok(ticket),
                Err(e) => {
                    restore.insert(ticket.clone());
                    result.push_err((ticket, e));
                }
            }
        }
        if !restore.is_empty() {
            // Refused tickets go back to their original position
            let mut state = self.state.write().await;
            let current: HashSet<Ticket> = state.tickets.iter().cloned().collect();
            let mut tickets: Vec<Ticket> = previous.into_iter()
                .filter(|t| restore.contains(t) || current.contains(t))
                .collect();
            let known: HashSet<&Ticket> = tickets.iter().collect();
            let added: Vec<Ticket> = state.tickets.iter()
                .filter(|t| !known.contains(t))
                .cloned()
                .collect();
            tickets.extend(added);
            state.tickets = tickets;
        }
        Ok(result)
    }

    pub async fn clear_tickets(&self) -> Result<(), DrawError> {
        let _edit = self.begin_edit()?;
        let previous = std::mem::take(&mut self.state.write().await.tickets);
        if let Err(e) = self.service.clear_tickets().await {
            log_warn!("Ticket pool not cleared: {}", e);
            self.state.write().await.tickets = previous;
            return Err(e.into());
        }
        Ok(())
    }

    /// Distinct tickets held by the known owners, in owner order.
    pub async fn tickets_from_owners(&self) -> Vec<Ticket> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        state.owners.iter()
            .flat_map(|o| o.ticket_numbers.iter())
            .filter(|t| seen.insert(*t))
            .cloned()
            .collect()
    }
    pub async fn owner_of(&self, ticket: &Ticket) -> Option<TicketOwner> {
        self.state.read().await.owner_of(ticket).cloned()
    }

    pub async fn add_category(&self, name: &str) -> Result<Category, DrawError> {
        let _edit = self.begin_edit()?;
        let category = Category::new(name)
            .ok_or_else(|| DrawError::InvalidInput("Category name is required".to_string()))?;
        {
            let mut state = self.state.write().await;
            if state.categories.contains(&category) {
                return Err(DrawError::CategoryExists(category));
            }
            state.categories.push(category.clone());
        }
        if let Err(e) = self.service.create_category(&category).await {
            self.state.write().await.categories.retain(|c| c != &category);
            return Err(e.into());
        }
        Ok(category)
    }

    /// Deletes a category. Only possible when no prize references it.
    pub async fn delete_category(&self, category: &Category) -> Result<(), DrawError> {
        let _edit = self.begin_edit()?;
        let index = {
            let mut state = self.state.write().await;
            let index = state.categories.iter()
                .position(|c| c == category)
                .ok_or_else(|| DrawError::UnknownCategory(category.clone()))?;
            if state.prizes.iter().any(|p| &p.category == category) {
                return Err(DrawError::CategoryInUse(category.clone()));
            }
            state.categories.remove(index);
            index
        };
        if let Err(e) = self.service.delete_category(category).await {
            let mut state = self.state.write().await;
            let index = index.min(state.categories.len());
            state.categories.insert(index, category.clone());
            return Err(e.into());
        }
        Ok(())
    }

    /// Creates a prize. The prize shows up immediately with a temporary id, replaced by the
    /// service's id once created.
    pub async fn add_prize(&self, name: &str, category: &Category) -> Result<Prize, DrawError> {
        let _edit = self.begin_edit()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DrawError::InvalidInput("Prize name is required".to_string()));
        }
        let tentative = Prize::new(PrizeId::temporary(), name, category.clone());
        {
            let mut state = self.state.write().await;
            if !state.categories.contains(category) {
                return Err(DrawError::UnknownCategory(category.clone()));
            }
            state.prizes.push(tentative.clone());
        }
        let created = self.service.create_prize(name, category).await;
        let mut state = self.state.write().await;
        match created {
            Ok(prize) => {
                match state.prizes.iter_mut().find(|p| p.id == tentative.id) {
                    Some(slot) => *slot = prize.clone(),
                    None => state.prizes.push(prize.clone()),
                }
                Ok(prize)
            }
            Err(e) => {
                state.prizes.retain(|p| p.id != tentative.id);
                Err(e.into())
            }
        }
    }

    pub async fn add_bulk_prizes(&self, prizes: Vec<(String, Category)>) -> Result<MultiResult<Prize, (String, DrawError)>, DrawError> {
        let _edit = self.begin_edit()?;
        let mut result = MultiResult::new();
        for (name, category) in prizes {
            result.push(self.add_prize(&name, &category).await.map_err(|e| (name, e)));
        }
        Ok(result)
    }

    /// Renames or moves an unassigned prize.
    pub async fn update_prize(&self, id: &PrizeId, name: &str, category: &Category) -> Result<Prize, DrawError> {
        let _edit = self.begin_edit()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DrawError::InvalidInput("Prize name is required".to_string()));
        }
        let (previous, updated) = {
            let mut state = self.state.write().await;
            if !state.categories.contains(category) {
                return Err(DrawError::UnknownCategory(category.clone()));
            }
            let prize = state.prizes.iter_mut()
                .find(|p| &p.id == id)
                .ok_or_else(|| DrawError::UnknownPrize(id.clone()))?;
            if prize.is_assigned {
                return Err(DrawError::PrizeFrozen(id.clone()));
            }
            if prize.id.is_temporary() {
                return Err(DrawError::InvalidInput(format!("Prize {} is still being created", prize.name)));
            }
            let previous = prize.clone();
            prize.name = name.to_string();
            prize.category = category.clone();
            (previous, prize.clone())
        };
        if let Err(e) = self.service.update_prize(&updated).await {
            let mut state = self.state.write().await;
            if let Some(prize) = state.prizes.iter_mut().find(|p| &p.id == id) {
                *prize = previous;
            }
            return Err(e.into());
        }
        Ok(updated)
    }

    pub async fn delete_prize(&self, id: &PrizeId) -> Result<(), DrawError> {
        let _edit = self.begin_edit()?;
        let (index, prize) = {
            let mut state = self.state.write().await;
            let index = state.prizes.iter()
                .position(|p| &p.id == id)
                .ok_or_else(|| DrawError::UnknownPrize(id.clone()))?;
            (index, state.prizes.remove(index))
        };
        if let Err(e) = self.service.delete_prize(id).await {
            let mut state = self.state.write().await;
            let index = index.min(state.prizes.len());
            state.prizes.insert(index, prize);
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn available_prizes(&self, category: &Category) -> Vec<Prize> {
        self.state.read().await.available_prizes(category)
    }
    pub async fn prizes_by_category(&self, category: &Category) -> Vec<Prize> {
        self.state.read().await.prizes_by_category(category)
    }
}
