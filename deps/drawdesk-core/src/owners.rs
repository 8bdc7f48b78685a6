//! Ticket owners
//!
//! Same local-first pattern as the rest of the inventory, except for creation: an owner only
//! shows up once the service gave its id. Owners never take part in a draw, they only name
//! the holder of a winning ticket.

use std::collections::HashSet;

use crate::{
    engine::DrawEngine,
    error::{DrawError, MultiResult, ServiceError},
    model::{Ticket, TicketOwner},
};

fn distinct(tickets: Vec<Ticket>) -> Vec<Ticket> {
    let mut seen = HashSet::new();
    tickets.into_iter().filter(|t| seen.insert(t.clone())).collect()
}
fn checked_name(name: &str) -> Result<String, DrawError> {
    match name.trim() {
        "" => Err(DrawError::InvalidInput("Owner name is required".to_string())),
        name => Ok(name.to_string()),
    }
}

impl DrawEngine {
    pub async fn owners(&self) -> Vec<TicketOwner> {
        self.state.read().await.owners.clone()
    }

    pub async fn add_owner(&self, name: &str, email: Option<&str>, tickets: Vec<Ticket>) -> Result<TicketOwner, DrawError> {
        let _edit = self.begin_edit()?;
        let draft = TicketOwner {
            id: String::new(),
            name: checked_name(name)?,
            ticket_numbers: distinct(tickets),
            email: email.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string),
        };
        let owner = self.service.create_owner(&draft).await?;
        self.state.write().await.owners.push(owner.clone());
        Ok(owner)
    }

    pub async fn add_bulk_owners(&self, owners: Vec<(String, Vec<Ticket>)>) -> Result<MultiResult<TicketOwner, (String, DrawError)>, DrawError> {
        let _edit = self.begin_edit()?;
        let mut result = MultiResult::new();
        for (name, tickets) in owners {
            result.push(self.add_owner(&name, None, tickets).await.map_err(|e| (name, e)));
        }
        Ok(result)
    }

    /// Renames an owner and replaces its tickets. The email is kept.
    pub async fn update_owner(&self, id: &str, name: &str, tickets: Vec<Ticket>) -> Result<TicketOwner, DrawError> {
        let _edit = self.begin_edit()?;
        let name = checked_name(name)?;
        let (previous, updated) = {
            let mut state = self.state.write().await;
            let owner = state.owners.iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| DrawError::UnknownOwner(id.to_string()))?;
            let previous = owner.clone();
            owner.name = name;
            owner.ticket_numbers = distinct(tickets);
            (previous, owner.clone())
        };
        if let Err(e) = self.service.update_owner(&updated).await {
            let mut state = self.state.write().await;
            if let Some(owner) = state.owners.iter_mut().find(|o| o.id == id) {
                *owner = previous;
            }
            return Err(e.into());
        }
        Ok(updated)
    }

    pub async fn delete_owner(&self, id: &str) -> Result<(), DrawError> {
        let _edit = self.begin_edit()?;
        let (index, owner) = {
            let mut state = self.state.write().await;
            let index = state.owners.iter()
                .position(|o| o.id == id)
                .ok_or_else(|| DrawError::UnknownOwner(id.to_string()))?;
            (index, state.owners.remove(index))
        };
        if let Err(e) = self.service.delete_owner(id).await {
            let mut state = self.state.write().await;
            let index = index.min(state.owners.len());
            state.owners.insert(index, owner);
            return Err(e.into());
        }
        Ok(())
    }

    /// Deletes every owner. The ones the service refuses to delete are kept, first.
    pub async fn clear_owners(&self) -> Result<MultiResult<TicketOwner, (TicketOwner, ServiceError)>, DrawError> {
        let _edit = self.begin_edit()?;
        let owners = std::mem::take(&mut self.state.write().await.owners);
        let mut result = MultiResult::new();
        for owner in owners {
            match self.service.delete_owner(&owner.id).await {
                Ok(()) => result.push_ok(owner),
                Err(e) => result.push_err((owner, e)),
            }
        }
        if result.has_err() {
            log_warn!("{} owner(s) kept by the service", result.errs().len());
            let mut state = self.state.write().await;
            let added = std::mem::take(&mut state.owners);
            state.owners = result.errs().iter()
                .map(|(o, _)| o.clone())
                .chain(added)
                .collect();
        }
        Ok(result)
    }
}
