//! Random selector
//!
//! Draws winners without replacement and pairs them with prizes.

use chrono::Utc;
use rand::{seq::SliceRandom, CryptoRng, Rng, RngCore};
use uuid::Uuid;

use crate::{
    error::DrawError,
    model::{Category, DrawResult, GroupSize, Prize, PrizeId, Ticket, TicketOwner},
};

/// Picks `group_size` distinct tickets from the pool.
///
/// Each pick draws a uniform index over the tickets still remaining, then removes that
/// ticket, so every ordered selection is equally likely and no ticket comes out twice.
/// Only cryptographically strong generators are accepted.
pub fn select_winners<R>(pool: &[Ticket], group_size: GroupSize, rng: &mut R) -> Result<Vec<Ticket>, DrawError>
    where R: RngCore + CryptoRng
{
    let wanted = group_size.get();
    if wanted > pool.len() {
        return Err(DrawError::Invariant(format!("cannot select {} winners from a pool of {}", wanted, pool.len())));
    }
    let mut remaining = pool.to_vec();
    let mut selected = Vec::with_capacity(wanted);
    for _ in 0..wanted {
        let index = rng.gen_range(0..remaining.len());
        selected.push(remaining.swap_remove(index));
    }
    Ok(selected)
}

/// Pairs the selected tickets with prizes, in order.
///
/// The n-th ticket gets the n-th available prize. For a single winner, an explicit prize id
/// replaces the positional pick; it must name one of the available prizes.
pub fn pair_results(selected: Vec<Ticket>, available: &[Prize], category: &Category, prize_id: Option<&PrizeId>, owners: &[TicketOwner]) -> Result<Vec<DrawResult>, DrawError> {
    if available.len() < selected.len() {
        return Err(DrawError::Invariant(format!("{} winners but only {} prizes available", selected.len(), available.len())));
    }
    let prizes: Vec<&Prize> = match prize_id {
        Some(id) if selected.len() == 1 => {
            let prize = available.iter()
                .find(|p| &p.id == id)
                .ok_or_else(|| DrawError::UnknownPrize(id.clone()))?;
            vec![prize]
        }
        _ => available.iter().take(selected.len()).collect(),
    };
    selected.into_iter()
        .zip(prizes)
        .map(|(ticket, prize)| {
            let mut prize = prize.clone();
            prize.assign(&ticket)?;
            Ok(DrawResult {
                id: Uuid::new_v4(),
                owner_name: owner_name(owners, &ticket),
                ticket,
                prize,
                category: category.clone(),
                timestamp: Utc::now(),
            })
        })
        .collect()
}

/// Throwaway sample shown while the draw animates.
///
/// Uses its own non-cryptographic generator: it must never influence the real selection.
pub fn shuffle_preview(pool: &[Ticket], group_size: GroupSize) -> Vec<Ticket> {
    pool.choose_multiple(&mut rand::thread_rng(), group_size.get())
        .cloned()
        .collect()
}

pub fn owner_name(owners: &[TicketOwner], ticket: &Ticket) -> Option<String> {
    owners.iter()
        .find(|o| o.owns(ticket))
        .map(|o| o.name.clone())
}
