//! Draw orchestrator
//!
//! The engine owns the raffle state and runs draws through three phases:
//! `Idle -> Drawing -> Settling -> Idle`.
//!
//! While drawing, a shuffle animation ticks on a fixed interval and the real selection
//! (local, or performed by the service) resolves alongside it, inside the same task.
//! Results are only revealed once the animation ran for its full duration. Settling then
//! commits the draw locally, marks the prizes on the service and records the history.
//! If the service fails, the local state goes back to what it was before the draw.
//!
//! Once settling started, the service calls run in their own task: dropping the draw future
//! at that point keeps the local commit, and the prizes still get marked and the history
//! recorded. Only the rollback needs the caller, so a failure after the drop is logged and
//! left for the next refresh.
//!
//! Inventory edits hold the engine in `Editing` until the service answered. Edits may
//! overlap each other, but never a draw or a sync.

use std::{
    collections::HashSet,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::Utc;
use rand::rngs::OsRng;
use tokio::{
    sync::{RwLock, RwLockReadGuard},
    time::{self, Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    error::DrawError,
    guard,
    model::{Category, DrawHistoryEntry, DrawRequest, DrawResult, GroupSize, Prize, PrizeId, Snapshot, Ticket, TicketOwner},
    selector,
    service::{HistoryRecord, RaffleService, RemoteWinner},
    state::RaffleState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Inventory changes waiting for the service
    Editing,
    /// Animation running, selection pending
    Drawing,
    /// Results known, being committed
    Settling,
    /// Reset or refresh replacing the state
    Syncing,
}

/// Where the winners are picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// In-process random selector
    Local,
    /// `POST draw` on the service
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawTiming {
    /// Minimum time before results are revealed
    pub animation: Duration,
    /// Interval between two shuffle frames
    pub tick: Duration,
}

impl Default for DrawTiming {
    fn default() -> Self {
        Self {
            animation: Duration::from_millis(2500),
            tick: Duration::from_millis(80),
        }
    }
}

pub struct DrawEngine {
    pub(crate) state: RwLock<RaffleState>,
    gate: Mutex<Gate>,
    pub(crate) service: Arc<dyn RaffleService>,
    resolution: Resolution,
    timing: DrawTiming,
}

struct Gate {
    phase: Phase,
    /// Edits in flight, only non zero in `Editing`
    edits: usize,
}

/// Holds the engine out of `Idle`. Dropping it brings the engine back to `Idle`,
/// including when a draw future is dropped halfway.
struct PhaseGuard<'a> {
    gate: &'a Mutex<Gate>,
}

impl<'a> PhaseGuard<'a> {
    fn set(&self, phase: Phase) {
        lock_gate(self.gate).phase = phase;
    }
}
impl<'a> Drop for PhaseGuard<'a> {
    fn drop(&mut self) {
        lock_gate(self.gate).phase = Phase::Idle;
    }
}

/// One inventory edit in flight. The last one dropped brings the engine back to `Idle`.
pub(crate) struct EditGuard<'a> {
    gate: &'a Mutex<Gate>,
}
impl<'a> Drop for EditGuard<'a> {
    fn drop(&mut self) {
        let mut gate = lock_gate(self.gate);
        gate.edits = gate.edits.saturating_sub(1);
        if gate.edits == 0 {
            gate.phase = Phase::Idle;
        }
    }
}

#[inline]
fn lock_gate(gate: &Mutex<Gate>) -> MutexGuard<'_, Gate> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DrawEngine {
    pub fn new(service: Arc<dyn RaffleService>, resolution: Resolution, timing: DrawTiming) -> Self {
        Self::with_snapshot(service, resolution, timing, Snapshot::default())
    }
    /// Warm start from a persisted snapshot.
    pub fn with_snapshot(service: Arc<dyn RaffleService>, resolution: Resolution, timing: DrawTiming, snapshot: Snapshot) -> Self {
        Self {
            state: RwLock::new(RaffleState::from(snapshot)),
            gate: Mutex::new(Gate { phase: Phase::Idle, edits: 0 }),
            service,
            resolution,
            timing,
        }
    }

    pub fn phase(&self) -> Phase {
        lock_gate(&self.gate).phase
    }
    pub fn is_drawing(&self) -> bool {
        matches!(self.phase(), Phase::Drawing | Phase::Settling)
    }
    pub fn timing(&self) -> DrawTiming {
        self.timing
    }
    /// Read access for the presentation layer.
    pub async fn state(&self) -> RwLockReadGuard<'_, RaffleState> {
        self.state.read().await
    }
    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.snapshot()
    }
    pub async fn current_results(&self) -> Vec<DrawResult> {
        self.state.read().await.current_results.clone()
    }
    pub async fn history(&self) -> Vec<DrawHistoryEntry> {
        self.state.read().await.history.clone()
    }

    /// Leaves `Idle` for the given phase. None if the engine is busy.
    fn begin(&self, phase: Phase) -> Option<PhaseGuard<'_>> {
        let mut gate = lock_gate(&self.gate);
        if gate.phase != Phase::Idle {
            return None;
        }
        gate.phase = phase;
        Some(PhaseGuard { gate: &self.gate })
    }
    /// Enters `Editing` for the lifetime of the guard. Refused while a draw or a sync runs.
    pub(crate) fn begin_edit(&self) -> Result<EditGuard<'_>, DrawError> {
        let mut gate = lock_gate(&self.gate);
        match gate.phase {
            Phase::Idle | Phase::Editing => {
                gate.phase = Phase::Editing;
                gate.edits += 1;
                Ok(EditGuard { gate: &self.gate })
            }
            _ => Err(DrawError::DrawInProgress),
        }
    }

    /// Inventory check for the presentation layer, evaluated on the current state.
    pub async fn blocking_reason(&self, category: &Category, group_size: GroupSize) -> Option<String> {
        let state = self.state.read().await;
        guard::blocking_reason(state.tickets.len(), state.available_prizes(category).len(), group_size, category)
    }
    pub async fn can_draw(&self, category: &Category, group_size: GroupSize) -> bool {
        self.blocking_reason(category, group_size).await.is_none()
    }

    /// Runs one draw.
    ///
    /// `on_tick` receives a throwaway shuffle of the pool at every animation frame.
    ///
    /// Returns an empty set, without touching anything, when the inventory doesn't allow
    /// the draw or when another draw is already running. Otherwise returns exactly
    /// `group_size` results, or an error after the state was rolled back.
    pub async fn execute_draw<F>(&self, request: DrawRequest, mut on_tick: F) -> Result<Vec<DrawResult>, DrawError>
        where F: FnMut(Vec<Ticket>) + Send
    {
        if let Some(reason) = self.blocking_reason(&request.category, request.group_size).await {
            log_info!("Draw of {} in category {} blocked: {}", request.group_size, request.category, reason);
            return Ok(Vec::new());
        }
        let phase = match self.begin(Phase::Drawing) {
            Some(phase) => phase,
            None => {
                log_warn!("Draw rejected: engine is {:?}", self.phase());
                return Ok(Vec::new());
            }
        };
        let (pool, available, owners) = {
            let state = self.state.read().await;
            (state.tickets.clone(), state.available_prizes(&request.category), state.owners.clone())
        };
        // The state may have moved between the first check and the phase change
        if !guard::can_draw(pool.len(), available.len(), request.group_size) {
            return Ok(Vec::new());
        }
        if let (Some(id), 1) = (&request.prize_id, request.group_size.get()) {
            if !available.iter().any(|p| &p.id == id) {
                return Err(DrawError::UnknownPrize(id.clone()));
            }
        }
        log_info!("Draw started: {} winner(s) in category {}", request.group_size, request.category);

        let resolution = self.resolve(&request, &pool, &available, &owners);
        let results = match self.animate(resolution, &pool, &request, &mut on_tick).await {
            Ok(results) => results,
            Err(e) => {
                log_error!("Draw failed: {}", e);
                return Err(e);
            }
        };
        phase.set(Phase::Settling);
        self.settle(&request, results).await
    }

    async fn resolve(&self, request: &DrawRequest, pool: &[Ticket], available: &[Prize], owners: &[TicketOwner]) -> Result<Vec<DrawResult>, DrawError> {
        match self.resolution {
            Resolution::Local => {
                let selected = selector::select_winners(pool, request.group_size, &mut OsRng)?;
                selector::pair_results(selected, available, &request.category, request.prize_id.as_ref(), owners)
            }
            Resolution::Remote => {
                let winners = self.service.draw(request).await?;
                validate_remote(winners, request, pool, available, owners)
            }
        }
    }

    /// Drives the shuffle animation until the resolution is known and the minimum
    /// duration elapsed. A resolution arriving early is held until the deadline; a late one
    /// keeps the animation going. A failed resolution stops the animation at once.
    async fn animate<Fut, F>(&self, resolution: Fut, pool: &[Ticket], request: &DrawRequest, on_tick: &mut F) -> Result<Vec<DrawResult>, DrawError>
        where
            Fut: Future<Output = Result<Vec<DrawResult>, DrawError>>,
            F: FnMut(Vec<Ticket>)
    {
        let start = Instant::now();
        let deadline = start + self.timing.animation;
        let mut ticker = time::interval_at(start + self.timing.tick, self.timing.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(resolution);
        let mut resolved = None;
        loop {
            tokio::select! {
                biased;
                res = &mut resolution, if resolved.is_none() => {
                    resolved = Some(res?);
                }
                _ = time::sleep_until(deadline), if resolved.is_some() => {
                    break;
                }
                _ = ticker.tick() => {
                    on_tick(selector::shuffle_preview(pool, request.group_size));
                }
            }
        }
        resolved.ok_or_else(|| DrawError::Invariant("animation ended without results".to_string()))
    }

    /// Commits the results. Rolls the local state back if a prize can't be marked drawn.
    async fn settle(&self, request: &DrawRequest, results: Vec<DrawResult>) -> Result<Vec<DrawResult>, DrawError> {
        let entry = DrawHistoryEntry {
            id: Uuid::new_v4(),
            results: results.clone(),
            category: request.category.clone(),
            group_size: request.group_size,
            timestamp: Utc::now(),
        };
        let backup = {
            let mut state = self.state.write().await;
            let backup = state.backup();
            if let Err(e) = state.apply_draw(entry) {
                log_error!("Draw results don't match the state: {}", e);
                return Err(e);
            }
            backup
        };
        let prize_ids = results.iter().map(|r| r.prize.id.clone()).collect();
        let records = results.iter().map(HistoryRecord::from).collect();
        let committed = tokio::spawn(commit_remote(self.service.clone(), prize_ids, records)).await
            .unwrap_or_else(|e| Err(DrawError::Invariant(format!("settle task failed: {}", e))));
        if let Err(e) = committed {
            log_error!("Rolling back the draw: {}", e);
            self.state.write().await.restore(backup);
            return Err(e);
        }
        log_info!("Draw settled: {}", results.iter().map(|r| format!("{} -> {}", r.ticket, r.prize.name)).collect::<Vec<_>>().join(", "));
        Ok(results)
    }

    /// Empties the current results. History is left untouched.
    pub async fn clear_current_results(&self) -> Result<(), DrawError> {
        let _edit = self.begin_edit()?;
        self.state.write().await.current_results.clear();
        Ok(())
    }

    /// Full environment reset.
    ///
    /// Clears tickets and history on the service, resets the local state (categories back to
    /// the defaults) and then refetches whatever the service still holds.
    pub async fn reset_all(&self) -> Result<(), DrawError> {
        let _phase = self.begin(Phase::Syncing).ok_or(DrawError::DrawInProgress)?;
        self.service.clear_tickets().await?;
        self.service.clear_history().await?;
        {
            let mut state = self.state.write().await;
            *state = RaffleState::from(Snapshot::default());
        }
        log_info!("Raffle reset");
        self.pull().await?;
        Ok(())
    }

    /// Reconciles the local state with the service.
    ///
    /// Returns false when the service isn't authoritative and nothing was fetched.
    pub async fn refresh(&self) -> Result<bool, DrawError> {
        let _phase = self.begin(Phase::Syncing).ok_or(DrawError::DrawInProgress)?;
        self.pull().await
    }

    async fn pull(&self) -> Result<bool, DrawError> {
        if !self.service.is_authoritative() {
            log_info!("Refresh skipped: service is not authoritative");
            return Ok(false);
        }
        let tickets = self.service.fetch_tickets().await?;
        let prizes = self.service.fetch_prizes().await?;
        let categories = self.service.fetch_categories().await?;
        let owners = self.service.fetch_owners().await?;
        let mut seen = HashSet::new();
        let mut state = self.state.write().await;
        state.tickets = tickets.into_iter().filter(|t| seen.insert(t.clone())).collect();
        state.prizes = prizes;
        state.categories = categories;
        state.owners = owners;
        log_info!("State refreshed: {} tickets, {} prizes, {} categories", state.tickets.len(), state.prizes.len(), state.categories.len());
        Ok(true)
    }
}

/// Marks the prizes drawn, then records the history. A prize the service refuses stops
/// everything; a history row it refuses is only logged.
async fn commit_remote(service: Arc<dyn RaffleService>, prize_ids: Vec<PrizeId>, records: Vec<HistoryRecord>) -> Result<(), DrawError> {
    for id in &prize_ids {
        if let Err(e) = service.mark_prize_drawn(id).await {
            log_error!("Prize {} could not be marked drawn: {}", id, e);
            return Err(e.into());
        }
    }
    for record in &records {
        if let Err(e) = service.record_result(record).await {
            log_warn!("History row for ticket {} not persisted: {}", record.ticket_number, e);
        }
    }
    Ok(())
}

/// Turns the service's winners into results, refusing anything the local selector could
/// not have produced.
fn validate_remote(winners: Vec<RemoteWinner>, request: &DrawRequest, pool: &[Ticket], available: &[Prize], owners: &[TicketOwner]) -> Result<Vec<DrawResult>, DrawError> {
    if winners.len() != request.group_size.get() {
        return Err(DrawError::Invariant(format!("service returned {} winners, {} requested", winners.len(), request.group_size)));
    }
    let mut tickets = HashSet::new();
    let mut prizes = HashSet::new();
    let timestamp = Utc::now();
    winners.into_iter()
        .map(|winner| {
            if winner.category != request.category {
                return Err(DrawError::Invariant(format!("service drew category {} instead of {}", winner.category, request.category)));
            }
            if !pool.contains(&winner.ticket_number) || !tickets.insert(winner.ticket_number.clone()) {
                return Err(DrawError::Invariant(format!("service drew ticket {} which is not available", winner.ticket_number)));
            }
            let mut prize = available.iter()
                .find(|p| p.id == winner.prize_id)
                .cloned()
                .ok_or_else(|| DrawError::Invariant(format!("service awarded prize {} which is not available", winner.prize_id)))?;
            if let (Some(id), 1) = (&request.prize_id, request.group_size.get()) {
                if &prize.id != id {
                    return Err(DrawError::Invariant(format!("service awarded prize {} instead of {}", prize.id, id)));
                }
            }
            if !prizes.insert(prize.id.clone()) {
                return Err(DrawError::Invariant(format!("service awarded prize {} twice", prize.id)));
            }
            prize.assign(&winner.ticket_number)?;
            Ok(DrawResult {
                id: Uuid::new_v4(),
                owner_name: selector::owner_name(owners, &winner.ticket_number),
                ticket: winner.ticket_number,
                prize,
                category: winner.category,
                timestamp,
            })
        })
        .collect()
}
