//! # Core library of drawdesk
//!
//! This library holds the draw engine of the raffle console: everything that decides
//! who wins what, and nothing that knows about HTTP, files or terminals.
//!
//! ## Draw engine
//!
//! The engine is made of three cooperating parts:
//! - [`guard`], the inventory guard. A pure predicate telling if a draw may start,
//!     and why not when it can't.
//! - [`selector`], the random selector. Draws distinct tickets without replacement from a
//!     cryptographically strong source and pairs them with prizes.
//! - [`engine`], the draw orchestrator. Owns the raffle state, runs the shuffle animation
//!     concurrently with the resolution, settles the results and rolls back on failure.
//!
//! ## Service boundary
//!
//! Durable state lives in an external service. The engine talks to it through the
//! [`RaffleService`] trait; the presentation layer provides the implementation
//! (a REST client, or [`service::OfflineService`] when running without a backend).

#[macro_use]
mod macros {
    macro_rules! log_error {
        ($($arg:tt)*) => {
            log::error!(target:"drawdesk", $($arg)*)
        };
    }
    macro_rules! log_warn {
        ($($arg:tt)*) => {
            log::warn!(target:"drawdesk", $($arg)*)
        };
    }
    macro_rules! log_info {
        ($($arg:tt)*) => {
            log::info!(target:"drawdesk", $($arg)*)
        };
    }
}

pub mod model;
pub mod error;
pub mod guard;
pub mod selector;
pub mod service;
pub mod state;
pub mod engine;
mod inventory;
mod owners;
#[cfg(test)]
mod tests;

pub use model::{Ticket, Category, Prize, PrizeId, DrawResult, DrawHistoryEntry, TicketOwner, GroupSize, DrawRequest, Snapshot};
pub use error::{DrawError, ServiceError, MultiResult};
pub use service::RaffleService;
pub use engine::{DrawEngine, DrawTiming, Resolution, Phase};
pub use inventory::{AddedTickets, MAX_TICKET_RANGE};
