use std::fmt;

use crate::model::{Category, PrizeId};

/// Failure of a call to the external raffle service.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The service answered with a non-success status
    Http { status: u16, message: String },
    /// The request never got an answer
    Transport(String),
    /// The answer could not be read
    Decode(String),
    /// The service does not provide this operation
    Unsupported(&'static str),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Http { status, message } => write!(f, "service answered {}: {}", status, message),
            ServiceError::Transport(e) => write!(f, "service unreachable: {}", e),
            ServiceError::Decode(e) => write!(f, "invalid service response: {}", e),
            ServiceError::Unsupported(op) => write!(f, "operation not supported by the service: {}", op),
        }
    }
}
impl std::error::Error for ServiceError {}

/// Errors of the draw engine and of the inventory operations.
///
/// An insufficient inventory is not an error: it is reported by
/// [`blocking_reason`](crate::guard::blocking_reason) and the draw simply doesn't start.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawError {
    /// Something that must never happen did. Never swallowed.
    Invariant(String),
    /// The external service failed. Local changes of the operation were rolled back.
    Service(ServiceError),
    /// A draw is running, the state can't be touched.
    DrawInProgress,
    CategoryExists(Category),
    /// Prizes still reference the category
    CategoryInUse(Category),
    UnknownCategory(Category),
    UnknownPrize(PrizeId),
    UnknownOwner(String),
    /// The prize was already awarded
    PrizeFrozen(PrizeId),
    /// Operator input refused before anything was changed
    InvalidInput(String),
}

impl fmt::Display for DrawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawError::Invariant(msg) => write!(f, "invariant violation: {}", msg),
            DrawError::Service(e) => e.fmt(f),
            DrawError::DrawInProgress => f.write_str("a draw is in progress"),
            DrawError::CategoryExists(c) => write!(f, "category {} already exists", c),
            DrawError::CategoryInUse(c) => write!(f, "category {} still has prizes", c),
            DrawError::UnknownCategory(c) => write!(f, "unknown category {}", c),
            DrawError::UnknownPrize(id) => write!(f, "unknown prize {}", id),
            DrawError::UnknownOwner(id) => write!(f, "unknown owner {}", id),
            DrawError::PrizeFrozen(id) => write!(f, "prize {} is already assigned", id),
            DrawError::InvalidInput(msg) => f.write_str(msg),
        }
    }
}
impl std::error::Error for DrawError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DrawError::Service(e) => Some(e),
            _ => None,
        }
    }
}
impl From<ServiceError> for DrawError {
    fn from(e: ServiceError) -> Self {
        DrawError::Service(e)
    }
}

/// Outcome of a bulk operation: every item either succeeded or failed on its own.
#[derive(Debug, Clone)]
pub struct MultiResult<T, E> {
    ok: Vec<T>,
    err: Vec<E>,
}

impl<T, E> MultiResult<T, E> {
    pub fn new() -> Self {
        Self {
            ok: Vec::new(),
            err: Vec::new(),
        }
    }
    pub fn push_ok(&mut self, t: T) {
        self.ok.push(t);
    }
    pub fn push_err(&mut self, e: E) {
        self.err.push(e);
    }
    pub fn push(&mut self, res: Result<T, E>) {
        match res {
            Ok(v) => self.push_ok(v),
            Err(e) => self.push_err(e),
        }
    }
    pub fn has_err(&self) -> bool {
        !self.err.is_empty()
    }
    pub fn oks(&self) -> &[T] {
        &self.ok
    }
    pub fn errs(&self) -> &[E] {
        &self.err
    }
    /// Consume the result and return the ok and err [Vec]
    pub fn extract(self) -> (Vec<T>, Vec<E>) {
        (self.ok, self.err)
    }
    pub fn map<F, U>(self, f: F) -> MultiResult<U, E>
        where F: Fn(T) -> U,
    {
        MultiResult {
            ok: self.ok.into_iter().map(f).collect(),
            err: self.err,
        }
    }
}
impl<T, E> Default for MultiResult<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
