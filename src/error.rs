//! Centralized error type for the rackhost umbrella crate.
//!
//! Wraps the routing core's error so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] rackhost_core::Error),

    #[error("Invalid plugin slot {0}")]
    InvalidSlot(usize),

    #[error("Patchbay mode requires a node graph backend")]
    MissingBackend,
}

pub type Result<T> = std::result::Result<T, Error>;
