//! Foundational types shared by the ledger and its collaborators.

pub mod account;
pub mod config;
pub mod error;
pub mod events;
pub mod math;
pub mod token;
