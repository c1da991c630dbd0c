//! fieldstore - local SQLite-backed record store for field technician
//! observations and history.
//!
//! Two collections:
//! - `ot`: observation records uniquely keyed by `tech|date|code`, with a
//!   `(tech, date)` lookup for per-day work sheets
//! - `history`: an append-only log keyed by store-assigned sequential
//!   identifiers, read back newest first
//!
//! Plus a JSON dump format ([`store::Dump`]) for full backup and transfer.

pub mod cli;
pub mod config;
pub mod error;
pub mod store;
