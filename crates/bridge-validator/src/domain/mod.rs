//! # Domain Module
//!
//! Core domain types for the bridge validator: peers, tasks, responses,
//! weights and the epoch ledger.

pub mod config;
pub mod credentials;
pub mod entities;
pub mod epoch;
pub mod errors;
pub mod value_objects;

pub use config::*;
pub use credentials::RelayCredentials;
pub use entities::*;
pub use epoch::{EpochLedger, FailureDisposition, PendingCommit};
pub use errors::*;
pub use value_objects::*;
