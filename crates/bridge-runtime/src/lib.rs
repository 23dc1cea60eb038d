//! # Subnet Bridge Runtime
//!
//! Turns a [`BridgeConfig`] into a running bridge.
//!
//! ## Modular Structure
//!
//! - `config` - TOML file plus `SB_*` environment overrides
//! - `container` - builds adapters and services from the config
//! - `api` - axum routes for the requesting network
//!
//! ## Startup Sequence
//!
//! 1. Resolve configuration (file, then environment)
//! 2. Initialize logging
//! 3. Validate configuration
//! 4. Wire components
//! 5. Spawn the validator loop and serve the relay until shutdown

pub mod api;
pub mod config;
pub mod container;

pub use api::{router, AppState, RelayRequest};
pub use config::BridgeConfig;
pub use container::BridgeContainer;
