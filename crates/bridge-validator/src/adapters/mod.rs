//! # Adapters
//!
//! Concrete implementations of the outbound ports: HTTP clients for a live
//! provider network and in-process variants for local runs and tests.

pub mod allow_list;
pub mod http_peer_client;
pub mod http_registry;
pub mod http_weight_submitter;
pub mod prompt_source;
pub mod static_registry;
pub mod weight_ledger;

pub use allow_list::AllowList;
pub use http_peer_client::HttpPeerClient;
pub use http_registry::HttpRegistrySource;
pub use http_weight_submitter::HttpWeightSubmitter;
pub use prompt_source::{prompt_payload, StaticPromptSource};
pub use static_registry::StaticRegistrySource;
pub use weight_ledger::InMemoryWeightLedger;
