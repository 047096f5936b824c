//! vaultx_client: session and resource client for the VaultX banking admin backend.
//!
//! Persisted session (Sled), guarded navigation, and list synchronization for every
//! backend collection over one bearer-authenticated REST client (reqwest).

pub mod config;
pub mod error;
pub mod models;
// Persisted client state: token, userId and user profile in a Sled tree
pub mod storage;
// REST client: base URL joining, bearer header, status classification
pub mod rest;
pub mod auth;
pub mod notice;
pub mod inflight;
pub mod navigator;
// Shared services and the single session-invalidation rule
pub mod context;
// Client-side text filters and trade-history filters
pub mod query;
pub mod normalize;
pub mod resource;
pub mod forms;
pub mod trading;
pub mod logging;

pub use context::ClientContext;
pub use error::{ClientError, ClientResult, ValidationError};
pub use resource::{ResourceList, Writable};
