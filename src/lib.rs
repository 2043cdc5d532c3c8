//! Ledger Sync - Main Library
//!
//! Thin top-level crate over the workspace members.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **ledger**: Order reconciliation engine (re-exported from workspace)
//! - **feedsockets**: WebSocket stream client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use ledger_sync::bin_common::{load_config_from_env, ConfigType};
//! use ledger_sync::ledger::LedgerEngine;
//! ```

// Re-export workspace libraries for convenience
pub use feedsockets;
pub use ledger;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod reconnect;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use reconnect::ReconnectGate;
    pub use runner::{BinaryRunner, RunConfig};
}
