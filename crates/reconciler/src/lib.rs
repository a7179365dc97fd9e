// gateboot-reconciler: bring local disk state in line with durable storage
// before the gateway starts.

pub mod best_effort;
pub mod boot;
pub mod config;
pub mod fsutil;
pub mod handoff;
pub mod hook;
pub mod instance;
pub mod layout;
pub mod settings;
pub mod sync_marker;
pub mod workspace;
