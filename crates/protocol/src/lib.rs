//! Wire types for the tunepilot coordinator boundaries.
//!
//! This crate contains the serde-serializable types used on the three
//! message boundaries the coordinator sits between:
//!
//! * page <-> coordinator (content-script notifications and commands)
//! * coordinator <-> relay host (the envelope that tunnels socket operations)
//! * coordinator <-> realtime backend (event names plus opaque payloads)
//!
//! Types here are pure data: no behavior beyond serialization. Backend
//! payload schemas are owned by the backend, so they stay `serde_json::Value`.
//! Higher-level coordination logic lives in `tp-core`.

pub mod envelope;
pub mod events;
pub mod page;

pub use envelope::*;
pub use events::*;
pub use page::*;
