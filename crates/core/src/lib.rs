//! Background coordination engine for the tunepilot browser extension.
//!
//! The coordinator sits between three boundaries and keeps them coherent:
//!
//! * the relay host document that owns the realtime socket ([`relay`])
//! * browser tabs and the content scripts inside them ([`tabs`], [`browser`])
//! * the playback queue driven by the backend ([`transition`], [`store`])
//!
//! [`coordinator::Coordinator`] is the single entry point: feed it page
//! events, tab lifecycle signals, host messages, and user commands, and it
//! drives the relay, the tabs, and the persisted queue position.
//!
//! All browser-facing I/O crosses the seams in [`browser`] and
//! [`relay::proxy::RelayPort`], so the whole engine runs against the
//! in-memory fakes in [`testing`].

pub mod browser;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod relay;
pub mod store;
pub mod tabs;
pub mod testing;
pub mod transition;
pub mod urls;

pub use commands::Command;
pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use error::{Error, Result};
pub use relay::{RelayHostManager, SocketProxy};
pub use store::{LATEST_URL_ENDED, MemoryStore, StateStore};
pub use tabs::{TabId, TabTracker};
