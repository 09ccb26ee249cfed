//! Playback transition state machine.
//!
//! Split into a pure decision layer ([`decision`]), the per-tab state holder
//! that applies decisions and arms end watches ([`machine`]), the race
//! primitives that keep a video-end and a tab-close from double-advancing
//! ([`race`]), and the effect executor that actually opens the next tab
//! ([`opener`]).

pub mod decision;
pub mod machine;
pub mod opener;
pub mod race;

pub use decision::{Decision, Effect, PlaybackState, Snapshot};
pub use machine::{SignalInput, TransitionMachine};
pub use opener::NextOpener;
pub use race::{EndWatch, RaceGuard};
