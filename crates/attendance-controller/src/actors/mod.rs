//! Actor model for session lifecycle and attendance recording.
//!
//! The actor hierarchy:
//!
//! ```text
//! SessionRegistryActor (singleton per controller instance)
//! └── supervises N SessionActors
//!     └── SessionActor (one per registered session)
//!         ├── owns the session's lifecycle state machine
//!         └── serializes transitions, scans, and corrections
//! ```
//!
//! All inter-actor communication goes through `tokio::sync::mpsc` channels
//! with `oneshot` reply channels; the root `CancellationToken` propagates to
//! session actors as child tokens for graceful shutdown. Serializing each
//! session's operations through its mailbox is what makes
//! check-then-transition and check-then-record atomic.
//!
//! # Modules
//!
//! - [`registry`] - `SessionRegistryActor` singleton that supervises sessions
//! - [`session`] - `SessionActor` per session, owns session state
//! - [`messages`] - Message types for actor communication

pub mod messages;
pub mod registry;
pub mod session;

pub use messages::{
    ActivationResult, CompletionResult, RegistryStatus, RotationResult, ScanInput,
};
pub use registry::SessionRegistryHandle;
pub use session::{ScanSettings, SessionActorHandle, SessionDeps};
