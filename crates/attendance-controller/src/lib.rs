//! Attendance Controller
//!
//! QR proof-of-presence attendance service: rotating short-lived tokens,
//! session lifecycle management, idempotent attendance recording, optional
//! geofence verification, and realtime event broadcast.
//!
//! # Architecture
//!
//! An actor hierarchy owns all mutable session state:
//! - `SessionRegistryActor` (singleton): supervises session actors
//! - `SessionActor` (per session): owns the lifecycle state machine and
//!   serializes transitions, scans, and status corrections
//!
//! Around the actors sit explicitly constructed shared components, injected
//! rather than global: the [`tokens::TokenStore`], the
//! [`records::AttendanceLedger`], the [`broadcast::SessionTopics`] registry,
//! and the [`clock::Clock`] time source. Collaborating subsystems the
//! controller consults but does not own (enrollment, notification) enter
//! through the traits in [`ports`].
//!
//! # Token model
//!
//! Tokens are unsigned, ephemeral credentials: 256 bits from the OS CSPRNG,
//! valid for a configured window plus a grace period, resident only in the
//! in-process store. Rotation issues a new token without invalidating the
//! previous one, so consecutive tokens have overlapping validity.

pub mod actors;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod errors;
pub mod geofence;
pub mod observability;
pub mod ports;
pub mod records;
pub mod routes;
pub mod tokens;
pub mod types;
