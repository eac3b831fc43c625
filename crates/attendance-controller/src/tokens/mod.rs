//! Rotating proof-of-presence tokens.
//!
//! A token is an ephemeral, unsigned credential: an opaque identifier plus
//! timestamp bounds, living in the in-process [`store::TokenStore`] for its
//! validity window plus a grace period. Issuance ([`issuer::TokenIssuer`])
//! and validation ([`validator::validate`]) are deliberately decoupled:
//! validation trusts the payload's timestamp bounds first and treats store
//! presence as a secondary cross-check, so a token swept from the store is
//! still honored while its timestamps hold.

pub mod issuer;
pub mod store;
pub mod validator;

pub use issuer::{IssuedToken, TokenIssuer};
pub use store::{TokenEntry, TokenStore};
pub use validator::{validate, TokenLimits};
