//! HTTPS transport for pushing and pulling snapshots.
//!
//! [`SecureChannel`] holds the client TLS identity and the relaxed
//! server verification peers need (they present self-signed
//! certificates). [`PeerClient`] issues every protocol call over it;
//! the existence checks live in [`probe`].

mod body;
pub mod channel;
pub mod client;
pub mod error;
pub mod probe;
#[cfg(test)]
mod testing;

pub use channel::{PeerConfig, SecureChannel};
pub use client::{Credentials, PeerClient, UploadAuth};
pub use error::PeerError;
