//! External collaborator seams: identity resolution and track selection.
//!
//! Both collaborators live behind object-safe traits so the coordinator can
//! be wired against the built-in implementations here or against real
//! upstream services without touching the room session.

/// Built-in shuffled-catalog track provider.
pub mod catalog;
/// In-memory bearer-token identity resolver.
pub mod tokens;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::state::game::{PlayerIdentity, TrackTruth};

/// Failure reported by an upstream collaborator.
#[derive(Debug, Error)]
#[error("{collaborator} provider failure: {message}")]
pub struct ProviderError {
    /// Which collaborator failed (`tracks`, `identity`).
    pub collaborator: &'static str,
    /// Human readable description of the failure.
    pub message: String,
}

impl ProviderError {
    /// Failure of the track-selection collaborator.
    pub fn tracks(message: impl Into<String>) -> Self {
        Self {
            collaborator: "tracks",
            message: message.into(),
        }
    }

    /// Failure of the identity collaborator.
    pub fn identity(message: impl Into<String>) -> Self {
        Self {
            collaborator: "identity",
            message: message.into(),
        }
    }
}

/// Outcome of resolving a bearer credential.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The credential is missing, malformed, or unknown.
    #[error("invalid or unknown credential")]
    InvalidCredential,
    /// The identity collaborator itself failed.
    #[error(transparent)]
    Unavailable(#[from] ProviderError),
}

/// Resolves an opaque bearer credential to a user identity.
pub trait IdentityResolver: Send + Sync {
    /// Resolve `credential`, rejecting unknown tokens with
    /// [`IdentityError::InvalidCredential`].
    fn resolve(&self, credential: &str) -> BoxFuture<'static, Result<PlayerIdentity, IdentityError>>;
}

/// Supplies ground-truth track metadata for a game's rounds.
pub trait TrackProvider: Send + Sync {
    /// Fetch `count` distinct tracks in round order. A failure here aborts
    /// game creation atomically.
    fn fetch_rounds(&self, count: u32) -> BoxFuture<'static, Result<Vec<TrackTruth>, ProviderError>>;
}
