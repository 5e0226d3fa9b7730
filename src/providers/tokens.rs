//! Identity resolver backed by an in-memory bearer-token table.
//!
//! The real deployment fronts an external identity service; this resolver
//! keeps the same narrow contract while letting the config (and the tests)
//! seed known tokens directly.

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use uuid::Uuid;

use crate::providers::{IdentityError, IdentityResolver};
use crate::state::game::PlayerIdentity;

/// Resolver mapping opaque tokens to pre-registered identities.
#[derive(Debug, Default)]
pub struct TokenTableResolver {
    tokens: DashMap<String, PlayerIdentity>,
}

impl TokenTableResolver {
    /// Create an empty token table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a fresh identity, returning it.
    pub fn register(&self, token: impl Into<String>, display_name: impl Into<String>) -> PlayerIdentity {
        let identity = PlayerIdentity {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
        };
        self.tokens.insert(token.into(), identity.clone());
        identity
    }
}

impl IdentityResolver for TokenTableResolver {
    fn resolve(&self, credential: &str) -> BoxFuture<'static, Result<PlayerIdentity, IdentityError>> {
        let result = self
            .tokens
            .get(credential)
            .map(|entry| entry.value().clone())
            .ok_or(IdentityError::InvalidCredential);

        Box::pin(future::ready(result))
    }
}
