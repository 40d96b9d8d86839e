//! Bearer token authentication.
//!
//! Tokens are opaque strings mapped to the user they were issued to. Account
//! management lives elsewhere; this store only answers "who is calling".

use std::collections::HashMap;
use std::sync::RwLock;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::ids::UserId;

const BEARER_PREFIX: &str = "Bearer ";

/// Token carried by an `Authorization: Bearer <token>` header value.
fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Thread-safe token → user mapping.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: RwLock<HashMap<String, UserId>>,
}

impl TokenStore {
    /// Create a store pre-populated with tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (S, UserId)>,
        S: Into<String>,
    {
        let store = Self::default();
        for (token, user) in tokens {
            store.insert(token, user);
        }
        store
    }

    /// Register a token for a user, replacing any previous owner.
    pub fn insert(&self, token: impl Into<String>, user: UserId) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.into(), user);
        }
    }

    /// User a token was issued to.
    pub fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens
            .read()
            .ok()
            .and_then(|tokens| tokens.get(token).copied())
    }

    /// Number of registered tokens.
    pub fn count(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Resolve the caller from request headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<UserId> {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .and_then(|token| self.resolve(token))
    }
}
