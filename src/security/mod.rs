//! Security module for therapy-sync.
//!
//! Callers authenticate with a bearer token that resolves to a user id.
//! Authorization (controller vs. follower, media ownership) is decided per
//! operation against the repository, not here.
//!
//! ## Example
//!
//! ```rust
//! use therapy_sync::security::TokenStore;
//! use therapy_sync::UserId;
//!
//! let tokens = TokenStore::default();
//! tokens.insert("s3cret", UserId::from_raw(20));
//! assert_eq!(tokens.resolve("s3cret"), Some(UserId::from_raw(20)));
//! ```

pub mod auth;

pub use auth::TokenStore;
