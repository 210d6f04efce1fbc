//! JWT validation for externally issued identities.
//!
//! Quill does not run login or invitation flows; an external identity
//! service issues the tokens and this module only validates them and lifts
//! the claims into an [`crate::middleware::auth::AuthUser`].

pub mod jwt;
