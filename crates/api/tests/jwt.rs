//! Unit tests for JWT generation and validation.
//!
//! These run without a database: tokens are generated and validated against
//! in-memory configs.

use quill_api::auth::jwt::{generate_access_token, validate_token, JwtConfig};
use quill_core::roles::ROLE_EDITOR;

fn test_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret-at-least-32-chars-long!!".to_string(),
        access_token_expiry_mins: 60,
    }
}

// ---------------------------------------------------------------------------
// Test: round trip preserves the identity claims
// ---------------------------------------------------------------------------

#[test]
fn generated_token_validates_and_preserves_claims() {
    let config = test_config();

    let token = generate_access_token(
        42,
        "Ada Lovelace",
        Some("https://example.com/ada.png"),
        7,
        ROLE_EDITOR,
        &config,
    )
    .expect("token generation should succeed");

    let claims = validate_token(&token, &config).expect("token should validate");

    assert_eq!(claims.sub, 42);
    assert_eq!(claims.name, "Ada Lovelace");
    assert_eq!(claims.avatar_url.as_deref(), Some("https://example.com/ada.png"));
    assert_eq!(claims.org, 7);
    assert_eq!(claims.role, ROLE_EDITOR);
    assert!(claims.exp > claims.iat);
    assert!(!claims.jti.is_empty());
}

// ---------------------------------------------------------------------------
// Test: missing avatar stays absent
// ---------------------------------------------------------------------------

#[test]
fn token_without_avatar_round_trips_none() {
    let config = test_config();

    let token = generate_access_token(1, "No Avatar", None, 1, ROLE_EDITOR, &config)
        .expect("token generation should succeed");
    let claims = validate_token(&token, &config).expect("token should validate");

    assert_eq!(claims.avatar_url, None);
}

// ---------------------------------------------------------------------------
// Test: wrong secret is rejected
// ---------------------------------------------------------------------------

#[test]
fn token_signed_with_other_secret_is_rejected() {
    let config = test_config();
    let other = JwtConfig {
        secret: "a-completely-different-signing-secret".to_string(),
        access_token_expiry_mins: 60,
    };

    let token = generate_access_token(42, "Ada", None, 7, ROLE_EDITOR, &config)
        .expect("token generation should succeed");

    assert!(validate_token(&token, &other).is_err());
}

// ---------------------------------------------------------------------------
// Test: expired tokens are rejected
// ---------------------------------------------------------------------------

#[test]
fn expired_token_is_rejected() {
    let config = JwtConfig {
        secret: "test-secret-at-least-32-chars-long!!".to_string(),
        // Negative expiry puts `exp` in the past (beyond validation leeway).
        access_token_expiry_mins: -5,
    };

    let token = generate_access_token(42, "Ada", None, 7, ROLE_EDITOR, &config)
        .expect("token generation should succeed");

    assert!(validate_token(&token, &config).is_err());
}

// ---------------------------------------------------------------------------
// Test: garbage input is rejected
// ---------------------------------------------------------------------------

#[test]
fn malformed_token_is_rejected() {
    let config = test_config();

    assert!(validate_token("not-a-jwt", &config).is_err());
    assert!(validate_token("", &config).is_err());
}

// ---------------------------------------------------------------------------
// Test: each token gets a unique jti
// ---------------------------------------------------------------------------

#[test]
fn tokens_carry_unique_jti() {
    let config = test_config();

    let a = generate_access_token(42, "Ada", None, 7, ROLE_EDITOR, &config)
        .expect("token generation should succeed");
    let b = generate_access_token(42, "Ada", None, 7, ROLE_EDITOR, &config)
        .expect("token generation should succeed");

    let claims_a = validate_token(&a, &config).expect("a validates");
    let claims_b = validate_token(&b, &config).expect("b validates");

    assert_ne!(claims_a.jti, claims_b.jti);
}
