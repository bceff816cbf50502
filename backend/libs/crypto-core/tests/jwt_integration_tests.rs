/// Integration tests for crypto-core JWT functionality
///
/// This test module covers:
/// - Loading signing and verification keys from PEM files
/// - Tokens minted by one codec verified by a public-key-only codec
/// - Expiry driven by a shared manual clock
use chrono::Duration;
use crypto_core::{
    AccessClaims, Clock, ManualClock, TokenCodec, TokenError, TokenTtlPolicy, TokenType,
    TrustLevel,
};
use std::sync::Arc;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn signing_codec(clock: Arc<ManualClock>) -> TokenCodec {
    TokenCodec::from_key_files(
        "RS256",
        fixture("jwt-private.pem"),
        fixture("jwt-public.pem"),
        TokenTtlPolicy::default(),
        clock,
    )
    .expect("load fixture keys")
}

fn snapshot(clock: &ManualClock) -> AccessClaims {
    AccessClaims {
        email: "ada@example.com".to_string(),
        username: "ada".to_string(),
        created_at: clock.now(),
    }
}

#[test]
fn test_verifier_only_codec_accepts_issuer_tokens() {
    let clock = Arc::new(ManualClock::starting_now());
    let issuer = signing_codec(clock.clone());

    let public_pem = std::fs::read(fixture("jwt-public.pem")).unwrap();
    let verifier = TokenCodec::verifier_only("RS256", &public_pem, clock.clone()).unwrap();

    let pair = issuer
        .mint_pair(42, snapshot(&clock), TrustLevel::Trusted)
        .unwrap();

    let access = verifier.parse(&pair.access.token).unwrap();
    assert_eq!(access, pair.access.claims);
    assert_eq!(access.token_type(), TokenType::Access);

    let refresh = verifier.parse(&pair.refresh.token).unwrap();
    assert_eq!(refresh.token_type(), TokenType::Refresh);
    assert_eq!(refresh.expires_at() - refresh.issued_at(), Duration::days(30));

    assert!(matches!(
        verifier.mint_refresh(42, TrustLevel::Web),
        Err(TokenError::SigningKeyMissing)
    ));
}

#[test]
fn test_shared_clock_expires_tokens_everywhere() {
    let clock = Arc::new(ManualClock::starting_now());
    let issuer = signing_codec(clock.clone());
    let minted = issuer.mint_access(42, snapshot(&clock)).unwrap();

    clock.advance(Duration::minutes(15) - Duration::seconds(1));
    assert!(issuer.parse(&minted.token).is_ok());

    clock.advance(Duration::seconds(1));
    assert!(matches!(issuer.parse(&minted.token), Err(TokenError::Expired)));
}

#[test]
fn test_missing_key_file_reported() {
    let clock = Arc::new(ManualClock::starting_now());
    let result = TokenCodec::from_key_files(
        "RS256",
        fixture("does-not-exist.pem"),
        fixture("jwt-public.pem"),
        TokenTtlPolicy::default(),
        clock,
    );

    match result {
        Err(TokenError::Key(message)) => assert!(message.contains("does-not-exist.pem")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("codec built without a private key file"),
    }
}
