//! Property tests for the token codec: claims survive the sign/verify round
//! trip for every role and token kind, kinds never cross-validate, and a
//! tampered signature never verifies.

use assaygate::auth::{Identity, Role, TokenCodec, TokenKind};
use assaygate::config::AuthConfig;
use assaygate::domain::IdentityId;
use chrono::Utc;
use proptest::prelude::*;

fn codec() -> TokenCodec {
    TokenCodec::new(&AuthConfig::default())
}

fn identity_with(email: &str, role: Role, token_version: i64) -> Identity {
    let now = Utc::now();
    Identity {
        id: IdentityId::new(),
        email: email.to_string(),
        display_name: "Property Holder".to_string(),
        password_hash: None,
        role,
        active: true,
        superuser: false,
        org_id: None,
        token_version,
        mfa_secret: None,
        mfa_enabled: false,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn kind_strategy() -> impl Strategy<Value = TokenKind> {
    prop_oneof![Just(TokenKind::Access), Just(TokenKind::Refresh)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn issued_claims_survive_decode(
        email in "[a-z]{1,12}@[a-z]{1,10}\\.com",
        role in role_strategy(),
        ver in 0i64..10_000,
        kind in kind_strategy(),
    ) {
        let codec = codec();
        let identity = identity_with(&email, role, ver);

        let token = codec.issue(&identity, kind).unwrap();
        let claims = codec.decode(&token).unwrap();

        prop_assert_eq!(&claims.sub, &identity.id);
        prop_assert_eq!(&claims.email, &email);
        prop_assert_eq!(claims.role, role);
        prop_assert_eq!(claims.kind, kind);
        prop_assert_eq!(claims.ver, ver);
        prop_assert!(claims.exp > claims.iat);
    }

    #[test]
    fn matching_kind_validates_and_cross_kind_never_does(
        role in role_strategy(),
        kind in kind_strategy(),
    ) {
        let codec = codec();
        let identity = identity_with("holder@example.com", role, 0);
        let token = codec.issue(&identity, kind).unwrap();

        let (same, cross) = match kind {
            TokenKind::Access => {
                (codec.validate_access_token(&token), codec.validate_refresh_token(&token))
            }
            TokenKind::Refresh => {
                (codec.validate_refresh_token(&token), codec.validate_access_token(&token))
            }
        };

        prop_assert!(same.is_ok());
        prop_assert!(cross.is_err());
    }

    #[test]
    fn tampered_signature_never_verifies(
        role in role_strategy(),
        flip in 0usize..16,
    ) {
        let codec = codec();
        let identity = identity_with("holder@example.com", role, 0);
        let token = codec.issue(&identity, TokenKind::Access).unwrap();

        // Flip one character inside the signature segment. An HS256
        // signature is 43 base64url characters, so the first 16 positions
        // after the final dot are always in bounds and never the last char.
        let dot = token.rfind('.').unwrap();
        let mut bytes = token.into_bytes();
        let idx = dot + 1 + flip;
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        prop_assert!(codec.validate_access_token(&tampered).is_err());
    }

    #[test]
    fn ttls_come_from_config_for_both_kinds(kind in kind_strategy()) {
        let config = AuthConfig {
            access_ttl_secs: 300,
            refresh_ttl_secs: 7200,
            ..AuthConfig::default()
        };
        let codec = TokenCodec::new(&config);
        let identity = identity_with("holder@example.com", Role::Auditor, 0);

        let token = codec.issue(&identity, kind).unwrap();
        let claims = codec.decode(&token).unwrap();

        let expected = match kind {
            TokenKind::Access => 300,
            TokenKind::Refresh => 7200,
        };
        prop_assert_eq!(claims.exp - claims.iat, expected);
    }
}
