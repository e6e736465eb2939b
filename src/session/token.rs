use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use thiserror::Error;

use crate::models::Role;

/// Structural decode failures. Any of these means the token is corrupt and
/// must be purged from the store.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token must have exactly 3 segments, found {0}")]
    SegmentCount(usize),

    #[error("token has an empty segment")]
    EmptySegment,

    #[error("token payload is not valid base64url")]
    PayloadEncoding,

    #[error("token payload is not a claims object: {0}")]
    PayloadShape(String),

    #[error("token is missing the `{0}` claim")]
    MissingClaim(&'static str),

    #[error("token role `{0}` is not recognized")]
    UnknownRole(String),
}

/// Claims the portal reads out of the payload segment. The signature
/// segment is never verified here; the gateway is the trust boundary and
/// these values gate routing and display only.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub user_id: i64,
    pub iat: Option<i64>,
    pub exp: Option<i64>,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, rename = "userId")]
    user_id: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Cheap shape check: exactly 3 non-empty dot-separated segments.
pub fn is_well_formed(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
}

/// Decode the payload segment into typed claims.
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::SegmentCount(segments.len()));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::EmptySegment);
    }

    // Tokens are minted unpadded; tolerate padded emitters as well.
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::PayloadEncoding)?;

    let raw: RawClaims =
        serde_json::from_slice(&bytes).map_err(|e| TokenError::PayloadShape(e.to_string()))?;

    let sub = raw.sub.ok_or(TokenError::MissingClaim("sub"))?;
    let role_text = raw.role.ok_or(TokenError::MissingClaim("role"))?;
    let role: Role = role_text
        .parse()
        .map_err(|_| TokenError::UnknownRole(role_text))?;
    let user_id = raw.user_id.ok_or(TokenError::MissingClaim("userId"))?;

    Ok(Claims {
        sub,
        role,
        user_id,
        iat: raw.iat,
        exp: raw.exp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(payload: &serde_json::Value) -> String {
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("eyJhbGciOiJIUzI1NiJ9.{encoded}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_decode_valid_token() {
        let token = make_token(&serde_json::json!({
            "sub": "dr.chen",
            "role": "PROVIDER",
            "userId": 42,
            "iat": 1700000000,
            "exp": 1700086400,
        }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.sub, "dr.chen");
        assert_eq!(claims.role, Role::Provider);
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.exp, Some(1700086400));
    }

    #[test]
    fn test_decode_rejects_wrong_segment_count() {
        assert_eq!(decode("onlyonesegment"), Err(TokenError::SegmentCount(1)));
        assert_eq!(decode("a.b"), Err(TokenError::SegmentCount(2)));
        assert_eq!(decode("a.b.c.d"), Err(TokenError::SegmentCount(4)));
        assert!(!is_well_formed("a.b"));
    }

    #[test]
    fn test_decode_rejects_empty_segment() {
        assert_eq!(decode("a..c"), Err(TokenError::EmptySegment));
        assert_eq!(decode(".b.c"), Err(TokenError::EmptySegment));
        assert!(!is_well_formed("a..c"));
    }

    #[test]
    fn test_decode_rejects_bad_payload() {
        assert_eq!(
            decode("head.!!!not-base64!!!.sig"),
            Err(TokenError::PayloadEncoding)
        );
        let not_json = URL_SAFE_NO_PAD.encode(b"plain text");
        assert!(matches!(
            decode(&format!("head.{not_json}.sig")),
            Err(TokenError::PayloadShape(_))
        ));
    }

    #[test]
    fn test_decode_requires_claims() {
        let token = make_token(&serde_json::json!({"sub": "x", "role": "PATIENT"}));
        assert_eq!(decode(&token), Err(TokenError::MissingClaim("userId")));

        let token = make_token(&serde_json::json!({"role": "PATIENT", "userId": 1}));
        assert_eq!(decode(&token), Err(TokenError::MissingClaim("sub")));
    }

    #[test]
    fn test_decode_rejects_unknown_role() {
        let token = make_token(&serde_json::json!({"sub": "x", "role": "WIZARD", "userId": 1}));
        assert_eq!(decode(&token), Err(TokenError::UnknownRole("WIZARD".into())));
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let payload = serde_json::json!({"sub": "x", "role": "ADMIN", "userId": 5});
        let padded = base64::engine::general_purpose::URL_SAFE
            .encode(serde_json::to_vec(&payload).unwrap());
        let token = format!("head.{padded}.sig");
        assert_eq!(decode(&token).unwrap().role, Role::Admin);
    }
}
