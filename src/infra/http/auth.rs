use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::error::ApiError;
use super::state::HttpState;

/// Bearer token guarding the maintenance routes.
///
/// Only the SHA-256 digest is kept; candidates are hashed and compared in constant time.
pub struct AdminToken {
    digest: Vec<u8>,
}

impl AdminToken {
    pub fn new(token: &str) -> Self {
        Self {
            digest: Self::hash(token),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        self.digest.ct_eq(&Self::hash(candidate)).unwrap_u8() == 1
    }

    fn hash(value: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminToken(..)")
    }
}

pub async fn admin_auth(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_ref() else {
        return ApiError::unauthorized().into_response();
    };

    let token = match extract_token(request.headers().get(AUTHORIZATION)) {
        Some(value) => value,
        None => return ApiError::unauthorized().into_response(),
    };

    if !expected.verify(token) {
        return ApiError::unauthorized().into_response();
    }

    next.run(request).await
}

fn extract_token(header: Option<&HeaderValue>) -> Option<&str> {
    let raw = header?.to_str().ok()?;
    raw.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_only_the_configured_token() {
        let token = AdminToken::new("s3cret");
        assert!(token.verify("s3cret"));
        assert!(!token.verify("s3cret "));
        assert!(!token.verify(""));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let header = HeaderValue::from_static("Bearer abc");
        assert_eq!(extract_token(Some(&header)), Some("abc"));

        let header = HeaderValue::from_static("abc");
        assert_eq!(extract_token(Some(&header)), None);
        assert_eq!(extract_token(None), None);
    }

    #[test]
    fn debug_output_hides_the_digest() {
        assert_eq!(format!("{:?}", AdminToken::new("x")), "AdminToken(..)");
    }
}
