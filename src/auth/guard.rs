//! Role-gated access control composed in front of every protected handler.
//!
//! Decode failures surface the exact token problem as a 401-class error; a
//! good token with the wrong role is a 403, which is a different failure
//! and must stay distinguishable.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::tokens::TokenService;
use crate::domain::Role;
use crate::error::ApiError;

/// Authenticated caller context decoded from an access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    pub email: String,
}

/// Pull the bearer token from the `Authorization` header, falling back to
/// the legacy `?token=` query parameter kept for old clients.
fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    if from_header.is_some() {
        return from_header;
    }
    query_token
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolve the request's token into a principal or the specific 401 cause.
pub fn authenticate(
    tokens: &TokenService,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Principal, ApiError> {
    let token = extract_token(headers, query_token).ok_or(ApiError::MissingToken)?;
    let claims = tokens.verify_access_token(&token)?;
    Ok(Principal {
        username: claims.username,
        role: claims.role,
        email: claims.email,
    })
}

/// Authorization check, distinct from authentication: the caller is known,
/// but the role is not in the allowed set.
pub fn require_role(principal: &Principal, roles: &[Role]) -> Result<(), ApiError> {
    if roles.contains(&principal.role) {
        Ok(())
    } else {
        Err(ApiError::AuthorizationDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::{authenticate, require_role, Principal};
    use crate::auth::tokens::TokenService;
    use crate::clock::ManualClock;
    use crate::domain::Role;
    use crate::error::ApiError;
    use axum::http::{HeaderMap, HeaderValue};
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;
    use std::sync::Arc;

    fn tokens() -> (TokenService, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let service = TokenService::new(
            &SecretString::from("access".to_string()),
            &SecretString::from("reset".to_string()),
            60,
            30,
            Arc::new(clock.clone()),
        );
        (service, clock)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn header_token_authenticates() {
        let (service, _) = tokens();
        let token = service
            .issue_access_token("huda", Role::Admin, "huda@example.com")
            .unwrap();
        let principal = authenticate(&service, &bearer(&token), None).unwrap();
        assert_eq!(principal.username, "huda");
        assert_eq!(principal.role, Role::Admin);
    }

    #[test]
    fn query_parameter_token_still_works() {
        let (service, _) = tokens();
        let token = service
            .issue_access_token("huda", Role::Admin, "huda@example.com")
            .unwrap();
        let principal = authenticate(&service, &HeaderMap::new(), Some(&token)).unwrap();
        assert_eq!(principal.username, "huda");
    }

    #[test]
    fn missing_token_is_its_own_failure() {
        let (service, _) = tokens();
        assert!(matches!(
            authenticate(&service, &HeaderMap::new(), None),
            Err(ApiError::MissingToken)
        ));
    }

    #[test]
    fn expired_and_malformed_stay_distinguishable() {
        let (service, clock) = tokens();
        let token = service
            .issue_access_token("huda", Role::Admin, "huda@example.com")
            .unwrap();
        clock.advance(chrono::Duration::minutes(61));
        assert!(matches!(
            authenticate(&service, &bearer(&token), None),
            Err(ApiError::TokenExpired)
        ));
        assert!(matches!(
            authenticate(&service, &bearer("garbage"), None),
            Err(ApiError::MalformedToken)
        ));
    }

    #[test]
    fn wrong_role_is_denied_not_unauthenticated() {
        let principal = Principal {
            username: "huda".to_string(),
            role: Role::Teacher,
            email: "huda@example.com".to_string(),
        };
        assert!(require_role(&principal, &[Role::Teacher]).is_ok());
        assert!(matches!(
            require_role(&principal, &[Role::Admin]),
            Err(ApiError::AuthorizationDenied)
        ));
    }
}
