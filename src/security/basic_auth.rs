//! HTTP Basic credential validation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

use super::access_control::{AccessCheck, CheckOutcome, Denial};
use super::context::RequestContext;
use super::enable::Enable;
use crate::config::Credential;
use crate::observability::{AccessEvent, EventSink};

/// Realm presented in the challenge when none is configured.
pub const DEFAULT_REALM: &str = "Auth required";

/// Decode `Authorization: Basic ...` into `(user, password)`.
///
/// The scheme is case-insensitive and the password is everything after the
/// first `:`. Anything malformed yields `None`.
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Matches supplied Basic credentials against a configured allow-set.
#[derive(Debug, Clone, Default)]
pub struct CredentialValidator {
    credentials: Vec<Credential>,
}

impl CredentialValidator {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    /// Username of the configured credential equal to the supplied pair.
    pub fn validate(&self, ctx: &RequestContext) -> Option<&str> {
        let (user, pass) = parse_basic(ctx.header("authorization")?)?;
        self.credentials
            .iter()
            .find(|c| c.username == user && c.password == pass)
            .map(|c| c.username.as_str())
    }
}

/// Access check that answers a failed validation with a Basic challenge.
pub struct BasicAuthCheck {
    validator: CredentialValidator,
    realm: String,
    log_user: bool,
    enable: Enable,
    sink: Arc<dyn EventSink>,
}

impl BasicAuthCheck {
    pub fn new(
        validator: CredentialValidator,
        realm: impl Into<String>,
        enable: Enable,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            validator,
            realm: realm.into(),
            log_user: false,
            enable,
            sink,
        }
    }

    /// Log the authenticated username on success.
    pub fn log_user(mut self, on: bool) -> Self {
        self.log_user = on;
        self
    }
}

impl AccessCheck for BasicAuthCheck {
    fn name(&self) -> &'static str {
        "basic_auth"
    }

    fn enable(&self) -> &Enable {
        &self.enable
    }

    fn check(&self, ctx: &RequestContext) -> CheckOutcome {
        match self.validator.validate(ctx) {
            Some(username) => {
                if self.log_user {
                    self.sink.emit(AccessEvent::UserAuthenticated {
                        username: username.to_string(),
                    });
                }
                CheckOutcome::Pass
            }
            None => {
                self.sink.emit(AccessEvent::CredentialsRejected {
                    path: ctx.path.clone(),
                });
                CheckOutcome::Deny(Denial::challenge(&self.realm))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::RecordingSink;
    use crate::security::access_control::Reason;
    use axum::http::{HeaderMap, HeaderValue, Method};

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    fn ctx(auth: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(v) = auth {
            headers.insert("authorization", HeaderValue::from_str(v).unwrap());
        }
        RequestContext::new(Method::GET, "/", None, headers)
    }

    fn validator() -> CredentialValidator {
        CredentialValidator::new(vec![
            Credential::new("vip", "123123"),
            Credential::new("ops", "p:w"),
        ])
    }

    #[test]
    fn test_parse_basic() {
        assert_eq!(
            parse_basic(&basic("vip", "123123")),
            Some(("vip".into(), "123123".into()))
        );
        assert_eq!(
            parse_basic("bAsIc dmlwOjEyMzEyMw=="),
            Some(("vip".into(), "123123".into()))
        );
        assert_eq!(parse_basic("Bearer abc"), None);
        assert_eq!(parse_basic("Basic !!!"), None);
        assert_eq!(parse_basic("Basic"), None);
        // "novalue" without a colon
        assert_eq!(parse_basic("Basic bm92YWx1ZQ=="), None);
    }

    #[test]
    fn test_matching_pair() {
        let v = validator();
        assert_eq!(v.validate(&ctx(Some(&basic("vip", "123123")))), Some("vip"));
        assert_eq!(v.validate(&ctx(Some(&basic("ops", "p:w")))), Some("ops"));
    }

    #[test]
    fn test_single_field_mismatch() {
        let v = validator();
        assert_eq!(v.validate(&ctx(Some(&basic("vip", "wrong")))), None);
        assert_eq!(v.validate(&ctx(Some(&basic("VIP", "123123")))), None);
        assert_eq!(v.validate(&ctx(Some(&basic("ops", "123123")))), None);
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(validator().validate(&ctx(None)), None);
    }

    #[test]
    fn test_check_challenge_and_user_log() {
        let sink = Arc::new(RecordingSink::new());
        let check = BasicAuthCheck::new(validator(), DEFAULT_REALM, Enable::Always, sink.clone())
            .log_user(true);

        assert!(matches!(
            check.check(&ctx(Some(&basic("vip", "123123")))),
            CheckOutcome::Pass
        ));
        assert_eq!(
            sink.count(|e| matches!(e, AccessEvent::UserAuthenticated { username } if username == "vip")),
            1
        );

        match check.check(&ctx(None)) {
            CheckOutcome::Deny(denial) => assert_eq!(denial.reason(), Reason::BadCredentials),
            CheckOutcome::Pass => panic!("missing credentials must be denied"),
        }
    }
}
