//! Request envelopes and response parsing.
//!
//! A request is `<wc-request:request>` with three children:
//!
//! - `<auth>`: HMAC of the serialized `<header>` under the session keyset
//!   (absent for anonymous methods)
//! - `<header>`: method, version, target record, session, locale, timing and
//!   the hash of `<info>`
//! - `<info>`: method-specific payload
//!
//! Both the HMAC and the info hash are computed over the exact bytes that are
//! sent, so the fragments are serialized once and embedded verbatim.

use std::time::Duration;

use time::OffsetDateTime;

use healthvault_auth::{HashAlgorithm, PersonContext, SessionSnapshot, hash_base64};
use healthvault_core::{
    ApplicationId, RecordId, XmlWriter, find_inner_xml, find_text, format_msg_time,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

pub const REQUEST_NAMESPACE: &str = "urn:com.microsoft.wc.request";

/// A method call before it is bound to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRequest {
    pub name: String,
    pub version: u32,
    pub record_id: Option<RecordId>,
    /// Inner XML of `<info>`.
    pub info_xml: String,
    /// Overrides the connection's `<msg-ttl>`.
    pub ttl: Option<Duration>,
    /// Sent with `<app-id>` instead of a session.
    pub anonymous: bool,
}

impl MethodRequest {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            record_id: None,
            info_xml: String::new(),
            ttl: None,
            anonymous: false,
        }
    }

    pub fn with_record(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn with_info(mut self, info_xml: impl Into<String>) -> Self {
        self.info_xml = info_xml.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// Per-connection header values.
#[derive(Debug, Clone)]
pub struct HeaderSettings {
    pub language: String,
    pub country: String,
    pub ttl: Duration,
    pub sdk_version: String,
    pub hash_algorithm: HashAlgorithm,
}

impl HeaderSettings {
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            language: config.language.clone(),
            country: config.country.clone(),
            ttl: config.request_ttl,
            sdk_version: config.sdk_version.clone(),
            hash_algorithm: config
                .auth
                .hash()
                .map_err(|e| ClientError::configuration(e.to_string()))?,
        })
    }
}

enum Caller<'a> {
    Session(&'a SessionSnapshot, &'a PersonContext),
    Anonymous(ApplicationId),
}

fn info_element(request: &MethodRequest) -> ClientResult<String> {
    let mut w = XmlWriter::new();
    w.start("info").raw(&request.info_xml).end("info");
    Ok(w.finish()?)
}

fn header_element(
    request: &MethodRequest,
    caller: &Caller<'_>,
    settings: &HeaderSettings,
    msg_time: OffsetDateTime,
    info: &str,
) -> ClientResult<String> {
    let mut w = XmlWriter::new();
    w.start("header")
        .element("method", &request.name)
        .element("method-version", &request.version.to_string());
    if let Some(record_id) = &request.record_id {
        w.element("record-id", &record_id.to_string());
    }
    match caller {
        Caller::Session(session, person) => {
            w.start("auth-session").element("auth-token", &session.token);
            match person {
                PersonContext::Application => {}
                PersonContext::Offline(person_id) => {
                    w.start("offline-person-info")
                        .element("offline-person-id", &person_id.to_string())
                        .end("offline-person-info");
                }
                PersonContext::UserToken(token) => {
                    w.element("user-auth-token", token);
                }
            }
            w.end("auth-session");
        }
        Caller::Anonymous(app_id) => {
            w.element("app-id", &app_id.to_string());
        }
    }
    w.element("language", &settings.language)
        .element("country", &settings.country)
        .element("msg-time", &format_msg_time(msg_time))
        .element(
            "msg-ttl",
            &request.ttl.unwrap_or(settings.ttl).as_secs().to_string(),
        )
        .element("version", &settings.sdk_version)
        .start("info-hash")
        .element_with(
            "hash-data",
            &[("algName", settings.hash_algorithm.name())],
            &hash_base64(settings.hash_algorithm, info.as_bytes()),
        )
        .end("info-hash")
        .end("header");
    Ok(w.finish()?)
}

fn wrap(auth: Option<&str>, header: &str, info: &str) -> ClientResult<String> {
    let mut w = XmlWriter::new();
    w.start_with("wc-request:request", &[("xmlns:wc-request", REQUEST_NAMESPACE)]);
    if let Some(auth) = auth {
        w.raw(auth);
    }
    w.raw(header).raw(info).end("wc-request:request");
    Ok(w.finish()?)
}

/// Envelope signed with the session's shared secret.
pub fn build_authenticated(
    request: &MethodRequest,
    session: &SessionSnapshot,
    person: &PersonContext,
    settings: &HeaderSettings,
    msg_time: OffsetDateTime,
) -> ClientResult<String> {
    let info = info_element(request)?;
    let header = header_element(
        request,
        &Caller::Session(session, person),
        settings,
        msg_time,
        &info,
    )?;

    let mac = session.keyset.sign(header.as_bytes())?;
    let mut auth = XmlWriter::new();
    auth.start("auth")
        .element_with(
            "hmac-data",
            &[("algName", session.keyset.algorithm().name())],
            &mac,
        )
        .end("auth");
    let auth = auth.finish()?;

    wrap(Some(&auth), &header, &info)
}

/// Unsigned envelope for methods callable without a session.
pub fn build_anonymous(
    request: &MethodRequest,
    application_id: ApplicationId,
    settings: &HeaderSettings,
    msg_time: OffsetDateTime,
) -> ClientResult<String> {
    let info = info_element(request)?;
    let header = header_element(
        request,
        &Caller::Anonymous(application_id),
        settings,
        msg_time,
        &info,
    )?;
    wrap(None, &header, &info)
}

// =============================================================================
// Response
// =============================================================================

/// Service status codes the client acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Failed,
    CredentialTokenExpired,
    AuthenticatedSessionTokenExpired,
    Other(i32),
}

impl StatusCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Failed => 1,
            Self::CredentialTokenExpired => 7,
            Self::AuthenticatedSessionTokenExpired => 65,
            Self::Other(code) => *code,
        }
    }

    /// The session token must be refreshed before retrying.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            Self::CredentialTokenExpired | Self::AuthenticatedSessionTokenExpired
        )
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Failed,
            7 => Self::CredentialTokenExpired,
            65 => Self::AuthenticatedSessionTokenExpired,
            other => Self::Other(other),
        }
    }
}

/// Parsed `<response>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: StatusCode,
    pub error_message: Option<String>,
    /// Inner XML of `<info>`, if the method returned any.
    pub info_xml: Option<String>,
}

impl ServiceResponse {
    pub fn parse(xml: &str) -> ClientResult<Self> {
        let code = find_text(xml, "response/status/code")?
            .ok_or_else(|| ClientError::unexpected("response has no status code"))?;
        let code: i32 = code
            .trim()
            .parse()
            .map_err(|_| ClientError::unexpected(format!("non-numeric status code '{code}'")))?;
        Ok(Self {
            status: StatusCode::from(code),
            error_message: find_text(xml, "response/status/error/message")?,
            info_xml: find_inner_xml(xml, "response/info")?,
        })
    }

    /// `Err(Service)` unless the status is OK.
    pub fn into_result(self) -> ClientResult<Self> {
        if self.status == StatusCode::Ok {
            return Ok(self);
        }
        Err(ClientError::Service {
            code: self.status.code(),
            message: self
                .error_message
                .unwrap_or_else(|| "no error message".to_string()),
        })
    }

    /// `<info>` content, or an error for methods that must return some.
    pub fn info(&self) -> ClientResult<&str> {
        self.info_xml
            .as_deref()
            .ok_or_else(|| ClientError::unexpected("response has no info element"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthvault_auth::{HmacAlgorithm, HmacKeySet, verify_hmac};
    use healthvault_core::{PersonId, find_attribute};
    use time::macros::datetime;

    fn settings() -> HeaderSettings {
        HeaderSettings {
            language: "en".into(),
            country: "US".into(),
            ttl: Duration::from_secs(1800),
            sdk_version: "test/1".into(),
            hash_algorithm: HashAlgorithm::Sha256,
        }
    }

    fn session() -> SessionSnapshot {
        SessionSnapshot {
            application_id: ApplicationId::generate(),
            token: "tok&en".into(),
            keyset: HmacKeySet::new(HmacAlgorithm::HmacSha256, b"shared".to_vec()),
            refresh_counter: 1,
        }
    }

    #[test]
    fn test_authenticated_envelope_shape() {
        let record = RecordId::generate();
        let request = MethodRequest::new("GetThings", 3)
            .with_record(record)
            .with_info("<group><id>x</id></group>");
        let xml = build_authenticated(
            &request,
            &session(),
            &PersonContext::Application,
            &settings(),
            datetime!(2024-03-01 10:00:00 UTC),
        )
        .unwrap();

        assert!(xml.starts_with(
            r#"<wc-request:request xmlns:wc-request="urn:com.microsoft.wc.request"><auth>"#
        ));
        assert_eq!(find_text(&xml, "header/method").unwrap().as_deref(), Some("GetThings"));
        assert_eq!(find_text(&xml, "header/method-version").unwrap().as_deref(), Some("3"));
        assert_eq!(
            find_text(&xml, "header/record-id").unwrap(),
            Some(record.to_string())
        );
        assert_eq!(
            find_text(&xml, "auth-session/auth-token").unwrap().as_deref(),
            Some("tok&en")
        );
        assert_eq!(
            find_text(&xml, "header/msg-time").unwrap().as_deref(),
            Some("2024-03-01T10:00:00Z")
        );
        assert_eq!(find_text(&xml, "header/msg-ttl").unwrap().as_deref(), Some("1800"));
        assert_eq!(
            find_inner_xml(&xml, "request/info").unwrap().as_deref(),
            Some("<group><id>x</id></group>")
        );
    }

    #[test]
    fn test_header_hmac_and_info_hash_cover_exact_bytes() {
        let session = session();
        let request = MethodRequest::new("GetPersonInfo", 1);
        let xml = build_authenticated(
            &request,
            &session,
            &PersonContext::Application,
            &settings(),
            datetime!(2024-03-01 10:00:00 UTC),
        )
        .unwrap();

        let header = format!(
            "<header>{}</header>",
            find_inner_xml(&xml, "request/header").unwrap().unwrap()
        );
        let mac = find_text(&xml, "auth/hmac-data").unwrap().unwrap();
        assert!(session.keyset.verify(header.as_bytes(), &mac).unwrap());
        assert_eq!(
            find_attribute(&xml, "auth/hmac-data", "algName").unwrap().as_deref(),
            Some("HMACSHA256")
        );

        let info = format!(
            "<info>{}</info>",
            find_inner_xml(&xml, "request/info").unwrap().unwrap()
        );
        assert_eq!(
            find_text(&xml, "info-hash/hash-data").unwrap(),
            Some(hash_base64(HashAlgorithm::Sha256, info.as_bytes()))
        );

        // Any change to the header invalidates the MAC.
        let tampered = header.replace("GetPersonInfo", "GetThings");
        let raw = base64_decode(&mac);
        assert!(
            !verify_hmac(HmacAlgorithm::HmacSha256, b"shared", tampered.as_bytes(), &raw).unwrap()
        );
    }

    fn base64_decode(s: &str) -> Vec<u8> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(s).unwrap()
    }

    #[test]
    fn test_person_context_in_auth_session() {
        let person = PersonId::generate();
        let xml = build_authenticated(
            &MethodRequest::new("GetPersonInfo", 1),
            &session(),
            &PersonContext::Offline(person),
            &settings(),
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(
            find_text(&xml, "offline-person-info/offline-person-id").unwrap(),
            Some(person.to_string())
        );

        let xml = build_authenticated(
            &MethodRequest::new("GetPersonInfo", 1),
            &session(),
            &PersonContext::UserToken("user-tok".into()),
            &settings(),
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(
            find_text(&xml, "auth-session/user-auth-token").unwrap().as_deref(),
            Some("user-tok")
        );
    }

    #[test]
    fn test_anonymous_envelope_has_app_id_and_no_auth() {
        let app = ApplicationId::generate();
        let xml = build_anonymous(
            &MethodRequest::new("CreateAuthenticatedSessionToken", 2).with_info("<auth-info/>"),
            app,
            &settings(),
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(find_text(&xml, "header/app-id").unwrap(), Some(app.to_string()));
        assert!(find_inner_xml(&xml, "request/auth").unwrap().is_none());
        assert!(find_inner_xml(&xml, "header/auth-session").unwrap().is_none());
    }

    #[test]
    fn test_request_ttl_overrides_settings() {
        let xml = build_anonymous(
            &MethodRequest::new("GetServiceDefinition", 2).with_ttl(Duration::from_secs(60)),
            ApplicationId::generate(),
            &settings(),
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(find_text(&xml, "header/msg-ttl").unwrap().as_deref(), Some("60"));
    }

    #[test]
    fn test_parse_ok_response() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?><response><status><code>0</code></status><wc:info xmlns:wc="urn:x"><a>1</a></wc:info></response>"#;
        let resp = ServiceResponse::parse(xml).unwrap();
        assert_eq!(resp.status, StatusCode::Ok);
        assert_eq!(resp.info().unwrap(), "<a>1</a>");
        assert!(resp.into_result().is_ok());
    }

    #[test]
    fn test_parse_error_response() {
        let xml = "<response><status><code>65</code><error><message>The authenticated session token has expired.</message></error></status></response>";
        let resp = ServiceResponse::parse(xml).unwrap();
        assert_eq!(resp.status, StatusCode::AuthenticatedSessionTokenExpired);
        assert!(resp.status.is_session_expired());
        assert!(resp.info().is_err());

        let err = resp.into_result().unwrap_err();
        assert_eq!(err.service_code(), Some(65));
    }

    #[test]
    fn test_parse_rejects_missing_status() {
        assert!(matches!(
            ServiceResponse::parse("<response/>"),
            Err(ClientError::UnexpectedResponse(_))
        ));
        assert!(matches!(
            ServiceResponse::parse("<response><status><code>x</code></status></response>"),
            Err(ClientError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(StatusCode::from(7), StatusCode::CredentialTokenExpired);
        assert!(StatusCode::from(7).is_session_expired());
        assert_eq!(StatusCode::from(42), StatusCode::Other(42));
        assert_eq!(StatusCode::Other(42).code(), 42);
        assert!(!StatusCode::Failed.is_session_expired());
    }
}
