//! Authenticated connection to the platform.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;
use url::Url;

use healthvault_auth::{
    AuthError, AuthResult, Credential, IssuedToken, SessionSnapshot, SessionTokenRequest,
    TokenIssuer,
};
use healthvault_core::{RecordId, find_elements, now_utc};

use crate::config::ClientConfig;
use crate::envelope::{
    HeaderSettings, MethodRequest, ServiceResponse, build_anonymous, build_authenticated,
};
use crate::error::{ClientError, ClientResult};
use crate::person::PersonClient;
use crate::things::ThingClient;

const CREATE_SESSION_TOKEN: &str = "CreateAuthenticatedSessionToken";

/// What came back for one attempt of a request.
enum Attempt {
    Response(ServiceResponse),
    SessionExpired,
}

struct ConnectionInner {
    http: reqwest::Client,
    endpoint: Url,
    config: ClientConfig,
    settings: HeaderSettings,
    credential: Arc<dyn Credential>,
}

/// Posts signed envelopes and keeps the credential's session fresh.
///
/// Clones share the HTTP client and the credential.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("application_id", &self.inner.credential.application_id())
            .finish()
    }
}

impl Connection {
    pub fn new(config: ClientConfig, credential: Arc<dyn Credential>) -> ClientResult<Self> {
        config.validate().map_err(ClientError::configuration)?;
        let endpoint = config
            .endpoint()
            .map_err(|e| ClientError::configuration(format!("service_url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.sdk_version.clone())
            .build()?;
        let settings = HeaderSettings::from_config(&config)?;

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                http,
                endpoint,
                config,
                settings,
                credential,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub fn credential(&self) -> &Arc<dyn Credential> {
        &self.inner.credential
    }

    pub fn person(&self) -> PersonClient {
        PersonClient::new(self.clone())
    }

    pub fn things(&self, record_id: RecordId) -> ThingClient {
        ThingClient::new(self.clone(), record_id)
    }

    /// Send `request` and return the successful response.
    ///
    /// Authenticated requests whose session the service rejects are retried
    /// after a refresh, at most `auth.max_refresh_attempts` times.
    pub async fn execute(&self, request: MethodRequest) -> ClientResult<ServiceResponse> {
        let span = tracing::debug_span!(
            "hv.request",
            method = %request.name,
            version = request.version
        );
        async move {
            if request.anonymous {
                let application_id = self.inner.credential.application_id();
                let body = build_anonymous(
                    &request,
                    application_id,
                    &self.inner.settings,
                    now_utc(),
                )?;
                return match self.post(body).await? {
                    Attempt::Response(response) => response.into_result(),
                    Attempt::SessionExpired => Err(ClientError::HttpStatus {
                        status: 401,
                        body: "anonymous request rejected".into(),
                    }),
                };
            }
            self.execute_authenticated(&request).await
        }
        .instrument(span)
        .await
    }

    async fn execute_authenticated(&self, request: &MethodRequest) -> ClientResult<ServiceResponse> {
        let credential = &self.inner.credential;
        let max_attempts = self.inner.config.auth.max_refresh_attempts;

        let mut session = credential.session(self).await?;
        let mut refreshes = 0u32;
        loop {
            tracing::debug!(
                refresh_counter = session.refresh_counter,
                attempt = refreshes + 1,
                "Sending request"
            );
            match self.send_with_session(request, &session).await? {
                Attempt::Response(response) if !response.status.is_session_expired() => {
                    return response.into_result();
                }
                _ => {}
            }

            if refreshes >= max_attempts {
                tracing::warn!(
                    refresh_counter = session.refresh_counter,
                    attempts = refreshes,
                    "Session still expired, giving up"
                );
                return Err(ClientError::SessionExpired {
                    attempts: refreshes,
                });
            }
            tracing::warn!(
                refresh_counter = session.refresh_counter,
                attempt = refreshes + 1,
                "Session expired, refreshing"
            );
            credential.invalidate(&session).await?;
            session = match credential.refresh(&session, self).await {
                Ok(session) => session,
                Err(AuthError::TokenExpired) => {
                    tracing::warn!(attempts = refreshes, "Credential cannot renew its session");
                    return Err(ClientError::SessionExpired {
                        attempts: refreshes,
                    });
                }
                Err(e) => return Err(e.into()),
            };
            refreshes += 1;
        }
    }

    async fn send_with_session(
        &self,
        request: &MethodRequest,
        session: &SessionSnapshot,
    ) -> ClientResult<Attempt> {
        let body = build_authenticated(
            request,
            session,
            self.inner.credential.person(),
            &self.inner.settings,
            now_utc(),
        )?;
        self.post(body).await
    }

    async fn post(&self, body: String) -> ClientResult<Attempt> {
        let response = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(Attempt::SessionExpired);
        }
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(Attempt::Response(ServiceResponse::parse(&text)?))
    }

    async fn request_session_token(&self, request: SessionTokenRequest) -> ClientResult<String> {
        let method = MethodRequest::new(CREATE_SESSION_TOKEN, 2)
            .with_info(request.info_xml)
            .anonymous();
        let response = self.execute(method).await?;

        let app_id = request.application_id.to_string();
        let tokens = find_elements(response.info()?, "token")?;
        let token = tokens
            .iter()
            .find(|t| {
                t.attr("app-id")
                    .is_some_and(|id| id.eq_ignore_ascii_case(&app_id))
            })
            .or_else(|| tokens.iter().find(|t| t.attr("app-id").is_none()))
            .ok_or_else(|| ClientError::unexpected("no session token for this application"))?;
        Ok(token.text()?)
    }
}

#[async_trait]
impl TokenIssuer for Connection {
    async fn create_session_token(&self, request: SessionTokenRequest) -> AuthResult<IssuedToken> {
        let application_id = request.application_id;
        self.request_session_token(request)
            .await
            .map(|token| IssuedToken { token })
            .map_err(|e| {
                tracing::warn!(%application_id, error = %e, "Session token request failed");
                match e {
                    ClientError::Auth(auth) => auth,
                    other => AuthError::authentication(other.to_string()),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthvault_auth::{
        ApplicationSigner, AuthConfig, AuthSessionKeySetPairs, HmacAlgorithm, HmacKeySet,
        WebApplicationCredential,
    };
    use healthvault_core::ApplicationId;

    fn credential() -> Arc<dyn Credential> {
        let secret = HmacKeySet::new(HmacAlgorithm::HmacSha256, b"long-term".to_vec());
        Arc::new(
            WebApplicationCredential::new(
                ApplicationId::generate(),
                ApplicationSigner::SharedSecret(secret),
                &AuthConfig::default(),
            )
            .unwrap()
            .with_cache(Arc::new(AuthSessionKeySetPairs::new())),
        )
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig {
            service_url: "not a url".into(),
            ..Default::default()
        };
        let err = Connection::new(config, credential()).unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_clones_share_inner() {
        let conn = Connection::new(ClientConfig::default(), credential()).unwrap();
        let clone = conn.clone();
        assert!(Arc::ptr_eq(&conn.inner, &clone.inner));
        assert_eq!(
            conn.endpoint().as_str(),
            "https://platform.healthvault-ppe.com/platform/wildcat.ashx"
        );
    }
}
