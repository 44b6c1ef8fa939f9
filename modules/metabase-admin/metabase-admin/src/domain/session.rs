use metabase_admin_sdk::{AuthError, Session, SessionMode};
use metabase_http::{Method, Transport};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const LOGIN_PATH: &str = "session";
const CURRENT_USER_PATH: &str = "user/current";

/// Username and password used for the login exchange.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    id: String,
}

/// Establishes sessions against one instance.
///
/// An existing token is reused when the server still accepts it; otherwise a
/// fresh one is obtained by logging in. Nothing here retries.
pub struct SessionManager {
    transport: Transport,
}

impl SessionManager {
    /// `transport` must not carry a session; the login exchange is anonymous.
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// # Errors
    ///
    /// - `LoginRejected` if the server refuses the credentials
    /// - `EmptyToken` if the login response carries no session id
    /// - `Transport` if the login exchange fails otherwise
    #[tracing::instrument(
        skip_all,
        fields(base_url = %self.transport.base_url(), username = %credentials.username)
    )]
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        existing_token: Option<&SecretString>,
    ) -> Result<Session, AuthError> {
        if let Some(token) = existing_token.filter(|t| !t.expose_secret().trim().is_empty())
            && self.probe(token).await
        {
            info!("Reusing existing session");
            return Ok(self.session(token.clone(), SessionMode::Reused));
        }

        let token = self.login(credentials).await?;
        info!("Logged in with a fresh session");
        Ok(self.session(token, SessionMode::FreshLogin))
    }

    /// Whether the server accepts `token`. Any failure counts as "no".
    async fn probe(&self, token: &SecretString) -> bool {
        match self
            .transport
            .with_session(token.clone())
            .probe(Method::GET, CURRENT_USER_PATH)
            .await
        {
            Ok(status) if status.is_success() => true,
            Ok(status) => {
                warn!(
                    status = status.as_u16(),
                    "Existing session not accepted, falling back to login"
                );
                false
            }
            Err(err) => {
                warn!(error = %err, "Existing session could not be validated, falling back to login");
                false
            }
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<SecretString, AuthError> {
        let request = LoginRequest {
            username: &credentials.username,
            password: credentials.password.expose_secret(),
        };

        let response: LoginResponse = self
            .transport
            .post(LOGIN_PATH, &request)
            .await
            .map_err(|err| AuthError::from_login_failure(&credentials.username, err))?;

        if response.id.trim().is_empty() {
            return Err(AuthError::EmptyToken {
                username: credentials.username.clone(),
            });
        }
        Ok(SecretString::from(response.id))
    }

    fn session(&self, token: SecretString, mode: SessionMode) -> Session {
        Session::new(
            token,
            mode,
            self.transport.base_url().as_str(),
            self.transport.user_agent(),
        )
    }
}
