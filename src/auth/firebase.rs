//! Firebase Authentication REST endpoints (Identity Toolkit + Secure Token).

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;

use super::{AuthError, AuthProvider, AuthSession, validate_credentials};
use crate::core::session::Identity;

const IDENTITY_TOOLKIT: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN: &str = "https://securetoken.googleapis.com/v1/token";

/// Tokens live an hour unless the reply says otherwise.
const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordReply {
    local_id: String,
    email: String,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct FirebaseAuth {
    api_key: String,
    http: Client,
}

impl FirebaseAuth {
    pub fn new(api_key: &str) -> Result<Self, AuthError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AuthError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key: api_key.trim().to_string(),
            http,
        })
    }

    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        validate_credentials(email, password)?;
        let url = format!("{}/accounts:{}", IDENTITY_TOOLKIT, method);
        let resp = self
            .http
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&json!({
                "email": email.trim(),
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("{} failed: {}", method, e)))?;

        let reply: PasswordReply = read_reply(resp).await?;
        Ok(AuthSession {
            identity: Identity {
                uid: reply.local_id,
                email: reply.email,
            },
            id_token: reply.id_token,
            refresh_token: reply.refresh_token,
            expires_in: parse_expiry(reply.expires_in.as_deref()),
        })
    }
}

async fn read_reply<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, AuthError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| AuthError::Network(format!("Failed to read response: {}", e)))?;
    if !status.is_success() {
        let code = serde_json::from_str::<ErrorReply>(&text)
            .map(|r| r.error.message)
            .unwrap_or_else(|_| format!("HTTP {}", status));
        return Err(map_error_code(&code));
    }
    serde_json::from_str(&text)
        .map_err(|e| AuthError::Backend(format!("Unexpected reply: {}", e)))
}

/// Codes come as `CODE` or `CODE : human readable detail`.
fn map_error_code(message: &str) -> AuthError {
    let code = message.split(" : ").next().unwrap_or(message).trim();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "WEAK_PASSWORD" => AuthError::WeakPassword,
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthError::InvalidEmail,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            AuthError::InvalidCredentials
        }
        other => AuthError::Backend(other.to_string()),
    }
}

fn parse_expiry(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_EXPIRES_IN)
}

#[async_trait]
impl AuthProvider for FirebaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let session = self
            .password_call("signInWithPassword", email, password)
            .await?;
        log::info!("Signed in {}", session.identity.email);
        Ok(session)
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let session = self.password_call("signUp", email, password).await?;
        log::info!("Created account {}", session.identity.email);
        Ok(session)
    }

    async fn refresh(&self, email: &str, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let resp = self
            .http
            .post(SECURE_TOKEN)
            .query(&[("key", &self.api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Token refresh failed: {}", e)))?;

        let reply: TokenReply = read_reply(resp).await?;
        log::debug!("Refreshed ID token for {}", email);
        Ok(AuthSession {
            identity: Identity {
                uid: reply.user_id,
                email: email.to_string(),
            },
            id_token: reply.id_token,
            refresh_token: reply.refresh_token,
            expires_in: parse_expiry(reply.expires_in.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_backend_codes() {
        assert_eq!(map_error_code("EMAIL_NOT_FOUND"), AuthError::InvalidCredentials);
        assert_eq!(
            map_error_code("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            map_error_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword
        );
        assert_eq!(map_error_code("EMAIL_EXISTS"), AuthError::EmailExists);
        assert_eq!(
            map_error_code("TOO_MANY_ATTEMPTS_TRY_LATER"),
            AuthError::TooManyAttempts
        );
        assert_eq!(
            map_error_code("OPERATION_NOT_ALLOWED"),
            AuthError::Backend("OPERATION_NOT_ALLOWED".into())
        );
    }

    #[test]
    fn decodes_password_reply() {
        let reply: PasswordReply = serde_json::from_str(
            r#"{"kind":"identitytoolkit#VerifyPasswordResponse","localId":"abc","email":"a@b.io","idToken":"t","refreshToken":"r","expiresIn":"3600","registered":true}"#,
        )
        .unwrap();
        assert_eq!(reply.local_id, "abc");
        assert_eq!(parse_expiry(reply.expires_in.as_deref()), 3600);
        assert_eq!(parse_expiry(None), DEFAULT_EXPIRES_IN);
    }

    #[tokio::test]
    async fn rejects_bad_email_without_a_request() {
        let auth = FirebaseAuth::new("unused").unwrap();
        assert_eq!(
            auth.sign_in("not-an-email", "secret1").await,
            Err(AuthError::InvalidEmail)
        );
    }
}
