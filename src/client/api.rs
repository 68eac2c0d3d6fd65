use async_trait::async_trait;
use reqwest::{
    Response,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::models::{AuthStatus, LoginRequest, LoginResponse, MessageResponse};

/// ClientError
///
/// Distinguishes a message the server chose to show from failures where no such
/// message exists. Pages display the former verbatim and fall back to their own
/// generic text for the rest.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error status.
    #[error("{}", message.as_deref().unwrap_or("server error"))]
    Server { status: u16, message: Option<String> },

    /// The request never produced a response (connection refused, timeout, ...).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success status whose body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// The server's message when there is one, otherwise the page's fallback text.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Server {
                message: Some(message),
                ..
            } => message.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// AuthApi
///
/// The three calls the auth context depends on. `ApiClient` is the production
/// implementation; tests substitute scripted ones.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn check_auth(&self) -> Result<AuthStatus, ClientError>;
    async fn login(&self, ssn: &str) -> Result<LoginResponse, ClientError>;
    async fn logout(&self) -> Result<MessageResponse, ClientError>;
}

/// ApiClient
///
/// A `reqwest` client with a cookie store, so the session cookie set by `/login`
/// rides along on every later call, as it would in a browser.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:5000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.http.get(self.url(path)).send().await?;
        read_json(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        read_json(response).await
    }

    /// Downloads a binary body (CSV exports).
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let response = ensure_success(self.http.get(self.url(path)).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Sends `bytes` as the multipart `file` field.
    pub async fn post_file<T: DeserializeOwned>(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<T, ClientError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let response = self.http.post(self.url(path)).multipart(form).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn check_auth(&self) -> Result<AuthStatus, ClientError> {
        self.get_json("/check_auth").await
    }

    async fn login(&self, ssn: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            ssn: ssn.to_string(),
        };
        self.post_json("/login", &body).await
    }

    async fn logout(&self) -> Result<MessageResponse, ClientError> {
        let response = self.http.post(self.url("/logout")).send().await?;
        read_json(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Error bodies are `{"message": ...}`; anything else leaves the page fallback in charge.
    let message = response
        .json::<MessageResponse>()
        .await
        .ok()
        .map(|body| body.message);

    tracing::debug!(status = status.as_u16(), ?message, "api call failed");
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = ensure_success(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}
