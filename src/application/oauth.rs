use crate::domain::models::{OAuthToken, TokenState};
use crate::infrastructure::config::{
    load_client_secrets, AppConfig, ClientSecrets, DEFAULT_AUTHORIZATION_ENDPOINT,
    DEFAULT_TOKEN_ENDPOINT,
};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::loopback::LoopbackListener;
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest, OAuthTokenResponse,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

const TOKEN_LEEWAY_SECONDS: i64 = 60;

static NEXT_STATE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn from_client_secrets(secrets: ClientSecrets, scopes: Vec<String>) -> Self {
        Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            scopes,
            token_endpoint: secrets.token_endpoint,
            authorization_endpoint: secrets.authorization_endpoint,
        }
    }

    /// Rebuilds the client registration stored alongside a cached token.
    /// Returns `None` for caches written without one.
    pub fn from_cached_token(token: &OAuthToken, scopes: Vec<String>) -> Option<Self> {
        let client_id = token.client_id.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let client_secret = token
            .client_secret
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())?;
        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scopes,
            token_endpoint: token
                .token_uri
                .clone()
                .filter(|uri| !uri.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string()),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(OAuthToken),
    Refreshed(OAuthToken),
    ReauthenticationRequired,
}

/// Consent request handed to an [`AuthorizationCodeSource`]; the URL is only
/// known once the source has picked its redirect URI.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    authorization_endpoint: String,
    client_id: String,
    scope: String,
    pub state: String,
}

impl AuthorizationRequest {
    pub fn url(&self, redirect_uri: &str) -> Result<String, InfraError> {
        let mut url = Url::parse(&self.authorization_endpoint)
            .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", &self.state);
        Ok(url.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub redirect_uri: String,
}

#[async_trait]
pub trait AuthorizationCodeSource: Send + Sync {
    async fn obtain_code(&self, request: &AuthorizationRequest) -> Result<AuthorizationGrant, InfraError>;
}

/// Prints the consent URL and waits for the browser redirect on a loopback port.
#[derive(Debug, Default)]
pub struct LoopbackAuthorizer;

#[async_trait]
impl AuthorizationCodeSource for LoopbackAuthorizer {
    async fn obtain_code(&self, request: &AuthorizationRequest) -> Result<AuthorizationGrant, InfraError> {
        let listener = LoopbackListener::bind().await?;
        let redirect_uri = listener.redirect_uri().to_string();
        let url = request.url(&redirect_uri)?;

        println!("Please visit this URL to authorize this application: {url}");
        tracing::info!(%redirect_uri, "waiting for authorization redirect");

        let code = listener.wait_for_code(&request.state).await?;
        Ok(AuthorizationGrant { code, redirect_uri })
    }
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn authorization_request(&self, state: &str) -> Result<AuthorizationRequest, InfraError> {
        if state.trim().is_empty() {
            return Err(InfraError::OAuth("state must not be empty".to_string()));
        }
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }
        Ok(AuthorizationRequest {
            authorization_endpoint: self.config.authorization_endpoint.clone(),
            client_id: self.config.client_id.clone(),
            scope: self.config.scopes.join(" "),
            state: state.to_string(),
        })
    }

    pub async fn authenticate_with_code(
        &self,
        authorization_code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken, InfraError> {
        if authorization_code.trim().is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .exchange_authorization_code(OAuthCodeExchangeRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                redirect_uri: redirect_uri.to_string(),
                authorization_code: authorization_code.trim().to_string(),
            })
            .await?;

        let token = self.token_from_response(response, None);
        self.credential_store.save_token(&token)?;
        Ok(token)
    }

    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        let stored = self.credential_store.load_token()?;
        match TokenState::classify(stored, (self.now_provider)(), TOKEN_LEEWAY_SECONDS) {
            TokenState::Valid(token) => Ok(EnsureTokenResult::Existing(token)),
            TokenState::Absent | TokenState::ExpiredUnrefreshable(_) => {
                Ok(EnsureTokenResult::ReauthenticationRequired)
            }
            TokenState::ExpiredRefreshable(stored_token) => self.refresh(stored_token).await,
        }
    }

    /// Returns a usable token, running the interactive flow through `authorizer`
    /// when the cache cannot be used or refreshed.
    pub async fn authenticate<A>(&self, authorizer: &A) -> Result<OAuthToken, InfraError>
    where
        A: AuthorizationCodeSource + ?Sized,
    {
        match self.ensure_access_token().await? {
            EnsureTokenResult::Existing(token) => Ok(token),
            EnsureTokenResult::Refreshed(token) => {
                tracing::info!("refreshed cached access token");
                Ok(token)
            }
            EnsureTokenResult::ReauthenticationRequired => {
                self.authorize_interactively(authorizer).await
            }
        }
    }

    pub async fn authorize_interactively<A>(&self, authorizer: &A) -> Result<OAuthToken, InfraError>
    where
        A: AuthorizationCodeSource + ?Sized,
    {
        let request = self.authorization_request(&next_state())?;
        let grant = authorizer.obtain_code(&request).await?;
        let token = self
            .authenticate_with_code(&grant.code, &grant.redirect_uri)
            .await?;
        tracing::info!("stored new access token");
        Ok(token)
    }

    async fn refresh(&self, stored_token: OAuthToken) -> Result<EnsureTokenResult, InfraError> {
        let Some(refresh_token) = stored_token.refresh_token.clone() else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        let refreshed = self
            .oauth_client
            .refresh_access_token(OAuthRefreshRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                refresh_token,
            })
            .await;

        match refreshed {
            Ok(response) => {
                let token = self.token_from_response(response, stored_token.refresh_token);
                self.credential_store.save_token(&token)?;
                Ok(EnsureTokenResult::Refreshed(token))
            }
            Err(InfraError::OAuth(reason)) => {
                tracing::warn!(%reason, "refresh token rejected; re-authorization required");
                Ok(EnsureTokenResult::ReauthenticationRequired)
            }
            Err(error) => Err(error),
        }
    }

    fn token_from_response(
        &self,
        response: OAuthTokenResponse,
        fallback_refresh_token: Option<String>,
    ) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        OAuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
            client_id: Some(self.config.client_id.clone()),
            client_secret: Some(self.config.client_secret.clone()),
            token_uri: Some(self.config.token_endpoint.clone()),
        }
    }
}

/// Resolves a usable token. A valid cached token is returned as is, and an
/// expired one is refreshed with the client registration stored next to it.
/// Only the interactive flow reads the client-secret file, failing with
/// `CredentialsMissing` when it is absent.
pub async fn authenticate<S, C, A>(
    config: &AppConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    authorizer: &A,
) -> Result<OAuthToken, InfraError>
where
    S: CredentialStore,
    C: OAuthHttpClient,
    A: AuthorizationCodeSource + ?Sized,
{
    let cached = credential_store.load_token()?;
    let mut refresh_attempted = false;
    match TokenState::classify(cached, Utc::now(), TOKEN_LEEWAY_SECONDS) {
        TokenState::Valid(token) => return Ok(token),
        TokenState::ExpiredRefreshable(token) => {
            if let Some(cached_config) = OAuthConfig::from_cached_token(&token, config.scopes.clone()) {
                let manager = OAuthManager::new(
                    cached_config,
                    Arc::clone(&credential_store),
                    Arc::clone(&oauth_client),
                );
                match manager.ensure_access_token().await? {
                    EnsureTokenResult::Existing(token) => return Ok(token),
                    EnsureTokenResult::Refreshed(token) => {
                        tracing::info!("refreshed cached access token");
                        return Ok(token);
                    }
                    EnsureTokenResult::ReauthenticationRequired => refresh_attempted = true,
                }
            }
        }
        TokenState::Absent | TokenState::ExpiredUnrefreshable(_) => {}
    }

    let secrets = load_client_secrets(&config.credentials_file)?;
    let oauth_config = OAuthConfig::from_client_secrets(secrets, config.scopes.clone());
    let manager = OAuthManager::new(oauth_config, credential_store, oauth_client);
    if refresh_attempted {
        manager.authorize_interactively(authorizer).await
    } else {
        manager.authenticate(authorizer).await
    }
}

fn next_state() -> String {
    let sequence = NEXT_STATE.fetch_add(1, Ordering::Relaxed);
    format!(
        "oauth-state-{}-{}-{sequence}",
        std::process::id(),
        Utc::now().timestamp_micros()
    )
}
