use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct OAuthCodeExchangeRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_code: String,
}

#[derive(Debug, Clone)]
pub struct OAuthRefreshRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Token endpoint calls. A grant the server refuses is `InfraError::OAuth`;
/// failing to reach the server at all is `InfraError::Connection`.
#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    async fn exchange_authorization_code(
        &self,
        request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, InfraError>;

    async fn refresh_access_token(
        &self,
        request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestOAuthClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct TokenEndpointPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ReqwestOAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn post_form(
        &self,
        endpoint: &str,
        grant_type: &str,
        params: &[(&str, &str)],
    ) -> Result<OAuthTokenResponse, InfraError> {
        let mut form = vec![("grant_type", grant_type)];
        form.extend_from_slice(params);

        let response = self
            .client
            .post(endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|error| {
                InfraError::Connection(format!("token request ({grant_type}) failed: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Connection(format!("failed reading token response: {error}"))
        })?;

        let parsed = serde_json::from_str::<TokenEndpointPayload>(&body);
        if status.is_server_error() {
            return Err(InfraError::Connection(format!(
                "token endpoint unavailable: http {}",
                status.as_u16()
            )));
        }
        let parsed = parsed.map_err(|error| {
            InfraError::OAuth(format!("invalid token response payload: {error}; body={body}"))
        })?;

        if !status.is_success() || parsed.error.is_some() {
            let code = parsed
                .error
                .unwrap_or_else(|| format!("http_{}", status.as_u16()));
            let detail = parsed.error_description.unwrap_or_else(|| body.clone());
            return Err(InfraError::OAuth(format!(
                "token endpoint rejected {grant_type}: {code}; {detail}"
            )));
        }

        let access_token = parsed
            .access_token
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| InfraError::OAuth("token response did not include access_token".to_string()))?;

        Ok(OAuthTokenResponse {
            access_token,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in.unwrap_or(0).max(0),
            token_type: parsed.token_type,
            scope: parsed.scope,
        })
    }
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn exchange_authorization_code(
        &self,
        request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        self.post_form(
            &request.token_endpoint,
            "authorization_code",
            &[
                ("client_id", request.client_id.as_str()),
                ("client_secret", request.client_secret.as_str()),
                ("redirect_uri", request.redirect_uri.as_str()),
                ("code", request.authorization_code.as_str()),
            ],
        )
        .await
    }

    async fn refresh_access_token(
        &self,
        request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        self.post_form(
            &request.token_endpoint,
            "refresh_token",
            &[
                ("client_id", request.client_id.as_str()),
                ("client_secret", request.client_secret.as_str()),
                ("refresh_token", request.refresh_token.as_str()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single canned HTTP response and returns the token endpoint URL
    /// plus a handle yielding the raw request that was received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let endpoint = format!("http://{}/token", listener.local_addr().expect("addr"));
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let read = stream.read(&mut chunk).await.expect("read");
                received.extend_from_slice(&chunk[..read]);
                let text = String::from_utf8_lossy(&received);
                if read == 0 || request_complete(&text) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.expect("write");
            String::from_utf8_lossy(&received).into_owned()
        });
        (endpoint, handle)
    }

    fn request_complete(text: &str) -> bool {
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        body.len() >= length
    }

    fn refresh_request(endpoint: String) -> OAuthRefreshRequest {
        OAuthRefreshRequest {
            token_endpoint: endpoint,
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh-1".to_string(),
        }
    }

    #[tokio::test]
    async fn refresh_posts_form_with_grant_type() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"access_token": " fresh ", "expires_in": 3599, "token_type": "Bearer"}"#,
        )
        .await;

        let response = ReqwestOAuthClient::new()
            .refresh_access_token(refresh_request(endpoint))
            .await
            .expect("refresh");
        let request = server.await.expect("server task");

        assert_eq!(response.access_token, "fresh");
        assert_eq!(response.expires_in, 3599);
        assert_eq!(response.refresh_token, None);
        assert!(request.starts_with("POST /token"));
        assert!(request.contains("grant_type=refresh_token"));
        assert!(request.contains("refresh_token=refresh-1"));
        assert!(request.contains("client_id=cid"));
    }

    #[tokio::test]
    async fn rejected_grant_is_an_oauth_error() {
        let (endpoint, _server) = serve_once(
            "400 Bad Request",
            r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#,
        )
        .await;

        match ReqwestOAuthClient::new()
            .refresh_access_token(refresh_request(endpoint))
            .await
        {
            Err(InfraError::OAuth(message)) => assert!(message.contains("invalid_grant")),
            other => panic!("expected oauth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_failure_is_a_connection_error() {
        let (endpoint, _server) = serve_once("503 Service Unavailable", "{}").await;

        let result = ReqwestOAuthClient::new()
            .refresh_access_token(refresh_request(endpoint))
            .await;

        assert!(matches!(result, Err(InfraError::Connection(_))));
    }
}
