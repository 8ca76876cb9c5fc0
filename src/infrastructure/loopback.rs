use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

const MAX_REQUEST_HEAD_BYTES: usize = 16 * 1024;

/// One-shot HTTP listener on 127.0.0.1 that receives the OAuth redirect.
pub struct LoopbackListener {
    listener: TcpListener,
    redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Code { code: String, state: Option<String> },
    Denied(String),
    Ignored,
}

impl LoopbackListener {
    pub async fn bind() -> Result<Self, InfraError> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|error| {
            InfraError::Connection(format!("failed to bind oauth redirect listener: {error}"))
        })?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            redirect_uri: format!("http://{addr}/"),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Serves redirect requests until one carries an authorization code or an error.
    pub async fn wait_for_code(&self, expected_state: &str) -> Result<String, InfraError> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            let target = match read_request_target(&mut stream).await {
                Ok(target) => target,
                Err(error) => {
                    tracing::debug!(%peer, %error, "dropping unreadable redirect request");
                    continue;
                }
            };

            match parse_redirect(&target) {
                RedirectOutcome::Ignored => {
                    respond(&mut stream, "404 Not Found", "Not found.").await;
                }
                RedirectOutcome::Denied(reason) => {
                    respond(&mut stream, "200 OK", &format!("Authorization failed: {reason}")).await;
                    return Err(InfraError::OAuth(format!("authorization denied: {reason}")));
                }
                RedirectOutcome::Code { code, state } => {
                    if state.as_deref() != Some(expected_state) {
                        respond(&mut stream, "400 Bad Request", "Invalid state.").await;
                        return Err(InfraError::OAuth(
                            "authorization redirect carried an unexpected state".to_string(),
                        ));
                    }
                    respond(
                        &mut stream,
                        "200 OK",
                        "The authentication flow has completed. You may close this window.",
                    )
                    .await;
                    return Ok(code);
                }
            }
        }
    }
}

pub fn parse_redirect(target: &str) -> RedirectOutcome {
    let Ok(url) = Url::parse("http://127.0.0.1").and_then(|base| base.join(target)) else {
        return RedirectOutcome::Ignored;
    };
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        let reason = match params.get("error_description") {
            Some(description) => format!("{error} ({description})"),
            None => error.clone(),
        };
        return RedirectOutcome::Denied(reason);
    }

    match params.get("code").map(|code| code.trim()).filter(|code| !code.is_empty()) {
        Some(code) => RedirectOutcome::Code {
            code: code.to_string(),
            state: params.get("state").cloned(),
        },
        None => RedirectOutcome::Ignored,
    }
}

async fn read_request_target(stream: &mut TcpStream) -> Result<String, InfraError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.len() > MAX_REQUEST_HEAD_BYTES {
            return Err(InfraError::OAuth("redirect request head too large".to_string()));
        }
    }

    let head = String::from_utf8_lossy(&buffer);
    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(target.to_string()),
        _ => Err(InfraError::OAuth(format!(
            "unexpected redirect request line: {request_line}"
        ))),
    }
}

async fn respond(stream: &mut TcpStream, status: &str, message: &str) {
    let body = format!("<html><body><p>{message}</p></body></html>");
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(error) = stream.write_all(response.as_bytes()).await {
        tracing::debug!(%error, "failed writing redirect response");
    }
    let _ = stream.shutdown().await;
}
