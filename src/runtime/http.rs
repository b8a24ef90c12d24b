// ABOUTME: Minimal HTTP/1 client for engine REST APIs over unix or tcp sockets.
// ABOUTME: One connection per request; JSON helpers and newline-delimited streaming bodies.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1::SendRequest;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};

/// Where an engine API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    /// `host:port`
    Tcp(String),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Errors from the HTTP layer. Adapters map these onto `BackendError`.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP exchange with {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("engine answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid JSON from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Raw lines from a streaming response body.
pub type ByteLines = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// Client for one engine endpoint.
#[derive(Debug, Clone)]
pub struct EngineHttp {
    endpoint: Endpoint,
}

impl EngineHttp {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn handshake(&self) -> Result<SendRequest<Full<Bytes>>, HttpError> {
        match &self.endpoint {
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .map_err(|source| self.connect_error(source))?;
                self.handshake_io(stream).await
            }
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|source| self.connect_error(source))?;
                self.handshake_io(stream).await
            }
        }
    }

    async fn handshake_io<S>(&self, stream: S) -> Result<SendRequest<Full<Bytes>>, HttpError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);
        let (sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| self.transport_error(format!("handshake failed: {e}")))?;

        let endpoint = self.endpoint.to_string();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(%endpoint, "engine connection error: {}", e);
            }
        });

        Ok(sender)
    }

    /// Send a request and return the response with the sender that owns its
    /// connection. Non-2xx answers become [`HttpError::Status`].
    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<(Response<Incoming>, SendRequest<Full<Bytes>>), HttpError> {
        let mut sender = self.handshake().await?;

        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("Host", "localhost");
        if body.is_some() {
            builder = builder.header("Content-Type", "application/json");
        }
        let req = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| self.transport_error(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| self.transport_error(format!("request {path} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map(|b| b.to_bytes())
                .unwrap_or_default();
            return Err(HttpError::Status {
                status,
                message: error_message(&bytes),
            });
        }

        Ok((resp, sender))
    }

    /// Send a request and collect the whole body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes, HttpError> {
        let (resp, _sender) = self.exchange(method, path, body).await?;
        let collected = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| self.transport_error(format!("failed to read {path}: {e}")))?;
        Ok(collected.to_bytes())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        let bytes = self.send(Method::GET, path, None).await?;
        decode(path, &bytes)
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body).map_err(|source| HttpError::Decode {
            path: path.to_string(),
            source,
        })?;
        let bytes = self.send(Method::POST, path, Some(payload)).await?;
        decode(path, &bytes)
    }

    /// Issue a request whose body is irrelevant beyond its status.
    pub async fn call(&self, method: Method, path: &str) -> Result<(), HttpError> {
        self.send(method, path, None).await.map(|_| ())
    }

    /// Stream a response body split on newlines. Empty lines are skipped.
    pub async fn stream_lines(&self, path: &str) -> Result<ByteLines, HttpError> {
        let raw = self.stream_raw(path).await?;
        let stream = futures::stream::unfold(
            Some((raw, Vec::<u8>::new())),
            |state| async move {
                let (mut raw, mut buf) = state?;
                loop {
                    if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        let trimmed = trim_line(&line);
                        if trimmed.is_empty() {
                            continue;
                        }
                        let item = Bytes::copy_from_slice(trimmed);
                        return Some((Ok(item), Some((raw, buf))));
                    }
                    match raw.next().await {
                        Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                        Some(Err(e)) => return Some((Err(e), None)),
                        None => {
                            let rest = trim_line(&buf);
                            if rest.is_empty() {
                                return None;
                            }
                            let item = Bytes::copy_from_slice(rest);
                            return Some((Ok(item), None));
                        }
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }

    /// Stream a response body chunk by chunk as it arrives.
    pub async fn stream_raw(&self, path: &str) -> Result<ByteLines, HttpError> {
        let (resp, sender) = self.exchange(Method::GET, path, None).await?;
        let endpoint = self.endpoint.to_string();
        let stream = futures::stream::unfold(
            Some((resp.into_body(), sender)),
            move |state| {
                let endpoint = endpoint.clone();
                async move {
                    let (mut body, sender) = state?;
                    loop {
                        match body.frame().await {
                            Some(Ok(frame)) => {
                                if let Ok(data) = frame.into_data() {
                                    return Some((Ok(data), Some((body, sender))));
                                }
                            }
                            Some(Err(e)) => {
                                let err = HttpError::Transport {
                                    endpoint,
                                    reason: format!("stream interrupted: {e}"),
                                };
                                return Some((Err(err), None));
                            }
                            None => return None,
                        }
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }

    fn connect_error(&self, source: std::io::Error) -> HttpError {
        HttpError::Connect {
            endpoint: self.endpoint.to_string(),
            source,
        }
    }

    fn transport_error(&self, reason: String) -> HttpError {
        HttpError::Transport {
            endpoint: self.endpoint.to_string(),
            reason,
        }
    }
}

fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice(bytes).map_err(|source| HttpError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Pull the message out of an engine error body (`{"message": ...}`), falling
/// back to the raw text.
fn error_message(body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        cause: Option<String>,
    }

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ErrorBody {
            cause: Some(cause), ..
        }) => cause,
        _ => String::from_utf8_lossy(body).trim().to_string(),
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}
