//! JSON over HTTP transport for backend services.
//!
//! A call is `POST /{Method}` with a JSON body. A 2xx reply carries the
//! JSON result; any other status carries a [`BackendError`] body. Only
//! connecting is retried, with a linear backoff: once the request has been
//! handed to a connection it is sent at most once, since most methods are
//! not idempotent.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Method};
use pingora_core::{
    connectors::http::Connector, protocols::http::client::HttpSession,
    upstreams::peer::HttpPeer,
};
use pingora_http::RequestHeader;
use serde_json::Value;

use super::{BackendError, BackendResult, RpcChannel};
use crate::config;

/// Idle time a pooled upstream connection is kept for reuse.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpRpcChannel {
    service: &'static str,
    host: String,
    peer: HttpPeer,
    connector: Connector,
    timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
}

impl HttpRpcChannel {
    pub fn new(
        service: &'static str,
        backend: &config::Backend,
        retry: &config::Retry,
    ) -> io::Result<Self> {
        let addr = resolve(&backend.address)?;
        let timeout = Duration::from_secs(backend.timeout);

        let sni = backend.sni.clone().unwrap_or_default();
        let mut peer = HttpPeer::new(addr, backend.tls, sni);
        peer.options.connection_timeout = Some(timeout);
        peer.options.read_timeout = Some(timeout);
        peer.options.write_timeout = Some(timeout);
        peer.options.idle_timeout = Some(IDLE_TIMEOUT);

        Ok(Self {
            service,
            host: backend.address.clone(),
            peer,
            connector: Connector::new(None),
            timeout,
            max_attempts: retry.max_attempts.max(1),
            backoff: Duration::from_millis(retry.backoff_ms),
        })
    }

    /// A connection to the backend, retried until `max_attempts` is reached.
    async fn connect(&self, method: &str) -> BackendResult<HttpSession> {
        let mut attempt = 1;
        loop {
            let failure = match tokio::time::timeout(
                self.timeout,
                self.connector.get_http_session(&self.peer),
            )
            .await
            {
                Ok(Ok((session, _reused))) => return Ok(session),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("connect deadline of {:?} exceeded", self.timeout),
            };

            if attempt >= self.max_attempts {
                log::error!(
                    "{}.{method} could not connect after {attempt} attempt(s): {failure}",
                    self.service
                );
                return Err(self.unavailable(&failure));
            }

            log::warn!(
                "{}.{method} connect attempt {attempt} failed: {failure}, retrying",
                self.service
            );
            tokio::time::sleep(self.backoff * attempt).await;
            attempt += 1;
        }
    }

    fn unavailable(&self, failure: &str) -> BackendError {
        BackendError::internal(format!("{} service unavailable: {failure}", self.service))
    }

    async fn exchange(
        &self,
        mut session: HttpSession,
        method: &str,
        body: &Bytes,
    ) -> pingora_error::Result<(u16, Vec<u8>)> {
        let mut req = RequestHeader::build(Method::POST, format!("/{method}").as_bytes(), None)?;
        req.insert_header(header::HOST, self.host.as_str())?;
        req.insert_header(header::CONTENT_TYPE, "application/json")?;
        req.insert_header(header::CONTENT_LENGTH, body.len().to_string())?;

        session.write_request_header(Box::new(req)).await?;
        session.write_request_body(body.clone(), true).await?;
        session.finish_request_body().await?;

        session.read_response_header().await?;
        let status = session
            .response_header()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        let mut payload = Vec::new();
        while let Some(chunk) = session.read_response_body().await? {
            payload.extend_from_slice(&chunk);
        }

        self.connector
            .release_http_session(session, &self.peer, Some(IDLE_TIMEOUT))
            .await;
        Ok((status, payload))
    }

    fn decode(&self, method: &str, status: u16, payload: &[u8]) -> BackendResult<Value> {
        if (200..300).contains(&status) {
            if payload.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(payload).map_err(|e| {
                BackendError::internal(format!(
                    "{}.{method} returned malformed json: {e}",
                    self.service
                ))
            });
        }

        Err(serde_json::from_slice::<BackendError>(payload).unwrap_or_else(|_| {
            BackendError::internal(format!(
                "{}.{method} failed with status {status}",
                self.service
            ))
        }))
    }
}

#[async_trait]
impl RpcChannel for HttpRpcChannel {
    async fn call(&self, method: &str, request: Value) -> BackendResult<Value> {
        let body = Bytes::from(serde_json::to_vec(&request).map_err(|e| {
            BackendError::internal(format!("failed to encode request: {e}"))
        })?);

        let session = self.connect(method).await?;
        let failure = match tokio::time::timeout(self.timeout, self.exchange(session, method, &body))
            .await
        {
            Ok(Ok((status, payload))) => return self.decode(method, status, &payload),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("deadline of {:?} exceeded", self.timeout),
        };

        // the request may already have been applied, so it is not resent
        log::error!("{}.{method} failed after the request was sent: {failure}", self.service);
        Err(self.unavailable(&failure))
    }
}

fn resolve(address: &str) -> io::Result<SocketAddr> {
    address.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{address} did not resolve to any address"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use serde_json::json;
    use tokio::{io::AsyncReadExt, net::TcpListener};

    use super::*;
    use crate::backend::ErrorKind;

    fn channel() -> HttpRpcChannel {
        channel_to("127.0.0.1:5003".to_string())
    }

    #[test]
    fn test_decode_success() {
        let ch = channel();
        assert_eq!(ch.decode("Ping", 204, b"").unwrap(), Value::Null);
        let value = ch.decode("GetOrderStatus", 200, br#"{"status":"PENDING"}"#).unwrap();
        assert_eq!(value["status"], "PENDING");
    }

    #[test]
    fn test_decode_structured_error() {
        let ch = channel();
        let err = ch
            .decode(
                "GetOrderDetails",
                404,
                br#"{"kind":"not_found","message":"order not found"}"#,
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "order not found");
    }

    #[test]
    fn test_decode_unstructured_error() {
        let ch = channel();
        let err = ch.decode("GetOrderDetails", 502, b"bad gateway").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.message, "orders.GetOrderDetails failed with status 502");
    }

    fn channel_to(address: String) -> HttpRpcChannel {
        let backend = config::Backend {
            address,
            timeout: 1,
            tls: false,
            sni: None,
        };
        let retry = config::Retry {
            max_attempts: 3,
            backoff_ms: 10,
        };
        HttpRpcChannel::new("orders", &backend, &retry).unwrap()
    }

    #[tokio::test]
    async fn test_sent_request_is_not_resent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                // read the request and never answer
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                    }
                });
            }
        });

        let err = channel_to(address)
            .call("ApproveCompliance", json!({"round": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.starts_with("orders service unavailable"));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = channel_to(address)
            .call("GetOrderStatus", json!({"order_id": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.starts_with("orders service unavailable"));
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        assert!(resolve("not an address").is_err());
        assert_eq!(
            resolve("127.0.0.1:80").unwrap(),
            "127.0.0.1:80".parse::<SocketAddr>().unwrap()
        );
    }
}
