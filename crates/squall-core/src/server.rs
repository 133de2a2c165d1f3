//! Native HTTP serve loop
//!
//! hyper + tokio glue around [`Router::dispatch`]. The router itself is
//! synchronous; this module owns the listener, the per-connection tasks and
//! the conversion between hyper types and squall's request/response types.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// The socket address this configuration describes
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.hostname, self.port)
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("{}:{}", self.hostname, self.port)))
    }
}

/// Create a TCP listener with the usual server socket options set:
/// SO_REUSEADDR, SO_REUSEPORT (unix) and TCP_NODELAY.
pub fn create_listener(addr: &SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // Allow binding to an address in TIME_WAIT
    socket.set_reuse_address(true)?;

    // Kernel load balancing across processes
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    // Disable Nagle's algorithm for lower latency
    socket.set_nodelay(true)?;

    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}

impl Router {
    /// Bind `addr` (e.g. `"127.0.0.1:3000"`) and serve requests through
    /// this router until the task is dropped.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        serve(Arc::new(self), addr).await
    }
}

/// Accept loop: one tokio task per connection, dispatching every request
/// through the shared router.
pub async fn serve(router: Arc<Router>, addr: SocketAddr) -> Result<()> {
    let std_listener = create_listener(&addr)?;
    std_listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(std_listener)?;

    tracing::info!(%addr, "listening");

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let router = Arc::clone(&router);

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |hyper_request| {
                let router = Arc::clone(&router);
                async move {
                    let request = from_hyper_request(hyper_request, remote_addr).await?;
                    let response = router.dispatch(request);
                    Ok::<_, hyper::Error>(to_hyper_response(response))
                }
            });

            if let Err(err) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                tracing::warn!(error = %err, %remote_addr, "connection error");
            }
        });
    }
}

/// Convert a hyper request into squall's [`Request`], collecting the body
pub async fn from_hyper_request(
    request: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> hyper::Result<Request> {
    let (parts, body) = request.into_parts();

    let mut converted = Request::new(parts.method.as_str(), parts.uri.path());
    converted.query = parts.uri.query().map(str::to_owned);
    converted.remote_addr = Some(remote_addr);

    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            converted.headers.push((name.to_string(), value.to_owned()));
        }
    }

    converted.body = body.collect().await?.to_bytes();
    Ok(converted)
}

/// Convert squall's [`Response`] into a hyper response
pub fn to_hyper_response(response: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(response.status.as_u16());

    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder.body(Full::new(response.body)).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to build response");
        let mut fallback = hyper::Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{ResponseBuilder, StatusCode};

    #[test]
    fn test_server_config_addr() {
        let config = ServerConfig::default();
        let addr = config.addr().unwrap();
        assert_eq!(addr.port(), 3000);

        let bad = ServerConfig {
            hostname: "not an address".into(),
            port: 0,
        };
        assert!(bad.addr().is_err());
    }

    #[test]
    fn test_to_hyper_response() {
        let response = ResponseBuilder::new(StatusCode::CREATED)
            .header("x-custom", "value")
            .body("made")
            .build();

        let converted = to_hyper_response(response);
        assert_eq!(converted.status(), hyper::StatusCode::CREATED);
        assert_eq!(
            converted.headers().get("x-custom").unwrap(),
            &hyper::header::HeaderValue::from_static("value")
        );
    }
}
