//! HTTP/1.1 over a Unix domain socket, for daemons such as dockerd that
//! listen on a local socket rather than TCP.

use std::path::Path;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::{HeaderMap, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use crate::error::{AdapterError, Result, ResultExt};

pub(super) struct RawReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// One request per connection; the daemon is local so there is nothing to pool.
pub(super) async fn send(socket: &Path, request: Request<Full<Bytes>>, timeout: Duration) -> Result<RawReply> {
    match tokio::time::timeout(timeout, exchange(socket, request)).await {
        Ok(reply) => reply,
        Err(_) => Err(AdapterError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no reply on {} within {}s", socket.display(), timeout.as_secs()),
        ))),
    }
}

async fn exchange(socket: &Path, request: Request<Full<Bytes>>) -> Result<RawReply> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(AdapterError::from)
        .context(format!("Cannot connect to {}", socket.display()))?;
    let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "unix socket connection ended");
        }
    });

    let response = sender.send_request(request).await?;
    let (parts, body) = response.into_parts();
    let body = body.collect().await?.to_bytes().to_vec();
    Ok(RawReply {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn request_and_reply_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap();
            let head = String::from_utf8_lossy(&buf[..n]).into_owned();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 16\r\n\r\n{\"ApiVersion\":1}")
                .await
                .unwrap();
            head
        });

        let request = Request::builder()
            .uri("/v1.43/version?x=1")
            .header("host", "localhost")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let reply = send(&socket, request, Duration::from_secs(5)).await.unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, b"{\"ApiVersion\":1}");

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /v1.43/version?x=1 HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn missing_socket_names_the_path() {
        let request = Request::builder().uri("/_ping").body(Full::new(Bytes::new())).unwrap();
        let err = send(Path::new("/nonexistent/docker.sock"), request, Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("Cannot connect to /nonexistent/docker.sock: "));
    }
}
