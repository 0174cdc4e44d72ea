//! Minimal HTTP/1.1 framing: one request per connection.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest accepted request head (request line plus headers).
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

const HEAD_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request head exceeds {MAX_HEADER_BYTES} bytes")]
    HeadersTooLarge,

    #[error("request body of {length} bytes exceeds limit of {limit}")]
    BodyTooLarge { length: usize, limit: usize },
}

impl RequestError {
    /// Status to answer with, or `None` if the peer is gone.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Io(_) => None,
            Self::Malformed(_) => Some(400),
            Self::HeadersTooLarge => Some(431),
            Self::BodyTooLarge { .. } => Some(413),
        }
    }
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path without the query string
    pub path: String,
    pub body: Vec<u8>,
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_END.len()).position(|w| w == HEAD_END)
}

/// Read one request.
///
/// Returns `Ok(None)` if the peer closed the connection before sending
/// anything. Bodies are framed by `Content-Length` only.
///
/// # Errors
/// Returns error for I/O failures, malformed framing, or limits exceeded.
pub async fn read_request<R>(reader: &mut R, max_body_bytes: usize) -> Result<Option<Request>, RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(RequestError::HeadersTooLarge);
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(RequestError::Malformed("connection closed mid-request".to_string()));
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    if head_end > MAX_HEADER_BYTES {
        return Err(RequestError::HeadersTooLarge);
    }

    let head = std::str::from_utf8(&buf[..head_end])
        .map_err(|_| RequestError::Malformed("request head is not UTF-8".to_string()))?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v), None) => (m, t, v),
        _ => {
            return Err(RequestError::Malformed(format!(
                "bad request line {request_line:?}"
            )))
        }
    };
    if !version.starts_with("HTTP/1.") {
        return Err(RequestError::Malformed(format!("unsupported version {version}")));
    }

    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(RequestError::Malformed(format!("bad header line {line:?}")));
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value
                .trim()
                .parse()
                .map_err(|_| RequestError::Malformed("invalid Content-Length".to_string()))?;
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            return Err(RequestError::Malformed(
                "Transfer-Encoding is not supported".to_string(),
            ));
        }
    }

    if content_length > max_body_bytes {
        return Err(RequestError::BodyTooLarge {
            length: content_length,
            limit: max_body_bytes,
        });
    }

    let mut body: Vec<u8> = buf[head_end + HEAD_END.len()..].to_vec();
    if body.len() < content_length {
        let already = body.len();
        body.resize(content_length, 0);
        reader.read_exact(&mut body[already..]).await?;
    } else {
        body.truncate(content_length);
    }

    let path = target.split('?').next().unwrap_or(target).to_string();
    Ok(Some(Request {
        method: method.to_string(),
        path,
        body,
    }))
}

/// A response ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    /// Value of the `Allow` header for 405 responses
    pub allow: Option<&'static str>,
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        431 => "Request Header Fields Too Large",
        _ => "Internal Server Error",
    }
}

const INTERNAL_ERROR_BODY: &[u8] = br#"{"detail":"Internal Server Error"}"#;

impl Response {
    /// JSON response; falls back to a generic 500 if serialization fails.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                body,
                allow: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                Self::internal_error()
            }
        }
    }

    /// `{"detail": message}` with the given status.
    pub fn detail(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "detail": message }))
    }

    /// Generic 500; never carries internal details.
    #[must_use]
    pub fn internal_error() -> Self {
        Self {
            status: 500,
            body: INTERNAL_ERROR_BODY.to_vec(),
            allow: None,
        }
    }

    #[must_use]
    pub fn with_allow(mut self, allow: &'static str) -> Self {
        self.allow = Some(allow);
        self
    }

    /// Serialize status line, headers and body.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            reason_phrase(self.status),
            self.body.len()
        );
        if let Some(allow) = self.allow {
            head.push_str("Allow: ");
            head.push_str(allow);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}
