//! Derivation of WebSocket and HTTP endpoints from a server address.
//!
//! Servers are configured either as a bare `host:port` or as a full
//! `http(s)://` URL. The WebSocket endpoint keeps host and port, maps
//! `http` (and bare addresses) to `ws` and `https` to `wss`, and replaces
//! whatever path the address carried with the channel's fixed path.

use url::Url;

/// Path of the recording-status WebSocket on a ping-viewer server.
pub const DEFAULT_RECORDING_PATH: &str = "/ws/recording";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Security {
    Plain,
    Tls,
}

/// Build the WebSocket endpoint for `address`, e.g.
/// `localhost:6060` -> `ws://localhost:6060/ws/recording`.
pub fn websocket_endpoint(address: &str, path: &str) -> Result<Url, EndpointError> {
    let (url, security) = parse_address(address)?;
    let scheme = match security {
        Security::Plain => "ws",
        Security::Tls => "wss",
    };
    build(address, scheme, &url, &normalize_path(path))
}

/// Build the HTTP base URL (`http(s)://host[:port]/`) for the REST API of
/// the server at `address`.
pub fn http_base(address: &str) -> Result<Url, EndpointError> {
    let (url, security) = parse_address(address)?;
    let scheme = match security {
        Security::Plain => "http",
        Security::Tls => "https",
    };
    build(address, scheme, &url, "/")
}

fn parse_address(address: &str) -> Result<(Url, Security), EndpointError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(EndpointError::Empty);
    }

    let (security, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
            "http" | "ws" => (Security::Plain, rest),
            "https" | "wss" => (Security::Tls, rest),
            _ => return Err(EndpointError::UnsupportedScheme(scheme.to_string())),
        },
        None => (Security::Plain, trimmed),
    };

    // Parse with the matching http scheme so default ports (80/443) are
    // recognised; ws/wss share them.
    let parse_scheme = match security {
        Security::Plain => "http",
        Security::Tls => "https",
    };
    let url = Url::parse(&format!("{parse_scheme}://{rest}")).map_err(|e| {
        EndpointError::Invalid {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(EndpointError::Invalid {
            address: address.to_string(),
            reason: "missing host".into(),
        });
    }

    Ok((url, security))
}

fn build(address: &str, scheme: &str, url: &Url, path: &str) -> Result<Url, EndpointError> {
    let host = url.host_str().unwrap_or_default();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Url::parse(&format!("{scheme}://{authority}{path}")).map_err(|e| EndpointError::Invalid {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Errors from turning a configured address into an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("Server address is empty")]
    Empty,

    #[error("Unsupported scheme '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    #[error("Invalid server address '{address}': {reason}")]
    Invalid { address: String, reason: String },
}
