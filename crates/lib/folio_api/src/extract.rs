//! Request extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::Json;

use crate::AppState;
use crate::error::AppError;

/// `Json<T>` whose rejections use the API error body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Caller identity used as the rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub const UNKNOWN: &'static str = "unknown";

    /// The peer address, unless `trust_proxy` is set, in which case the
    /// first `X-Forwarded-For` entry and then `X-Real-IP` take precedence.
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        let forwarded = if trust_proxy { forwarded_ip(headers) } else { None };
        let ip = forwarded
            .map(str::to_string)
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| Self::UNKNOWN.to_string());
        Self(ip)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<&str> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"))
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::resolve(&parts.headers, peer, state.config.trust_proxy))
    }
}

/// The caller's `User-Agent`, if any.
#[derive(Debug, Clone, Default)]
pub struct UserAgent(pub Option<String>);

impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn forwarded_for_first_entry_wins_behind_a_proxy() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(ClientIp::resolve(&h, None, true).as_str(), "203.0.113.7");
    }

    #[test]
    fn real_ip_then_peer_then_unknown() {
        let peer: SocketAddr = "192.0.2.1:5555".parse().unwrap();
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(ClientIp::resolve(&h, Some(peer), true).as_str(), "198.51.100.2");
        assert_eq!(
            ClientIp::resolve(&HeaderMap::new(), Some(peer), true).as_str(),
            "192.0.2.1"
        );
        assert_eq!(
            ClientIp::resolve(&HeaderMap::new(), None, true).as_str(),
            ClientIp::UNKNOWN
        );
    }

    #[test]
    fn empty_forwarded_header_is_ignored() {
        let h = headers(&[("x-forwarded-for", " "), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(ClientIp::resolve(&h, None, true).as_str(), "198.51.100.2");
    }

    #[test]
    fn forwarding_headers_are_ignored_without_a_trusted_proxy() {
        let peer: SocketAddr = "192.0.2.1:5555".parse().unwrap();
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(ClientIp::resolve(&h, Some(peer), false).as_str(), "192.0.2.1");
        assert_eq!(ClientIp::resolve(&h, None, false).as_str(), ClientIp::UNKNOWN);
    }
}
