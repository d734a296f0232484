//! Client identity used as the rate-limit key.

use std::net::IpAddr;

use pingora::http::RequestHeader;

/// Characters of the user agent appended to the login key.
const USER_AGENT_CHARS: usize = 50;

const UNKNOWN: &str = "unknown";

/// How much of the request identifies a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// Address only.
    Address,
    /// Address plus a truncated user agent.
    AddressAndAgent,
}

/// Build the rate-limit key for a request.
///
/// With `trust_proxy_headers`, the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`; otherwise only the TCP peer address is used.
pub fn client_key(
    req: &RequestHeader,
    peer: Option<IpAddr>,
    trust_proxy_headers: bool,
    scope: KeyScope,
) -> String {
    let forwarded = if trust_proxy_headers {
        header(req, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header(req, "x-real-ip").map(str::trim).filter(|v| !v.is_empty()))
            .map(str::to_string)
    } else {
        None
    };

    let address = forwarded
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| UNKNOWN.to_string());

    match scope {
        KeyScope::Address => address,
        KeyScope::AddressAndAgent => {
            let agent: String = header(req, "user-agent")
                .unwrap_or(UNKNOWN)
                .chars()
                .take(USER_AGENT_CHARS)
                .collect();
            format!("{address}:{agent}")
        }
    }
}

/// Extract the credential from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &RequestHeader) -> Option<&str> {
    let value = header(req, "authorization")?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn header<'a>(req: &'a RequestHeader, name: &str) -> Option<&'a str> {
    req.headers.get(name).and_then(|v| v.to_str().ok())
}
