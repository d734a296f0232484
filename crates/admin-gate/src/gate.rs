use std::net::IpAddr;
use std::sync::Arc;

use admin_auth::{AuthError, AuthService, ErrorBody, Limit, LoginResponse, RateLimiter};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use pingora::http::{RequestHeader, ResponseHeader};
use pingora::lb::LoadBalancer;
use pingora::lb::prelude::RoundRobin;
use pingora::prelude::*;
use serde::Serialize;

use crate::client::{KeyScope, bearer_token, client_key};
use crate::metric::{AuthMetrics, Outcome};

pub const LOGIN_PATH: &str = "/auth/verify";
/// Metrics key for the login endpoint.
pub const LOGIN_ENDPOINT: &str = "login";

const MAX_LOGIN_BODY: usize = 16 * 1024;

/// A guarded path prefix with its own request counter.
pub struct PrivilegedRoute {
    prefix: String,
    limiter: Arc<RateLimiter>,
}

impl PrivilegedRoute {
    pub fn new(prefix: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            prefix: prefix.into(),
            limiter,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// `/admin/data` matches `/admin/data` and `/admin/data/...`, not
    /// `/admin/database`.
    fn matches(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Serves the login endpoint and guards privileged routes in front of the
/// data service.
pub struct AdminGate {
    auth: Arc<AuthService>,
    routes: Vec<PrivilegedRoute>,
    upstreams: Arc<LoadBalancer<RoundRobin>>,
    metrics: Arc<AuthMetrics>,
    trust_proxy_headers: bool,
}

impl AdminGate {
    pub fn new(
        auth: Arc<AuthService>,
        routes: Vec<PrivilegedRoute>,
        upstreams: Arc<LoadBalancer<RoundRobin>>,
        metrics: Arc<AuthMetrics>,
        trust_proxy_headers: bool,
    ) -> Self {
        Self {
            auth,
            routes,
            upstreams,
            metrics,
            trust_proxy_headers,
        }
    }

    /// Longest matching privileged route for `path`.
    fn route_for(&self, path: &str) -> Option<&PrivilegedRoute> {
        self.routes
            .iter()
            .filter(|r| r.matches(path))
            .max_by_key(|r| r.prefix.len())
    }

    async fn handle_login(&self, session: &mut Session) -> Result<()> {
        if session.req_header().method.as_str() != "POST" {
            self.metrics.record(LOGIN_ENDPOINT, Outcome::BadRequest);
            return respond_json(session, 405, &ErrorBody::new("Method not allowed")).await;
        }

        let client = client_key(
            session.req_header(),
            peer_ip(session),
            self.trust_proxy_headers,
            KeyScope::AddressAndAgent,
        );

        let Some(body) = read_body(session, MAX_LOGIN_BODY).await? else {
            self.metrics.record(LOGIN_ENDPOINT, Outcome::BadRequest);
            let err = AuthError::InvalidInput("Request body too large");
            return respond_json(session, 413, &LoginResponse::denied(&err)).await;
        };

        // PBKDF2 and the SQLite read both block.
        let auth = Arc::clone(&self.auth);
        let result = tokio::task::spawn_blocking(move || auth.login_request(&body, &client))
            .await
            .unwrap_or_else(|e| Err(AuthError::Internal(format!("login task failed: {e}"))));

        match result {
            Ok(grant) => {
                self.metrics.record(LOGIN_ENDPOINT, Outcome::Granted);
                respond_json(session, 200, &LoginResponse::granted(grant.token)).await
            }
            Err(err) => {
                if let AuthError::Internal(detail) = &err {
                    log::error!("Login request failed: {}", detail);
                }
                self.metrics.record(LOGIN_ENDPOINT, outcome_for(&err));
                let body = LoginResponse::denied(&err);
                match err {
                    AuthError::RateLimited => {
                        respond_rate_limited(session, self.auth.config().login_limit, &body).await
                    }
                    _ => respond_json(session, err.status(), &body).await,
                }
            }
        }
    }
}

#[async_trait]
impl ProxyHttp for AdminGate {
    /// Prefix of the route the request was authorized for.
    type CTX = Option<String>;

    fn new_ctx(&self) -> Self::CTX {
        None
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool>
    where
        Self::CTX: Send + Sync,
    {
        let path = session.req_header().uri.path().to_string();

        if path == LOGIN_PATH {
            self.handle_login(session).await?;
            return Ok(true);
        }

        let Some(route) = self.route_for(&path) else {
            respond_json(session, 404, &ErrorBody::new("Not found")).await?;
            return Ok(true);
        };

        let client = client_key(
            session.req_header(),
            peer_ip(session),
            self.trust_proxy_headers,
            KeyScope::Address,
        );
        if !route.limiter.check_and_consume(&client) {
            self.metrics.record(&route.prefix, Outcome::RateLimited);
            let body = ErrorBody::new("Too many requests. Please try again later.");
            respond_rate_limited(session, route.limiter.limit(), &body).await?;
            return Ok(true);
        }

        let authorized =
            bearer_token(session.req_header()).is_some_and(|t| self.auth.authorize_request(t));
        if !authorized {
            self.metrics.record(&route.prefix, Outcome::Rejected);
            respond_json(session, 401, &ErrorBody::new("Unauthorized")).await?;
            return Ok(true);
        }

        *ctx = Some(route.prefix.clone());
        Ok(false)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let backend = self
            .upstreams
            .select(b"", 256)
            .ok_or_else(|| Error::explain(ErrorType::InternalError, "no upstream available"))?;

        Ok(Box::new(HttpPeer::new(
            backend.addr,
            false, // plain HTTP to the data service
            String::new(),
        )))
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        _ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        // The data service never sees the admin credential.
        upstream_request.remove_header("authorization");
        Ok(())
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        if let Some(prefix) = ctx.as_ref() {
            self.metrics.record(
                prefix,
                Outcome::Forwarded(upstream_response.status.as_u16()),
            );
        }
        Ok(())
    }
}

fn outcome_for(err: &AuthError) -> Outcome {
    match err {
        AuthError::InvalidInput(_) => Outcome::BadRequest,
        AuthError::RateLimited => Outcome::RateLimited,
        AuthError::Internal(_) => Outcome::Error,
        _ => Outcome::Rejected,
    }
}

fn peer_ip(session: &Session) -> Option<IpAddr> {
    session
        .client_addr()
        .and_then(|addr| addr.as_inet())
        .map(|addr| addr.ip())
}

/// Read the whole request body, or `None` once it grows past `limit`.
async fn read_body(session: &mut Session, limit: usize) -> Result<Option<Bytes>> {
    let mut body = BytesMut::new();
    while let Some(chunk) = session.read_request_body().await? {
        if body.len() + chunk.len() > limit {
            return Ok(None);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Some(body.freeze()))
}

async fn respond_rate_limited<T: Serialize>(
    session: &mut Session,
    limit: Limit,
    body: &T,
) -> Result<()> {
    let retry_after = (limit.window_ms / 1000).max(1).to_string();
    respond(session, 429, body, &[("Retry-After", retry_after)]).await
}

async fn respond_json<T: Serialize>(session: &mut Session, status: u16, body: &T) -> Result<()> {
    respond(session, status, body, &[]).await
}

async fn respond<T: Serialize>(
    session: &mut Session,
    status: u16,
    body: &T,
    extra_headers: &[(&'static str, String)],
) -> Result<()> {
    let body = serde_json::to_vec(body).map_err(|e| {
        Error::explain(
            ErrorType::InternalError,
            format!("failed to encode response: {e}"),
        )
    })?;

    let mut header = ResponseHeader::build(status, Some(2 + extra_headers.len()))?;
    header.insert_header("Content-Type", "application/json")?;
    header.insert_header("Content-Length", body.len().to_string())?;
    for (name, value) in extra_headers {
        header.insert_header(*name, value.as_str())?;
    }

    session.set_keepalive(None);
    session
        .write_response_header(Box::new(header), false)
        .await?;
    session
        .write_response_body(Some(Bytes::from(body)), true)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(prefix: &str) -> PrivilegedRoute {
        PrivilegedRoute::new(prefix, Arc::new(RateLimiter::new(Limit::DATA_READ)))
    }

    #[test]
    fn route_matches_on_segment_boundary() {
        let r = route("/admin/data");
        assert!(r.matches("/admin/data"));
        assert!(r.matches("/admin/data/subscribers"));
        assert!(!r.matches("/admin/database"));
        assert!(!r.matches("/admin"));
    }

    #[test]
    fn outcome_mapping() {
        assert_eq!(
            outcome_for(&AuthError::InvalidInput("x")),
            Outcome::BadRequest
        );
        assert_eq!(outcome_for(&AuthError::RateLimited), Outcome::RateLimited);
        assert_eq!(
            outcome_for(&AuthError::AuthenticationFailed),
            Outcome::Rejected
        );
        assert_eq!(
            outcome_for(&AuthError::Internal("x".to_string())),
            Outcome::Error
        );
    }
}
