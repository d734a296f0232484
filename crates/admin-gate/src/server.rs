use std::sync::Arc;

use admin_auth::{AuthService, RateLimiter};
use pingora::lb::LoadBalancer;
use pingora::lb::prelude::TcpHealthCheck;
use pingora::prelude::*;
use pingora::server::RunArgs;
use pingora::server::Server as PingoraServer;
use pingora::server::configuration::Opt;
use pingora::services::background::GenBackgroundService;

use crate::configuration::GateConfig;
use crate::gate::{AdminGate, PrivilegedRoute};
use crate::metric::AuthMetrics;
use crate::store::SqliteHashStore;
use crate::sweeper::RateLimitSweeper;

pub struct Server {
    server: PingoraServer,
}

impl Server {
    pub fn new(opt: Option<Opt>) -> Result<Self> {
        let server = PingoraServer::new(opt)?;
        Ok(Server { server })
    }

    pub fn bootstrap(&mut self, conf: GateConfig, metrics: Arc<AuthMetrics>) -> Result<()> {
        self.server.bootstrap();

        conf.validate().map_err(|e| {
            Error::explain(ErrorType::InternalError, format!("invalid gate config: {e}"))
        })?;
        let secret = conf.resolve_secret().map_err(|e| {
            Error::explain(ErrorType::InternalError, format!("token secret: {e}"))
        })?;

        let store = SqliteHashStore::new(&conf.password_db);
        let auth = Arc::new(AuthService::new(store, secret, conf.auth_config()));

        let routes: Vec<PrivilegedRoute> = conf
            .routes
            .iter()
            .map(|route| {
                let limiter =
                    RateLimiter::new(route.limit.into()).with_max_tracked(conf.max_tracked_clients);
                PrivilegedRoute::new(route.prefix.clone(), Arc::new(limiter))
            })
            .collect();

        // Expired entries are swept in the background
        let mut limiters = vec![auth.login_limiter()];
        limiters.extend(routes.iter().map(PrivilegedRoute::limiter));
        let sweeper = RateLimitSweeper::new(limiters, conf.sweep_interval());
        let background =
            GenBackgroundService::new("rate limit sweeper".to_string(), Arc::new(sweeper));
        self.server.add_service(background);

        let mut upstreams =
            LoadBalancer::try_from_iter(conf.upstreams.iter().map(String::as_str)).map_err(
                |e| Error::explain(ErrorType::InternalError, format!("invalid upstreams: {e}")),
            )?;
        upstreams.set_health_check(TcpHealthCheck::new());
        upstreams.health_check_frequency = Some(conf.health_check_interval());
        let health = background_service("health check", upstreams);
        let upstreams = health.task();
        self.server.add_service(health);

        log::info!(
            "Admin gate on {} guarding {} route(s) in front of {:?}",
            conf.listen,
            routes.len(),
            conf.upstreams
        );

        let mut gate_service = http_proxy_service(
            &self.server.configuration,
            AdminGate::new(auth, routes, upstreams, metrics, conf.trust_proxy_headers),
        );
        gate_service.add_tcp(&conf.listen);
        self.server.add_service(gate_service);

        Ok(())
    }

    pub fn run_forever(self) {
        self.server.run_forever();
    }

    pub fn run(self, args: RunArgs) {
        self.server.run(args);
    }
}
