use std::sync::Arc;

use admin_gate::configuration::GateConfig;
use admin_gate::metric::AuthMetrics;
use admin_gate::server::Server;
use clap::Parser;
use pingora::server::configuration::Opt;

fn main() {
    // Set RUST_LOG=info for visibility.
    env_logger::init();

    let opt = Opt::parse();

    // Pingora and the gate read the same YAML file.
    let conf_path = opt.conf.clone().unwrap_or_else(|| "conf.yaml".to_string());
    let conf_str = std::fs::read_to_string(&conf_path).unwrap_or_else(|e| {
        log::error!("Failed to read config file {}: {}", conf_path, e);
        std::process::exit(1);
    });
    let gate_conf = GateConfig::from_yaml(&conf_str).unwrap_or_else(|e| {
        log::error!("{}", e);
        std::process::exit(1);
    });

    let mut server = Server::new(Some(opt)).expect("Failed to create server");
    server
        .bootstrap(gate_conf, Arc::new(AuthMetrics::new()))
        .expect("Failed to bootstrap server");

    server.run_forever();
}
