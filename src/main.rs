use std::fs::File;
use std::io::BufReader;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use crate::config::VAULT_SERVER_CONFIG;
use crate::session::Session;

mod config;
mod db_migrations;
mod model;
mod repository;
mod service;
mod session;
#[cfg(test)]
mod test;

fn main() {
    init_logging();
    repository::initialize_db().unwrap();
    service::storage_service::check_storage_dir();
    let tls_config = load_tls_config();
    let server = VAULT_SERVER_CONFIG.clone().server;
    let address = format!("{}:{}", server.host, server.port);
    let listener = TcpListener::bind(address.as_str())
        .unwrap_or_else(|e| panic!("Failed to bind to {address}: {e}"));
    log::info!("listening on {address}");
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to accept connection: {e:?}");
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let tls_config = Arc::clone(&tls_config);
        thread::spawn(move || {
            let connection = match rustls::ServerConnection::new(tls_config) {
                Ok(c) => c,
                Err(e) => {
                    log::error!("failed to start TLS for {peer}: {e:?}");
                    return;
                }
            };
            // the handshake completes lazily on the first read
            let stream = rustls::StreamOwned::new(connection, stream);
            Session::new(stream, peer).run();
        });
    }
}

fn init_logging() {
    let level = VAULT_SERVER_CONFIG
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .unwrap_or_else(|e| panic!("Failed to initialize logging: {e}"));
}

/// loads the PEM certificate chain and private key named in the config.
/// The server can't run without them, so failures here panic at startup
fn load_tls_config() -> Arc<rustls::ServerConfig> {
    let server = VAULT_SERVER_CONFIG.clone().server;
    let cert_file = File::open(server.cert_file.as_str())
        .unwrap_or_else(|e| panic!("Failed to open certificate file {}: {e}", server.cert_file));
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| panic!("Failed to parse certificate file: {e}"));
    let key_file = File::open(server.key_file.as_str())
        .unwrap_or_else(|e| panic!("Failed to open key file {}: {e}", server.key_file));
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .unwrap_or_else(|e| panic!("Failed to parse key file: {e}"))
        .unwrap_or_else(|| panic!("No private key found in {}", server.key_file));
    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap_or_else(|e| panic!("Failed to build TLS configuration: {e}"));
    Arc::new(tls_config)
}
