use config::{Config, ConfigError};
use once_cell::sync::Lazy;
use serde::Deserialize;

/// where and how the server listens for client connections
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "certfile")]
    pub cert_file: String,
    #[serde(rename = "keyfile")]
    pub key_file: String,
}

#[derive(Deserialize, Clone)]
pub struct DbConfig {
    pub location: String,
}

/// config properties for the physical blob store
#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    pub location: String,
}

/// config properties for the whole of this application
#[derive(Deserialize, Clone)]
pub struct VaultServerConfig {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub storage: StorageConfig,
    #[serde(rename = "loglevel")]
    pub log_level: String,
}

/// Parses the config file located at ./VaultServer.toml, if it exists.
/// If this fails to parse the file, the application will panic
pub fn parse_config() -> VaultServerConfig {
    let builder = Config::builder()
        .add_source(config::File::with_name("./VaultServer.toml"))
        .build();
    // some errors are fine, such as not found
    if let Err(ConfigError::Foreign(e)) = builder {
        let message = e.to_string();
        if message.contains("not found") {
            log::warn!("No config file found. Continuing startup...");
            return VAULT_CONFIG_DEFAULT.clone();
        }
        panic!("Failed to parse config file. Exception is {e}");
        // basically everything else is unrecoverable, though
    } else if let Err(e) = builder {
        log::error!("Failed to parse config file. Exception is {e}");
        panic!("Failed to parse config file. Exception is {e}");
    }
    let settings = builder.unwrap();
    settings
        .try_deserialize()
        .unwrap_or(VAULT_CONFIG_DEFAULT.clone())
}

/// global variable for config, that way it doesn't need to be repeatedly parsed
pub static VAULT_SERVER_CONFIG: Lazy<VaultServerConfig> = Lazy::new(parse_config);
static VAULT_CONFIG_DEFAULT: Lazy<VaultServerConfig> = Lazy::new(|| VaultServerConfig {
    server: ServerConfig {
        host: "localhost".to_string(),
        port: 65432,
        cert_file: "./cert.pem".to_string(),
        key_file: "./key.pem".to_string(),
    },
    database: DbConfig {
        location: "./db.sqlite".to_string(),
    },
    storage: StorageConfig {
        location: "./storage".to_string(),
    },
    log_level: "info".to_string(),
});
