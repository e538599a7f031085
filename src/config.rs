use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub paypal: PayPalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_paypal_base_url")]
    pub base_url: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub max_file_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            max_file_bytes: 5 * 1024 * 1024,
        }
    }
}

fn default_paypal_base_url() -> String {
    "https://api-m.sandbox.paypal.com".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // no file: environment variables and defaults only
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and config.toml was not found")?;

                let storage_defaults = StorageConfig::default();

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            2_592_000i64,
                        ),
                    },
                    paypal: PayPalConfig {
                        client_id: get_env("PAYPAL_CLIENT_ID").unwrap_or_default(),
                        client_secret: get_env("PAYPAL_CLIENT_SECRET").unwrap_or_default(),
                        base_url: get_env("PAYPAL_BASE_URL")
                            .unwrap_or_else(default_paypal_base_url),
                        currency: get_env("PAYPAL_CURRENCY").unwrap_or_else(default_currency),
                        timeout_secs: get_env_parse("PAYPAL_TIMEOUT_SECS", default_timeout_secs()),
                    },
                    storage: StorageConfig {
                        upload_dir: get_env("UPLOAD_DIR").unwrap_or(storage_defaults.upload_dir),
                        max_file_bytes: get_env_parse(
                            "UPLOAD_MAX_FILE_BYTES",
                            storage_defaults.max_file_bytes,
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // environment always wins over the file
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.refresh_token_expires_in = n;
        }
        if let Ok(v) = env::var("PAYPAL_CLIENT_ID") {
            config.paypal.client_id = v;
        }
        if let Ok(v) = env::var("PAYPAL_CLIENT_SECRET") {
            config.paypal.client_secret = v;
        }
        if let Ok(v) = env::var("PAYPAL_BASE_URL") {
            config.paypal.base_url = v;
        }
        if let Ok(v) = env::var("PAYPAL_CURRENCY") {
            config.paypal.currency = v;
        }
        if let Ok(v) = env::var("PAYPAL_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.paypal.timeout_secs = n;
        }
        if let Ok(v) = env::var("UPLOAD_DIR") {
            config.storage.upload_dir = v;
        }
        if let Ok(v) = env::var("UPLOAD_MAX_FILE_BYTES")
            && let Ok(n) = v.parse()
        {
            config.storage.max_file_bytes = n;
        }

        Ok(config)
    }
}
