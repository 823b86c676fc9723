/*
 * Responsibility
 * - 環境変数の読み込み (DATABASE_URL, TOKEN_KEY, WALLET_VALIDATOR_URL, CORS 許可など)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - secret (TOKEN_KEY, DATABASE_URL) は Debug に出さない
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where sessions come from.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { url: String },
    /// In-process tables; development only.
    Memory,
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // URL carries credentials
        match self {
            StorageBackend::Postgres { .. } => f.write_str("Postgres"),
            StorageBackend::Memory => f.write_str("Memory"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub storage: StorageBackend,
    pub db_pool_size: u32,
    pub db_pool_timeout: Duration,
    pub db_pool_recycle: Duration,

    pub token_key: Vec<u8>,
    pub token_leeway_seconds: u64,

    pub wallet_validator_url: String,
    pub wallet_validator_timeout: Duration,

    pub request_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("storage", &self.storage)
            .field("db_pool_size", &self.db_pool_size)
            .field("db_pool_timeout", &self.db_pool_timeout)
            .field("db_pool_recycle", &self.db_pool_recycle)
            .field("token_leeway_seconds", &self.token_leeway_seconds)
            .field("wallet_validator_url", &self.wallet_validator_url)
            .field("wallet_validator_timeout", &self.wallet_validator_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source (the process environment in `from_env`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = parse_or(get("PORT"), "PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV"));

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let storage = match get("DATABASE_URL") {
            Some(url) => StorageBackend::Postgres { url },
            None if app_env.is_production() => return Err(ConfigError::Missing("DATABASE_URL")),
            None => StorageBackend::Memory,
        };

        let db_pool_size: u32 = parse_or(get("DB_POOL_SIZE"), "DB_POOL_SIZE", 10)?;
        if db_pool_size == 0 {
            return Err(ConfigError::Invalid("DB_POOL_SIZE"));
        }
        let db_pool_timeout = seconds_or(get("DB_POOL_TIMEOUT"), "DB_POOL_TIMEOUT", 10)?;
        let db_pool_recycle = seconds_or(get("DB_POOL_RECYCLE"), "DB_POOL_RECYCLE", 300)?;

        let token_key = get("TOKEN_KEY").ok_or(ConfigError::Missing("TOKEN_KEY"))?;
        let token_key =
            hex::decode(token_key.trim()).map_err(|_| ConfigError::Invalid("TOKEN_KEY"))?;
        if token_key.is_empty() {
            return Err(ConfigError::Invalid("TOKEN_KEY"));
        }
        let token_leeway_seconds: u64 =
            parse_or(get("TOKEN_LEEWAY_SECONDS"), "TOKEN_LEEWAY_SECONDS", 0)?;

        let wallet_validator_url =
            get("WALLET_VALIDATOR_URL").ok_or(ConfigError::Missing("WALLET_VALIDATOR_URL"))?;
        let wallet_validator_timeout = seconds_or(
            get("WALLET_VALIDATOR_TIMEOUT"),
            "WALLET_VALIDATOR_TIMEOUT",
            10,
        )?;

        let request_timeout = seconds_or(get("REQUEST_TIMEOUT"), "REQUEST_TIMEOUT", 30)?;

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            storage,
            db_pool_size,
            db_pool_timeout,
            db_pool_recycle,
            token_key,
            token_leeway_seconds,
            wallet_validator_url,
            wallet_validator_timeout,
            request_timeout,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn seconds_or(raw: Option<String>, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    parse_or(raw, key, default).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("TOKEN_KEY", "00112233445566778899aabbccddeeff"),
        ("WALLET_VALIDATOR_URL", "https://broadcast.example.com"),
    ];

    #[test]
    fn defaults_apply_in_development() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.db_pool_size, 10);
        assert_eq!(config.db_pool_timeout, Duration::from_secs(10));
        assert_eq!(config.db_pool_recycle, Duration::from_secs(300));
        assert_eq!(config.token_leeway_seconds, 0);
        assert_eq!(config.token_key.len(), 16);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn production_requires_a_database() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("APP_ENV", "production"));

        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("DATABASE_URL"));

        vars.push(("DATABASE_URL", "postgres://app:pw@db/wallets"));
        let config = load(&vars).unwrap();
        assert!(matches!(config.storage, StorageBackend::Postgres { .. }));
    }

    #[test]
    fn token_key_must_be_hex() {
        let vars = [
            ("TOKEN_KEY", "not-hex"),
            ("WALLET_VALIDATOR_URL", "https://broadcast.example.com"),
        ];

        assert_eq!(load(&vars).unwrap_err(), ConfigError::Invalid("TOKEN_KEY"));
        assert_eq!(
            load(&REQUIRED[1..]).unwrap_err(),
            ConfigError::Missing("TOKEN_KEY")
        );
    }

    #[test]
    fn unparsable_numbers_are_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("DB_POOL_SIZE", "lots"));

        assert_eq!(load(&vars).unwrap_err(), ConfigError::Invalid("DB_POOL_SIZE"));
    }

    #[test]
    fn debug_hides_secrets() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("DATABASE_URL", "postgres://app:hunter2@db/wallets"));
        let printed = format!("{:?}", load(&vars).unwrap());

        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("00112233"));
    }
}
