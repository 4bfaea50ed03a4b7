use anyhow::Context;

/// Process configuration, read once from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Allowed browser origin; any origin when unset.
    pub cors_origin: Option<String>,
    /// Sessions older than this are rejected; unset means no expiry.
    pub session_max_age: Option<chrono::Duration>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = get("DATABASE_URL").unwrap_or_else(|| "sqlite:getlost.db?mode=rwc".into());
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match get("PORT") {
            Some(v) => v.parse().context("PORT must be a port number")?,
            None => 3000,
        };
        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse().context("DB_MAX_CONNECTIONS must be a number")?,
            None => 5,
        };
        let cors_origin = get("CORS_ORIGIN").filter(|v| !v.is_empty());
        let session_max_age = match get("SESSION_MAX_AGE_SECS") {
            Some(v) => {
                let secs: i64 = v.parse().context("SESSION_MAX_AGE_SECS must be a number")?;
                Some(chrono::Duration::seconds(secs))
            }
            None => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            db_max_connections,
            cors_origin,
            session_max_age,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
