use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Drop directory shared with the analysis worker
    pub inbox: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

        // PGN_INBOX wins; PGN_DIR keeps server and worker on one variable
        let inbox = lookup("PGN_INBOX")
            .or_else(|| lookup("PGN_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/data/inbox"));

        let port = match lookup("PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT is not a valid port: {v}"))?,
            None => 8000,
        };

        Ok(Self {
            database_url,
            inbox,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
