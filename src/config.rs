//! We can have a little hard-coded config, [as a
//! snack](https://knowyourmeme.com/memes/cats-can-have-a-little-salami).
//! Everything that differs between deployments comes from the environment
//! (and `.env`, via dotenvy) in [ServerConfig::from_env].

use anyhow::{bail, Context, Result};
use std::{env, net::SocketAddr, time::Duration};

/// Trimmed titles shorter than this are rejected.
pub const MIN_TITLE_LEN: usize = 3;
pub const MAX_TITLE_LEN: usize = 200;
/// There is no upper bound on content.
pub const MIN_CONTENT_LEN: usize = 10;

/// Quiet period after the last edit before a background save fires.
pub const AUTO_SAVE_DELAY: Duration = Duration::from_millis(2000);

/// Editors that see no requests for this long are assumed abandoned.
pub const EDITOR_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Postgres default max connections is 100, and we'll take most of 'em
/// https://www.postgresql.org/docs/current/runtime-config-connection.html
pub const PG_MAX_CONNECTIONS: u32 = 80;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Notes vanish on restart; handy for poking at the API locally.
    Memory,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub store: StoreBackend,
    pub autosave_delay: Duration,
    pub editor_idle_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(p) => p.parse::<u16>().context("PORT must be a port number")?,
            Err(_) => 8000,
        };
        let store = match env::var("NOTES_STORE").as_deref() {
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok("memory") => StoreBackend::Memory,
            Ok(other) => bail!("unknown NOTES_STORE {other:?}"),
        };
        let autosave_delay = match env::var("AUTO_SAVE_DELAY_MS") {
            Ok(ms) => Duration::from_millis(
                ms.parse().context("AUTO_SAVE_DELAY_MS must be an integer")?,
            ),
            Err(_) => AUTO_SAVE_DELAY,
        };
        let editor_idle_timeout = match env::var("EDITOR_IDLE_TIMEOUT_SECS") {
            Ok(secs) => match secs.parse() {
                Ok(0) => bail!("EDITOR_IDLE_TIMEOUT_SECS must be positive"),
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => bail!("EDITOR_IDLE_TIMEOUT_SECS must be an integer"),
            },
            Err(_) => EDITOR_IDLE_TIMEOUT,
        };

        Ok(Self {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            store,
            autosave_delay,
            editor_idle_timeout,
        })
    }
}

pub fn postgres_url() -> Result<String> {
    let pg_usr = env::var("POSTGRES_USER")
        .context("postgres user to be defined in environment")?;
    let pg_pw = env::var("POSTGRES_PASSWORD")
        .context("postgres password to be defined in environment")?;
    let pg_db = env::var("POSTGRES_DB")
        .context("postgres db name to be defined in environment")?;
    let pg_host =
        env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());

    Ok(format!(
        "postgres://{}:{}@{}:5432/{}",
        pg_usr, pg_pw, pg_host, pg_db
    ))
}
