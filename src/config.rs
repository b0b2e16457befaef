use {
    std::env,
    smart_default::SmartDefault,
    url::Url,
    crate::{
        prelude::*,
        startgg::rate_limit::DEFAULT_INTERVAL,
    },
};
#[cfg(unix)] use xdg::BaseDirectories;

const TOKEN_ENV: &str = "STARTGG_TOKEN";

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Io(#[from] io::Error),
    #[error(transparent)] Json(#[from] serde_json::Error),
    #[error("missing config file and {TOKEN_ENV} is not set")]
    Missing,
    #[error("start.gg API token is empty")]
    EmptyToken,
    #[error("invalid config value for {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Config {
    /// start.gg API token.
    #[serde(default)]
    pub(crate) startgg: String,
    #[serde(default)]
    pub(crate) api: ConfigApi,
    #[serde(default)]
    pub(crate) collection: ConfigCollection,
}

#[derive(Debug, Clone, SmartDefault, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ConfigApi {
    #[default(Url::parse("https://api.start.gg/gql/alpha").expect("wrong hardcoded URL"))]
    pub(crate) endpoint: Url,
    #[default(DEFAULT_INTERVAL.as_millis() as u64)]
    pub(crate) rate_limit_ms: u64,
    #[default(30)]
    pub(crate) timeout_secs: u64,
    #[default(3)]
    pub(crate) max_attempts: u32,
    #[default(10)]
    pub(crate) server_error_delay_secs: u64,
    #[default(10)]
    pub(crate) backoff_base_secs: u64,
    #[default(60)]
    pub(crate) default_retry_after_secs: u64,
    #[default(10)]
    pub(crate) max_rate_limit_waits: u32,
}

#[derive(Debug, Clone, SmartDefault, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ConfigCollection {
    #[default(3)]
    pub(crate) workers: usize,
    #[default(100)]
    pub(crate) page_size: i64,
    /// `perPage` for match queries, which return far more objects per node.
    #[default(20)]
    pub(crate) sets_page_size: i64,
    #[default(4)]
    pub(crate) max_extra_pages: i64,
    #[default(365)]
    pub(crate) window_days: i64,
    #[default(2000)]
    pub(crate) max_requests: usize,
}

impl Config {
    /// Reads the config file, then applies the `STARTGG_TOKEN` override.
    ///
    /// Without an explicit path the XDG config directory is searched for `rival-scout.json`.
    pub(crate) async fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path {
            Some(path) => Some(path.to_owned()),
            None => Self::default_path(),
        };
        let token = env::var(TOKEN_ENV).ok().filter(|token| !token.is_empty());
        let mut config = match path {
            Some(path) => serde_json::from_str::<Self>(&tokio::fs::read_to_string(path).await?)?,
            None if token.is_some() => serde_json::from_value::<Self>(Value::Object(Default::default()))?,
            None => return Err(Error::Missing),
        };
        if let Some(token) = token {
            config.startgg = token;
        }
        config.validate()?;
        Ok(config)
    }

    #[cfg(unix)]
    fn default_path() -> Option<PathBuf> {
        BaseDirectories::new().find_config_file("rival-scout.json")
    }

    #[cfg(windows)]
    fn default_path() -> Option<PathBuf> {
        let path = PathBuf::from("cfg/rival-scout.json");
        path.exists().then_some(path)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.startgg.trim().is_empty() {
            return Err(Error::EmptyToken)
        }
        if self.api.max_attempts == 0 { return Err(Error::Invalid("api.maxAttempts")) }
        if self.collection.page_size <= 0 { return Err(Error::Invalid("collection.pageSize")) }
        if self.collection.sets_page_size <= 0 { return Err(Error::Invalid("collection.setsPageSize")) }
        if self.collection.max_extra_pages < 0 { return Err(Error::Invalid("collection.maxExtraPages")) }
        if !(1..=36_500).contains(&self.collection.window_days) { return Err(Error::Invalid("collection.windowDays")) }
        if self.collection.max_requests == 0 { return Err(Error::Invalid("collection.maxRequests")) }
        Ok(())
    }
}

impl ConfigApi {
    pub(crate) fn rate_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ConfigCollection {
    pub(crate) fn window(&self) -> TimeDelta {
        TimeDelta::days(self.window_days)
    }
}
