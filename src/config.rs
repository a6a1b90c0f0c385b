use url::Url;

const DEFAULT_PB_TABLE: &str = "personal_bests";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("Invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    /// Project key, sent as `apikey` on every request
    pub api_key: String,
    /// Signed-in user's token; requests fall back to the project key
    pub access_token: Option<String>,
    pub pb_table: String,
}

impl BackendConfig {
    /// Load backend config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("RUNTRIBE_BACKEND_URL")
            .map_err(|_| ConfigError::Missing("RUNTRIBE_BACKEND_URL"))?;
        let api_key = std::env::var("RUNTRIBE_BACKEND_KEY")
            .map_err(|_| ConfigError::Missing("RUNTRIBE_BACKEND_KEY"))?;
        let access_token = std::env::var("RUNTRIBE_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        let pb_table = std::env::var("RUNTRIBE_PB_TABLE")
            .ok()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_PB_TABLE.to_string());

        Self::new(&url, api_key, access_token, pb_table)
    }

    pub fn new(
        url: &str,
        api_key: String,
        access_token: Option<String>,
        pb_table: String,
    ) -> Result<Self, ConfigError> {
        let base_url = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            base_url,
            api_key,
            access_token,
            pb_table,
        })
    }

    /// Token sent as bearer auth
    pub fn bearer_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }
}
