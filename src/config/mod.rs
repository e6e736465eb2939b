use std::env;
use std::path::PathBuf;

/// Portal configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base URL of the API gateway (default: http://localhost:8083)
    pub gateway_url: String,

    /// File holding the raw bearer token (default: $HOME/.neuroguard/authToken)
    pub token_path: PathBuf,

    /// Per-request timeout in seconds (default: 30)
    pub request_timeout_secs: u64,

    /// Directory downloaded files are saved to (default: current directory)
    pub download_dir: PathBuf,
}

fn default_token_path() -> PathBuf {
    let home = env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".neuroguard").join("authToken")
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8083".to_string(),
            token_path: default_token_path(),
            request_timeout_secs: 30,
            download_dir: PathBuf::from("."),
        }
    }
}

impl PortalConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            gateway_url: env::var("GATEWAY_URL").unwrap_or(default.gateway_url),

            token_path: env::var("TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.token_path),

            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.request_timeout_secs),

            download_dir: env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.download_dir),
        }
    }

    /// Create config for development (short timeout, token store in the
    /// working directory so sessions never touch $HOME)
    pub fn development() -> Self {
        Self {
            gateway_url: "http://localhost:8083".to_string(),
            token_path: PathBuf::from(".neuroguard-dev").join("authToken"),
            request_timeout_secs: 5,
            download_dir: PathBuf::from("."),
        }
    }
}
