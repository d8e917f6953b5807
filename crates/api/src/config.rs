use thematic_db::classification::DEFAULT_MIN_ANNOTATABLE_CONFIDENCE;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight requests to finish on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Confidence floor for the annotatable-cells listing when the request
    /// does not give one (default: `0.7`).
    pub min_annotatable_confidence: f64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `3000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                    |
    /// | `MIN_ANNOTATABLE_CONFIDENCE` | `0.7`                   |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let min_annotatable_confidence: f64 = std::env::var("MIN_ANNOTATABLE_CONFIDENCE")
            .map(|v| {
                v.parse()
                    .expect("MIN_ANNOTATABLE_CONFIDENCE must be a number")
            })
            .unwrap_or(DEFAULT_MIN_ANNOTATABLE_CONFIDENCE);
        assert!(
            (0.0..=1.0).contains(&min_annotatable_confidence),
            "MIN_ANNOTATABLE_CONFIDENCE must be between 0 and 1"
        );

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            min_annotatable_confidence,
        }
    }
}
