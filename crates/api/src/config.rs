use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except
/// `DATABASE_URL`, which the binary requires at startup.
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
    /// Root for all project/job directories.
    pub data_root: PathBuf,
    /// Anchor for relative user-supplied paths.
    pub repo_root: PathBuf,
    /// Models root; forwarded to workers, not read by this service.
    pub models_dir: PathBuf,
    /// Redis URL for the task queue broker/backend.
    pub queue_url: String,
    /// Queue name (Redis key prefix).
    pub queue_name: String,
    /// Shared-secret API key; `None` disables authentication.
    pub api_key: Option<String>,
    /// How long a task may be unknown to the queue before its job is
    /// expired, in seconds.
    pub task_staleness_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                          |
    /// |--------------------------|----------------------------------|
    /// | `HOST`                   | `0.0.0.0`                        |
    /// | `PORT`                   | `3000`                           |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`          |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                             |
    /// | `STEADYDANCER_REPO_ROOT` | current working directory        |
    /// | `STEADYDANCER_DATA_DIR`  | `<repo_root>/assets/projects`    |
    /// | `MODELS_DIR`             | `<repo_root>/models`             |
    /// | `JOB_QUEUE_URL`          | `redis://localhost:6379/1`       |
    /// | `QUEUE_NAME`             | `steadydancer`                   |
    /// | `STEADYDANCER_API_KEY`   | unset (auth disabled)            |
    /// | `TASK_STALENESS_SECS`    | `3600`                           |
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

        let repo_root = std::env::var("STEADYDANCER_REPO_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::current_dir().expect("cannot determine working directory")
            });

        let data_root = std::env::var("STEADYDANCER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| repo_root.join("assets").join("projects"));

        let models_dir = std::env::var("MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| repo_root.join("models"));

        let queue_url = std::env::var("JOB_QUEUE_URL")
            .unwrap_or_else(|_| "redis://localhost:6379/1".into());

        let queue_name = std::env::var("QUEUE_NAME").unwrap_or_else(|_| "steadydancer".into());

        let api_key = std::env::var("STEADYDANCER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let task_staleness_secs: i64 = std::env::var("TASK_STALENESS_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("TASK_STALENESS_SECS must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_root,
            repo_root,
            models_dir,
            queue_url,
            queue_name,
            api_key,
            task_staleness_secs,
        }
    }
}
