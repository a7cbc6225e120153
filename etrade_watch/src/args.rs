//! Command-line arguments for the watch client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Poll live E*TRADE quotes and log the price table", long_about = None)]
pub struct Args {
    /// Symbols to track, separated by commas or spaces.
    #[clap(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Path to a text file with symbols to track.
    /// Symbols may be separated by commas, spaces, or new lines; `#` starts a comment.
    #[clap(long)]
    pub path: Option<String>,

    /// Use the sandbox environment instead of production.
    #[clap(long)]
    pub sandbox: bool,

    /// Pause between two polls of the same batch, in milliseconds.
    #[clap(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// How often the price table is logged, in milliseconds.
    #[clap(long, default_value_t = 5000)]
    pub report_ms: u64,

    /// Timeout of a single HTTP call, in seconds.
    #[clap(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Retries for failed requests.
    #[clap(long, default_value_t = 3)]
    pub retries: u32,

    /// Backoff factor for retries, in seconds.
    #[clap(long, default_value_t = 2.0)]
    pub backoff: f64,

    /// OAuth consumer key.
    #[clap(long, env = "ETRADE_CLIENT_KEY", hide_env_values = true)]
    pub client_key: String,

    /// OAuth consumer secret.
    #[clap(long, env = "ETRADE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// OAuth access token.
    #[clap(long, env = "ETRADE_RESOURCE_OWNER_KEY", hide_env_values = true)]
    pub resource_owner_key: Option<String>,

    /// OAuth access token secret.
    #[clap(long, env = "ETRADE_RESOURCE_OWNER_SECRET", hide_env_values = true)]
    pub resource_owner_secret: Option<String>,

    /// OAuth callback URI sent as `oauth_callback`.
    #[clap(long, env = "ETRADE_CALLBACK_URI")]
    pub callback_uri: Option<String>,
}
