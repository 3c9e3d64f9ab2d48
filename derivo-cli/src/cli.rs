use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Behaviour when the cache is current but its manifest cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ManifestFallbackArg {
    /// Rebuild the whole cache
    Rebuild,
    /// Emit no items for this run
    Empty,
}

/// Define CLI arguments
#[derive(Parser)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "Cache resolution-specific derivatives of a remote media collection",
    long_about = "Reads a media listing (JSON), makes sure every item has its thumbnail,\n\
                  timeline and fullscreen renditions (plus the raw stream of ready videos)\n\
                  cached under the cache root, and writes the items enriched with their\n\
                  cached URLs as JSON.\n\
                  \n\
                  Derivatives are only fetched again when the set of item ids changes."
)]
pub struct CliArgs {
    /// Media listing to cache
    #[arg(help = "JSON file with the media listing, or '-' to read it from stdin")]
    pub input: String,

    /// Cache root directory
    #[arg(
        short = 'c',
        long,
        help = "Directory holding version.txt, config.json and the derivative folders"
    )]
    pub cache_root: PathBuf,

    /// Public URL prefix the cache root is served under
    #[arg(
        short = 'p',
        long,
        default_value = "/media",
        help = "Prefix of the relative URLs written into the output"
    )]
    pub public_prefix: String,

    /// Output file for the enriched items
    #[arg(short, long, help = "Write the enriched items here instead of stdout")]
    pub output: Option<PathBuf>,

    /// Bearer credential for the remote service
    #[arg(
        long,
        env = "DERIVO_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Access token sent as a bearer credential with every request"
    )]
    pub token: Option<String>,

    /// Items rebuilt at the same time
    #[arg(
        long,
        default_value = "1",
        help = "Number of items whose derivatives are fetched at the same time"
    )]
    pub item_concurrency: usize,

    /// Retries per derivative
    #[arg(
        long,
        default_value = "3",
        help = "Retries after a network error, 429 or 5xx response"
    )]
    pub max_retries: u32,

    /// Backoff base in milliseconds
    #[arg(
        long,
        default_value = "1000",
        help = "Delay before the first retry in milliseconds, doubled for each retry after it"
    )]
    pub retry_base_delay_ms: u64,

    /// Manifest fallback
    #[arg(
        long,
        value_enum,
        default_value = "rebuild",
        help = "What to do when the cache is current but its manifest is unreadable"
    )]
    pub manifest_fallback: ManifestFallbackArg,

    /// Overall timeout in seconds for HTTP requests
    #[arg(
        long,
        default_value = "120",
        help = "Overall timeout in seconds for one request (0 for no timeout)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Timeout in seconds for establishing connections"
    )]
    pub connect_timeout: u64,

    /// Custom User-Agent
    #[arg(long, help = "Override the User-Agent sent with every request")]
    pub user_agent: Option<String>,

    /// Add custom HTTP headers
    #[arg(
        short = 'H',
        long = "header",
        help = "Add custom HTTP header (can be used multiple times). Format: 'Name: Value'"
    )]
    pub headers: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Mirror logs into a file
    #[arg(long, help = "Also write logs to this file (truncated on start)")]
    pub log_file: Option<PathBuf>,
}
