use clap::Parser;

#[derive(Parser)]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// The request url,like http://www.google.com
    pub url: String,
    /// Specify request method to use
    #[arg(short = 'X', long = "request", value_name = "method")]
    pub method_option: Option<String>,
    /// HTTP POST data.
    #[arg(short = 'd', long = "data", value_name = "data")]
    pub body_option: Option<String>,
    /// The http headers.
    #[arg(short = 'H', long = "header", value_name = "header")]
    pub headers: Vec<String>,
    /// Number of times to issue the request.
    #[arg(short = 'n', long = "count", value_name = "count", default_value_t = 1)]
    pub count: u32,
    /// Emit one JSON object per request instead of the compact line.
    #[arg(long = "json")]
    pub json: bool,
    /// Connect timeout in seconds.
    #[arg(long = "connect-timeout", value_name = "seconds", default_value_t = 30)]
    pub connect_timeout: u64,
    /// Maximum time allowed for each request in seconds (0 means no limit).
    #[arg(short = 'm', long = "max-time", value_name = "seconds", default_value_t = 0)]
    pub max_time: u64,
    /// TLS handshake timeout in seconds.
    #[arg(long = "tls-timeout", value_name = "seconds", default_value_t = 10)]
    pub tls_timeout: u64,
    /// Allow insecure server connections
    #[arg(short = 'k', long = "insecure")]
    pub skip_certificate_validate: bool,
    /// The pem path.
    #[arg(short = 'c', long = "cacert", value_name = "file")]
    pub certificate_path_option: Option<String>,
    /// Disable keep-alive (send Connection: close).
    #[arg(long = "no-keepalive")]
    pub no_keepalive: bool,
    /// Send User-Agent <name> to server
    #[arg(short = 'A', long = "user-agent", value_name = "name")]
    pub user_agent_option: Option<String>,
    /// Make the operation more talkative
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
