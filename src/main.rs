use clap::Parser;

use dataproxy::config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_HOST, DEFAULT_MAX_LENGTH, DEFAULT_PORT,
    DEFAULT_TIMEOUT_SECS,
};
use dataproxy::{ProxyConfig, ServerConfig};

#[derive(Parser, Debug)]
#[clap(name = "dataproxy")]
#[clap(about = "Relay remote CSV and spreadsheet files as JSON or JSONP", long_about = None)]
struct Cli {
    #[clap(long, default_value = DEFAULT_HOST)]
    host: String,

    #[clap(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Largest file to relay, in bytes
    #[clap(long, default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: u64,

    /// Bytes requested from the upstream body per pull
    #[clap(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Upstream request timeout, in seconds
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        ServerConfig {
            host: cli.host,
            port: cli.port,
            proxy: ProxyConfig {
                max_length: cli.max_length,
                chunk_size: cli.chunk_size,
                timeout_secs: cli.timeout,
                ..ProxyConfig::default()
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ServerConfig::from(Cli::parse());
    config.proxy.validate()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dataproxy::server::serve(config))
}
