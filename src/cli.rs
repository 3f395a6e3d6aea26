use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run a reconnaissance scan against a domain
    Scan {
        /// Target domain (e.g. example.com)
        target: String,

        /// Scan type: full, subdomain, port or vuln
        #[arg(short = 't', long = "type", default_value = "full")]
        scan_type: String,

        /// Output directory
        #[arg(short = 'o', long, default_value = "./results")]
        out: String,

        /// Job identifier (generated when omitted)
        #[arg(long)]
        job_id: Option<String>,

        /// JSON config file (concurrency, timeouts, ports)
        #[arg(long, value_name = "FILE")]
        config: Option<String>,

        /// Timing template: T0 (paranoid) to T5 (insane) - like nmap -T4
        #[arg(short = 'T', long, value_parser = clap::value_parser!(u8).range(0..=5))]
        timing: Option<u8>,

        /// Global concurrency (overrides -T template)
        #[arg(short = 'c', long)]
        concurrency: Option<u16>,

        /// Per-host limit (overrides -T template)
        #[arg(long)]
        per_host: Option<u16>,

        /// HTTP request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Comma-separated port list (overrides config)
        #[arg(short = 'p', long, value_delimiter = ',')]
        ports: Option<Vec<u16>>,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
