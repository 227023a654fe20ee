pub mod admin;
pub mod serve;

use clap::{Parser, Subcommand};

/// Parish Map - church directory export and image cache service
#[derive(Parser, Debug)]
#[command(
    name = "parishmap",
    version,
    about = "Parish Map - church directory export and image cache service"
)]
pub struct Cli {
    /// Server host
    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Server port
    #[arg(long, default_value_t = 8643, global = true)]
    pub port: u16,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server in the foreground
    Serve {
        /// Path to configuration file
        #[arg(short = 'c', long = "config")]
        config: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short = 'p', long)]
        port: Option<u16>,

        /// Data directory path
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },

    /// Trigger a document regeneration on a running server
    Regenerate {
        /// Run steps until completion instead of returning after one page batch
        #[arg(long)]
        wait: bool,

        /// Resume a specific job by id
        #[arg(short = 'j', long)]
        job: Option<String>,

        /// Start from an explicit pagination cursor
        #[arg(long)]
        cursor: Option<String>,

        /// Pages to fetch per step
        #[arg(long = "max-pages")]
        max_pages: Option<usize>,

        /// Admin bearer token
        #[arg(short = 't', long)]
        token: String,
    },

    /// Schedule an image cache prewarm on a running server
    Prewarm {
        /// Re-fetch images that are already cached
        #[arg(long)]
        flush: bool,

        /// Admin bearer token
        #[arg(short = 't', long)]
        token: String,
    },

    /// Show server status
    Status,
}

/// Build the base URL for the server HTTP API.
pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Format a connection error message for when the server is not reachable.
pub fn connection_error_message(host: &str, port: u16) -> String {
    format!(
        "Could not connect to server at {}:{}. Is it running? (try: parishmap serve)",
        host, port
    )
}

/// Dispatch the CLI command to the appropriate handler.
pub async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Serve {
            config,
            port,
            data_dir,
        }) => {
            serve::cmd_serve(&cli.host, config.as_deref(), *port, data_dir.as_deref()).await
        }
        Some(Commands::Regenerate {
            wait,
            job,
            cursor,
            max_pages,
            token,
        }) => {
            admin::cmd_regenerate(
                &cli.host,
                cli.port,
                *wait,
                job.as_deref(),
                cursor.as_deref(),
                *max_pages,
                token,
            )
            .await
        }
        Some(Commands::Prewarm { flush, token }) => {
            admin::cmd_prewarm(&cli.host, cli.port, *flush, token).await
        }
        Some(Commands::Status) => admin::cmd_status(&cli.host, cli.port, cli.verbose).await,
        None => {
            // No subcommand provided -- print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
