use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dispatchd::config::ServerConfig;
use dispatchd::shutdown::install_shutdown_handler;
use dispatchd::{client, worker, Server};

#[derive(Parser, Debug)]
#[command(name = "dispatchd")]
#[command(version)]
#[command(about = "A job dispatch server with a pooled worker fleet")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the dispatch server
    Serve {
        /// Address for client submit/status/results connections
        #[arg(long, default_value = "127.0.0.1:1209")]
        client_addr: SocketAddr,

        /// Address for long-lived worker connections
        #[arg(long, default_value = "127.0.0.1:1205")]
        worker_addr: SocketAddr,

        /// Retries per job before permanent failure
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
    },

    /// Run one worker process
    Worker {
        /// Server worker-port address to connect to
        #[arg(long, default_value = "127.0.0.1:1205")]
        addr: SocketAddr,
    },

    /// Submit a job ("<keyword> <data>")
    Submit {
        #[arg(long, default_value = "127.0.0.1:1209")]
        addr: SocketAddr,

        metadata: String,
    },

    /// Query a job's status
    Status {
        #[arg(long, default_value = "127.0.0.1:1209")]
        addr: SocketAddr,

        job_id: u16,
    },

    /// Fetch a job's results
    Results {
        #[arg(long, default_value = "127.0.0.1:1209")]
        addr: SocketAddr,

        job_id: u16,
    },

    /// Submit the same job repeatedly (load generator)
    Flood {
        #[arg(long, default_value = "127.0.0.1:1209")]
        addr: SocketAddr,

        /// Number of copies to submit
        count: u32,

        /// Job metadata to repeat
        #[arg(default_value = "wordcount one two three four five six seven")]
        metadata: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Serve {
            client_addr,
            worker_addr,
            max_retries,
        } => {
            let config =
                ServerConfig::new(client_addr, worker_addr).with_max_retries(max_retries);
            let shutdown = install_shutdown_handler();
            let server = Server::bind(&config).await?;
            server.run(shutdown).await?;
        }
        Commands::Worker { addr } => {
            let shutdown = install_shutdown_handler();
            worker::run_worker(addr, shutdown).await?;
        }
        Commands::Submit { addr, metadata } => {
            println!("{}", client::submit(addr, &metadata).await?);
        }
        Commands::Status { addr, job_id } => {
            println!("{}", client::status(addr, job_id).await?);
        }
        Commands::Results { addr, job_id } => {
            println!("{}", client::results(addr, job_id).await?);
        }
        Commands::Flood {
            addr,
            count,
            metadata,
        } => {
            for _ in 0..count {
                println!("{}", client::submit(addr, &metadata).await?);
            }
        }
    }

    Ok(())
}
