use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use petal::config::load_or_default;
use petal::config::schema::ResponseFraming;
use petal::observability::logging;
use petal::Sender;

#[derive(Parser)]
#[command(name = "petal-send")]
#[command(about = "Send an image to a petal receiver and print its answer", long_about = None)]
struct Cli {
    /// Image file to classify
    image: PathBuf,

    /// Receiver address (overrides sender.server_address)
    #[arg(short, long)]
    server: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Response timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Payload write size in bytes
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Expect a length-prefixed response
    #[arg(long)]
    framed: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.sender.server_address = server;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.sender.response_timeout_ms = timeout_ms.max(1);
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.sender.chunk_size = chunk_size.max(1);
    }
    if cli.framed {
        config.protocol.response_framing = ResponseFraming::LengthPrefixed;
    }

    logging::init_logging(&config.observability.log_level);

    let sender = Sender::from_config(&config);
    match sender.send_file(&cli.image, &config.sender.server_address).await {
        Ok(reply) => {
            println!("{}", reply);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error sending image: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
