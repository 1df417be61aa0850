//! Chat Relay Client - Entry Point
//!
//! `chat_client <connectionString> <nickname>`: connects, logs in, then
//! relays stdin to the server and server lines to stdout. Any error ends
//! the process with status 1.

use std::process::ExitCode;

use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use chat_relay::cli::{ArgsError, USAGE};
use chat_relay::{ChatClient, ClientArgs, ClientError};

#[tokio::main]
async fn main() -> ExitCode {
    // Log to stderr so stdout only carries chat lines
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = match ClientArgs::try_parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(ArgsError::Usage) => {
            println!("Wrong Argument count");
            println!("{}", USAGE);
            return ExitCode::from(1);
        }
        Err(ArgsError::Display(e)) => e.exit(),
    };

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    };

    // Exit directly: a pending blocking stdin read would otherwise hold up
    // runtime shutdown.
    std::process::exit(code)
}

async fn run(args: ClientArgs) -> Result<(), ClientError> {
    let mut client = ChatClient::connect(&args.connection_string, &args.nickname).await?;
    client.login().await?;
    client
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}
