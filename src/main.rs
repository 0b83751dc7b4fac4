#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
mod executor;
mod structures;

use std::{
    path::PathBuf,
    process::ExitCode,
    time::{Duration, TryFromFloatSecsError},
};

use argh::FromArgs;
use craftping::{BedrockServer, JavaServer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[macro_use]
extern crate tracing;

#[derive(FromArgs, Debug, PartialEq)]
/// Query Minecraft servers for any information they expose.
///
/// Exit status is 0 when the server answered, non-zero otherwise.
struct Args {
    /// the server address, as `host[:port]`
    #[argh(positional)]
    address: String,
    /// seconds each network operation may take
    #[argh(option, default = "3.0")]
    timeout: f64,
    /// how many attempts each request gets
    #[argh(option, default = "craftping::DEFAULT_TRIES")]
    retries: usize,
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand)]
enum Command {
    Ping(PingCommand),
    Status(StatusCommand),
    Query(QueryCommand),
    Json(JsonCommand),
    Bedrock(BedrockCommand),
}

#[derive(FromArgs, Debug, PartialEq)]
/// Print the server latency.
#[argh(subcommand, name = "ping")]
struct PingCommand {}

#[derive(FromArgs, Debug, PartialEq)]
/// Print version, description and players. Needs a 1.7+ server.
#[argh(subcommand, name = "status")]
struct StatusCommand {
    /// write the server icon to this PNG file
    #[argh(option)]
    favicon: Option<PathBuf>,
}

#[derive(FromArgs, Debug, PartialEq)]
/// Print detailed information. The server must have `enable-query` set.
#[argh(subcommand, name = "query")]
struct QueryCommand {}

#[derive(FromArgs, Debug, PartialEq)]
/// Print everything that can be found out as one JSON object.
#[argh(subcommand, name = "json")]
struct JsonCommand {}

#[derive(FromArgs, Debug, PartialEq)]
/// Ping a Bedrock Edition server.
#[argh(subcommand, name = "bedrock")]
struct BedrockCommand {}

#[tokio::main]
async fn main() -> ExitCode {
    start_tracing();
    let args: Args = argh::from_env();
    match run(args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            if let Failure::Offline { report, .. } = &error {
                println!("{report}");
            }
            error!(?error, "command failed");
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<String, Failure> {
    let timeout = Duration::try_from_secs_f64(args.timeout)?;
    match &args.command {
        Command::Ping(_) => executor::ping(&java_server(&args, timeout).await?).await,
        Command::Status(cmd) => {
            let server = java_server(&args, timeout).await?;
            executor::status(&server, cmd.favicon.as_deref()).await
        }
        Command::Query(_) => executor::query(&java_server(&args, timeout).await?).await,
        Command::Json(_) => executor::json(&java_server(&args, timeout).await?).await,
        Command::Bedrock(_) => {
            let server = BedrockServer {
                timeout,
                tries: args.retries,
                ..BedrockServer::lookup(&args.address)?
            };
            executor::bedrock(&server).await
        }
    }
}

async fn java_server(args: &Args, timeout: Duration) -> Result<JavaServer, Failure> {
    Ok(JavaServer {
        timeout,
        tries: args.retries,
        ..JavaServer::lookup_async(&args.address).await?
    })
}

#[derive(thiserror::Error, Debug)]
pub enum Failure {
    #[error("error talking to the server: {0}")]
    Server(#[from] craftping::Error),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(#[from] TryFromFloatSecsError),
    #[error("the server did not send a favicon")]
    NoFavicon,
    #[error("the favicon is not valid base64: {0}")]
    Favicon(#[from] base64::DecodeError),
    #[error("could not write the favicon: {0}")]
    Io(#[from] std::io::Error),
    #[error("the server is unreachable: {source}")]
    Offline {
        report: String,
        source: craftping::Error,
    },
    #[error("JSON processing error")]
    JsonProcessingFailed(#[from] serde_json::Error),
}

fn start_tracing() {
    let env_filter = EnvFilter::try_from_env("LOG")
        .unwrap_or_else(|_| EnvFilter::new(concat!(env!("CARGO_PKG_NAME"), "=info")));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["craftstat"], args).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["mc.example.org", "ping"]);
        assert_eq!(args.address, "mc.example.org");
        assert!((args.timeout - 3.0).abs() < f64::EPSILON);
        assert_eq!(args.retries, 3);
        assert_eq!(args.command, Command::Ping(PingCommand {}));
    }

    #[test]
    fn options_and_favicon() {
        let args = parse(&[
            "--timeout",
            "1.5",
            "--retries",
            "5",
            "mc.example.org:25566",
            "status",
            "--favicon",
            "icon.png",
        ]);
        assert_eq!(args.retries, 5);
        assert_eq!(
            args.command,
            Command::Status(StatusCommand {
                favicon: Some(PathBuf::from("icon.png")),
            })
        );
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Args::from_args(&["craftstat"], &["mc.example.org"]).is_err());
    }

    #[tokio::test]
    async fn bad_timeout_is_reported() {
        let args = parse(&["--timeout", "nan", "127.0.0.1", "bedrock"]);
        assert!(matches!(run(args).await, Err(Failure::InvalidTimeout(_))));
    }

    #[tokio::test]
    async fn json_on_closed_port_fails() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let address = format!("127.0.0.1:{port}");
        let args = parse(&["--timeout", "1", "--retries", "1", &address, "json"]);
        assert!(matches!(run(args).await, Err(Failure::Offline { .. })));
    }

    #[tokio::test]
    async fn zero_retries_is_reported() {
        let args = parse(&["--retries", "0", "127.0.0.1:1", "bedrock"]);
        assert!(matches!(
            run(args).await,
            Err(Failure::Server(craftping::Error::InvalidValue(_)))
        ));
    }
}
