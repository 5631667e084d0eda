use broker_net::Dispatcher;
use clap::Parser;

/// Lightweight pub/sub broker: binds a TCP control/data listener and
/// a UDP publish-ingest socket on the same port.
#[derive(Debug, Parser)]
#[command(name = "broker-server")]
struct Args {
    /// Port to bind for both the TCP listener and the UDP socket.
    port: u16,

    /// Raise log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut dispatcher = match Dispatcher::bind(args.port) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}:{}: {e}", file!(), line!());
            std::process::exit(1);
        }
    };

    if let Err(e) = dispatcher.run() {
        eprintln!("{}:{}: {e}", file!(), line!());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}
