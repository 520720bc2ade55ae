use clap::error::ErrorKind;
use mybucket::{cli::Cli, engine, ConnectConfig, Intent, Outcome, Result, Session};
use std::process;
use tokio::runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match Cli::try_parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            eprint!("{}", e.render());
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => process::exit(0),
                _ => process::exit(1),
            }
        }
    };

    init_logging(cli.verbose);

    let intent = match cli.intent() {
        Ok(intent) => intent,
        Err(e) => {
            error!("{}", e);
            eprint!("{}", mybucket::cli::usage());
            process::exit(1);
        }
    };

    match run(&intent, &cli.connect_config()) {
        Ok(outcome) => info!("{}", outcome),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn,mybucket=info",
        1 => "warn,mybucket=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_level(false)
        .init();
}

fn run(intent: &Intent, config: &ConnectConfig) -> Result<Outcome> {
    let runtime = runtime::Builder::new_current_thread().enable_all().build()?;

    runtime.block_on(async {
        let session = Session::connect(config).await?;
        let result = execute(&session, intent).await;
        session.close().await;
        result
    })
}

async fn execute(session: &Session, intent: &Intent) -> Result<Outcome> {
    let bucket = session.open_bucket(&intent.bucket).await?;
    let outcome = engine::execute(&bucket, intent).await?;
    session.finish().await?;
    Ok(outcome)
}
