mod arg_parser;
mod console;

use arg_parser::ArgParser;
use console::Console;
use joblib::Supervisor;

use clap::Parser;
use std::{error, io, process, time::Duration};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    // job output goes to stdout, diagnostics to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = ArgParser::parse();
    let supervisor = Supervisor::new(args.supervisor_config());
    let console = Console::new(
        supervisor,
        Duration::from_millis(args.interval_ms.max(1)),
        args.json,
    );

    let (jobs, launch_failures) = console.start_all(&args.parameters);
    let all_succeeded = console.follow(jobs).await?;
    if !all_succeeded || launch_failures > 0 {
        process::exit(1);
    }
    Ok(())
}
