use bird::cli::Cli;
use bird::output::Printer;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.verbose) {
        eprintln!("Warning: could not initialise logging: {}", e);
    }

    let printer = Printer::new(cli.global.json, cli.global.plain, cli.global.no_color);
    if let Err(e) = bird::commands::run(cli).await {
        printer.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `-v`.
fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "bird=debug,info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
