//! zkSync Token Lifecycle PoC CLI
//!
//! One invocation runs one scenario end to end:
//! - `l2-poc`            -> fund, deposit, activate, transfer, withdraw
//! - `l2-poc --exodus`   -> same, but exit through the settlement contract
//! - `l2-poc --save`     -> also write both identities as keystores

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use l2_poc::{execute, provision_all, save_keystores, ExitPath, PocConfig, PocResult, Session};

#[derive(Parser)]
#[command(name = "l2-poc")]
#[command(about = "Deposit, transfer and withdraw a token through zkSync", long_about = None)]
struct Cli {
    /// Provider secret (mnemonic or private key); random if omitted
    #[arg(short, long)]
    provider: Option<String>,

    /// Requestor secret (mnemonic or private key); random if omitted
    #[arg(short, long)]
    requestor: Option<String>,

    /// Exit through an emergency withdrawal instead of a normal withdrawal
    #[arg(short, long)]
    exodus: bool,

    /// Save both identities as keystore files
    #[arg(short, long)]
    save: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli));

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!(kind = e.kind(), "{}", e);
            Ok(ExitCode::from(e.exit_code() as u8))
        }
    }
}

async fn async_main(cli: Cli) -> PocResult<()> {
    info!("Starting zkSync token lifecycle PoC");

    let config = PocConfig::from_env()?;
    info!(
        eth_rpc = %config.eth_rpc_url,
        zksync = %config.zksync_rpc_url,
        chain_id = config.chain_id,
        "Configuration loaded"
    );

    let identities = provision_all(cli.requestor.as_deref(), cli.provider.as_deref())?;
    if cli.save {
        save_keystores(&identities, &config.keystore_dir)?;
    }

    let session = Session::connect(config).await?;

    let path = if cli.exodus {
        ExitPath::Exodus
    } else {
        ExitPath::Withdraw
    };
    execute(&session, &identities, path).await?;

    info!("zkSync token lifecycle PoC finished");
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,l2_poc=debug"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}
