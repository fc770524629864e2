use anyhow::{anyhow, Context, Result};
use candy_mint_client::{
    notify, session::dispatch_events, Config, GatewayTokenAttestation, MintMetrics, MintSession,
    RpcLedgerClient, SessionSettings, ViewModel, WalletSigner,
};
use prometheus::Registry;
use solana_sdk::{signature::read_keypair_file, signer::Signer};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| "candy_mint_client=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_timer(ChronoLocal::rfc_3339()))
            .init();
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{home}/{rest}"),
        _ => path.to_string(),
    }
}

fn print_view(vm: &ViewModel) {
    info!(
        headline = vm.headline(),
        price = %vm.display_price(),
        redeemed = vm.supply.redeemed(),
        available = vm.supply.available(),
        remaining = vm.supply.remaining(),
        minted_percent = vm.supply.minted_percent(),
        phase = ?vm.sale_phase(),
        balance = ?vm.wallet_balance,
        "mint page"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::load(config_path.as_deref())?;
    init_tracing(&config);
    let do_mint = std::env::args().any(|arg| arg == "--mint");

    let keypair_path = expand_home(&config.wallet.keypair_path);
    let keypair = read_keypair_file(&keypair_path)
        .map_err(|e| anyhow!("failed to read keypair {}: {}", keypair_path, e))?;
    let signer: WalletSigner = Arc::new(keypair);
    let wallet = signer.pubkey();

    let registry = Registry::new();
    let metrics = MintMetrics::new(&registry).context("failed to register metrics")?;

    let ledger = Arc::new(RpcLedgerClient::new(config.rpc.url.clone(), config.commitment()?));
    let (tx, rx) = notify::channel();
    let session = Arc::new(MintSession::new(
        ledger.clone(),
        SessionSettings::from_config(&config)?,
        tx,
        metrics,
    ));
    let event_task = tokio::spawn(dispatch_events(rx, Arc::downgrade(&session)));

    info!(wallet = %wallet, candy_machine = %config.mint.candy_machine_id, network = %config.mint.network, "starting");
    for task in session.set_wallet(Some(signer)).await {
        task.await.context("sync task panicked")?;
    }

    let vm = session.snapshot().await;
    if !vm.is_loaded() {
        return Err(anyhow!("candy machine state could not be loaded"));
    }
    if let Some(gatekeeper) = vm.program.as_ref().and_then(|p| p.gatekeeper.as_ref()) {
        let provider = GatewayTokenAttestation::new(ledger.rpc(), wallet, gatekeeper.network, session.shutdown_token());
        if let Err(e) = provider.refresh().await {
            warn!("gateway token lookup failed: {}", e);
        }
        session.set_attestation(Arc::new(provider));
    }
    print_view(&vm);

    if do_mint {
        let unlocked = tokio::select! {
            unlocked = session.drive_countdown(|| chrono::Utc::now().timestamp()) => unlocked,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                false
            }
        };
        if unlocked {
            match session.mint().await {
                Ok(receipt) => info!(link = %receipt.explorer_link, "mint complete"),
                Err(e) => warn!("mint not completed: {}", e),
            }
            print_view(&session.snapshot().await);
        }
    }

    if config.metrics.enabled {
        println!("{}", MintMetrics::scrape(&registry));
    }

    session.teardown();
    drop(session);
    event_task.await.context("event task panicked")?;
    Ok(())
}
