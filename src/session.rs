use anyhow::Result;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use solana_sdk::{pubkey::Pubkey, signer::Signer};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::attestation::AttestationProvider;
use crate::config::Config;
use crate::countdown::CountdownGate;
use crate::error::MintFailure;
use crate::explorer::ExplorerLinks;
use crate::gatekeeper::GatekeeperGate;
use crate::ledger::{LedgerClient, WalletSigner};
use crate::metrics::MintMetrics;
use crate::notify::{EventReceiver, EventSender, MintEvent, Severity};
use crate::orchestrator::{MintOrchestrator, MintReceipt};
use crate::synchronizer::{PaymentUnits, Synchronizer};
use crate::view_model::ViewModel;

/// Wallet/program pair a fetch was issued for. `generation` increases on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityKey {
    pub wallet: Option<Pubkey>,
    pub program_id: Pubkey,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub program_id: Pubkey,
    pub units: PaymentUnits,
    pub explorer: ExplorerLinks,
    pub tx_timeout: Duration,
    pub fee_estimate: Decimal,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            program_id: config.candy_machine_id()?,
            units: PaymentUnits {
                token_decimals: config.mint.spl_token_decimals,
                token_label: config.mint.spl_token_label.clone(),
                ..PaymentUnits::default()
            },
            explorer: config.explorer_links(),
            tx_timeout: config.tx_timeout(),
            fee_estimate: config.mint.fee_estimate_sol,
        })
    }
}

fn is_current(current: &Mutex<IdentityKey>, issued: &IdentityKey) -> bool {
    current.lock().generation == issued.generation
}

/// One mounted mint page: view, sync, gates and orchestrator wired together.
pub struct MintSession {
    synchronizer: Arc<Synchronizer>,
    orchestrator: Arc<MintOrchestrator>,
    view: Arc<RwLock<ViewModel>>,
    identity: Arc<Mutex<IdentityKey>>,
    signer: Mutex<Option<WalletSigner>>,
    gate: Mutex<Option<Arc<GatekeeperGate>>>,
    shutdown: CancellationToken,
    identity_cancel: Mutex<CancellationToken>,
    metrics: MintMetrics,
}

impl MintSession {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        settings: SessionSettings,
        events: EventSender,
        metrics: MintMetrics,
    ) -> Self {
        let view = Arc::new(RwLock::new(ViewModel::new()));
        let synchronizer = Arc::new(Synchronizer::new(ledger.clone(), settings.units, metrics.clone()));
        let orchestrator = Arc::new(MintOrchestrator::new(
            ledger,
            view.clone(),
            events,
            settings.explorer,
            settings.tx_timeout,
            settings.fee_estimate,
            metrics.clone(),
        ));
        let shutdown = CancellationToken::new();

        Self {
            synchronizer,
            orchestrator,
            view,
            identity: Arc::new(Mutex::new(IdentityKey {
                wallet: None,
                program_id: settings.program_id,
                generation: 0,
            })),
            signer: Mutex::new(None),
            gate: Mutex::new(None),
            identity_cancel: Mutex::new(shutdown.child_token()),
            shutdown,
            metrics,
        }
    }

    pub fn view(&self) -> Arc<RwLock<ViewModel>> {
        self.view.clone()
    }

    pub async fn snapshot(&self) -> ViewModel {
        self.view.read().await.clone()
    }

    pub fn identity(&self) -> IdentityKey {
        *self.identity.lock()
    }

    pub fn is_minting(&self) -> bool {
        self.orchestrator.is_busy()
    }

    pub fn is_verifying(&self) -> bool {
        self.gate.lock().as_ref().map_or(false, |gate| gate.is_pending())
    }

    /// Spawns the state sync and the wallet balance fetch for the current
    /// identity. Both are unordered; results for a superseded identity are dropped.
    pub fn refresh(&self) -> Vec<JoinHandle<()>> {
        let identity = self.identity();
        let mut tasks = vec![self.spawn_sync(identity)];
        if let Some(wallet) = identity.wallet {
            tasks.push(self.spawn_balance(identity, wallet));
        }
        tasks
    }

    fn spawn_sync(&self, identity: IdentityKey) -> JoinHandle<()> {
        let synchronizer = self.synchronizer.clone();
        let view = self.view.clone();
        let current = self.identity.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let snapshot = match synchronizer.sync(identity.wallet.as_ref(), &identity.program_id).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) | Err(_) => return,
            };
            let mut vm = view.write().await;
            if !is_current(&current, &identity) {
                metrics.stale_results_total.inc();
                debug!(generation = identity.generation, "discarding stale program state");
                return;
            }
            vm.apply_snapshot(snapshot);
        })
    }

    fn spawn_balance(&self, identity: IdentityKey, wallet: Pubkey) -> JoinHandle<()> {
        let synchronizer = self.synchronizer.clone();
        let view = self.view.clone();
        let current = self.identity.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let Ok(balance) = synchronizer.fetch_wallet_balance(&wallet).await else {
                return;
            };
            let mut vm = view.write().await;
            if !is_current(&current, &identity) {
                metrics.stale_results_total.inc();
                debug!(generation = identity.generation, "discarding stale wallet balance");
                return;
            }
            vm.wallet_balance = Some(balance);
        })
    }

    async fn change_identity<F: FnOnce(&mut IdentityKey)>(&self, update: F) -> Vec<JoinHandle<()>> {
        let connected = {
            let mut identity = self.identity.lock();
            update(&mut identity);
            identity.generation += 1;
            identity.wallet.is_some()
        };
        {
            let mut cancel = self.identity_cancel.lock();
            cancel.cancel();
            *cancel = self.shutdown.child_token();
        }
        self.view.write().await.reset_identity(connected);
        self.refresh()
    }

    /// Connects, switches or (with `None`) disconnects the wallet.
    pub async fn set_wallet(&self, signer: Option<WalletSigner>) -> Vec<JoinHandle<()>> {
        let wallet = signer.as_ref().map(|s| s.pubkey());
        info!(wallet = ?wallet, "wallet changed");
        *self.signer.lock() = signer;
        *self.gate.lock() = None;
        self.change_identity(|identity| identity.wallet = wallet).await
    }

    pub async fn set_program(&self, program_id: Pubkey) -> Vec<JoinHandle<()>> {
        info!(program = %program_id, "target program changed");
        self.change_identity(|identity| identity.program_id = program_id).await
    }

    /// Attestation provider for the connected wallet.
    pub fn set_attestation(&self, provider: Arc<dyn AttestationProvider>) {
        *self.gate.lock() = Some(Arc::new(GatekeeperGate::new(provider)));
    }

    /// The user's mint action: checks eligibility, passes the attestation gate
    /// when the program requires one, then submits.
    pub async fn mint(&self) -> Result<MintReceipt, MintFailure> {
        let Some(signer) = self.signer.lock().clone() else {
            return Err(MintFailure::NotReady);
        };
        let gate = self.gate.lock().clone();
        let issued = self.identity();
        let current = self.identity.clone();
        let still_current = move || is_current(&current, &issued);

        let gated = {
            let vm = self.view.read().await;
            if !vm.show_mint_action() || vm.mint_button(false, false).disabled {
                debug!(phase = ?vm.sale_phase(), "mint action not available");
                return Err(MintFailure::NotReady);
            }
            vm.gatekeeper_required()
        };

        if !gated {
            return self.orchestrator.submit_for(&signer, still_current).await;
        }

        let Some(gate) = gate else {
            warn!("program requires attestation but no provider is attached");
            return Err(MintFailure::Attestation("no attestation provider".into()));
        };
        let cancel = self.identity_cancel.lock().clone();
        let pass = gate
            .authorize(&cancel)
            .await
            .map_err(|e| MintFailure::Attestation(e.to_string()))?;

        let result = self.orchestrator.submit_for(&signer, still_current).await;
        pass.finish();
        result
    }

    /// Unlocks the mint action once `clock` passes the go-live date of the
    /// loaded program. Returns false if the session shut down first or no
    /// program is loaded yet.
    pub async fn drive_countdown<C: Fn() -> i64>(&self, clock: C) -> bool {
        let (loaded, go_live) = {
            let vm = self.view.read().await;
            (vm.is_loaded(), vm.go_live_date())
        };
        if !loaded {
            debug!("countdown skipped, program state not loaded");
            return false;
        }

        let mut countdown = CountdownGate::new(go_live, clock());
        if let Some(parts) = countdown.remaining(clock()) {
            info!(days = parts.days, hours = parts.hours, minutes = parts.minutes, seconds = parts.seconds, "waiting for go-live");
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = countdown.wait(&clock) => {}
            }
        }
        self.view.write().await.unlock_countdown();
        true
    }

    /// Token cancelled on teardown, for collaborators with their own background work.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancels pending attestation waits and the countdown.
    pub fn teardown(&self) {
        self.shutdown.cancel();
    }
}

/// Logs notifications and serves resync requests until every sender is gone.
/// Holds the session weakly so dropping it closes the channel.
pub async fn dispatch_events(mut events: EventReceiver, session: Weak<MintSession>) {
    while let Some(event) = events.recv().await {
        match event {
            MintEvent::Notify(n) if n.severity == Severity::Success => info!("{}", n.message),
            MintEvent::Notify(n) => error!("{}", n.message),
            MintEvent::Celebrate { signature, mint } => {
                info!(signature = %signature, mint = %mint, "minted");
            }
            MintEvent::ForceResync => {
                let Some(session) = session.upgrade() else {
                    debug!("session dropped, skipping resync");
                    continue;
                };
                for task in session.refresh() {
                    if let Err(e) = task.await {
                        error!("resync task failed: {}", e);
                    }
                }
            }
        }
    }
    debug!("event channel closed");
}
