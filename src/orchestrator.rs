use rust_decimal::Decimal;
use solana_sdk::{pubkey::Pubkey, signature::Signature, signer::Signer};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{sync::RwLock, time::timeout};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, MintFailure, ProgramErrorKind};
use crate::explorer::ExplorerLinks;
use crate::ledger::{ConfirmationStatus, LedgerClient, WalletSigner};
use crate::metrics::MintMetrics;
use crate::notify::{EventSender, MintEvent, Notification};
use crate::view_model::ViewModel;

pub const SUCCESS_MESSAGE: &str = "Congratulations! Mint succeeded!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintReceipt {
    pub signature: Signature,
    pub mint: Pubkey,
    pub explorer_link: String,
}

/// Holds the in-flight flag; clears it on drop.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight submit-and-confirm pipeline.
pub struct MintOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    view: Arc<RwLock<ViewModel>>,
    events: EventSender,
    explorer: ExplorerLinks,
    tx_timeout: Duration,
    fee_estimate: Decimal,
    metrics: MintMetrics,
    busy: AtomicBool,
}

impl MintOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        view: Arc<RwLock<ViewModel>>,
        events: EventSender,
        explorer: ExplorerLinks,
        tx_timeout: Duration,
        fee_estimate: Decimal,
        metrics: MintMetrics,
    ) -> Self {
        Self {
            ledger,
            view,
            events,
            explorer,
            tx_timeout,
            fee_estimate,
            metrics,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Mints one item for `signer`. Eligibility (active, not sold out,
    /// whitelist balance during presale) is checked by the caller.
    pub async fn submit(&self, signer: &WalletSigner) -> Result<MintReceipt, MintFailure> {
        self.submit_for(signer, || true).await
    }

    /// Like [`Self::submit`], but the optimistic view update is skipped when
    /// `still_current` returns false once the mint is confirmed.
    pub async fn submit_for<F>(
        &self,
        signer: &WalletSigner,
        still_current: F,
    ) -> Result<MintReceipt, MintFailure>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!(wallet = %signer.pubkey(), "mint already in flight, rejecting");
            self.metrics.failures_total.with_label_values(&[MintFailure::Busy.metric_label()]).inc();
            return Err(MintFailure::Busy);
        };

        self.metrics.submissions_total.inc();
        let result = self.submit_and_confirm(signer, &still_current).await;

        match &result {
            Ok(receipt) => {
                self.metrics.confirmed_total.inc();
                info!(signature = %receipt.signature, mint = %receipt.mint, "mint confirmed");
                self.emit(MintEvent::Notify(Notification::success(SUCCESS_MESSAGE)));
                self.emit(MintEvent::Celebrate { signature: receipt.signature, mint: receipt.mint });
            }
            Err(failure) => self.report_failure(failure),
        }
        result
    }

    async fn submit_and_confirm<F>(
        &self,
        signer: &WalletSigner,
        still_current: &F,
    ) -> Result<MintReceipt, MintFailure>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let state = self.view.read().await.program.clone().ok_or(MintFailure::NotReady)?;

        let submission = self
            .ledger
            .build_and_submit_mint(signer, &state)
            .await
            .map_err(classify_submit_error)?;
        debug!(signature = %submission.signature, "awaiting confirmation");

        let started = Instant::now();
        let confirmation = timeout(
            self.tx_timeout,
            self.ledger.confirm_signature(&submission.signature, self.tx_timeout),
        )
        .await;
        self.metrics.confirmation_seconds.observe(started.elapsed().as_secs_f64());

        let status = match confirmation {
            Err(_) | Ok(Err(LedgerError::ConfirmationTimeout(_))) => {
                return Err(MintFailure::ConfirmationTimeout)
            }
            Ok(Err(e)) => return Err(MintFailure::ConfirmationUnavailable(e.to_string())),
            Ok(Ok(status)) => status,
        };
        classify_status(status)?;

        let explorer_link = self.explorer.address(&submission.mint);
        let mut vm = self.view.write().await;
        if still_current() {
            vm.reconcile_successful_mint(explorer_link.clone(), self.fee_estimate);
        } else {
            self.metrics.stale_results_total.inc();
            info!(signature = %submission.signature, "identity changed during mint, skipping local update");
        }
        drop(vm);

        Ok(MintReceipt { signature: submission.signature, mint: submission.mint, explorer_link })
    }

    fn report_failure(&self, failure: &MintFailure) {
        self.metrics.failures_total.with_label_values(&[failure.metric_label()]).inc();
        warn!(kind = failure.metric_label(), "mint failed: {}", failure);

        if failure.is_user_visible() {
            self.emit(MintEvent::Notify(Notification::error(failure.user_message())));
        }
        if failure.requires_resync() {
            self.emit(MintEvent::ForceResync);
        }
    }

    fn emit(&self, event: MintEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

fn classify_submit_error(err: LedgerError) -> MintFailure {
    match err.program_code() {
        Some(code) => MintFailure::OnChain(ProgramErrorKind::from_code(code)),
        None => MintFailure::BuildOrSubmit(err.to_string()),
    }
}

fn classify_status(status: ConfirmationStatus) -> Result<(), MintFailure> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        ConfirmationStatus { confirmed: false, .. } => Err(MintFailure::ConfirmationTimeout),
        ConfirmationStatus { error_code: Some(code), .. } => {
            Err(MintFailure::OnChain(ProgramErrorKind::from_code(code)))
        }
        ConfirmationStatus { error_code: None, .. } => {
            Err(MintFailure::OnChain(ProgramErrorKind::Transaction))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::Network;
    use crate::notify::{self, EventReceiver, Severity};
    use crate::synchronizer::{build_snapshot, PaymentUnits};
    use crate::test_support::{program_state, signer, ConfirmScript, MockLedger};
    use rust_decimal_macros::dec;
    use tokio::sync::Notify;

    struct Harness {
        ledger: Arc<MockLedger>,
        view: Arc<RwLock<ViewModel>>,
        events: EventReceiver,
        metrics: MintMetrics,
        orchestrator: Arc<MintOrchestrator>,
    }

    fn harness(available: u64, redeemed: u64) -> Harness {
        let ledger = Arc::new(MockLedger::new());
        let mut vm = ViewModel::connected();
        vm.apply_snapshot(build_snapshot(
            Arc::new(program_state(available, redeemed)),
            Decimal::ZERO,
            &PaymentUnits::default(),
        ));
        vm.wallet_balance = Some(dec!(10));
        let view = Arc::new(RwLock::new(vm));
        let (tx, events) = notify::channel();
        let metrics = MintMetrics::unregistered();
        let orchestrator = Arc::new(MintOrchestrator::new(
            ledger.clone(),
            view.clone(),
            tx,
            ExplorerLinks::new("explorer.solana.com", Network::Devnet),
            Duration::from_secs(30),
            dec!(0.012),
            metrics.clone(),
        ));
        Harness { ledger, view, events, metrics, orchestrator }
    }

    fn drain(events: &mut EventReceiver) -> Vec<MintEvent> {
        let mut out = vec![];
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_successful_mint_reconciles_view() {
        let mut h = harness(100, 40);
        let receipt = h.orchestrator.submit(&signer()).await.unwrap();

        let vm = h.view.read().await;
        assert_eq!((vm.supply.redeemed(), vm.supply.remaining()), (41, 59));
        assert_eq!(vm.wallet_balance, Some(dec!(8.988)));
        assert_eq!(vm.explorer_link.as_deref(), Some(receipt.explorer_link.as_str()));
        assert!(receipt.explorer_link.ends_with("?cluster=devnet"));
        assert_eq!(h.ledger.last_submission.lock().as_ref().map(|s| s.mint), Some(receipt.mint));

        let events = drain(&mut h.events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], MintEvent::Notify(Notification::success(SUCCESS_MESSAGE)));
        assert!(matches!(events[1], MintEvent::Celebrate { mint, .. } if mint == receipt.mint));
        assert!(!h.orchestrator.is_busy());
        assert_eq!(h.metrics.confirmed_total.get(), 1);
    }

    #[tokio::test]
    async fn test_sold_out_rejection_forces_resync() {
        let mut h = harness(100, 40);
        h.ledger.set_confirm(ConfirmScript::Status(ConfirmationStatus::rejected(Some(0x137))));

        let failure = h.orchestrator.submit(&signer()).await.unwrap_err();
        assert_eq!(failure, MintFailure::OnChain(ProgramErrorKind::SoldOut));

        let events = drain(&mut h.events);
        assert_eq!(events, vec![MintEvent::Notify(Notification::error("SOLD OUT!")), MintEvent::ForceResync]);
        assert_eq!(h.view.read().await.supply.redeemed(), 40, "no optimistic update on failure");
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_clears_busy() {
        let mut h = harness(100, 40);
        h.ledger.set_confirm(ConfirmScript::Hang);

        let failure = h.orchestrator.submit(&signer()).await.unwrap_err();
        assert_eq!(failure, MintFailure::ConfirmationTimeout);
        assert!(!h.orchestrator.is_busy());

        let events = drain(&mut h.events);
        assert_eq!(events.len(), 1);
        match &events[0] {
            MintEvent::Notify(n) => {
                assert_eq!(n.severity, Severity::Error);
                assert_eq!(n.message, MintFailure::TIMEOUT_MESSAGE);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(h.metrics.failures_total.with_label_values(&["timeout"]).get(), 1);
    }

    #[tokio::test]
    async fn test_preflight_rejection_is_classified() {
        let mut h = harness(100, 40);
        *h.ledger.submit.lock() =
            Err(LedgerError::Submit { message: "custom program error: 0x135".into(), code: Some(0x135) });

        let failure = h.orchestrator.submit(&signer()).await.unwrap_err();
        assert_eq!(failure, MintFailure::OnChain(ProgramErrorKind::InsufficientFunds));
        assert_eq!(
            drain(&mut h.events),
            vec![MintEvent::Notify(Notification::error(
                "Insufficient funds to mint. Please fund your wallet."
            ))]
        );
    }

    #[tokio::test]
    async fn test_build_error_gets_generic_message() {
        let mut h = harness(100, 40);
        *h.ledger.submit.lock() = Err(LedgerError::Build("missing signer".into()));

        let failure = h.orchestrator.submit(&signer()).await.unwrap_err();
        assert!(matches!(failure, MintFailure::BuildOrSubmit(_)));
        assert_eq!(
            drain(&mut h.events),
            vec![MintEvent::Notify(Notification::error(MintFailure::GENERIC_MESSAGE))]
        );
    }

    #[tokio::test]
    async fn test_unknown_code_falls_back_to_generic() {
        let h = harness(100, 40);
        h.ledger.set_confirm(ConfirmScript::Status(ConfirmationStatus::rejected(Some(6001))));
        let failure = h.orchestrator.submit(&signer()).await.unwrap_err();
        assert_eq!(failure, MintFailure::OnChain(ProgramErrorKind::Unknown(6001)));
        assert_eq!(failure.user_message(), MintFailure::GENERIC_MESSAGE);
    }

    #[tokio::test]
    async fn test_landed_error_without_code_is_a_failure() {
        let mut h = harness(100, 40);
        h.ledger.set_confirm(ConfirmScript::Status(ConfirmationStatus::rejected(None)));

        let failure = h.orchestrator.submit(&signer()).await.unwrap_err();
        assert_eq!(failure, MintFailure::OnChain(ProgramErrorKind::Transaction));
        assert_eq!(
            drain(&mut h.events),
            vec![MintEvent::Notify(Notification::error(MintFailure::GENERIC_MESSAGE))]
        );

        let vm = h.view.read().await;
        assert_eq!(vm.supply.redeemed(), 40);
        assert_eq!(vm.wallet_balance, Some(dec!(10)));
        assert_eq!(vm.explorer_link, None);
        assert_eq!(h.metrics.confirmed_total.get(), 0);
    }

    #[tokio::test]
    async fn test_confirmation_lookup_failure_asks_to_check_wallet() {
        let mut h = harness(100, 40);
        h.ledger.set_confirm(ConfirmScript::Fail(LedgerError::Rpc("node unavailable".into())));

        let failure = h.orchestrator.submit(&signer()).await.unwrap_err();
        assert!(matches!(failure, MintFailure::ConfirmationUnavailable(_)));
        assert!(failure.user_message().contains("check your wallet"));
        assert_eq!(
            drain(&mut h.events),
            vec![MintEvent::Notify(Notification::error(MintFailure::UNCONFIRMED_MESSAGE))]
        );
        assert_eq!(h.view.read().await.supply.redeemed(), 40);
        assert!(!h.orchestrator.is_busy());
        assert_eq!(h.metrics.failures_total.with_label_values(&["unconfirmed"]).get(), 1);
    }

    #[tokio::test]
    async fn test_superseded_identity_skips_local_update() {
        let mut h = harness(100, 40);

        let receipt = h.orchestrator.submit_for(&signer(), || false).await.unwrap();
        let vm = h.view.read().await;
        assert_eq!(vm.supply.redeemed(), 40);
        assert_eq!(vm.wallet_balance, Some(dec!(10)));
        assert_eq!(vm.explorer_link, None);
        assert_eq!(h.metrics.stale_results_total.get(), 1);

        let events = drain(&mut h.events);
        assert!(matches!(events[1], MintEvent::Celebrate { mint, .. } if mint == receipt.mint));
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected() {
        let mut h = harness(100, 40);
        let release = Arc::new(Notify::new());
        h.ledger.set_confirm(ConfirmScript::Gated(release.clone(), ConfirmationStatus::success()));

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.submit(&signer()).await })
        };
        while !h.orchestrator.is_busy() {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.orchestrator.submit(&signer()).await.unwrap_err(), MintFailure::Busy);
        assert_eq!(h.ledger.submit_calls(), 1);

        release.notify_one();
        first.await.unwrap().unwrap();
        assert!(!h.orchestrator.is_busy());

        let events = drain(&mut h.events);
        assert!(events.iter().all(|e| !matches!(e, MintEvent::Notify(n) if n.severity == Severity::Error)));
    }

    #[tokio::test]
    async fn test_not_ready_without_program() {
        let h = harness(100, 40);
        h.view.write().await.reset_identity(true);
        assert_eq!(h.orchestrator.submit(&signer()).await.unwrap_err(), MintFailure::NotReady);
        assert_eq!(h.ledger.submit_calls(), 0);
        assert!(!h.orchestrator.is_busy());
    }
}
