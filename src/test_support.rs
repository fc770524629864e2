use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use solana_sdk::{pubkey::Pubkey, signature::Signature, signer::keypair::Keypair};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{watch, Notify};

use crate::attestation::{AttestationProvider, AttestationStatus};
use crate::candy_machine::{GatekeeperSettings, ProgramState, WhitelistSettings};
use crate::error::{AttestationError, LedgerError};
use crate::ledger::{ConfirmationStatus, LedgerClient, MintSubmission, WalletSigner};

pub(crate) fn program_state(available: u64, redeemed: u64) -> ProgramState {
    ProgramState {
        id: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
        treasury: Pubkey::new_unique(),
        token_mint: None,
        price: 1_000_000_000,
        items_available: available,
        items_redeemed: redeemed,
        items_remaining: available - redeemed,
        go_live_date: Some(1_000),
        whitelist: None,
        gatekeeper: None,
        is_active: true,
        is_presale: false,
        is_sold_out: available == redeemed,
    }
}

pub(crate) fn presale_state(discount: Option<u64>) -> ProgramState {
    ProgramState {
        whitelist: Some(WhitelistSettings {
            mint: Pubkey::new_unique(),
            burn_every_time: true,
            presale: true,
            discount_price: discount,
        }),
        is_presale: true,
        ..program_state(100, 40)
    }
}

pub(crate) fn gated_state() -> ProgramState {
    ProgramState {
        gatekeeper: Some(GatekeeperSettings { network: Pubkey::new_unique(), expire_on_use: false }),
        ..program_state(100, 40)
    }
}

pub(crate) fn signer() -> WalletSigner {
    Arc::new(Keypair::new())
}

pub(crate) enum ConfirmScript {
    Status(ConfirmationStatus),
    /// Never resolves; the caller's timeout must fire.
    Hang,
    /// Resolves once the notify is triggered.
    Gated(Arc<Notify>, ConfirmationStatus),
    Fail(LedgerError),
}

/// Scripted ledger. Every response can be swapped between calls.
pub(crate) struct MockLedger {
    pub states: Mutex<HashMap<Pubkey, ProgramState>>,
    pub state_delays: Mutex<HashMap<Pubkey, Duration>>,
    pub state_error: Mutex<Option<LedgerError>>,
    pub token_balance: Mutex<Result<Decimal, LedgerError>>,
    pub native_balance: Mutex<Result<u64, LedgerError>>,
    pub submit: Mutex<Result<(), LedgerError>>,
    pub confirm: Mutex<ConfirmScript>,
    pub fetch_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub last_submission: Mutex<Option<MintSubmission>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            state_delays: Mutex::new(HashMap::new()),
            state_error: Mutex::new(None),
            token_balance: Mutex::new(Ok(Decimal::ZERO)),
            native_balance: Mutex::new(Ok(5_000_000_000)),
            submit: Mutex::new(Ok(())),
            confirm: Mutex::new(ConfirmScript::Status(ConfirmationStatus::success())),
            fetch_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            last_submission: Mutex::new(None),
        }
    }

    pub fn with_state(self, state: ProgramState) -> Self {
        self.states.lock().insert(state.id, state);
        self
    }

    pub fn set_confirm(&self, script: ConfirmScript) {
        *self.confirm.lock() = script;
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn fetch_state(&self, program_id: &Pubkey) -> Result<ProgramState, LedgerError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state_delays.lock().get(program_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.state_error.lock().clone() {
            return Err(err);
        }
        self.states
            .lock()
            .get(program_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(*program_id))
    }

    async fn fetch_token_balance(&self, _owner: &Pubkey, _mint: &Pubkey) -> Result<Decimal, LedgerError> {
        self.token_balance.lock().clone()
    }

    async fn fetch_native_balance(&self, _owner: &Pubkey) -> Result<u64, LedgerError> {
        self.native_balance.lock().clone()
    }

    async fn build_and_submit_mint(
        &self,
        _signer: &WalletSigner,
        _state: &ProgramState,
    ) -> Result<MintSubmission, LedgerError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submit.lock().clone()?;
        let submission = MintSubmission { signature: Signature::new_unique(), mint: Pubkey::new_unique() };
        *self.last_submission.lock() = Some(submission.clone());
        Ok(submission)
    }

    async fn confirm_signature(
        &self,
        _signature: &Signature,
        _timeout: Duration,
    ) -> Result<ConfirmationStatus, LedgerError> {
        let gated = match &*self.confirm.lock() {
            ConfirmScript::Status(status) => return Ok(*status),
            ConfirmScript::Fail(err) => return Err(err.clone()),
            ConfirmScript::Hang => None,
            ConfirmScript::Gated(notify, status) => Some((notify.clone(), *status)),
        };
        match gated {
            Some((notify, status)) => {
                notify.notified().await;
                Ok(status)
            }
            None => std::future::pending().await,
        }
    }
}

/// Attestation provider driven by the test.
pub(crate) struct MockAttestation {
    status: watch::Sender<AttestationStatus>,
    /// Status published when a token is requested, if any.
    pub on_request: Mutex<Option<AttestationStatus>>,
    pub request_calls: AtomicUsize,
}

impl MockAttestation {
    pub fn new(initial: AttestationStatus) -> Self {
        let (status, _) = watch::channel(initial);
        Self { status, on_request: Mutex::new(None), request_calls: AtomicUsize::new(0) }
    }

    pub fn publish(&self, status: AttestationStatus) {
        self.status.send_replace(status);
    }

    pub fn request_calls(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationProvider for MockAttestation {
    fn status(&self) -> AttestationStatus {
        *self.status.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<AttestationStatus> {
        self.status.subscribe()
    }

    async fn request_token(&self) -> Result<(), AttestationError> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        self.status.send_replace(AttestationStatus::Requesting);
        if let Some(next) = *self.on_request.lock() {
            self.status.send_replace(next);
        }
        Ok(())
    }
}
