pub mod rpc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::{
    instruction::InstructionError, pubkey::Pubkey, signature::Signature, signer::Signer,
    transaction::TransactionError,
};
use std::{sync::Arc, time::Duration};

use crate::candy_machine::ProgramState;
use crate::error::LedgerError;

pub use rpc::RpcLedgerClient;

/// Wallet capability handed to the ledger client for signing.
pub type WalletSigner = Arc<dyn Signer + Send + Sync>;

/// Result of submitting a mint transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintSubmission {
    pub signature: Signature,
    pub mint: Pubkey,
}

/// Terminal status observed for a submitted signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationStatus {
    pub confirmed: bool,
    /// The transaction landed with an error. `error_code` is only set for
    /// custom program errors.
    pub failed: bool,
    pub error_code: Option<u32>,
}

impl ConfirmationStatus {
    pub fn success() -> Self {
        Self { confirmed: true, failed: false, error_code: None }
    }

    pub fn rejected(code: Option<u32>) -> Self {
        Self { confirmed: true, failed: true, error_code: code }
    }

    pub fn is_success(&self) -> bool {
        self.confirmed && !self.failed
    }
}

/// Remote collaborator that reads program state and lands transactions.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn fetch_state(&self, program_id: &Pubkey) -> Result<ProgramState, LedgerError>;

    /// Balance of `owner`'s associated token account for `mint`, in UI units.
    async fn fetch_token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Decimal, LedgerError>;

    /// Native balance in lamports.
    async fn fetch_native_balance(&self, owner: &Pubkey) -> Result<u64, LedgerError>;

    async fn build_and_submit_mint(
        &self,
        signer: &WalletSigner,
        state: &ProgramState,
    ) -> Result<MintSubmission, LedgerError>;

    /// Waits for finality of `signature`. Implementations may give up early
    /// with [`LedgerError::ConfirmationTimeout`].
    async fn confirm_signature(
        &self,
        signature: &Signature,
        timeout: Duration,
    ) -> Result<ConfirmationStatus, LedgerError>;
}

/// Custom program error code carried by a failed transaction, if any.
pub fn custom_error_code(err: &TransactionError) -> Option<u32> {
    match err {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(*code),
        _ => None,
    }
}
