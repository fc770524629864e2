use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

/// Errors raised by a [`crate::ledger::LedgerClient`] implementation.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("account not found: {0}")]
    AccountNotFound(Pubkey),

    #[error("invalid account data: {0}")]
    Decode(String),

    #[error("balance fetch failed: {0}")]
    BalanceFetch(String),

    #[error("failed to build transaction: {0}")]
    Build(String),

    #[error("failed to submit transaction: {message}")]
    Submit { message: String, code: Option<u32> },

    #[error("confirmation timeout: sig={0}")]
    ConfirmationTimeout(Signature),
}

impl LedgerError {
    /// Program error code carried by a rejected submission, if any.
    pub fn program_code(&self) -> Option<u32> {
        match self {
            Self::Submit { code, .. } => *code,
            _ => None,
        }
    }
}

/// Failure of a state synchronization pass. Never shown to the end user.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("failed to fetch program state for {program}: {source}")]
    ProgramState {
        program: Pubkey,
        #[source]
        source: LedgerError,
    },

    #[error("failed to fetch wallet balance for {wallet}: {source}")]
    WalletBalance {
        wallet: Pubkey,
        #[source]
        source: LedgerError,
    },
}

/// Closed set of program rejections the mint page knows how to explain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramErrorKind {
    SoldOut,
    InsufficientFunds,
    NotLiveYet,
    Unknown(u32),
    /// Transaction failed without a custom program code.
    Transaction,
}

impl ProgramErrorKind {
    pub const INSUFFICIENT_FUNDS: u32 = 0x135;
    pub const SOLD_OUT: u32 = 0x137;
    pub const NOT_LIVE_YET: u32 = 0x138;

    pub fn from_code(code: u32) -> Self {
        match code {
            Self::SOLD_OUT => Self::SoldOut,
            Self::INSUFFICIENT_FUNDS => Self::InsufficientFunds,
            Self::NOT_LIVE_YET => Self::NotLiveYet,
            other => Self::Unknown(other),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::SoldOut => "SOLD OUT!",
            Self::InsufficientFunds => "Insufficient funds to mint. Please fund your wallet.",
            Self::NotLiveYet => "Minting period hasn't started yet.",
            Self::Unknown(_) | Self::Transaction => MintFailure::GENERIC_MESSAGE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SoldOut => "sold_out",
            Self::InsufficientFunds => "insufficient_funds",
            Self::NotLiveYet => "not_live_yet",
            Self::Unknown(_) => "unknown",
            Self::Transaction => "transaction_error",
        }
    }
}

/// Terminal failure of a single mint attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MintFailure {
    #[error("a mint is already in flight")]
    Busy,

    #[error("program state has not been loaded")]
    NotReady,

    #[error("could not build or submit the mint transaction: {0}")]
    BuildOrSubmit(String),

    #[error("program rejected the mint: {0:?}")]
    OnChain(ProgramErrorKind),

    #[error("no confirmation observed before the timeout")]
    ConfirmationTimeout,

    #[error("confirmation status unavailable: {0}")]
    ConfirmationUnavailable(String),

    #[error("attestation not granted: {0}")]
    Attestation(String),
}

impl MintFailure {
    pub const GENERIC_MESSAGE: &'static str = "Mint failed! Please try again!";
    pub const TIMEOUT_MESSAGE: &'static str =
        "Transaction timed out. Please check your wallet before retrying.";
    pub const UNCONFIRMED_MESSAGE: &'static str =
        "Could not confirm the transaction. Please check your wallet before retrying.";

    /// Message shown in the user-facing notification.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::OnChain(kind) => kind.message(),
            Self::ConfirmationTimeout => Self::TIMEOUT_MESSAGE,
            Self::ConfirmationUnavailable(_) => Self::UNCONFIRMED_MESSAGE,
            Self::Busy | Self::NotReady | Self::BuildOrSubmit(_) | Self::Attestation(_) => {
                Self::GENERIC_MESSAGE
            }
        }
    }

    /// Whether the failure should reach the user at all.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Busy | Self::NotReady | Self::Attestation(_))
    }

    /// A sold-out rejection means the local mirror is stale enough to need a full reload.
    pub fn requires_resync(&self) -> bool {
        matches!(self, Self::OnChain(ProgramErrorKind::SoldOut))
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::NotReady => "not_ready",
            Self::BuildOrSubmit(_) => "build_or_submit",
            Self::OnChain(kind) => kind.label(),
            Self::ConfirmationTimeout => "timeout",
            Self::ConfirmationUnavailable(_) => "unconfirmed",
            Self::Attestation(_) => "attestation",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum AttestationError {
    #[error("attestation request failed: {0}")]
    Request(String),

    #[error("attestation request already pending")]
    Pending,

    #[error("attestation flow cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_map_to_kinds() {
        assert_eq!(ProgramErrorKind::from_code(311), ProgramErrorKind::SoldOut);
        assert_eq!(ProgramErrorKind::from_code(309), ProgramErrorKind::InsufficientFunds);
        assert_eq!(ProgramErrorKind::from_code(312), ProgramErrorKind::NotLiveYet);
        assert_eq!(ProgramErrorKind::from_code(6000), ProgramErrorKind::Unknown(6000));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(MintFailure::OnChain(ProgramErrorKind::SoldOut).user_message(), "SOLD OUT!");
        assert_eq!(
            MintFailure::OnChain(ProgramErrorKind::Unknown(1)).user_message(),
            MintFailure::GENERIC_MESSAGE
        );
        assert!(MintFailure::ConfirmationTimeout.user_message().contains("check your wallet"));
        assert!(MintFailure::OnChain(ProgramErrorKind::SoldOut).requires_resync());
        assert!(!MintFailure::ConfirmationTimeout.requires_resync());
        assert!(!MintFailure::Busy.is_user_visible());

        let landed_with_error = MintFailure::OnChain(ProgramErrorKind::Transaction);
        assert_eq!(landed_with_error.user_message(), MintFailure::GENERIC_MESSAGE);
        assert!(landed_with_error.is_user_visible());
        assert!(!landed_with_error.requires_resync());
        assert_eq!(landed_with_error.metric_label(), "transaction_error");
    }

    #[test]
    fn test_submit_error_carries_code() {
        let err = LedgerError::Submit { message: "custom program error: 0x137".into(), code: Some(0x137) };
        assert_eq!(err.program_code(), Some(311));
        assert_eq!(LedgerError::Rpc("down".into()).program_code(), None);
    }
}
