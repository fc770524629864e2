//! Mint-request orchestration for candy machine v2 sales: state sync into a
//! local view, countdown and attestation gates, and single-flight minting with
//! optimistic reconciliation.

pub mod attestation;
pub mod candy_machine;
pub mod config;
pub mod countdown;
pub mod error;
pub mod explorer;
pub mod gatekeeper;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod session;
pub mod synchronizer;
pub mod view_model;

#[cfg(test)]
pub(crate) mod test_support;

pub use attestation::{AttestationProvider, AttestationStatus, GatewayTokenAttestation};
pub use config::Config;
pub use countdown::CountdownGate;
pub use error::{AttestationError, LedgerError, MintFailure, ProgramErrorKind, SyncError};
pub use gatekeeper::{GateCommand, GateInput, GateState, GatekeeperGate};
pub use ledger::{LedgerClient, RpcLedgerClient, WalletSigner};
pub use metrics::MintMetrics;
pub use notify::{MintEvent, Notification, Severity};
pub use orchestrator::{MintOrchestrator, MintReceipt};
pub use session::{IdentityKey, MintSession, SessionSettings};
pub use synchronizer::{PaymentUnits, Synchronizer};
pub use view_model::{SalePhase, SupplyCounters, ViewModel};
