use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long a notification stays on screen.
pub const AUTO_DISMISS: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub auto_dismiss: Duration,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { severity: Severity::Success, message: message.into(), auto_dismiss: AUTO_DISMISS }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, message: message.into(), auto_dismiss: AUTO_DISMISS }
    }
}

/// Side effects the presentation layer reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintEvent {
    Notify(Notification),
    /// Mint landed; play the celebration.
    Celebrate { signature: Signature, mint: Pubkey },
    /// Local mirror is known stale; reload everything from the chain.
    ForceResync,
}

pub type EventSender = mpsc::UnboundedSender<MintEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<MintEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
