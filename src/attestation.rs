use async_trait::async_trait;
use borsh::BorshDeserialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::candy_machine::{gateway_token_address, GATEWAY_PROGRAM_ID};
use crate::error::AttestationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationStatus {
    Unknown,
    Requesting,
    Active,
    Error,
}

/// Human/bot verification that must hold before a gated mint is accepted.
#[async_trait]
pub trait AttestationProvider: Send + Sync {
    fn status(&self) -> AttestationStatus;

    fn subscribe(&self) -> watch::Receiver<AttestationStatus>;

    /// Starts obtaining a token. Progress is reported through [`Self::subscribe`].
    async fn request_token(&self) -> Result<(), AttestationError>;
}

#[derive(BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
enum GatewayTokenState {
    Active,
    Frozen,
    Revoked,
}

#[derive(BorshDeserialize, Debug, Clone)]
struct GatewayToken {
    _features: u8,
    _parent_gateway_token: Option<Pubkey>,
    owner_wallet: Pubkey,
    _owner_identity: Option<Pubkey>,
    gatekeeper_network: Pubkey,
    _issuing_gatekeeper: Pubkey,
    state: GatewayTokenState,
    expire_time: Option<i64>,
}

/// Status carried by a gateway token account.
pub fn gateway_token_status(data: &[u8], owner: &Pubkey, network: &Pubkey, now: i64) -> AttestationStatus {
    let token = match GatewayToken::deserialize(&mut &data[..]) {
        Ok(token) => token,
        Err(e) => {
            debug!("undecodable gateway token: {}", e);
            return AttestationStatus::Error;
        }
    };
    if token.owner_wallet != *owner || token.gatekeeper_network != *network {
        return AttestationStatus::Error;
    }
    match token.state {
        GatewayTokenState::Active if token.expire_time.map_or(true, |t| t > now) => AttestationStatus::Active,
        _ => AttestationStatus::Error,
    }
}

/// Watches the wallet's gateway token account. The token itself is issued by
/// the gatekeeper network's own flow; this provider only observes it.
pub struct GatewayTokenAttestation {
    rpc: Arc<RpcClient>,
    owner: Pubkey,
    network: Pubkey,
    poll_interval: Duration,
    status: Arc<watch::Sender<AttestationStatus>>,
    cancel: CancellationToken,
}

impl GatewayTokenAttestation {
    pub fn new(rpc: Arc<RpcClient>, owner: Pubkey, network: Pubkey, cancel: CancellationToken) -> Self {
        let (status, _) = watch::channel(AttestationStatus::Unknown);
        Self {
            rpc,
            owner,
            network,
            poll_interval: Duration::from_secs(2),
            status: Arc::new(status),
            cancel,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// One-shot lookup, used on mount to pick up a token from an earlier session.
    pub async fn refresh(&self) -> Result<AttestationStatus, AttestationError> {
        let status = check_token(&self.rpc, &self.owner, &self.network).await?;
        if status != AttestationStatus::Unknown {
            self.status.send_replace(status);
        }
        Ok(status)
    }
}

async fn check_token(
    rpc: &RpcClient,
    owner: &Pubkey,
    network: &Pubkey,
) -> Result<AttestationStatus, AttestationError> {
    let address = gateway_token_address(owner, network);
    let account = rpc
        .get_account_with_commitment(&address, CommitmentConfig::confirmed())
        .await
        .map_err(|e| AttestationError::Request(e.to_string()))?
        .value;

    Ok(match account {
        None => AttestationStatus::Unknown,
        Some(account) if account.owner != GATEWAY_PROGRAM_ID => AttestationStatus::Error,
        Some(account) => gateway_token_status(&account.data, owner, network, chrono::Utc::now().timestamp()),
    })
}

#[async_trait]
impl AttestationProvider for GatewayTokenAttestation {
    fn status(&self) -> AttestationStatus {
        *self.status.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<AttestationStatus> {
        self.status.subscribe()
    }

    async fn request_token(&self) -> Result<(), AttestationError> {
        if self.cancel.is_cancelled() {
            return Err(AttestationError::Cancelled);
        }
        if self.status() == AttestationStatus::Active {
            return Ok(());
        }
        self.status.send_replace(AttestationStatus::Requesting);
        info!(owner = %self.owner, network = %self.network, "waiting for gateway token");

        let rpc = self.rpc.clone();
        let status = self.status.clone();
        let cancel = self.cancel.clone();
        let (owner, network, poll_interval) = (self.owner, self.network, self.poll_interval);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(owner = %owner, "gateway token watch cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }
                match check_token(&rpc, &owner, &network).await {
                    Ok(AttestationStatus::Unknown) => continue,
                    Ok(next) => {
                        status.send_replace(next);
                        break;
                    }
                    Err(e) => warn!(owner = %owner, "gateway token lookup failed: {}", e),
                }
            }
        });
        Ok(())
    }
}
