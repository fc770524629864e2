use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    message::Message,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use spl_associated_token_account::get_associated_token_address;
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::{custom_error_code, ConfirmationStatus, LedgerClient, MintSubmission, WalletSigner};
use crate::candy_machine::{build_mint_plan, ProgramState};
use crate::error::LedgerError;

/// [`LedgerClient`] backed by a JSON-RPC node.
pub struct RpcLedgerClient {
    rpc: Arc<RpcClient>,
    commitment: CommitmentConfig,
    poll_interval: Duration,
}

impl RpcLedgerClient {
    pub fn new(url: String, commitment: CommitmentConfig) -> Self {
        Self {
            rpc: Arc::new(RpcClient::new_with_commitment(url, commitment)),
            commitment,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn rpc(&self) -> Arc<RpcClient> {
        self.rpc.clone()
    }

    async fn poll_until_final(&self, signature: &Signature) -> Result<ConfirmationStatus, LedgerError> {
        loop {
            match self.rpc.get_signature_statuses(&[*signature]).await {
                Ok(response) => {
                    if let Some(Some(status)) = response.value.first() {
                        if let Some(err) = &status.err {
                            debug!(signature = %signature, error = ?err, "transaction failed on-chain");
                            return Ok(ConfirmationStatus::rejected(custom_error_code(err)));
                        }
                        if status.satisfies_commitment(self.commitment) {
                            return Ok(ConfirmationStatus::success());
                        }
                    }
                }
                Err(e) => {
                    warn!(signature = %signature, "error checking confirmation: {}", e);
                }
            }
            sleep(self.poll_interval).await;
        }
    }
}

/// Raw token account amount in UI units.
fn parse_token_amount(amount: &str, decimals: u8) -> Result<Decimal, LedgerError> {
    let raw: u64 = amount
        .parse()
        .map_err(|e| LedgerError::BalanceFetch(format!("bad token amount {}: {}", amount, e)))?;
    Decimal::try_from_i128_with_scale(raw as i128, decimals as u32)
        .map(|balance| balance.normalize())
        .map_err(|e| LedgerError::BalanceFetch(format!("unsupported token decimals {}: {}", decimals, e)))
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn fetch_state(&self, program_id: &Pubkey) -> Result<ProgramState, LedgerError> {
        let account = self
            .rpc
            .get_account_with_commitment(program_id, self.commitment)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?
            .value
            .ok_or(LedgerError::AccountNotFound(*program_id))?;

        ProgramState::decode(*program_id, &account.data, chrono::Utc::now().timestamp())
    }

    async fn fetch_token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Decimal, LedgerError> {
        let ata = get_associated_token_address(owner, mint);
        let amount = self
            .rpc
            .get_token_account_balance(&ata)
            .await
            .map_err(|e| LedgerError::BalanceFetch(e.to_string()))?;

        parse_token_amount(&amount.amount, amount.decimals)
    }

    async fn fetch_native_balance(&self, owner: &Pubkey) -> Result<u64, LedgerError> {
        self.rpc
            .get_balance(owner)
            .await
            .map_err(|e| LedgerError::BalanceFetch(e.to_string()))
    }

    async fn build_and_submit_mint(
        &self,
        signer: &WalletSigner,
        state: &ProgramState,
    ) -> Result<MintSubmission, LedgerError> {
        let payer = signer.pubkey();
        let mint = Keypair::new();

        let rent = self
            .rpc
            .get_minimum_balance_for_rent_exemption(spl_token::state::Mint::LEN)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        let plan = build_mint_plan(state, &payer, &mint.pubkey(), rent)?;

        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        let transaction = {
            let payer_signer: &dyn Signer = signer.as_ref();
            let signers: Vec<&dyn Signer> = vec![payer_signer, &mint];
            let mut tx = Transaction::new_unsigned(Message::new(&plan.instructions, Some(&payer)));
            tx.try_sign(&signers, blockhash)
                .map_err(|e| LedgerError::Build(e.to_string()))?;
            tx
        };

        let signature = self.rpc.send_transaction(&transaction).await.map_err(|e| {
            let code = e.get_transaction_error().as_ref().and_then(custom_error_code);
            LedgerError::Submit { message: e.to_string(), code }
        })?;

        info!(signature = %signature, mint = %plan.mint, "mint transaction sent");
        Ok(MintSubmission { signature, mint: plan.mint })
    }

    async fn confirm_signature(
        &self,
        signature: &Signature,
        wait: Duration,
    ) -> Result<ConfirmationStatus, LedgerError> {
        timeout(wait, self.poll_until_final(signature))
            .await
            .map_err(|_| LedgerError::ConfirmationTimeout(*signature))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_token_amount() {
        assert_eq!(parse_token_amount("2500000", 6).unwrap(), dec!(2.5));
        assert_eq!(parse_token_amount("3", 0).unwrap(), dec!(3));
        assert!(matches!(parse_token_amount("abc", 6), Err(LedgerError::BalanceFetch(_))));
    }

    #[test]
    fn test_oversized_decimals_are_an_error() {
        assert!(matches!(parse_token_amount("1", 29), Err(LedgerError::BalanceFetch(_))));
        assert!(matches!(parse_token_amount("1", u8::MAX), Err(LedgerError::BalanceFetch(_))));
    }
}
