use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::candy_machine::ProgramState;
use crate::error::SyncError;
use crate::ledger::LedgerClient;
use crate::metrics::MintMetrics;
use crate::view_model::{ProgramFlags, SupplyCounters, SyncSnapshot, WhitelistView};

const NATIVE_DECIMALS: u32 = 9;

/// Display units for prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUnits {
    pub native_label: String,
    /// Decimals of the alternate payment token.
    pub token_decimals: u32,
    pub token_label: String,
}

impl Default for PaymentUnits {
    fn default() -> Self {
        Self { native_label: "SOL".into(), token_decimals: 9, token_label: "TOKEN".into() }
    }
}

impl PaymentUnits {
    fn for_state(&self, state: &ProgramState) -> (u32, &str) {
        match state.token_mint {
            Some(_) => (self.token_decimals, &self.token_label),
            None => (NATIVE_DECIMALS, &self.native_label),
        }
    }
}

/// Largest scale a `Decimal` can carry.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Raw integer amount scaled down by `10^decimals`. Digits beyond the
/// representable scale are truncated.
pub fn to_ui_amount(raw: u64, decimals: u32) -> Decimal {
    if let Ok(amount) = Decimal::try_from_i128_with_scale(raw as i128, decimals) {
        return amount.normalize();
    }
    let truncated = 10u64
        .checked_pow(decimals.saturating_sub(MAX_DECIMAL_SCALE))
        .map_or(0, |divisor| raw / divisor);
    Decimal::from_i128_with_scale(truncated as i128, MAX_DECIMAL_SCALE).normalize()
}

pub fn lamports_to_sol(lamports: u64) -> Decimal {
    to_ui_amount(lamports, NATIVE_DECIMALS)
}

/// Derives every view field from one fetched state. `whitelist_balance` is
/// ignored when the program has no whitelist.
pub fn build_snapshot(
    state: Arc<ProgramState>,
    whitelist_balance: Decimal,
    units: &PaymentUnits,
) -> SyncSnapshot {
    let (decimals, label) = units.for_state(&state);
    let price = to_ui_amount(state.price, decimals);

    let whitelist_price = state
        .whitelist
        .as_ref()
        .and_then(|wl| wl.discount_price)
        .filter(|discount| *discount != state.price)
        .map_or(price, |discount| to_ui_amount(discount, decimals));

    let whitelist = state.whitelist.as_ref().map(|wl| WhitelistView {
        enabled: true,
        token_balance: whitelist_balance,
        burn_on_use: wl.burn_every_time,
        presale_only: wl.presale,
    });

    SyncSnapshot {
        supply: SupplyCounters::new(state.items_available, state.items_redeemed),
        flags: ProgramFlags {
            is_active: state.is_active,
            is_presale: state.is_presale,
            is_sold_out: state.is_sold_out,
        },
        price,
        whitelist_price,
        pay_with_alternate_token: state.token_mint.is_some(),
        price_unit_label: label.to_string(),
        whitelist,
        program: state,
    }
}

/// Pulls remote state and turns it into view snapshots.
pub struct Synchronizer {
    ledger: Arc<dyn LedgerClient>,
    units: PaymentUnits,
    metrics: MintMetrics,
}

impl Synchronizer {
    pub fn new(ledger: Arc<dyn LedgerClient>, units: PaymentUnits, metrics: MintMetrics) -> Self {
        Self { ledger, units, metrics }
    }

    /// `Ok(None)` without a wallet. Errors leave the caller's view untouched.
    pub async fn sync(
        &self,
        wallet: Option<&Pubkey>,
        program_id: &Pubkey,
    ) -> Result<Option<SyncSnapshot>, SyncError> {
        let Some(wallet) = wallet else {
            debug!("no wallet connected, skipping sync");
            return Ok(None);
        };

        let state = match self.ledger.fetch_state(program_id).await {
            Ok(state) => state,
            Err(e) => {
                self.metrics.sync_failures_total.inc();
                error!(program = %program_id, "failed to fetch program state: {}", e);
                return Err(SyncError::ProgramState { program: *program_id, source: e });
            }
        };

        let mut whitelist_balance = Decimal::ZERO;
        if let Some(wl) = &state.whitelist {
            match self.ledger.fetch_token_balance(wallet, &wl.mint).await {
                Ok(balance) => whitelist_balance = balance,
                Err(e) => {
                    warn!(wallet = %wallet, mint = %wl.mint, "whitelist balance unavailable, using 0: {}", e);
                }
            }
        }

        self.metrics.sync_total.inc();
        debug!(
            program = %program_id,
            redeemed = state.items_redeemed,
            available = state.items_available,
            active = state.is_active,
            "program state synced"
        );
        Ok(Some(build_snapshot(Arc::new(state), whitelist_balance, &self.units)))
    }

    /// Native wallet balance in SOL.
    pub async fn fetch_wallet_balance(&self, wallet: &Pubkey) -> Result<Decimal, SyncError> {
        self.ledger
            .fetch_native_balance(wallet)
            .await
            .map(lamports_to_sol)
            .map_err(|e| {
                warn!(wallet = %wallet, "failed to fetch wallet balance: {}", e);
                SyncError::WalletBalance { wallet: *wallet, source: e }
            })
    }
}
