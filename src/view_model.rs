use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use crate::candy_machine::ProgramState;

/// Supply counters. Constructors and mutators keep
/// `redeemed + remaining == available`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupplyCounters {
    available: u64,
    remaining: u64,
    redeemed: u64,
}

impl SupplyCounters {
    /// `redeemed` past `available` is treated as fully sold.
    pub fn new(available: u64, redeemed: u64) -> Self {
        let available = available.max(redeemed);
        Self { available, remaining: available - redeemed, redeemed }
    }

    /// Accepts a remote triple only if it is self-consistent.
    pub fn from_parts(available: u64, redeemed: u64, remaining: u64) -> Option<Self> {
        (redeemed.checked_add(remaining) == Some(available))
            .then_some(Self { available, remaining, redeemed })
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn redeemed(&self) -> u64 {
        self.redeemed
    }

    pub fn is_sold_out(&self) -> bool {
        self.remaining == 0
    }

    /// Moves one item from remaining to redeemed. False when nothing is left.
    pub fn record_mint(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.redeemed += 1;
        true
    }

    pub fn minted_percent(&self) -> u8 {
        if self.available == 0 {
            return 0;
        }
        ((self.redeemed as u128 * 100) / self.available as u128) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalePhase {
    NotStarted,
    Presale,
    Live,
    SoldOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistView {
    pub enabled: bool,
    pub token_balance: Decimal,
    pub burn_on_use: bool,
    pub presale_only: bool,
}

impl WhitelistView {
    pub fn has_balance(&self) -> bool {
        self.enabled && self.token_balance > Decimal::ZERO
    }
}

/// Sale flags as evaluated by the program-state decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramFlags {
    pub is_active: bool,
    pub is_presale: bool,
    pub is_sold_out: bool,
}

/// Everything one sync pass produces. Applied to the view in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub program: Arc<ProgramState>,
    pub supply: SupplyCounters,
    pub flags: ProgramFlags,
    pub price: Decimal,
    pub whitelist_price: Decimal,
    pub pay_with_alternate_token: bool,
    pub price_unit_label: String,
    pub whitelist: Option<WhitelistView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintButton {
    pub label: &'static str,
    pub disabled: bool,
}

/// Local mirror of the candy machine plus derived UI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub wallet_connected: bool,
    pub program: Option<Arc<ProgramState>>,
    pub supply: SupplyCounters,
    pub flags: ProgramFlags,
    pub price: Decimal,
    pub whitelist_price: Decimal,
    pub pay_with_alternate_token: bool,
    pub price_unit_label: String,
    pub whitelist: Option<WhitelistView>,
    pub wallet_balance: Option<Decimal>,
    pub explorer_link: Option<String>,
    /// Set once by the countdown gate, never cleared.
    countdown_unlocked: bool,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            wallet_connected: false,
            program: None,
            supply: SupplyCounters::default(),
            flags: ProgramFlags::default(),
            price: Decimal::ZERO,
            whitelist_price: Decimal::ZERO,
            pay_with_alternate_token: false,
            price_unit_label: "SOL".to_string(),
            whitelist: None,
            wallet_balance: None,
            explorer_link: None,
            countdown_unlocked: false,
        }
    }
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty view for a freshly connected wallet.
    pub fn connected() -> Self {
        Self { wallet_connected: true, ..Self::default() }
    }

    pub fn is_loaded(&self) -> bool {
        self.program.is_some()
    }

    pub fn go_live_date(&self) -> Option<i64> {
        self.program.as_ref().and_then(|p| p.go_live_date)
    }

    pub fn gatekeeper_required(&self) -> bool {
        self.program.as_ref().map_or(false, |p| p.gatekeeper.is_some())
    }

    pub fn whitelist_enabled(&self) -> bool {
        self.whitelist.as_ref().map_or(false, |wl| wl.enabled)
    }

    pub fn whitelist_balance(&self) -> Decimal {
        self.whitelist
            .as_ref()
            .filter(|wl| wl.enabled)
            .map_or(Decimal::ZERO, |wl| wl.token_balance)
    }

    /// True once the countdown completed or the wallet holds whitelist tokens.
    pub fn show_mint_action(&self) -> bool {
        self.countdown_unlocked || self.whitelist.as_ref().map_or(false, WhitelistView::has_balance)
    }

    pub fn countdown_unlocked(&self) -> bool {
        self.countdown_unlocked
    }

    pub fn unlock_countdown(&mut self) {
        self.countdown_unlocked = true;
    }

    pub fn sale_phase(&self) -> SalePhase {
        if !self.is_loaded() {
            SalePhase::NotStarted
        } else if self.flags.is_sold_out || self.supply.is_sold_out() {
            SalePhase::SoldOut
        } else if self.flags.is_presale {
            SalePhase::Presale
        } else if self.flags.is_active {
            SalePhase::Live
        } else {
            SalePhase::NotStarted
        }
    }

    /// Price the wallet actually pays.
    pub fn active_price(&self) -> Decimal {
        if self.whitelist_enabled() {
            self.whitelist_price
        } else {
            self.price
        }
    }

    pub fn display_price(&self) -> String {
        let amount = if self.show_mint_action() && self.whitelist_enabled() {
            self.whitelist_price
        } else {
            self.price
        };
        format!("{} {}", amount.normalize(), self.price_unit_label)
    }

    pub fn headline(&self) -> &'static str {
        if !self.wallet_connected {
            "Connect Your Wallet"
        } else if !self.is_loaded() {
            "LOADING"
        } else {
            match self.sale_phase() {
                SalePhase::SoldOut => "SOLD OUT !",
                SalePhase::Presale => "PRESALE ACCESS !",
                SalePhase::Live => "MINT IS LIVE !",
                SalePhase::NotStarted => "COMMING SOON !",
            }
        }
    }

    /// Label and enablement of the mint button. `minting` is the orchestrator's
    /// in-flight flag, `verifying` is a pending attestation request.
    pub fn mint_button(&self, minting: bool, verifying: bool) -> MintButton {
        let sold_out = self.sale_phase() == SalePhase::SoldOut;
        let presale = self.flags.is_presale;
        let wl_balance = self.whitelist_balance();

        let label = if sold_out {
            "SOLD OUT"
        } else if minting {
            "MINTING"
        } else if presale && wl_balance > Decimal::ZERO {
            "PRESALE MINT"
        } else if verifying && self.gatekeeper_required() {
            "VERIFYING"
        } else if self.flags.is_active {
            "MINT"
        } else {
            "WAIT"
        };

        let disabled = !self.wallet_connected
            || !self.is_loaded()
            || verifying
            || sold_out
            || minting
            || !self.flags.is_active
            || (presale && wl_balance.is_zero());

        MintButton { label, disabled }
    }

    /// Replaces every remote-derived field at once.
    pub fn apply_snapshot(&mut self, snapshot: SyncSnapshot) {
        self.program = Some(snapshot.program);
        self.supply = snapshot.supply;
        self.flags = snapshot.flags;
        self.price = snapshot.price;
        self.whitelist_price = snapshot.whitelist_price;
        self.pay_with_alternate_token = snapshot.pay_with_alternate_token;
        self.price_unit_label = snapshot.price_unit_label;
        self.whitelist = snapshot.whitelist;
    }

    /// Drops everything tied to the previous wallet/program identity.
    pub fn reset_identity(&mut self, wallet_connected: bool) {
        let countdown_unlocked = self.countdown_unlocked;
        *self = Self { wallet_connected, countdown_unlocked, ..Self::default() };
    }

    /// Local approximation of a successful mint until the next sync.
    pub fn reconcile_successful_mint(&mut self, explorer_link: String, fee_estimate: Decimal) {
        self.supply.record_mint();
        self.flags.is_sold_out = self.supply.is_sold_out();
        if self.flags.is_sold_out {
            self.flags.is_active = false;
        }

        if let Some(wl) = self.whitelist.as_mut().filter(|wl| wl.has_balance()) {
            wl.token_balance -= Decimal::ONE;
        }

        if !self.pay_with_alternate_token {
            if let Some(balance) = self.wallet_balance.filter(|b| *b > Decimal::ZERO) {
                let spent = self.active_price() + fee_estimate;
                self.wallet_balance = Some((balance - spent).max(Decimal::ZERO));
            }
        }

        self.explorer_link = Some(explorer_link);
    }

    pub fn program_id(&self) -> Option<Pubkey> {
        self.program.as_ref().map(|p| p.id)
    }
}
