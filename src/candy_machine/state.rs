use borsh::BorshDeserialize;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

use crate::error::LedgerError;

/// Anchor account discriminator: first 8 bytes of `sha256("account:<Name>")`.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("account:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

#[derive(BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndSettingType {
    Date,
    Amount,
}

#[derive(BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct EndSettings {
    pub end_setting_type: EndSettingType,
    pub number: u64,
}

#[derive(BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub address: Pubkey,
    pub verified: bool,
    pub share: u8,
}

#[derive(BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct HiddenSettings {
    pub name: String,
    pub uri: String,
    pub hash: [u8; 32],
}

#[derive(BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitelistMintMode {
    BurnEveryTime,
    NeverBurn,
}

#[derive(BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct WhitelistMintSettings {
    pub mode: WhitelistMintMode,
    pub mint: Pubkey,
    pub presale: bool,
    pub discount_price: Option<u64>,
}

#[derive(BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct GatekeeperConfig {
    pub gatekeeper_network: Pubkey,
    pub expire_on_use: bool,
}

#[derive(BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CandyMachineData {
    pub uuid: String,
    pub price: u64,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    pub max_supply: u64,
    pub is_mutable: bool,
    pub retain_authority: bool,
    pub go_live_date: Option<i64>,
    pub end_settings: Option<EndSettings>,
    pub creators: Vec<Creator>,
    pub hidden_settings: Option<HiddenSettings>,
    pub whitelist_mint_settings: Option<WhitelistMintSettings>,
    pub items_available: u64,
    pub gatekeeper: Option<GatekeeperConfig>,
}

/// On-chain candy machine v2 account, without the trailing config lines.
#[derive(BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CandyMachineAccount {
    pub authority: Pubkey,
    pub wallet: Pubkey,
    pub token_mint: Option<Pubkey>,
    pub items_redeemed: u64,
    pub data: CandyMachineData,
}

impl CandyMachineAccount {
    /// Decode raw account bytes. Trailing bytes (config lines) are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, LedgerError> {
        if data.len() < 8 {
            return Err(LedgerError::Decode("account shorter than discriminator".into()));
        }
        let (disc, mut body) = data.split_at(8);
        if disc != account_discriminator("CandyMachine") {
            return Err(LedgerError::Decode("not a candy machine account".into()));
        }
        Self::deserialize(&mut body).map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

/// Whitelist settings as the client needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistSettings {
    pub mint: Pubkey,
    pub burn_every_time: bool,
    pub presale: bool,
    pub discount_price: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatekeeperSettings {
    pub network: Pubkey,
    pub expire_on_use: bool,
}

/// Decoded program state with the sale flags evaluated at fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramState {
    pub id: Pubkey,
    pub authority: Pubkey,
    pub treasury: Pubkey,
    pub token_mint: Option<Pubkey>,
    pub price: u64,
    pub items_available: u64,
    pub items_redeemed: u64,
    pub items_remaining: u64,
    pub go_live_date: Option<i64>,
    pub whitelist: Option<WhitelistSettings>,
    pub gatekeeper: Option<GatekeeperSettings>,
    pub is_active: bool,
    pub is_presale: bool,
    pub is_sold_out: bool,
}

impl ProgramState {
    pub fn from_account(id: Pubkey, account: &CandyMachineAccount, now: i64) -> Self {
        let data = &account.data;
        let redeemed = account.items_redeemed;

        // An amount end-setting caps supply below items_available.
        let mut available = data.items_available;
        let mut end_reached = false;
        if let Some(end) = &data.end_settings {
            match end.end_setting_type {
                EndSettingType::Date => end_reached = (end.number as i64) <= now,
                EndSettingType::Amount => {
                    available = end.number.min(data.items_available);
                    end_reached = redeemed >= available;
                }
            }
        }
        let available = available.max(redeemed);
        let remaining = available - redeemed;
        let is_sold_out = remaining == 0;

        let is_presale = data
            .whitelist_mint_settings
            .as_ref()
            .map_or(false, |wl| wl.presale && data.go_live_date.map_or(true, |d| d > now));
        let is_live = data.go_live_date.map_or(false, |d| d <= now);
        let is_active = (is_presale || is_live) && !end_reached && !is_sold_out;

        Self {
            id,
            authority: account.authority,
            treasury: account.wallet,
            token_mint: account.token_mint,
            price: data.price,
            items_available: available,
            items_redeemed: redeemed,
            items_remaining: remaining,
            go_live_date: data.go_live_date,
            whitelist: data.whitelist_mint_settings.as_ref().map(|wl| WhitelistSettings {
                mint: wl.mint,
                burn_every_time: wl.mode == WhitelistMintMode::BurnEveryTime,
                presale: wl.presale,
                discount_price: wl.discount_price,
            }),
            gatekeeper: data.gatekeeper.as_ref().map(|g| GatekeeperSettings {
                network: g.gatekeeper_network,
                expire_on_use: g.expire_on_use,
            }),
            is_active,
            is_presale,
            is_sold_out,
        }
    }

    pub fn decode(id: Pubkey, data: &[u8], now: i64) -> Result<Self, LedgerError> {
        let account = CandyMachineAccount::decode(data)?;
        Ok(Self::from_account(id, &account, now))
    }
}
