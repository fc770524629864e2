use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::{path::Path, str::FromStr, time::Duration};

use crate::explorer::{ExplorerLinks, Network};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    pub mint: MintConfig,
    pub wallet: WalletConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintConfig {
    /// Base58 address of the candy machine account.
    pub candy_machine_id: String,
    pub network: Network,
    #[serde(default = "default_tx_timeout_ms")]
    pub tx_timeout_ms: u64,
    /// Decimals of the SPL payment token, when the machine charges in one.
    #[serde(default = "default_spl_decimals")]
    pub spl_token_decimals: u32,
    #[serde(default = "default_spl_label")]
    pub spl_token_label: String,
    /// Network fee deducted locally after a native-currency mint.
    #[serde(default = "default_fee_estimate")]
    pub fee_estimate_sol: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_tx_timeout_ms() -> u64 {
    30_000
}

fn default_spl_decimals() -> u32 {
    9
}

fn default_spl_label() -> String {
    "TOKEN".to_string()
}

fn default_fee_estimate() -> Decimal {
    dec!(0.012)
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self { host: "explorer.solana.com".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "candy_mint_client=info".to_string(), json_format: false }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                url: "https://api.devnet.solana.com".to_string(),
                commitment: default_commitment(),
            },
            mint: MintConfig {
                candy_machine_id: String::new(),
                network: Network::Devnet,
                tx_timeout_ms: default_tx_timeout_ms(),
                spl_token_decimals: default_spl_decimals(),
                spl_token_label: default_spl_label(),
                fee_estimate_sol: default_fee_estimate(),
            },
            wallet: WalletConfig { keypair_path: "~/.config/solana/id.json".to_string() },
            explorer: ExplorerConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content).map_err(|e| anyhow!("Failed to parse config: {}", e))
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// File (if given) then environment overrides, then validation.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SOLANA_RPC_HOST") {
            self.rpc.url = url;
        }
        if let Ok(id) = std::env::var("CANDY_MACHINE_ID") {
            self.mint.candy_machine_id = id;
        }
        if let Ok(network) = std::env::var("SOLANA_NETWORK") {
            self.mint.network = network.parse().map_err(|e| anyhow!("Invalid SOLANA_NETWORK: {}", e))?;
        }
        if let Ok(timeout) = std::env::var("TX_TIMEOUT_MS") {
            self.mint.tx_timeout_ms =
                timeout.parse().map_err(|e| anyhow!("Invalid TX_TIMEOUT_MS: {}", e))?;
        }
        if let Ok(decimals) = std::env::var("SPL_TOKEN_DECIMALS") {
            self.mint.spl_token_decimals =
                decimals.parse().map_err(|e| anyhow!("Invalid SPL_TOKEN_DECIMALS: {}", e))?;
        }
        if let Ok(label) = std::env::var("SPL_TOKEN_NAME") {
            self.mint.spl_token_label = label;
        }
        if let Ok(path) = std::env::var("WALLET_KEYPAIR") {
            self.wallet.keypair_path = path;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc.url.is_empty() {
            return Err(anyhow!("RPC URL cannot be empty"));
        }
        self.commitment()?;
        self.candy_machine_id()?;
        if self.mint.tx_timeout_ms == 0 {
            return Err(anyhow!("Transaction timeout must be positive"));
        }
        // rust_decimal holds at most 28 fractional digits
        if self.mint.spl_token_decimals > 28 {
            return Err(anyhow!("SPL token decimals must be at most 28"));
        }
        if self.mint.fee_estimate_sol.is_sign_negative() {
            return Err(anyhow!("Fee estimate cannot be negative"));
        }
        if self.explorer.host.is_empty() {
            return Err(anyhow!("Explorer host cannot be empty"));
        }
        Ok(())
    }

    pub fn candy_machine_id(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.mint.candy_machine_id)
            .map_err(|e| anyhow!("Invalid candy machine id {:?}: {}", self.mint.candy_machine_id, e))
    }

    pub fn commitment(&self) -> Result<CommitmentConfig> {
        CommitmentConfig::from_str(&self.rpc.commitment)
            .map_err(|e| anyhow!("Invalid commitment {:?}: {}", self.rpc.commitment, e))
    }

    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.mint.tx_timeout_ms)
    }

    pub fn explorer_links(&self) -> ExplorerLinks {
        ExplorerLinks::new(self.explorer.host.clone(), self.mint.network)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;
        std::fs::write(path, content).map_err(|e| anyhow!("Failed to write config file: {}", e))
    }
}
