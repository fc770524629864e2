use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    MainnetBeta,
    Devnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainnetBeta => "mainnet-beta",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::MainnetBeta)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Self::MainnetBeta),
            "devnet" => Ok(Self::Devnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Builds block-explorer links for the configured network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerLinks {
    host: String,
    network: Network,
}

impl ExplorerLinks {
    pub fn new(host: impl Into<String>, network: Network) -> Self {
        Self { host: host.into(), network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn address(&self, id: &Pubkey) -> String {
        let base = format!("https://{}/address/{}", self.host, id);
        if self.network.is_production() {
            base
        } else {
            format!("{base}?cluster={}", self.network)
        }
    }
}
