//! Registry configuration: target contract, required network and logging.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ConfigError;
use crate::logging::LogConfig;
use crate::types::{Address, ChainId, TxHash};

/// Address of the deployed registry on Sepolia.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xA2DD8Fe6933120bF47B2130A46010519C1ef5460";

fn default_poll_interval_ms() -> u64 { 4_000 }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything a wallet needs to register the required chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
    pub native_currency: NativeCurrency,
}

impl NetworkDescriptor {
    pub fn sepolia() -> Self {
        Self {
            chain_id: ChainId(11_155_111),
            chain_name: "Sepolia".to_string(),
            rpc_urls: vec!["https://sepolia.infura.io/v3/".to_string()],
            block_explorer_urls: vec!["https://sepolia.etherscan.io".to_string()],
            native_currency: NativeCurrency {
                name: "Sepolia Ether".to_string(),
                symbol: "SEP".to_string(),
                decimals: 18,
            },
        }
    }

    pub fn chain_id_hex(&self) -> String { self.chain_id.to_hex_quantity() }

    /// Parameters for `wallet_addEthereumChain` (EIP-3085).
    pub fn to_add_chain_params(&self) -> serde_json::Value {
        json!({
            "chainId": self.chain_id_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.block_explorer_urls,
        })
    }

    /// Explorer page for a transaction, if the network has an explorer.
    pub fn explorer_tx_url(&self, tx: &TxHash) -> Option<String> {
        self.block_explorer_urls
            .first()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), tx))
    }
}

impl Default for NetworkDescriptor {
    fn default() -> Self { Self::sepolia() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub contract_address: Address,
    #[serde(default = "default_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default)]
    pub network: NetworkDescriptor,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS
                .parse()
                .unwrap_or(Address::ZERO),
            receipt_poll_interval_ms: default_poll_interval_ms(),
            network: NetworkDescriptor::default(),
            log: LogConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Loads the configuration from `path`. A missing file yields the
    /// default configuration; a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Saves the configuration to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.contract_address == Address::ZERO {
            return Err(ConfigError::Invalid("contract_address must not be zero".into()));
        }
        if self.network.rpc_urls.is_empty() {
            return Err(ConfigError::Invalid("network.rpc_urls must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_sepolia() {
        let config = RegistryConfig::default();
        assert_eq!(config.network.chain_id, ChainId(11_155_111));
        assert_eq!(config.network.chain_id_hex(), "0xaa36a7");
        assert_eq!(
            config.contract_address.to_string().to_lowercase(),
            DEFAULT_CONTRACT_ADDRESS.to_lowercase()
        );
        assert_eq!(config.receipt_poll_interval(), Duration::from_secs(4));
    }

    #[test]
    fn test_add_chain_params_shape() {
        let params = NetworkDescriptor::sepolia().to_add_chain_params();
        assert_eq!(params["chainId"], "0xaa36a7");
        assert_eq!(params["chainName"], "Sepolia");
        assert_eq!(params["nativeCurrency"]["symbol"], "SEP");
        assert_eq!(params["nativeCurrency"]["decimals"], 18);
        assert_eq!(params["blockExplorerUrls"][0], "https://sepolia.etherscan.io");
    }

    #[test]
    fn test_explorer_tx_url() {
        let tx = TxHash::from([0x11u8; 32]);
        let url = NetworkDescriptor::sepolia().explorer_tx_url(&tx).unwrap();
        assert_eq!(url, format!("https://sepolia.etherscan.io/tx/{tx}"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RegistryConfig::from_toml_str(
            "contract_address = \"0x00000000000000000000000000000000000000aa\"\n",
        )
        .unwrap();
        assert_eq!(config.network, NetworkDescriptor::sepolia());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        let err = RegistryConfig::from_toml_str("contract_address = 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_address_is_rejected() {
        let err = RegistryConfig::from_toml_str(
            "contract_address = \"0x0000000000000000000000000000000000000000\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("registry.toml");

        let mut config = RegistryConfig::default();
        config.receipt_poll_interval_ms = 250;
        config.log.level = "debug".to_string();
        config.save(&path).unwrap();

        let loaded = RegistryConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RegistryConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, RegistryConfig::default());
    }
}
