use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tally_chain::ChainClientConfig;
use tally_directory::DirectoryConfig;
use tally_dispute::DisputeConfig;
use tally_reputation::ReputationConfig;
use tally_settlement::{AmountPolicy, VerifierConfig};
use tally_types::{Address, TokenAmount};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub chain: ChainSettings,
    pub settlement: SettlementSettings,
    pub directory: DirectorySettings,
    pub reputation: ReputationSettings,
    pub dispute: DisputeSettings,
    pub api: ApiSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// EVM JSON-RPC endpoint.
    pub rpc_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Stablecoin contract address for this network. Deployment-specific;
    /// the zero default refuses to verify token transfers until set.
    pub stablecoin: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementSettings {
    /// `strict` rejects amount mismatches; `lenient` settles at the
    /// on-chain amount with a warning. Strict is the shipped default.
    pub amount_policy: AmountPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    /// Platform default price in base units, applied when a request names
    /// no agent.
    pub default_price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationSettings {
    pub feedback_weight: f64,
    pub attestation_weight: f64,
    pub dispute_penalty: f64,
    pub prior_score: f64,
    pub prior_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisputeSettings {
    /// Distinct validator votes required to resolve a dispute.
    pub quorum_votes: u32,
    /// Stake forfeited on a lost dispute, in base units.
    pub slash_amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "tally-node".to_string(),
        }
    }
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            timeout_secs: 10,
            stablecoin: Address::ZERO,
        }
    }
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            amount_policy: AmountPolicy::Strict,
        }
    }
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            // 0.01 tokens at 6 decimals.
            default_price: 10_000,
        }
    }
}

impl Default for ReputationSettings {
    fn default() -> Self {
        let defaults = ReputationConfig::default();
        Self {
            feedback_weight: defaults.feedback_weight,
            attestation_weight: defaults.attestation_weight,
            dispute_penalty: defaults.dispute_penalty,
            prior_score: defaults.prior_score,
            prior_weight: defaults.prior_weight,
        }
    }
}

impl Default for DisputeSettings {
    fn default() -> Self {
        Self {
            quorum_votes: 3,
            // 0.5 tokens at 6 decimals.
            slash_amount: 500_000,
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings::default(),
            chain: ChainSettings::default(),
            settlement: SettlementSettings::default(),
            directory: DirectorySettings::default(),
            reputation: ReputationSettings::default(),
            dispute: DisputeSettings::default(),
            api: ApiSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file, falling back to defaults when no
    /// path is given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Environment overrides for the deployment-sensitive fields.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var("TALLY_RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Ok(stablecoin) = env::var("TALLY_STABLECOIN") {
            self.chain.stablecoin = Address::from_hex(&stablecoin)
                .context("parsing TALLY_STABLECOIN")?;
        }
        if let Ok(port) = env::var("TALLY_API_PORT") {
            self.api.port = port.parse().context("parsing TALLY_API_PORT")?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }
}

impl From<&ChainSettings> for ChainClientConfig {
    fn from(settings: &ChainSettings) -> Self {
        Self {
            endpoint_url: settings.rpc_url.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

impl ChainSettings {
    pub fn verifier_config(&self, policy: AmountPolicy) -> VerifierConfig {
        VerifierConfig {
            stablecoin: self.stablecoin,
            amount_policy: policy,
        }
    }
}

impl From<&DirectorySettings> for DirectoryConfig {
    fn from(settings: &DirectorySettings) -> Self {
        Self {
            default_price: TokenAmount::from_base_units(u128::from(settings.default_price)),
        }
    }
}

impl From<&ReputationSettings> for ReputationConfig {
    fn from(settings: &ReputationSettings) -> Self {
        Self {
            feedback_weight: settings.feedback_weight,
            attestation_weight: settings.attestation_weight,
            dispute_penalty: settings.dispute_penalty,
            prior_score: settings.prior_score,
            prior_weight: settings.prior_weight,
        }
    }
}

impl From<&DisputeSettings> for DisputeConfig {
    fn from(settings: &DisputeSettings) -> Self {
        Self {
            quorum_votes: settings.quorum_votes,
            slash_amount: TokenAmount::from_base_units(u128::from(settings.slash_amount)),
        }
    }
}
