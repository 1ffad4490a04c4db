//! Keeper configuration

use alloy_primitives::utils::{format_ether, parse_ether};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use curve_ledger::CurveParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Admin of the factory and default admin of deployed tokens
    pub admin: Address,

    /// Address the factory derives token addresses from
    pub factory: Address,

    /// Upper bound on a single settlement call (transfer or pool hand-off)
    pub settlement_deadline_ms: u64,

    /// Status log interval in seconds
    pub status_interval_secs: u64,

    /// Per-token command queue depth
    pub command_queue_capacity: usize,

    pub curve: CurveSection,

    pub simulation: SimulationConfig,
}

/// Curve constants with amounts as decimal ether strings ("1.6")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSection {
    pub total_supply: String,
    pub initial_virtual_token_reserve: String,
    pub initial_virtual_eth_reserve: String,
    pub migration_threshold: String,
    pub migration_fee: String,
    pub min_purchase: String,
    pub max_purchase: String,
    pub price_impact_limit: u64,
    pub rate_limit_interval: u64,
    pub max_actions_in_interval: u32,
    pub trade_fee_bps: u64,
}

/// Knobs for the in-process settlement stand-in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub transfer_latency_ms: u64,
    pub pool_latency_ms: u64,
    #[serde(default)]
    pub failing_recipients: Vec<Address>,
    #[serde(default)]
    pub fail_pool: bool,
}

impl CurveSection {
    pub fn from_params(p: &CurveParams) -> Self {
        Self {
            total_supply: format_ether(p.total_supply),
            initial_virtual_token_reserve: format_ether(p.initial_virtual_token_reserve),
            initial_virtual_eth_reserve: format_ether(p.initial_virtual_eth_reserve),
            migration_threshold: format_ether(p.migration_threshold),
            migration_fee: format_ether(p.migration_fee),
            min_purchase: format_ether(p.min_purchase),
            max_purchase: format_ether(p.max_purchase),
            price_impact_limit: p.price_impact_limit,
            rate_limit_interval: p.rate_limit_interval,
            max_actions_in_interval: p.max_actions_in_interval,
            trade_fee_bps: p.trade_fee_bps,
        }
    }

    /// Parse and validate
    pub fn to_params(&self) -> Result<CurveParams> {
        let amount = |field: &str, value: &str| {
            parse_ether(value).with_context(|| format!("Invalid {} amount: {:?}", field, value))
        };

        let params = CurveParams {
            total_supply: amount("total_supply", &self.total_supply)?,
            initial_virtual_token_reserve: amount(
                "initial_virtual_token_reserve",
                &self.initial_virtual_token_reserve,
            )?,
            initial_virtual_eth_reserve: amount("initial_virtual_eth_reserve", &self.initial_virtual_eth_reserve)?,
            migration_threshold: amount("migration_threshold", &self.migration_threshold)?,
            migration_fee: amount("migration_fee", &self.migration_fee)?,
            min_purchase: amount("min_purchase", &self.min_purchase)?,
            max_purchase: amount("max_purchase", &self.max_purchase)?,
            price_impact_limit: self.price_impact_limit,
            rate_limit_interval: self.rate_limit_interval,
            max_actions_in_interval: self.max_actions_in_interval,
            trade_fee_bps: self.trade_fee_bps,
        };
        params.validate().context("Invalid curve parameters")?;
        Ok(params)
    }
}

impl KeeperConfig {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CURVE_KEEPER_CONFIG").unwrap_or_else(|_| "curve-keeper.toml".to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let config_str = std::fs::read_to_string(expanded.as_ref())
            .context(format!("Failed to read config file: {}", path))?;

        let config: KeeperConfig = toml::from_str(&config_str).context("Failed to parse config TOML")?;
        config.curve.to_params()?;

        Ok(config)
    }

    /// Local defaults: deployed-contract curve constants, instant settlement
    pub fn default_local() -> Self {
        Self {
            admin: Address::repeat_byte(0xad),
            factory: Address::repeat_byte(0xfa),
            settlement_deadline_ms: 5_000,
            status_interval_secs: 30,
            command_queue_capacity: 256,
            curve: CurveSection::from_params(&CurveParams::default()),
            simulation: SimulationConfig::default(),
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_local();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        let expanded = shellexpand::tilde(path);
        std::fs::write(expanded.as_ref(), toml_str).context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }

    pub fn settlement_deadline(&self) -> Duration {
        Duration::from_millis(self.settlement_deadline_ms)
    }

    pub fn curve_params(&self) -> Result<CurveParams> {
        self.curve.to_params()
    }
}
