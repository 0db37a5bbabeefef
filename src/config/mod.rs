use crate::catalog::{AssetCatalog, AssetKind, TokenInfo};
use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::{MonitorConfig, ProtocolPrograms, Registry, program_ids};
use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Prefix of environment overrides, e.g. `HYLO__PROGRAMS__EXCHANGE`.
pub const ENV_PREFIX: &str = "HYLO";

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawConfig {
    #[serde(default)]
    rpc: RawRpcConfig,
    #[serde(default)]
    programs: RawProgramsConfig,
    #[serde(default)]
    tokens: RawTokensConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawRpcConfig {
    endpoint: String,
    #[serde(default)]
    use_confirmed_commitment: Option<bool>,
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    concurrency: Option<usize>,
}

impl Default for RawRpcConfig {
    fn default() -> Self {
        let defaults = MonitorConfig::default();
        Self {
            endpoint: defaults.rpc_endpoint,
            use_confirmed_commitment: Some(defaults.use_confirmed_commitment),
            max_retries: Some(defaults.max_retries),
            concurrency: Some(defaults.concurrency),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawProgramsConfig {
    exchange: String,
    stability_pool: String,
}

impl Default for RawProgramsConfig {
    fn default() -> Self {
        Self {
            exchange: program_ids::EXCHANGE.to_string(),
            stability_pool: program_ids::STABILITY_POOL.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawTokensConfig {
    stable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stable_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stable_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stable_decimals: Option<u8>,

    staked_stable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    staked_stable_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    staked_stable_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    staked_stable_decimals: Option<u8>,

    leveraged: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    leveraged_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    leveraged_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    leveraged_decimals: Option<u8>,

    #[serde(default = "default_extra_tokens")]
    extra: Vec<RawTokenEntry>,
}

impl Default for RawTokensConfig {
    fn default() -> Self {
        Self {
            stable: program_ids::HYUSD_MINT.to_string(),
            stable_symbol: None,
            stable_name: None,
            stable_decimals: None,
            staked_stable: program_ids::SHYUSD_MINT.to_string(),
            staked_stable_symbol: None,
            staked_stable_name: None,
            staked_stable_decimals: None,
            leveraged: program_ids::XSOL_MINT.to_string(),
            leveraged_symbol: None,
            leveraged_name: None,
            leveraged_decimals: None,
            extra: default_extra_tokens(),
        }
    }
}

/// Registry entry of a protocol token; unset fields keep the mainnet values.
fn protocol_token(
    mint: &str,
    symbol: Option<String>,
    name: Option<String>,
    decimals: Option<u8>,
    defaults: (&str, &str, u8),
    kind: AssetKind,
) -> MonitorResult<TokenInfo> {
    let (default_symbol, default_name, default_decimals) = defaults;
    let symbol = symbol.unwrap_or_else(|| default_symbol.to_string());
    if symbol.trim().is_empty() {
        return Err(MonitorError::ConfigError(format!("Empty symbol for {} token", kind)));
    }

    Ok(TokenInfo {
        mint: parse_pubkey(mint, &symbol)?,
        name: name.unwrap_or_else(|| default_name.to_string()),
        symbol,
        decimals: decimals.unwrap_or(default_decimals),
        kind,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTokenEntry {
    mint: String,
    symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    decimals: u8,
    kind: AssetKind,
}

impl RawTokenEntry {
    fn new(mint: &str, symbol: &str, name: &str, decimals: u8, kind: AssetKind) -> Self {
        Self {
            mint: mint.to_string(),
            symbol: symbol.to_string(),
            name: Some(name.to_string()),
            decimals,
            kind,
        }
    }
}

/// Non-protocol assets that show up on the other side of trades.
fn default_extra_tokens() -> Vec<RawTokenEntry> {
    vec![
        RawTokenEntry::new(program_ids::USDC_MINT, "USDC", "USD Coin", 6, AssetKind::ReferenceStable),
        RawTokenEntry::new(program_ids::USDT_MINT, "USDT", "Tether USD", 6, AssetKind::ReferenceStable),
        RawTokenEntry::new(program_ids::JITOSOL_MINT, "JitoSOL", "Jito Staked SOL", 9, AssetKind::LiquidStakingToken),
        RawTokenEntry::new(program_ids::MSOL_MINT, "mSOL", "Marinade Staked SOL", 9, AssetKind::LiquidStakingToken),
        RawTokenEntry::new(program_ids::BSOL_MINT, "bSOL", "BlazeStake Staked SOL", 9, AssetKind::LiquidStakingToken),
        RawTokenEntry::new(program_ids::WSOL_MINT, "WSOL", "Wrapped SOL", 9, AssetKind::NativeUnit),
    ]
}

#[derive(Debug, Serialize, Deserialize)]
struct LoggingConfig {
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Fully validated settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub registry: Registry,
    /// Logging level: trace, debug, info, warn, error
    pub log_level: String,
}

/// Load configuration from a TOML file, then apply `HYLO__*` environment overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> MonitorResult<AppConfig> {
    load_with_env(path.as_ref(), None)
}

/// `env` replaces the process environment when set.
fn load_with_env(path: &Path, env: Option<Map<String, String>>) -> MonitorResult<AppConfig> {
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .source(env),
        )
        .build()
        .map_err(|e| MonitorError::ConfigError(format!("Failed to load config: {}", e)))?;

    let raw: RawConfig = config
        .try_deserialize()
        .map_err(|e| MonitorError::ConfigError(format!("Failed to parse config: {}", e)))?;

    resolve(raw)
}

impl AppConfig {
    /// Log the effective settings. Call once a subscriber is installed.
    pub fn log_summary(&self) {
        info!("RPC endpoint: {}", self.monitor.rpc_endpoint);
        info!("Exchange program: {}", self.registry.programs.exchange);
        info!(
            "Tracking {} ({} registry entries)",
            self.registry.catalog.leveraged().symbol,
            self.registry.catalog.len()
        );
    }
}

fn parse_pubkey(value: &str, what: &str) -> MonitorResult<Pubkey> {
    Pubkey::from_str(value.trim())
        .map_err(|e| MonitorError::ConfigError(format!("Invalid {} address {}: {}", what, value, e)))
}

fn resolve(raw: RawConfig) -> MonitorResult<AppConfig> {
    let endpoint = raw.rpc.endpoint.trim().to_string();
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(MonitorError::ConfigError(format!(
            "Invalid RPC endpoint (must start with http:// or https://): {}",
            endpoint
        )));
    }

    let defaults = MonitorConfig::default();
    let monitor = MonitorConfig {
        rpc_endpoint: endpoint,
        use_confirmed_commitment: raw
            .rpc
            .use_confirmed_commitment
            .unwrap_or(defaults.use_confirmed_commitment),
        max_retries: raw.rpc.max_retries.unwrap_or(defaults.max_retries).max(1),
        concurrency: raw.rpc.concurrency.unwrap_or(defaults.concurrency).max(1),
    };

    let programs = ProtocolPrograms {
        exchange: parse_pubkey(&raw.programs.exchange, "exchange program")?,
        stability_pool: parse_pubkey(&raw.programs.stability_pool, "stability pool program")?,
    };

    let tokens = raw.tokens;
    let mut entries = vec![
        protocol_token(
            &tokens.stable,
            tokens.stable_symbol,
            tokens.stable_name,
            tokens.stable_decimals,
            ("hyUSD", "Hylo USD", 6),
            AssetKind::Stable,
        )?,
        protocol_token(
            &tokens.staked_stable,
            tokens.staked_stable_symbol,
            tokens.staked_stable_name,
            tokens.staked_stable_decimals,
            ("sHYUSD", "Staked hyUSD", 6),
            AssetKind::StakedStable,
        )?,
        protocol_token(
            &tokens.leveraged,
            tokens.leveraged_symbol,
            tokens.leveraged_name,
            tokens.leveraged_decimals,
            ("xSOL", "Hylo Leveraged SOL", 6),
            AssetKind::LeveragedToken,
        )?,
    ];

    for extra in tokens.extra {
        if matches!(extra.kind, AssetKind::Stable | AssetKind::LeveragedToken) {
            return Err(MonitorError::ConfigError(format!(
                "Extra token {} cannot be of kind {}; set it under [tokens]",
                extra.symbol, extra.kind
            )));
        }
        entries.push(TokenInfo {
            mint: parse_pubkey(&extra.mint, &extra.symbol)?,
            name: extra.name.unwrap_or_else(|| extra.symbol.clone()),
            symbol: extra.symbol,
            decimals: extra.decimals,
            kind: extra.kind,
        });
    }

    let catalog = AssetCatalog::new(entries)?;

    Ok(AppConfig {
        monitor,
        registry: Registry { programs, catalog },
        log_level: raw.logging.level,
    })
}

/// Create a default configuration file
pub fn create_default_config<P: AsRef<Path>>(path: P) -> MonitorResult<()> {
    let header = r#"# Hylo trade tracker configuration.
#
# Every key can be overridden from the environment with the HYLO prefix and
# "__" between sections, e.g. HYLO__RPC__ENDPOINT or HYLO__PROGRAMS__EXCHANGE.
#
# [rpc]       use_confirmed_commitment: "confirmed" (faster) instead of "finalized" (safer)
#             max_retries: attempts per getTransaction call
#             concurrency: transactions fetched and classified at once
# [tokens]    stable / staked_stable / leveraged are the protocol mints; each
#             also takes optional <name>_symbol, <name>_name and <name>_decimals
#             keys, e.g. leveraged_decimals = 6
#             [[tokens.extra]] kind is one of staked_stable, reference_stable,
#             liquid_staking_token, native_unit, unknown
# [logging]   level: trace, debug, info, warn, error

"#;

    let body = toml::to_string_pretty(&RawConfig::default())
        .map_err(|e| MonitorError::ConfigError(format!("Failed to serialize default config: {}", e)))?;

    std::fs::write(path.as_ref(), format!("{}{}", header, body))
        .map_err(|e| MonitorError::ConfigError(format!("Failed to write config file: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(text: &str) -> MonitorResult<AppConfig> {
        let raw: RawConfig = toml::from_str(text).unwrap();
        resolve(raw)
    }

    #[test]
    fn test_defaults_resolve() {
        let config = resolve(RawConfig::default()).unwrap();

        assert_eq!(config.monitor, MonitorConfig::default());
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.registry.programs.exchange.to_string(),
            program_ids::EXCHANGE
        );
        assert_eq!(config.registry.catalog.leveraged().symbol, "xSOL");
        assert_eq!(config.registry.catalog.stable().symbol, "hyUSD");
        assert_eq!(config.registry.catalog.len(), 9);
    }

    #[test]
    fn test_summary_logged_from_resolved_config() {
        let config = resolve(RawConfig::default()).unwrap();
        // logging works with or without a subscriber installed
        config.log_summary();
        assert_eq!(config.registry.catalog.leveraged().symbol, "xSOL");
    }

    #[test]
    fn test_overrides_and_extra_tokens() {
        let exchange = Pubkey::new_unique();
        let extra_mint = Pubkey::new_unique();
        let text = format!(
            r#"
[rpc]
endpoint = "http://localhost:8899"
concurrency = 0

[programs]
exchange = "{exchange}"
stability_pool = "{pool}"

[tokens]
stable = "{stable}"
staked_stable = "{staked}"
leveraged = "{lever}"

[[tokens.extra]]
mint = "{extra_mint}"
symbol = "PYUSD"
decimals = 6
kind = "reference_stable"

[logging]
level = "debug"
"#,
            pool = Pubkey::new_unique(),
            stable = Pubkey::new_unique(),
            staked = Pubkey::new_unique(),
            lever = Pubkey::new_unique(),
        );

        let config = from_toml(&text).unwrap();
        assert_eq!(config.monitor.rpc_endpoint, "http://localhost:8899");
        assert_eq!(config.monitor.concurrency, 1);
        assert_eq!(config.monitor.max_retries, 3);
        assert_eq!(config.registry.programs.exchange, exchange);
        assert_eq!(config.log_level, "debug");

        let pyusd = config.registry.catalog.get(&extra_mint).unwrap();
        assert_eq!(pyusd.name, "PYUSD");
        assert_eq!(pyusd.kind, AssetKind::ReferenceStable);
        // an explicit extra list replaces the built-in one
        assert_eq!(config.registry.catalog.len(), 4);
    }

    #[test]
    fn test_invalid_addresses_rejected() {
        let mut raw = RawConfig::default();
        raw.programs.exchange = "not-a-pubkey".to_string();
        assert!(matches!(resolve(raw), Err(MonitorError::ConfigError(_))));

        let mut raw = RawConfig::default();
        raw.rpc.endpoint = "wss://api.mainnet-beta.solana.com".to_string();
        assert!(matches!(resolve(raw), Err(MonitorError::ConfigError(_))));
    }

    #[test]
    fn test_extra_cannot_redefine_protocol_tokens() {
        let mut raw = RawConfig::default();
        raw.tokens.extra.push(RawTokenEntry::new(
            &Pubkey::new_unique().to_string(),
            "FAKE",
            "Fake",
            6,
            AssetKind::LeveragedToken,
        ));
        assert!(resolve(raw).is_err());
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("hylo-trades-{}-{}.toml", tag, std::process::id()))
    }

    #[test]
    fn test_protocol_token_metadata_overrides() {
        let text = r#"
[rpc]
endpoint = "http://localhost:8899"

[tokens]
stable = "5YMkXAYccHSGnHn9nob9xEvv6Pvka9DZWH7nTbotTu9E"
stable_symbol = "USDh"
staked_stable = "HnnGv3HrSqjRpgdFmx7vQGjntNEoex1SU4e9Lxcxuihz"
leveraged = "4sWNB8zGWHkh6UnmwiEtzNxL4XrN7uK9tosbESbJFfVs"
leveraged_name = "xSOL v2"
leveraged_decimals = 9
"#;
        let config = from_toml(text).unwrap();
        let catalog = &config.registry.catalog;

        assert_eq!(catalog.stable().symbol, "USDh");
        assert_eq!(catalog.stable().name, "Hylo USD");
        assert_eq!(catalog.stable().decimals, 6);
        assert_eq!(catalog.leveraged().symbol, "xSOL");
        assert_eq!(catalog.leveraged().name, "xSOL v2");
        assert_eq!(catalog.leveraged().decimals, 9);
    }

    #[test]
    fn test_protocol_token_overrides_validated() {
        let mut raw = RawConfig::default();
        raw.tokens.leveraged_decimals = Some(19);
        assert!(matches!(resolve(raw), Err(MonitorError::ConfigError(_))));

        let mut raw = RawConfig::default();
        raw.tokens.stable_symbol = Some("  ".to_string());
        assert!(matches!(resolve(raw), Err(MonitorError::ConfigError(_))));
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = temp_path("env");
        create_default_config(&path).unwrap();

        let exchange = Pubkey::new_unique();
        let mut env = Map::new();
        env.insert("HYLO__PROGRAMS__EXCHANGE".to_string(), exchange.to_string());
        env.insert("HYLO__RPC__MAX_RETRIES".to_string(), "7".to_string());
        env.insert("HYLO__RPC__USE_CONFIRMED_COMMITMENT".to_string(), "false".to_string());
        env.insert("HYLO__TOKENS__LEVERAGED_DECIMALS".to_string(), "9".to_string());
        env.insert("HYLO__LOGGING__LEVEL".to_string(), "debug".to_string());
        env.insert("OTHER__RPC__CONCURRENCY".to_string(), "64".to_string());

        let loaded = load_with_env(&path, Some(env));
        std::fs::remove_file(&path).unwrap();
        let config = loaded.unwrap();

        assert_eq!(config.registry.programs.exchange, exchange);
        assert_eq!(
            config.registry.programs.stability_pool.to_string(),
            program_ids::STABILITY_POOL
        );
        assert_eq!(config.monitor.max_retries, 7);
        assert!(!config.monitor.use_confirmed_commitment);
        assert_eq!(config.monitor.concurrency, MonitorConfig::default().concurrency);
        assert_eq!(config.registry.catalog.leveraged().decimals, 9);
        assert_eq!(config.log_level, "debug");
        // the [[tokens.extra]] array from the file survives a table override
        assert_eq!(config.registry.catalog.len(), 9);
    }

    #[test]
    fn test_invalid_environment_override_rejected() {
        let path = temp_path("bad-env");
        create_default_config(&path).unwrap();

        let mut env = Map::new();
        env.insert("HYLO__PROGRAMS__EXCHANGE".to_string(), "not-a-pubkey".to_string());
        let loaded = load_with_env(&path, Some(env));
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(loaded, Err(MonitorError::ConfigError(_))));
    }

    #[test]
    fn test_default_file_round_trips() {
        let path = temp_path("default");
        create_default_config(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Hylo trade tracker configuration."));
        let config = from_toml(&text).unwrap();
        assert_eq!(config.registry.catalog.len(), 9);

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.registry.programs, config.registry.programs);

        std::fs::remove_file(&path).unwrap();
    }
}
