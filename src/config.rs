use crate::allowlist::MerkleRoot;
use crate::domain::{Address, AssetId, Decimal, StreamTiming, TimeMs};
use crate::engine::AssetPrecision;
use crate::orchestration::{PoolOptions, SettlementOptions, StreamConfig};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

const MAX_ASSET_DECIMALS: u8 = 18;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub stream: StreamConfig,
    /// Derives the per-account bearer tokens callers authenticate with.
    pub auth_secret: String,
    /// Guards the credit endpoint; crediting over HTTP is disabled when unset.
    pub operator_token: Option<String>,
    /// Enables delegated deposits when set.
    pub permit_secret: Option<String>,
    pub settlement_webhook_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn invalid(key: &str, msg: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), msg.into())
}

fn get<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn required<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Result<&'a str, ConfigError> {
    get(env_map, key).ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn parse_address(key: &str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value).map_err(|e| invalid(key, e.to_string()))
}

fn parse_time(env_map: &HashMap<String, String>, key: &str) -> Result<TimeMs, ConfigError> {
    required(env_map, key)?
        .parse::<i64>()
        .map(TimeMs::new)
        .map_err(|_| invalid(key, "must be a valid i64 (ms since epoch)"))
}

fn parse_ratio(env_map: &HashMap<String, String>, key: &str) -> Result<Decimal, ConfigError> {
    let Some(raw) = get(env_map, key) else {
        return Ok(Decimal::zero());
    };
    let ratio = Decimal::from_str(raw).map_err(|e| invalid(key, e.to_string()))?;
    if ratio.greater_than(&Decimal::one()) {
        return Err(invalid(key, "must be within [0, 1]"));
    }
    Ok(ratio)
}

fn parse_decimals(env_map: &HashMap<String, String>, key: &str) -> Result<u8, ConfigError> {
    let decimals = get(env_map, key)
        .unwrap_or("6")
        .parse::<u8>()
        .map_err(|_| invalid(key, "must be a valid u8"))?;
    if decimals > MAX_ASSET_DECIMALS {
        return Err(invalid(key, format!("must be at most {}", MAX_ASSET_DECIMALS)));
    }
    Ok(decimals)
}

fn parse_bool(env_map: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match get(env_map, key).unwrap_or("false") {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(invalid(key, format!("must be true or false, got {}", other))),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = get(&env_map, "PORT")
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| invalid("PORT", "must be a valid u16"))?;

        let database_path = required(&env_map, "DATABASE_PATH")?.to_string();
        let stream = parse_stream_config(&env_map)?;

        let auth_secret = required(&env_map, "AUTH_SECRET")?.to_string();
        let operator_token = get(&env_map, "OPERATOR_TOKEN").map(str::to_string);
        let permit_secret = get(&env_map, "PERMIT_SECRET").map(str::to_string);
        let settlement_webhook_url = get(&env_map, "SETTLEMENT_WEBHOOK_URL").map(str::to_string);

        Ok(Config {
            port,
            database_path,
            stream,
            auth_secret,
            operator_token,
            permit_secret,
            settlement_webhook_url,
        })
    }
}

fn parse_stream_config(env_map: &HashMap<String, String>) -> Result<StreamConfig, ConfigError> {
    let creator = parse_address("STREAM_CREATOR", required(env_map, "STREAM_CREATOR")?)?;
    let stream_account = parse_address(
        "STREAM_ACCOUNT",
        get(env_map, "STREAM_ACCOUNT").unwrap_or("stream"),
    )?;
    if stream_account == creator {
        return Err(invalid("STREAM_ACCOUNT", "must differ from STREAM_CREATOR"));
    }

    let in_asset = AssetId::from(get(env_map, "STREAM_IN_ASSET").unwrap_or("native").to_string());
    let out_asset = AssetId::from(required(env_map, "STREAM_OUT_ASSET")?.to_string());
    if in_asset == out_asset {
        return Err(invalid("STREAM_OUT_ASSET", "must differ from STREAM_IN_ASSET"));
    }

    let precision = AssetPrecision {
        in_decimals: parse_decimals(env_map, "STREAM_IN_DECIMALS")?,
        out_decimals: parse_decimals(env_map, "STREAM_OUT_DECIMALS")?,
    };

    let out_supply = required(env_map, "STREAM_OUT_SUPPLY")?
        .parse::<u128>()
        .map_err(|_| invalid("STREAM_OUT_SUPPLY", "must be a valid u128"))?;
    if out_supply == 0 {
        return Err(invalid("STREAM_OUT_SUPPLY", "must be positive"));
    }

    let threshold = get(env_map, "STREAM_THRESHOLD")
        .unwrap_or("0")
        .parse::<u128>()
        .map_err(|_| invalid("STREAM_THRESHOLD", "must be a valid u128"))?;
    let stream_start = parse_time(env_map, "STREAM_START_MS")?;
    let stream_end = parse_time(env_map, "STREAM_END_MS")?;
    if stream_start >= stream_end {
        return Err(invalid("STREAM_END_MS", "must be after STREAM_START_MS"));
    }
    let timing = StreamTiming::new(
        parse_time(env_map, "STREAM_BOOTSTRAPPING_START_MS")?,
        stream_start,
        stream_end,
        threshold,
    )
    .map_err(|e| invalid("STREAM_BOOTSTRAPPING_START_MS", e.to_string()))?;

    let fee_collector = match get(env_map, "FEE_COLLECTOR") {
        Some(raw) => parse_address("FEE_COLLECTOR", raw)?,
        None => creator.clone(),
    };

    let allowlist_root = match get(env_map, "ALLOWLIST_ROOT") {
        Some(raw) => {
            MerkleRoot::from_hex(raw).map_err(|e| invalid("ALLOWLIST_ROOT", e.to_string()))?
        }
        None => MerkleRoot::ZERO,
    };

    let pool = match (get(env_map, "POOL_RATIO"), get(env_map, "POOL_ACCOUNT")) {
        (None, None) => None,
        (Some(_), Some(account)) => Some(PoolOptions {
            ratio: parse_ratio(env_map, "POOL_RATIO")?,
            account: parse_address("POOL_ACCOUNT", account)?,
        }),
        (Some(_), None) => return Err(ConfigError::MissingEnv("POOL_ACCOUNT".to_string())),
        (None, Some(_)) => return Err(ConfigError::MissingEnv("POOL_RATIO".to_string())),
    };

    Ok(StreamConfig {
        creator,
        stream_account,
        in_asset,
        out_asset,
        out_supply,
        timing,
        precision,
        deposit_fee_ratio: parse_ratio(env_map, "DEPOSIT_FEE_RATIO")?,
        exit_fee_ratio: parse_ratio(env_map, "EXIT_FEE_RATIO")?,
        fee_collector,
        allowlist_root,
        settlement: SettlementOptions {
            creator_vesting: parse_bool(env_map, "CREATOR_VESTING")?,
            subscriber_vesting: parse_bool(env_map, "SUBSCRIBER_VESTING")?,
            pool,
        },
    })
}
