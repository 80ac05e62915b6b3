// Hollow Raffle - Process configuration
use crate::raffle_error::ConfigError;
use crate::raffle_state::{PayerPolicy, RaffleConfig};

use solana_program::pubkey::Pubkey;
use std::{path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_MAX_TICKETS: u32 = 10_000;
pub const DEFAULT_TICKET_PRICE: &str = "2";
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// Everything the binary needs to start
#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub raffle: RaffleConfig,
    pub rpc_url: String,
    pub rpc_timeout: Duration,
    /// Snapshot file for the ledger; in-memory when unset
    pub ledger_path: Option<PathBuf>,
}

impl ServiceSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let vault_address = parse_pubkey("VAULT_WALLET_ADDRESS", get("VAULT_WALLET_ADDRESS"))?;
        let token_mint = parse_pubkey("USDC_MINT_ADDRESS", get("USDC_MINT_ADDRESS"))?;

        let token_decimals = match get("TOKEN_DECIMALS") {
            Some(raw) => parse_number::<u8>("TOKEN_DECIMALS", &raw)?,
            None => DEFAULT_TOKEN_DECIMALS,
        };
        let price = get("TICKET_PRICE_USDC").unwrap_or_else(|| DEFAULT_TICKET_PRICE.to_string());
        let unit_price_micros = parse_token_amount(&price, token_decimals).map_err(|reason| {
            ConfigError::Invalid { name: "TICKET_PRICE_USDC", reason }
        })?;
        if unit_price_micros == 0 {
            return Err(ConfigError::Invalid {
                name: "TICKET_PRICE_USDC",
                reason: "ticket price must be greater than zero".to_string(),
            });
        }

        let max_tickets = match get("MAX_TICKETS") {
            Some(raw) => parse_number::<u32>("MAX_TICKETS", &raw)?,
            None => DEFAULT_MAX_TICKETS,
        };
        if max_tickets == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_TICKETS",
                reason: "capacity must be greater than zero".to_string(),
            });
        }

        let mut raffle = RaffleConfig::new(unit_price_micros, max_tickets, vault_address, token_mint);
        raffle.token_decimals = token_decimals;
        if let Some(symbol) = get("TOKEN_SYMBOL") {
            raffle.token_symbol = symbol;
        }
        raffle.end_time = get("RAFFLE_END_TIME")
            .map(|raw| parse_number::<i64>("RAFFLE_END_TIME", &raw))
            .transpose()?;
        raffle.admin_secret = get("ADMIN_SECRET_KEY");
        let buyer_only = get("REQUIRE_BUYER_SIGNATURE")
            .map(|raw| parse_flag("REQUIRE_BUYER_SIGNATURE", &raw))
            .transpose()?
            .unwrap_or(false);
        if buyer_only {
            raffle.payer_policy = PayerPolicy::BuyerOnly;
        }
        if let Some(raw) = get("VERIFICATION_TIMEOUT_SECS") {
            raffle.verification_timeout =
                Duration::from_secs(parse_number::<u64>("VERIFICATION_TIMEOUT_SECS", &raw)?);
        }

        let rpc_timeout = match get("RPC_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number::<u64>("RPC_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(30),
        };

        Ok(Self {
            raffle,
            rpc_url: get("SOLANA_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            rpc_timeout,
            ledger_path: get("LEDGER_PATH").map(PathBuf::from),
        })
    }
}

fn parse_pubkey(name: &'static str, raw: Option<String>) -> Result<Pubkey, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing(name))?;
    Pubkey::from_str(&raw).map_err(|e| ConfigError::Invalid { name, reason: e.to_string() })
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::Invalid { name, reason: e.to_string() })
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(ConfigError::Invalid { name, reason: format!("expected a boolean, got {}", other) }),
    }
}

/// Convert a decimal token amount ("2", "2.5") into raw units without going
/// through floating point.
pub fn parse_token_amount(raw: &str, decimals: u8) -> Result<u64, String> {
    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (raw, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err("empty amount".to_string());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(format!("{} is not a decimal amount", raw));
    }
    if fraction.len() > usize::from(decimals) {
        return Err(format!("{} has more than {} decimal places", raw, decimals));
    }

    let scale = 10u64
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| "too many decimals".to_string())?;
    let whole_units = if whole.is_empty() { 0 } else { whole.parse::<u64>().map_err(|e| e.to_string())? };
    let padded = format!("{:0<width$}", fraction, width = usize::from(decimals));
    let fraction_units = if padded.is_empty() { 0 } else { padded.parse::<u64>().map_err(|e| e.to_string())? };

    whole_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or_else(|| format!("{} overflows the token amount range", raw))
}

/// Render raw units as a decimal string with trailing zeros trimmed
pub fn format_token_amount(raw: u64, decimals: u8) -> String {
    let scale = match 10u64.checked_pow(u32::from(decimals)) {
        Some(scale) => scale,
        None => return raw.to_string(),
    };
    let whole = raw / scale;
    let fraction = raw % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction, width = usize::from(decimals));
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
