use hollow_raffle::{
    config::{format_token_amount, parse_token_amount, ServiceSettings, DEFAULT_RPC_URL},
    raffle_error::ConfigError,
    raffle_state::PayerPolicy,
};
use solana_sdk::pubkey::Pubkey;
use std::{collections::HashMap, time::Duration};

fn settings(pairs: &[(&str, String)]) -> Result<ServiceSettings, ConfigError> {
    let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    ServiceSettings::from_lookup(|key| env.get(key).cloned())
}

fn required() -> Vec<(&'static str, String)> {
    vec![
        ("VAULT_WALLET_ADDRESS", Pubkey::new_unique().to_string()),
        ("USDC_MINT_ADDRESS", Pubkey::new_unique().to_string()),
    ]
}

#[test]
fn test_defaults() {
    let settings = settings(&required()).unwrap();

    assert_eq!(settings.raffle.unit_price_micros, 2_000_000);
    assert_eq!(settings.raffle.max_tickets, 10_000);
    assert_eq!(settings.raffle.payer_policy, PayerPolicy::AnyPayer);
    assert_eq!(settings.raffle.admin_secret, None);
    assert_eq!(settings.raffle.end_time, None);
    assert_eq!(settings.rpc_url, DEFAULT_RPC_URL);
    assert_eq!(settings.rpc_timeout, Duration::from_secs(30));
    assert!(settings.ledger_path.is_none());
}

#[test]
fn test_overrides() {
    let mut pairs = required();
    pairs.extend([
        ("TICKET_PRICE_USDC", "2.5".to_string()),
        ("MAX_TICKETS", "500".to_string()),
        ("RAFFLE_END_TIME", "1767225600".to_string()),
        ("ADMIN_SECRET_KEY", "s3cret".to_string()),
        ("REQUIRE_BUYER_SIGNATURE", "true".to_string()),
        ("VERIFICATION_TIMEOUT_SECS", "10".to_string()),
        ("LEDGER_PATH", "/var/lib/raffle/tickets.ledger".to_string()),
    ]);
    let settings = settings(&pairs).unwrap();

    assert_eq!(settings.raffle.unit_price_micros, 2_500_000);
    assert_eq!(settings.raffle.max_tickets, 500);
    assert_eq!(settings.raffle.end_time, Some(1_767_225_600));
    assert_eq!(settings.raffle.admin_secret.as_deref(), Some("s3cret"));
    assert_eq!(settings.raffle.payer_policy, PayerPolicy::BuyerOnly);
    assert_eq!(settings.raffle.verification_timeout, Duration::from_secs(10));
    assert!(settings.ledger_path.is_some());
}

#[test]
fn test_missing_vault_is_an_error() {
    let pairs = vec![("USDC_MINT_ADDRESS", Pubkey::new_unique().to_string())];
    assert_eq!(settings(&pairs).unwrap_err(), ConfigError::Missing("VAULT_WALLET_ADDRESS"));
}

#[test]
fn test_bad_values_are_errors() {
    for (key, value) in [
        ("VAULT_WALLET_ADDRESS", "not-a-key"),
        ("TICKET_PRICE_USDC", "0"),
        ("TICKET_PRICE_USDC", "1.0000001"),
        ("MAX_TICKETS", "0"),
        ("MAX_TICKETS", "lots"),
        ("REQUIRE_BUYER_SIGNATURE", "maybe"),
    ] {
        let mut pairs = required();
        pairs.retain(|(k, _)| *k != key);
        pairs.push((key, value.to_string()));
        assert!(matches!(settings(&pairs), Err(ConfigError::Invalid { .. })), "{}={}", key, value);
    }
}

#[test]
fn test_token_amounts_are_exact() {
    assert_eq!(parse_token_amount("2", 6), Ok(2_000_000));
    assert_eq!(parse_token_amount("0.000001", 6), Ok(1));
    assert_eq!(parse_token_amount("1.1", 6), Ok(1_100_000));
    assert_eq!(parse_token_amount(".5", 6), Ok(500_000));
    assert!(parse_token_amount("-1", 6).is_err());
    assert!(parse_token_amount("", 6).is_err());
    assert!(parse_token_amount("18446744073709551615", 6).is_err());

    assert_eq!(format_token_amount(6_000_000, 6), "6");
    assert_eq!(format_token_amount(2_500_000, 6), "2.5");
    assert_eq!(format_token_amount(1, 6), "0.000001");
}
