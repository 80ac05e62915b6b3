use crate::raffle_error::CommandError;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum RaffleCommand {
    /// Redeem a paid transaction for tickets
    ///
    /// `{"command":"buyTicket","buyerAddress":"..","txSignature":"..","quantity":3}`
    #[serde(rename_all = "camelCase")]
    BuyTicket {
        /// Wallet that will own the tickets
        #[serde(default)]
        buyer_address: Option<String>,
        /// Signature of the USDC transfer to the vault
        #[serde(default)]
        tx_signature: Option<String>,
        /// Number of tickets, 1 when omitted
        #[serde(default = "default_quantity", deserialize_with = "lenient_quantity")]
        quantity: i64,
    },

    /// Draw a winner (admin only)
    ///
    /// `{"command":"drawWinner","adminKey":".."}`
    #[serde(rename_all = "camelCase")]
    DrawWinner {
        #[serde(default)]
        admin_key: Option<String>,
    },

    /// Price, end time and ticket counts
    RaffleInfo,

    /// Sold tickets, optionally only those owned by `wallet`
    Tickets {
        #[serde(default)]
        wallet: Option<String>,
    },
}

impl RaffleCommand {
    /// Decode one JSON command
    pub fn unpack(input: &str) -> Result<Self, CommandError> {
        Ok(serde_json::from_str(input)?)
    }
}

fn default_quantity() -> i64 {
    1
}

/// Accept a number or a numeric string, truncating fractions the same way for
/// both. Anything else maps to 0, which the issuer rejects as an invalid
/// quantity.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let quantity = match Value::deserialize(deserializer)? {
        Value::Null => default_quantity(),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .unwrap_or(0)
        }
        _ => 0,
    };
    Ok(quantity)
}
