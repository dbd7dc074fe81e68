use chrono::{DateTime, Utc};
use ethers::types::{Address, H160, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// TRANSFERS
// ============================================================================

/// Source address of freshly minted supply.
pub const MINT_SENTINEL: Address = H160([0u8; 20]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    /// Raw amount in token base units.
    pub amount: U256,
    pub block_height: u64,
}

impl TransferEvent {
    pub fn is_mint(&self) -> bool {
        self.from == MINT_SENTINEL
    }
}

// ============================================================================
// LEADERBOARD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderEntry {
    pub address: Address,
    /// Whole-token balance.
    pub balance: Decimal,
    pub reward: Decimal,
}

/// Wire and snapshot shape of one holder: `{"address": "0x..", "balance": 12.5}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderRecord {
    pub address: Address,
    #[serde(with = "decimal_number")]
    pub balance: Decimal,
}

/// Ranked holders, highest balance first, plus the time they were computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    entries: Vec<HolderEntry>,
    as_of: DateTime<Utc>,
}

impl Leaderboard {
    pub fn new(entries: Vec<HolderEntry>, as_of: DateTime<Utc>) -> Self {
        Self { entries, as_of }
    }

    /// Rebuilds a leaderboard from persisted records, recomputing rewards.
    ///
    /// Records are taken in the order given; a snapshot is always written
    /// already ranked.
    pub fn from_records(
        records: Vec<HolderRecord>,
        reward_rate: Decimal,
        as_of: DateTime<Utc>,
    ) -> Self {
        let entries = records
            .into_iter()
            .map(|record| HolderEntry {
                address: record.address,
                balance: record.balance,
                reward: reward_for(record.balance, reward_rate),
            })
            .collect();

        Self { entries, as_of }
    }

    pub fn entries(&self) -> &[HolderEntry] {
        &self.entries
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> Vec<HolderRecord> {
        self.entries
            .iter()
            .map(|entry| HolderRecord {
                address: entry.address,
                balance: entry.balance,
            })
            .collect()
    }
}

/// Reward owed on a whole-token balance.
pub fn reward_for(balance: Decimal, reward_rate: Decimal) -> Decimal {
    balance.saturating_mul(reward_rate).normalize()
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

/// Serializes a [`Decimal`] as a bare JSON number with every digit kept.
///
/// Only usable with `serde_json`, which understands `RawValue`.
pub mod decimal_number {
    use rust_decimal::Decimal;
    use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::value::RawValue;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = RawValue::from_string(value.normalize().to_string())
            .map_err(<S::Error as ser::Error>::custom)?;
        raw.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let text = raw.get();
        if text.starts_with('"') {
            return Err(de::Error::custom(format!("expected a number, found {}", text)));
        }

        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(de::Error::custom)
    }
}
