use chrono::Utc;
use ethers::types::{Address, I256, U256};
use rust_decimal::Decimal;

use crate::accumulator::BalanceTable;
use crate::error::LeaderboardError;
use crate::types::{reward_for, HolderEntry, Leaderboard};

/// Largest mantissa a `Decimal` can hold (2^96 - 1).
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;
const MAX_SCALE: u32 = 28;

/// Converts a positive base-unit amount into whole tokens.
///
/// When the amount has more significant digits than `Decimal` can carry, the
/// trailing fractional digits are truncated.
pub fn to_token_units(raw: U256, decimals: u32) -> Result<Decimal, LeaderboardError> {
    let max = U256::from(MAX_MANTISSA);
    let ten = U256::from(10u8);
    let mut mantissa = raw;
    let mut scale = decimals;

    while scale > 0 && (mantissa > max || scale > MAX_SCALE) {
        mantissa /= ten;
        scale -= 1;
    }

    if mantissa > max {
        return Err(LeaderboardError::Decode(format!(
            "balance {} exceeds the representable range",
            raw
        )));
    }

    Decimal::try_from_i128_with_scale(mantissa.as_u128() as i128, scale)
        .map(|value| value.normalize())
        .map_err(|e| LeaderboardError::Decode(format!("balance {}: {}", raw, e)))
}

#[derive(Debug, Clone, Copy)]
pub struct LeaderboardBuilder {
    reward_rate: Decimal,
    decimals: u32,
}

impl LeaderboardBuilder {
    pub fn new(reward_rate: Decimal, decimals: u32) -> Self {
        Self {
            reward_rate,
            decimals,
        }
    }

    pub fn reward_rate(&self) -> Decimal {
        self.reward_rate
    }

    /// Ranks every positive balance, highest first.
    ///
    /// Equal balances keep the order in which their addresses first appeared
    /// in the transfer stream.
    pub fn build(&self, table: BalanceTable) -> Result<Leaderboard, LeaderboardError> {
        let mut holders: Vec<(Address, I256)> = table
            .into_iter()
            .filter(|(_, balance)| balance.is_positive())
            .collect();

        // sort_by is stable
        holders.sort_by(|a, b| b.1.cmp(&a.1));

        let entries = holders
            .into_iter()
            .map(|(address, raw)| {
                let balance = to_token_units(raw.into_raw(), self.decimals)?;
                Ok(HolderEntry {
                    address,
                    balance,
                    reward: reward_for(balance, self.reward_rate),
                })
            })
            .collect::<Result<Vec<_>, LeaderboardError>>()?;

        Ok(Leaderboard::new(entries, Utc::now()))
    }
}
