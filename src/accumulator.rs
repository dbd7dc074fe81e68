use ethers::types::{Address, I256};
use std::collections::HashMap;

use crate::error::LeaderboardError;
use crate::types::TransferEvent;

/// Net base-unit balance per address, in the order addresses were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceTable {
    index: HashMap<Address, usize>,
    entries: Vec<(Address, I256)>,
}

impl BalanceTable {
    pub fn get(&self, address: &Address) -> Option<I256> {
        self.index.get(address).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, I256)> + '_ {
        self.entries.iter().copied()
    }

    /// Sum of all balances. Equals minted minus burned supply.
    pub fn total(&self) -> Option<I256> {
        self.entries
            .iter()
            .try_fold(I256::zero(), |acc, (_, balance)| acc.checked_add(*balance))
    }

    fn slot(&mut self, address: Address) -> &mut I256 {
        let i = *self.index.entry(address).or_insert_with(|| {
            self.entries.push((address, I256::zero()));
            self.entries.len() - 1
        });
        &mut self.entries[i].1
    }

    fn adjust(&mut self, address: Address, delta: I256) -> Result<(), LeaderboardError> {
        let slot = self.slot(address);
        *slot = slot.checked_add(delta).ok_or_else(|| {
            LeaderboardError::Decode(format!("balance of {:?} overflows 256 bits", address))
        })?;
        Ok(())
    }
}

impl IntoIterator for BalanceTable {
    type Item = (Address, I256);
    type IntoIter = std::vec::IntoIter<(Address, I256)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Folds transfer events into a [`BalanceTable`], one event at a time.
#[derive(Debug, Default)]
pub struct BalanceAccumulator {
    table: BalanceTable,
    applied: u64,
}

impl BalanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debits the sender (unless minted) and credits the receiver.
    pub fn apply(&mut self, event: &TransferEvent) -> Result<(), LeaderboardError> {
        let amount = I256::try_from(event.amount).map_err(|_| {
            LeaderboardError::Decode(format!(
                "transfer at block {} has amount {} beyond signed 256-bit range",
                event.block_height, event.amount
            ))
        })?;

        if !event.is_mint() {
            let debit = amount.checked_neg().ok_or_else(|| {
                LeaderboardError::Decode(format!("cannot negate amount {}", event.amount))
            })?;
            self.table.adjust(event.from, debit)?;
        }
        self.table.adjust(event.to, amount)?;

        self.applied += 1;
        Ok(())
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn finish(self) -> BalanceTable {
        self.table
    }
}

pub fn accumulate<'a, I>(events: I) -> Result<BalanceTable, LeaderboardError>
where
    I: IntoIterator<Item = &'a TransferEvent>,
{
    let mut accumulator = BalanceAccumulator::new();
    for event in events {
        accumulator.apply(event)?;
    }
    Ok(accumulator.finish())
}
