//! In-process balance ledger.

use super::{Transfer, TransferError};
use crate::domain::{Address, AssetId};
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

type BalanceKey = (AssetId, Address);
type Balances = HashMap<BalanceKey, u128>;

/// Balance-checked ledger kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    balances: Mutex<Balances>,
}

/// A validated transfer batch holding the bank's lock.
///
/// Nothing changes until [`StagedTransfers::apply`]; dropping the batch
/// discards it.
pub struct StagedTransfers<'a> {
    balances: MutexGuard<'a, Balances>,
    staged: Balances,
}

impl StagedTransfers<'_> {
    pub fn apply(self) {
        let StagedTransfers {
            mut balances,
            staged,
        } = self;
        balances.extend(staged);
    }
}

impl InMemoryBank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` into `owner`'s balance.
    pub async fn credit(&self, asset: &AssetId, owner: &Address, amount: u128) {
        let mut balances = self.balances.lock().await;
        let entry = balances.entry((asset.clone(), owner.clone())).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub async fn balance(&self, asset: &AssetId, owner: &Address) -> u128 {
        let balances = self.balances.lock().await;
        balances
            .get(&(asset.clone(), owner.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Check every transfer of a batch against current balances.
    ///
    /// Zero-amount transfers are no-ops. The lock is held until the returned
    /// batch is applied or dropped.
    pub async fn stage(&self, transfers: &[Transfer]) -> Result<StagedTransfers<'_>, TransferError> {
        let balances = self.balances.lock().await;

        let mut staged = Balances::new();
        for transfer in transfers.iter().filter(|t| !t.is_noop()) {
            let from_key = (transfer.asset.clone(), transfer.from.clone());
            let available = staged
                .get(&from_key)
                .or_else(|| balances.get(&from_key))
                .copied()
                .unwrap_or(0);
            let remaining = available.checked_sub(transfer.amount).ok_or_else(|| {
                TransferError::InsufficientBalance {
                    asset: transfer.asset.clone(),
                    owner: transfer.from.clone(),
                    required: transfer.amount,
                    available,
                }
            })?;
            staged.insert(from_key, remaining);

            let to_key = (transfer.asset.clone(), transfer.to.clone());
            let current = staged
                .get(&to_key)
                .or_else(|| balances.get(&to_key))
                .copied()
                .unwrap_or(0);
            let credited = current
                .checked_add(transfer.amount)
                .ok_or_else(|| TransferError::Backend("balance overflow".to_string()))?;
            staged.insert(to_key, credited);
        }

        Ok(StagedTransfers { balances, staged })
    }

    /// Execute a batch: every transfer or none of them.
    pub async fn execute(&self, transfers: &[Transfer]) -> Result<(), TransferError> {
        self.stage(transfers).await?.apply();
        Ok(())
    }

    /// Single transfer convenience wrapper around [`InMemoryBank::execute`].
    pub async fn transfer(
        &self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TransferError> {
        let transfer = Transfer::new(asset.clone(), from.clone(), to.clone(), amount);
        self.execute(std::slice::from_ref(&transfer)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let bank = InMemoryBank::new();
        let usdc = AssetId::token("USDC");
        bank.credit(&usdc, &addr("alice"), 100).await;

        bank.transfer(&usdc, &addr("alice"), &addr("bob"), 40)
            .await
            .unwrap();

        assert_eq!(bank.balance(&usdc, &addr("alice")).await, 60);
        assert_eq!(bank.balance(&usdc, &addr("bob")).await, 40);
    }

    #[tokio::test]
    async fn test_native_asset_is_separate_from_tokens() {
        let bank = InMemoryBank::new();
        bank.credit(&AssetId::Native, &addr("alice"), 10).await;
        assert_eq!(bank.balance(&AssetId::token("native-ish"), &addr("alice")).await, 0);
        assert_eq!(bank.balance(&AssetId::Native, &addr("alice")).await, 10);
    }

    #[tokio::test]
    async fn test_zero_amount_is_noop_even_without_funds() {
        let bank = InMemoryBank::new();
        bank.transfer(&AssetId::Native, &addr("nobody"), &addr("bob"), 0)
            .await
            .unwrap();
        assert_eq!(bank.balance(&AssetId::Native, &addr("bob")).await, 0);
    }

    #[tokio::test]
    async fn test_failed_batch_applies_nothing() {
        let bank = InMemoryBank::new();
        let usdc = AssetId::token("USDC");
        bank.credit(&usdc, &addr("alice"), 50).await;

        let batch = vec![
            Transfer::new(usdc.clone(), addr("alice"), addr("bob"), 30),
            Transfer::new(usdc.clone(), addr("alice"), addr("carol"), 30),
        ];
        let err = bank.execute(&batch).await.unwrap_err();

        assert_eq!(
            err,
            TransferError::InsufficientBalance {
                asset: usdc.clone(),
                owner: addr("alice"),
                required: 30,
                available: 20,
            }
        );
        assert_eq!(bank.balance(&usdc, &addr("alice")).await, 50);
        assert_eq!(bank.balance(&usdc, &addr("bob")).await, 0);
    }

    #[tokio::test]
    async fn test_dropped_stage_applies_nothing() {
        let bank = InMemoryBank::new();
        bank.credit(&AssetId::Native, &addr("alice"), 50).await;

        let batch = vec![Transfer::new(AssetId::Native, addr("alice"), addr("bob"), 20)];
        let staged = bank.stage(&batch).await.unwrap();
        drop(staged);

        assert_eq!(bank.balance(&AssetId::Native, &addr("alice")).await, 50);
        assert_eq!(bank.balance(&AssetId::Native, &addr("bob")).await, 0);
    }
}
