use super::{CommitError, OperationCommit, PositionStore, StoreError, StreamStore};
use crate::assets::InMemoryBank;
use crate::domain::{Address, Position};
use crate::orchestration::StreamState;
use crate::permit::AuthorizationError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// `HashMap`-backed position store.
#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    positions: Mutex<HashMap<Address, Position>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored positions, ordered by participant.
    pub async fn all(&self) -> Vec<(Address, Position)> {
        let positions = self.positions.lock().await;
        let mut all: Vec<_> = positions
            .iter()
            .map(|(addr, pos)| (addr.clone(), pos.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn get(&self, participant: &Address) -> Result<Position, StoreError> {
        let positions = self.positions.lock().await;
        Ok(positions.get(participant).cloned().unwrap_or_default())
    }

    async fn put(&self, participant: &Address, position: &Position) -> Result<(), StoreError> {
        let mut positions = self.positions.lock().await;
        positions.insert(participant.clone(), position.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Committed {
    state: Option<StreamState>,
    used_permits: HashSet<(Address, u64)>,
}

/// In-process [`StreamStore`] over an [`InMemoryBank`] and any position store.
///
/// A commit stages the transfer batch under the bank's lock, writes the
/// position, and only then applies balances, state and nonce. The position
/// write is the last fallible step.
pub struct MemoryStreamStore {
    bank: Arc<InMemoryBank>,
    positions: Arc<dyn PositionStore>,
    committed: Mutex<Committed>,
}

impl MemoryStreamStore {
    pub fn new(bank: Arc<InMemoryBank>) -> Self {
        Self::with_positions(bank, Arc::new(MemoryPositionStore::new()))
    }

    pub fn with_positions(bank: Arc<InMemoryBank>, positions: Arc<dyn PositionStore>) -> Self {
        Self {
            bank,
            positions,
            committed: Mutex::new(Committed::default()),
        }
    }
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
    async fn load_state(&self) -> Result<Option<StreamState>, StoreError> {
        Ok(self.committed.lock().await.state.clone())
    }

    async fn position(&self, participant: &Address) -> Result<Position, StoreError> {
        self.positions.get(participant).await
    }

    async fn permit_used(&self, owner: &Address, nonce: u64) -> Result<bool, StoreError> {
        let committed = self.committed.lock().await;
        Ok(committed.used_permits.contains(&(owner.clone(), nonce)))
    }

    async fn commit(&self, commit: OperationCommit<'_>) -> Result<(), CommitError> {
        let mut committed = self.committed.lock().await;
        if let Some((owner, nonce)) = commit.permit_nonce {
            if committed.used_permits.contains(&(owner.clone(), nonce)) {
                return Err(AuthorizationError::NonceUsed(nonce).into());
            }
        }

        let staged = self.bank.stage(commit.transfers).await?;
        if let Some((participant, position)) = commit.position {
            self.positions.put(participant, position).await?;
        }
        staged.apply();

        committed.state = Some(commit.state.clone());
        if let Some((owner, nonce)) = commit.permit_nonce {
            committed.used_permits.insert((owner.clone(), nonce));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Transfer;
    use crate::domain::{AssetId, DistributionLedger, Phase, TimeMs};
    use uuid::Uuid;

    struct BrokenPositions;

    #[async_trait]
    impl PositionStore for BrokenPositions {
        async fn get(&self, _participant: &Address) -> Result<Position, StoreError> {
            Ok(Position::default())
        }

        async fn put(&self, _participant: &Address, _position: &Position) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
    }

    fn state() -> StreamState {
        StreamState {
            phase: Phase::Bootstrapping,
            ledger: DistributionLedger::new(2000, TimeMs(150)),
        }
    }

    #[tokio::test]
    async fn test_unknown_participant_gets_zero_position() {
        let store = MemoryPositionStore::new();
        let position = store.get(&Address::new("alice")).await.unwrap();
        assert_eq!(position, Position::default());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryPositionStore::new();
        let position = Position {
            in_balance: 10,
            shares: 10,
            ..Position::default()
        };
        store.put(&Address::new("alice"), &position).await.unwrap();
        assert_eq!(store.get(&Address::new("alice")).await.unwrap(), position);
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_applies_every_write() {
        let bank = Arc::new(InMemoryBank::new());
        let alice = Address::new("alice");
        bank.credit(&AssetId::Native, &alice, 100).await;
        let store = MemoryStreamStore::new(bank.clone());

        let transfers = vec![Transfer::new(
            AssetId::Native,
            alice.clone(),
            Address::new("stream"),
            60,
        )];
        let position = Position {
            in_balance: 60,
            shares: 60,
            ..Position::default()
        };
        let state = state();
        store
            .commit(OperationCommit {
                operation_id: Uuid::new_v4(),
                transfers: &transfers,
                position: Some((&alice, &position)),
                permit_nonce: Some((&alice, 4)),
                state: &state,
            })
            .await
            .unwrap();

        assert_eq!(bank.balance(&AssetId::Native, &alice).await, 40);
        assert_eq!(store.position(&alice).await.unwrap(), position);
        assert_eq!(store.load_state().await.unwrap(), Some(state));
        assert!(store.permit_used(&alice, 4).await.unwrap());
        assert!(!store.permit_used(&alice, 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_position_write_discards_transfers() {
        let bank = Arc::new(InMemoryBank::new());
        let alice = Address::new("alice");
        bank.credit(&AssetId::Native, &alice, 100).await;
        let store = MemoryStreamStore::with_positions(bank.clone(), Arc::new(BrokenPositions));

        let transfers = vec![Transfer::new(
            AssetId::Native,
            alice.clone(),
            Address::new("stream"),
            60,
        )];
        let position = Position::default();
        let err = store
            .commit(OperationCommit {
                operation_id: Uuid::new_v4(),
                transfers: &transfers,
                position: Some((&alice, &position)),
                permit_nonce: Some((&alice, 1)),
                state: &state(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CommitError::Store(_)));
        assert_eq!(bank.balance(&AssetId::Native, &alice).await, 100);
        assert_eq!(bank.balance(&AssetId::Native, &Address::new("stream")).await, 0);
        assert!(store.load_state().await.unwrap().is_none());
        assert!(!store.permit_used(&alice, 1).await.unwrap());
    }
}
