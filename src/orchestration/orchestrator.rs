use crate::allowlist::Hash32;
use crate::domain::{Address, Position};
use crate::orchestration::instance::{
    Collaborators, StreamConfig, StreamError, StreamInstance, StreamState, StreamStatus,
};
use crate::orchestration::receipt::Receipt;
use crate::permit::DepositPermit;
use crate::settlement::{dispatch_handoffs, SettlementHook};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Serializes all operations on the stream instance, then dispatches
/// settlement hand-offs once the operation is committed.
pub struct Orchestrator {
    instance: Mutex<StreamInstance>,
    settlement_hook: Option<Arc<dyn SettlementHook>>,
}

impl Orchestrator {
    /// Restore the instance from its store, or create it.
    pub async fn start(
        config: StreamConfig,
        collaborators: Collaborators,
        settlement_hook: Option<Arc<dyn SettlementHook>>,
    ) -> Result<Self, StreamError> {
        let instance = StreamInstance::open(config, collaborators).await?;
        Ok(Self {
            instance: Mutex::new(instance),
            settlement_hook,
        })
    }

    pub async fn status(&self) -> Result<StreamStatus, StreamError> {
        self.instance.lock().await.status()
    }

    pub async fn state(&self) -> StreamState {
        self.instance.lock().await.state().clone()
    }

    pub async fn preview_position(&self, participant: &Address) -> Result<Position, StreamError> {
        let instance = self.instance.lock().await;
        instance.preview_position(participant).await
    }

    pub async fn sync_stream(&self) -> Result<Receipt, StreamError> {
        self.instance.lock().await.sync_stream().await
    }

    pub async fn sync_position(&self, participant: &Address) -> Result<Receipt, StreamError> {
        self.instance.lock().await.sync_position(participant).await
    }

    pub async fn deposit(
        &self,
        participant: &Address,
        amount: u128,
        proof: &[Hash32],
    ) -> Result<Receipt, StreamError> {
        let mut instance = self.instance.lock().await;
        instance.deposit(participant, amount, proof).await
    }

    pub async fn deposit_with_permit(
        &self,
        permit: &DepositPermit,
        proof: &[Hash32],
    ) -> Result<Receipt, StreamError> {
        let mut instance = self.instance.lock().await;
        instance.deposit_with_permit(permit, proof).await
    }

    pub async fn withdraw(&self, participant: &Address, amount: u128) -> Result<Receipt, StreamError> {
        self.instance.lock().await.withdraw(participant, amount).await
    }

    pub async fn withdraw_all(&self, participant: &Address) -> Result<Receipt, StreamError> {
        self.instance.lock().await.withdraw_all(participant).await
    }

    pub async fn exit(&self, participant: &Address) -> Result<Receipt, StreamError> {
        let receipt = self.instance.lock().await.exit(participant).await?;
        self.dispatch(&receipt).await;
        Ok(receipt)
    }

    pub async fn finalize(&self, caller: &Address) -> Result<Receipt, StreamError> {
        let receipt = self.instance.lock().await.finalize(caller).await?;
        self.dispatch(&receipt).await;
        Ok(receipt)
    }

    pub async fn cancel(&self, caller: &Address) -> Result<Receipt, StreamError> {
        self.instance.lock().await.cancel(caller).await
    }

    async fn dispatch(&self, receipt: &Receipt) {
        if receipt.handoffs.is_empty() {
            return;
        }
        match &self.settlement_hook {
            Some(hook) => {
                dispatch_handoffs(hook.as_ref(), receipt.operation_id, &receipt.handoffs).await;
            }
            None => {
                info!(
                    operation_id = %receipt.operation_id,
                    count = receipt.handoffs.len(),
                    "No settlement hook configured, hand-offs dropped"
                );
            }
        }
    }
}
