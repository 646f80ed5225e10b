use super::{SettlementHandoff, SettlementHook, SettlementHookError};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-process hook that records every hand-off it receives.
#[derive(Debug, Default)]
pub struct RecordingSettlementHook {
    fail: bool,
    received: Mutex<Vec<(Uuid, SettlementHandoff)>>,
}

impl RecordingSettlementHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook that rejects everything after recording it.
    pub fn failing() -> Self {
        Self {
            fail: true,
            received: Mutex::new(Vec::new()),
        }
    }

    pub async fn recorded(&self) -> Vec<(Uuid, SettlementHandoff)> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl SettlementHook for RecordingSettlementHook {
    async fn hand_off(
        &self,
        operation_id: Uuid,
        handoff: &SettlementHandoff,
    ) -> Result<(), SettlementHookError> {
        self.received
            .lock()
            .await
            .push((operation_id, handoff.clone()));
        if self.fail {
            return Err(SettlementHookError::Rejected(503));
        }
        Ok(())
    }
}
