//! HTTP delivery of settlement hand-offs.

use super::{HandoffKind, SettlementHandoff, SettlementHook, SettlementHookError};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HandoffPayload {
    operation_id: Uuid,
    kind: HandoffKind,
    beneficiary: String,
    asset: String,
    amount: String,
}

impl HandoffPayload {
    fn new(operation_id: Uuid, handoff: &SettlementHandoff) -> Self {
        Self {
            operation_id,
            kind: handoff.kind,
            beneficiary: handoff.beneficiary.to_string(),
            asset: handoff.asset.to_string(),
            amount: handoff.amount.to_string(),
        }
    }
}

/// Posts each hand-off as JSON, retrying transient failures.
///
/// The operation id travels with the payload so receivers can deduplicate
/// retried deliveries.
#[derive(Debug, Clone)]
pub struct WebhookSettlementHook {
    client: Client,
    url: String,
    max_elapsed: Duration,
}

impl WebhookSettlementHook {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
            max_elapsed: Duration::from_secs(30),
        }
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }
}

#[async_trait]
impl SettlementHook for WebhookSettlementHook {
    async fn hand_off(
        &self,
        operation_id: Uuid,
        handoff: &SettlementHandoff,
    ) -> Result<(), SettlementHookError> {
        let payload = HandoffPayload::new(operation_id, handoff);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        debug!(url = %self.url, kind = %handoff.kind, "Posting settlement hand-off");

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(SettlementHookError::Request(e.to_string())))?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(SettlementHookError::Rejected(
                    status.as_u16(),
                )));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(SettlementHookError::Rejected(
                    status.as_u16(),
                )));
            }
            Ok(())
        })
        .await
    }
}
