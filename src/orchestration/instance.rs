//! One stream instance: ledger, phase and configuration, sequenced through
//! the pure engine on every entry point.
//!
//! Every entry point follows the same shape: recompute the phase, tick the
//! ledger, sync the participant if there is one, apply the operation's own
//! effect, then commit. All computation happens on copies; the store applies
//! an operation's transfers, position, permit nonce and state as one unit,
//! and the in-memory state is replaced only after that unit committed.

use crate::allowlist::{AllowListVerifier, Hash32, MerkleRoot};
use crate::assets::{Transfer, TransferError};
use crate::domain::{
    Address, AssetId, Decimal, DistributionLedger, MathError, Phase, Position, StreamTiming, TimeMs,
};
use crate::engine::{
    compute_shares, phase_at, split_fee, sync_position, update_distribution, AssetPrecision,
    ShareDirection,
};
use crate::orchestration::clock::Clock;
use crate::orchestration::receipt::{Operation, Receipt};
use crate::permit::{AuthorizationError, DepositAuthorizer, DepositPermit};
use crate::settlement::{HandoffKind, SettlementHandoff};
use crate::store::{CommitError, OperationCommit, StoreError, StreamStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Share of creator revenue routed to a liquidity pool on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub ratio: Decimal,
    pub account: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementOptions {
    pub creator_vesting: bool,
    pub subscriber_vesting: bool,
    pub pool: Option<PoolOptions>,
}

/// Static configuration of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub creator: Address,
    /// Escrow account holding the stream's input and output.
    pub stream_account: Address,
    pub in_asset: AssetId,
    pub out_asset: AssetId,
    pub out_supply: u128,
    pub timing: StreamTiming,
    pub precision: AssetPrecision,
    pub deposit_fee_ratio: Decimal,
    pub exit_fee_ratio: Decimal,
    pub fee_collector: Address,
    pub allowlist_root: MerkleRoot,
    pub settlement: SettlementOptions,
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), StreamError> {
        let invalid = |msg: &str| Err(StreamError::InvalidInput(msg.to_string()));
        if self.in_asset == self.out_asset {
            return invalid("in and out assets must differ");
        }
        if self.out_supply == 0 {
            return invalid("out supply must be positive");
        }
        if self.timing.bootstrapping_start > self.timing.stream_start
            || self.timing.stream_start >= self.timing.stream_end
        {
            return invalid("checkpoints must satisfy bootstrapping_start <= stream_start < stream_end");
        }
        if self.creator == self.stream_account {
            return invalid("creator and stream account must differ");
        }
        if self.deposit_fee_ratio.greater_than(&Decimal::one())
            || self.exit_fee_ratio.greater_than(&Decimal::one())
        {
            return invalid("fee ratios must be within [0, 1]");
        }
        if let Some(pool) = &self.settlement.pool {
            if pool.ratio.greater_than(&Decimal::one()) {
                return invalid("pool ratio must be within [0, 1]");
            }
        }
        Ok(())
    }
}

/// Mutable global state of an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamState {
    pub phase: Phase,
    pub ledger: DistributionLedger,
}

/// Projected view of the stream at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatus {
    pub as_of: TimeMs,
    pub phase: Phase,
    pub ledger: DistributionLedger,
    pub timing: StreamTiming,
    pub threshold_met: bool,
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{operation} is not allowed in phase {phase}")]
    OperationNotAllowed { operation: Operation, phase: Phase },
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("amount {requested} exceeds balance {available}")]
    ExceedsBalance { requested: u128, available: u128 },
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

impl From<CommitError> for StreamError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::Transfer(e) => StreamError::Transfer(e),
            CommitError::Store(e) => StreamError::Store(e),
            CommitError::Authorization(e) => StreamError::Authorization(e),
        }
    }
}

/// External collaborators of an instance.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StreamStore>,
    pub allowlist: Arc<dyn AllowListVerifier>,
    /// `None` disables delegated deposits.
    pub authorizer: Option<Arc<dyn DepositAuthorizer>>,
    pub clock: Arc<dyn Clock>,
}

/// How much a withdrawal takes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WithdrawAmount {
    Exact(u128),
    All,
}

/// Fully computed effect of an operation, not yet applied.
struct PendingOperation {
    operation_id: Uuid,
    operation: Operation,
    state: StreamState,
    participant: Option<(Address, Position)>,
    permit_nonce: Option<(Address, u64)>,
    transfers: Vec<Transfer>,
    handoffs: Vec<SettlementHandoff>,
}

impl PendingOperation {
    fn new(operation: Operation, state: StreamState) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            operation,
            state,
            participant: None,
            permit_nonce: None,
            transfers: Vec::new(),
            handoffs: Vec::new(),
        }
    }

    fn transfer(&mut self, asset: &AssetId, from: &Address, to: &Address, amount: u128) {
        if amount > 0 {
            self.transfers
                .push(Transfer::new(asset.clone(), from.clone(), to.clone(), amount));
        }
    }

    fn handoff(&mut self, kind: HandoffKind, beneficiary: &Address, asset: &AssetId, amount: u128) {
        if amount > 0 {
            self.handoffs.push(SettlementHandoff {
                kind,
                beneficiary: beneficiary.clone(),
                asset: asset.clone(),
                amount,
            });
        }
    }
}

fn checked_add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

fn checked_sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

pub struct StreamInstance {
    config: StreamConfig,
    state: StreamState,
    collaborators: Collaborators,
}

impl StreamInstance {
    /// Create a new instance and move the output supply into escrow.
    ///
    /// The escrow transfer and the initial state are committed together.
    pub async fn create(
        config: StreamConfig,
        collaborators: Collaborators,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        let now = collaborators.clock.now();
        let state = StreamState {
            phase: phase_at(Phase::Waiting, now, &config.timing),
            ledger: DistributionLedger::new(config.out_supply, now),
        };

        let mut instance = Self {
            config,
            state: state.clone(),
            collaborators,
        };
        let mut pending = PendingOperation::new(Operation::Create, state);
        pending.transfer(
            &instance.config.out_asset,
            &instance.config.creator,
            &instance.config.stream_account,
            instance.config.out_supply,
        );
        let receipt = instance.commit(pending).await?;

        info!(
            operation_id = %receipt.operation_id,
            creator = %instance.config.creator,
            out_supply = instance.config.out_supply,
            phase = %receipt.phase,
            "Stream created"
        );
        Ok(instance)
    }

    /// Restore the instance from its store, or create it if nothing was
    /// committed yet.
    pub async fn open(
        config: StreamConfig,
        collaborators: Collaborators,
    ) -> Result<Self, StreamError> {
        match collaborators.store.load_state().await? {
            Some(state) => {
                info!(phase = %state.phase, "Restored stream state");
                Self::restore(config, state, collaborators)
            }
            None => Self::create(config, collaborators).await,
        }
    }

    /// Rebuild an instance from previously persisted state.
    pub fn restore(
        config: StreamConfig,
        state: StreamState,
        collaborators: Collaborators,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        if state.ledger.out_supply != config.out_supply {
            return Err(StreamError::InvalidInput(format!(
                "persisted out supply {} does not match configured {}",
                state.ledger.out_supply, config.out_supply
            )));
        }
        Ok(Self {
            config,
            state,
            collaborators,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Phase and ledger as of `now`, computed on a copy.
    fn refresh(&self, now: TimeMs) -> Result<StreamState, MathError> {
        let phase = phase_at(self.state.phase, now, &self.config.timing);
        let ledger = if phase.is_terminal() {
            self.state.ledger.clone()
        } else {
            update_distribution(
                &self.state.ledger,
                now,
                &self.config.timing,
                self.config.precision,
            )?
        };
        Ok(StreamState { phase, ledger })
    }

    fn ensure_creator(&self, caller: &Address, operation: Operation) -> Result<(), StreamError> {
        if caller != &self.config.creator {
            warn!(%caller, %operation, "Rejected non-creator caller");
            return Err(StreamError::Unauthorized(format!(
                "only the creator may {}",
                operation
            )));
        }
        Ok(())
    }

    fn not_allowed(operation: Operation, phase: Phase) -> StreamError {
        warn!(%operation, %phase, "Operation rejected in current phase");
        StreamError::OperationNotAllowed { operation, phase }
    }

    /// Stream state projected to the current time. Nothing is persisted.
    pub fn status(&self) -> Result<StreamStatus, StreamError> {
        let now = self.collaborators.clock.now();
        let state = self.refresh(now)?;
        Ok(StreamStatus {
            as_of: now,
            phase: state.phase,
            threshold_met: state.ledger.threshold_met(&self.config.timing),
            ledger: state.ledger,
            timing: self.config.timing,
        })
    }

    /// A participant's position as a sync at the current time would leave it.
    pub async fn preview_position(&self, participant: &Address) -> Result<Position, StreamError> {
        let now = self.collaborators.clock.now();
        let state = self.refresh(now)?;
        let position = self.collaborators.store.position(participant).await?;
        if position.is_exited() {
            return Ok(position);
        }
        Ok(sync_position(&position, &state.ledger, now)?)
    }

    /// Advance phase and ledger to now and persist the result.
    pub async fn sync_stream(&mut self) -> Result<Receipt, StreamError> {
        let now = self.collaborators.clock.now();
        let state = self.refresh(now)?;
        self.commit(PendingOperation::new(Operation::SyncStream, state))
            .await
    }

    /// Catch one participant up with the ledger. Exited positions are left as they are.
    pub async fn sync_position(&mut self, participant: &Address) -> Result<Receipt, StreamError> {
        let now = self.collaborators.clock.now();
        let state = self.refresh(now)?;
        let position = self.collaborators.store.position(participant).await?;
        let position = if position.is_exited() {
            position
        } else {
            sync_position(&position, &state.ledger, now)?
        };

        let mut pending = PendingOperation::new(Operation::SyncPosition, state);
        pending.participant = Some((participant.clone(), position));
        self.commit(pending).await
    }

    /// Deposit `amount` of the input asset for `participant`.
    ///
    /// `proof` is only consulted on the participant's first deposit, and only
    /// when an allow-list root is configured.
    pub async fn deposit(
        &mut self,
        participant: &Address,
        amount: u128,
        proof: &[Hash32],
    ) -> Result<Receipt, StreamError> {
        let pending = self.prepare_deposit(participant, amount, proof).await?;
        self.commit(pending).await
    }

    /// Deposit on behalf of the permit's owner.
    ///
    /// The permit nonce is spent in the same commit as the deposit, so a
    /// permit authorizes at most one deposit and a failed deposit leaves it
    /// usable.
    pub async fn deposit_with_permit(
        &mut self,
        permit: &DepositPermit,
        proof: &[Hash32],
    ) -> Result<Receipt, StreamError> {
        let authorizer = self
            .collaborators
            .authorizer
            .clone()
            .ok_or(AuthorizationError::Disabled)?;
        let now = self.collaborators.clock.now();
        authorizer.verify(permit, now).await?;
        if self
            .collaborators
            .store
            .permit_used(&permit.owner, permit.nonce)
            .await?
        {
            return Err(AuthorizationError::NonceUsed(permit.nonce).into());
        }

        let mut pending = self
            .prepare_deposit(&permit.owner, permit.amount, proof)
            .await?;
        pending.permit_nonce = Some((permit.owner.clone(), permit.nonce));
        self.commit(pending).await
    }

    async fn prepare_deposit(
        &self,
        participant: &Address,
        amount: u128,
        proof: &[Hash32],
    ) -> Result<PendingOperation, StreamError> {
        let now = self.collaborators.clock.now();
        let mut state = self.refresh(now)?;
        if !state.phase.accepts_participation() {
            return Err(Self::not_allowed(Operation::Deposit, state.phase));
        }
        if amount == 0 {
            return Err(StreamError::InvalidInput("deposit amount must be positive".into()));
        }

        let stored = self.collaborators.store.position(participant).await?;
        if stored.is_exited() {
            return Err(StreamError::InvalidPosition(format!(
                "{} has already exited",
                participant
            )));
        }
        if !self.config.allowlist_root.is_zero()
            && stored.is_empty()
            && !self
                .collaborators
                .allowlist
                .verify(proof, &self.config.allowlist_root, participant)
        {
            warn!(%participant, "Allow-list proof rejected");
            return Err(StreamError::Unauthorized(format!(
                "{} is not on the allow-list",
                participant
            )));
        }

        let split = split_fee(amount, self.config.deposit_fee_ratio)?;
        if split.remainder == 0 {
            return Err(StreamError::InvalidInput(
                "deposit is fully consumed by the fee".into(),
            ));
        }

        let mut position = sync_position(&stored, &state.ledger, now)?;
        let ledger = &mut state.ledger;
        let minted = compute_shares(
            split.remainder,
            ShareDirection::Mint,
            ledger.in_supply,
            ledger.shares,
        )?;
        if minted == 0 {
            return Err(StreamError::InvalidInput(
                "deposit is too small to mint shares".into(),
            ));
        }

        position.in_balance = checked_add(position.in_balance, split.remainder)?;
        position.shares = checked_add(position.shares, minted)?;
        ledger.in_supply = checked_add(ledger.in_supply, split.remainder)?;
        ledger.shares = checked_add(ledger.shares, minted)?;

        let mut pending = PendingOperation::new(Operation::Deposit, state);
        pending.transfer(
            &self.config.in_asset,
            participant,
            &self.config.fee_collector,
            split.fee,
        );
        pending.transfer(
            &self.config.in_asset,
            participant,
            &self.config.stream_account,
            split.remainder,
        );
        pending.participant = Some((participant.clone(), position));
        Ok(pending)
    }

    /// Withdraw `amount` of the participant's unspent input.
    pub async fn withdraw(
        &mut self,
        participant: &Address,
        amount: u128,
    ) -> Result<Receipt, StreamError> {
        let pending = self
            .prepare_withdraw(participant, WithdrawAmount::Exact(amount))
            .await?;
        self.commit(pending).await
    }

    /// Withdraw the participant's entire unspent input.
    pub async fn withdraw_all(&mut self, participant: &Address) -> Result<Receipt, StreamError> {
        let pending = self
            .prepare_withdraw(participant, WithdrawAmount::All)
            .await?;
        self.commit(pending).await
    }

    async fn prepare_withdraw(
        &self,
        participant: &Address,
        amount: WithdrawAmount,
    ) -> Result<PendingOperation, StreamError> {
        let now = self.collaborators.clock.now();
        let mut state = self.refresh(now)?;
        if !state.phase.accepts_participation() {
            return Err(Self::not_allowed(Operation::Withdraw, state.phase));
        }

        let stored = self.collaborators.store.position(participant).await?;
        if stored.is_exited() || stored.shares == 0 {
            return Err(StreamError::InvalidPosition(format!(
                "{} has no active position",
                participant
            )));
        }

        let mut position = sync_position(&stored, &state.ledger, now)?;
        let amount = match amount {
            WithdrawAmount::Exact(0) => {
                return Err(StreamError::InvalidInput(
                    "withdraw amount must be positive".into(),
                ))
            }
            WithdrawAmount::Exact(amount) => amount,
            WithdrawAmount::All => position.in_balance,
        };
        if amount > position.in_balance {
            return Err(StreamError::ExceedsBalance {
                requested: amount,
                available: position.in_balance,
            });
        }
        if amount == 0 {
            return Err(StreamError::InvalidPosition(format!(
                "{} has no unspent balance",
                participant
            )));
        }

        let ledger = &mut state.ledger;
        let burned = if amount == position.in_balance {
            position.shares
        } else {
            compute_shares(amount, ShareDirection::Burn, ledger.in_supply, ledger.shares)?
        };

        position.shares = checked_sub(position.shares, burned)?;
        position.in_balance = checked_sub(position.in_balance, amount)?;
        ledger.shares = checked_sub(ledger.shares, burned)?;
        ledger.in_supply = checked_sub(ledger.in_supply, amount)?;

        // The last shares out take the rounding dust with them.
        let mut payout = amount;
        if ledger.shares == 0 && ledger.in_supply > 0 {
            payout = checked_add(payout, ledger.in_supply)?;
            ledger.in_supply = 0;
        }

        let mut pending = PendingOperation::new(Operation::Withdraw, state);
        pending.transfer(
            &self.config.in_asset,
            &self.config.stream_account,
            participant,
            payout,
        );
        pending.participant = Some((participant.clone(), position));
        Ok(pending)
    }

    /// Settle one participant once the outcome is known.
    ///
    /// On success the participant receives the purchased output and the
    /// unspent input; otherwise every unit of input they put in comes back.
    pub async fn exit(&mut self, participant: &Address) -> Result<Receipt, StreamError> {
        let now = self.collaborators.clock.now();
        let state = self.refresh(now)?;
        if !state.phase.allows_exit() {
            return Err(Self::not_allowed(Operation::Exit, state.phase));
        }

        let stored = self.collaborators.store.position(participant).await?;
        if stored.is_exited() {
            return Err(StreamError::InvalidPosition(format!(
                "{} has already exited",
                participant
            )));
        }
        if stored.is_empty() {
            return Err(StreamError::InvalidPosition(format!(
                "{} has no position",
                participant
            )));
        }

        let mut position = sync_position(&stored, &state.ledger, now)?;
        position.exited_at = Some(now);

        let succeeded = match state.phase {
            Phase::SettledSuccess => true,
            Phase::Ended => state.ledger.threshold_met(&self.config.timing),
            _ => false,
        };

        let config = &self.config;
        let mut pending = PendingOperation::new(Operation::Exit, state);
        if succeeded {
            pending.transfer(
                &config.out_asset,
                &config.stream_account,
                participant,
                position.purchased,
            );
            pending.transfer(
                &config.in_asset,
                &config.stream_account,
                participant,
                position.in_balance,
            );
            if config.settlement.subscriber_vesting {
                pending.handoff(
                    HandoffKind::SubscriberVesting,
                    participant,
                    &config.out_asset,
                    position.purchased,
                );
            }
        } else {
            let refund = checked_add(position.in_balance, position.spent_in)?;
            pending.transfer(
                &config.in_asset,
                &config.stream_account,
                participant,
                refund,
            );
        }
        pending.participant = Some((participant.clone(), position));
        self.commit(pending).await
    }

    /// Settle the stream after it ended. Creator only.
    pub async fn finalize(&mut self, caller: &Address) -> Result<Receipt, StreamError> {
        self.ensure_creator(caller, Operation::Finalize)?;
        let now = self.collaborators.clock.now();
        let mut state = self.refresh(now)?;
        if state.phase != Phase::Ended {
            return Err(Self::not_allowed(Operation::Finalize, state.phase));
        }

        let config = &self.config;
        let threshold_met = state.ledger.threshold_met(&config.timing);
        state.phase = if threshold_met {
            Phase::SettledSuccess
        } else {
            Phase::SettledRefund
        };

        let spent_in = state.ledger.spent_in;
        let out_remaining = state.ledger.out_remaining;
        let mut pending = PendingOperation::new(Operation::Finalize, state);

        if threshold_met {
            let fee_split = split_fee(spent_in, config.exit_fee_ratio)?;
            pending.transfer(
                &config.in_asset,
                &config.stream_account,
                &config.fee_collector,
                fee_split.fee,
            );

            let mut revenue = fee_split.remainder;
            if let Some(pool) = &config.settlement.pool {
                let pool_split = split_fee(revenue, pool.ratio)?;
                pending.transfer(
                    &config.in_asset,
                    &config.stream_account,
                    &pool.account,
                    pool_split.fee,
                );
                pending.handoff(
                    HandoffKind::LiquidityPool,
                    &config.creator,
                    &config.in_asset,
                    pool_split.fee,
                );
                revenue = pool_split.remainder;
            }

            pending.transfer(
                &config.in_asset,
                &config.stream_account,
                &config.creator,
                revenue,
            );
            if config.settlement.creator_vesting {
                pending.handoff(
                    HandoffKind::CreatorVesting,
                    &config.creator,
                    &config.in_asset,
                    revenue,
                );
            }
            pending.transfer(
                &config.out_asset,
                &config.stream_account,
                &config.creator,
                out_remaining,
            );
        } else {
            pending.transfer(
                &config.out_asset,
                &config.stream_account,
                &config.creator,
                config.out_supply,
            );
        }

        self.commit(pending).await
    }

    /// Abort the stream before it ends. Creator only.
    pub async fn cancel(&mut self, caller: &Address) -> Result<Receipt, StreamError> {
        self.ensure_creator(caller, Operation::Cancel)?;
        let now = self.collaborators.clock.now();
        let mut state = self.refresh(now)?;
        if !matches!(
            state.phase,
            Phase::Waiting | Phase::Bootstrapping | Phase::Active
        ) {
            return Err(Self::not_allowed(Operation::Cancel, state.phase));
        }
        state.phase = Phase::Cancelled;

        let config = &self.config;
        let mut pending = PendingOperation::new(Operation::Cancel, state);
        pending.transfer(
            &config.out_asset,
            &config.stream_account,
            &config.creator,
            config.out_supply,
        );
        self.commit(pending).await
    }

    /// Apply a computed operation as one unit, then replace the in-memory
    /// state.
    async fn commit(&mut self, pending: PendingOperation) -> Result<Receipt, StreamError> {
        let PendingOperation {
            operation_id,
            operation,
            state,
            participant,
            permit_nonce,
            transfers,
            handoffs,
        } = pending;

        let unit = OperationCommit {
            operation_id,
            transfers: &transfers,
            position: participant.as_ref().map(|(who, position)| (who, position)),
            permit_nonce: permit_nonce.as_ref().map(|(owner, nonce)| (owner, *nonce)),
            state: &state,
        };
        if let Err(e) = self.collaborators.store.commit(unit).await {
            warn!(%operation_id, %operation, "Operation discarded: {}", e);
            return Err(e.into());
        }

        if state.phase != self.state.phase {
            info!(from = %self.state.phase, to = %state.phase, "Phase changed");
        }
        self.state = state;

        info!(
            %operation_id,
            %operation,
            phase = %self.state.phase,
            transfers = transfers.len(),
            "Operation committed"
        );

        let (participant, position) = match participant {
            Some((who, position)) => (Some(who), Some(position)),
            None => (None, None),
        };
        Ok(Receipt {
            operation_id,
            operation,
            phase: self.state.phase,
            transfers,
            participant,
            position,
            handoffs,
        })
    }
}
