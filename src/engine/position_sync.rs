use crate::domain::{mul_div_floor, DistributionLedger, MathError, Position, TimeMs};
use tracing::debug;

/// Catch a position up with the ledger.
///
/// Output purchased grows by `shares * (index - position.index)`; the input
/// balance shrinks to the position's share of the outstanding pool, and the
/// difference is booked as spent.
pub fn sync_position(
    position: &Position,
    ledger: &DistributionLedger,
    now: TimeMs,
) -> Result<Position, MathError> {
    let mut next = position.clone();

    let delta_index = ledger.dist_index.checked_sub(position.index)?;
    if position.shares > 0 && !delta_index.is_zero() {
        let purchased_delta = delta_index.mul_integer_floor(position.shares)?;
        next.purchased = position
            .purchased
            .checked_add(purchased_delta)
            .ok_or(MathError::Overflow)?;
    }

    if ledger.shares > 0 {
        // Floor-rounded mints by other participants can lift the per-share
        // value; a position never gains input from that dust.
        let new_balance =
            mul_div_floor(position.shares, ledger.in_supply, ledger.shares)?.min(position.in_balance);
        let spent_delta = position.in_balance - new_balance;
        next.spent_in = position
            .spent_in
            .checked_add(spent_delta)
            .ok_or(MathError::Overflow)?;
        next.in_balance = new_balance;
    }

    next.index = ledger.dist_index;
    next.last_updated = now.max(position.last_updated);

    debug!(
        shares = next.shares,
        in_balance = next.in_balance,
        purchased = next.purchased,
        "Position synced"
    );

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;

    fn ledger(index: &str, in_supply: u128, shares: u128) -> DistributionLedger {
        let mut ledger = DistributionLedger::new(2000, TimeMs(0));
        ledger.dist_index = Decimal::from_str_canonical(index).unwrap();
        ledger.in_supply = in_supply;
        ledger.shares = shares;
        ledger
    }

    #[test]
    fn test_sync_books_purchase_and_spend() {
        let position = Position {
            in_balance: 1000,
            shares: 1000,
            ..Position::default()
        };
        let synced = sync_position(&position, &ledger("0.75", 625, 1000), TimeMs(250)).unwrap();
        assert_eq!(synced.purchased, 750);
        assert_eq!(synced.in_balance, 625);
        assert_eq!(synced.spent_in, 375);
        assert_eq!(synced.index, Decimal::from_str_canonical("0.75").unwrap());
        assert_eq!(synced.last_updated, TimeMs(250));
    }

    #[test]
    fn test_sync_is_idempotent() {
        let position = Position {
            in_balance: 1000,
            shares: 1000,
            ..Position::default()
        };
        let ledger = ledger("0.75", 625, 1000);
        let once = sync_position(&position, &ledger, TimeMs(250)).unwrap();
        let twice = sync_position(&once, &ledger, TimeMs(250)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sync_of_unknown_participant_only_records_index() {
        let synced =
            sync_position(&Position::default(), &ledger("3.5", 100, 100), TimeMs(10)).unwrap();
        assert_eq!(synced.purchased, 0);
        assert_eq!(synced.in_balance, 0);
        assert_eq!(synced.index, Decimal::from_str_canonical("3.5").unwrap());
    }

    #[test]
    fn test_sync_never_credits_rounding_gains() {
        // Pool value per share rose above the stored balance.
        let position = Position {
            in_balance: 1,
            shares: 1,
            ..Position::default()
        };
        let synced = sync_position(&position, &ledger("0", 4, 2), TimeMs(1)).unwrap();
        assert_eq!(synced.in_balance, 1);
        assert_eq!(synced.spent_in, 0);
    }

    #[test]
    fn test_index_behind_position_is_a_defect() {
        let position = Position {
            index: Decimal::from_integer(2).unwrap(),
            ..Position::default()
        };
        assert_eq!(
            sync_position(&position, &ledger("1", 0, 0), TimeMs(0)),
            Err(MathError::Underflow)
        );
    }
}
