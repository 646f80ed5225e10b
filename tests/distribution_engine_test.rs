use proptest::prelude::*;
use streamswap::domain::{Decimal, DistributionLedger, Position, StreamTiming, TimeMs};
use streamswap::engine::{
    compute_shares, sync_position, update_distribution, AssetPrecision, ShareDirection,
};

fn timing() -> StreamTiming {
    StreamTiming::new(TimeMs(100), TimeMs(200), TimeMs(300), 0).unwrap()
}

fn tick(ledger: &DistributionLedger, now: i64) -> DistributionLedger {
    update_distribution(ledger, TimeMs(now), &timing(), AssetPrecision::default()).unwrap()
}

/// Deposit into a position the way the instance does, without fees.
fn deposit(ledger: &mut DistributionLedger, position: &Position, amount: u128, now: i64) -> Position {
    let mut position = sync_position(position, ledger, TimeMs(now)).unwrap();
    let minted = compute_shares(amount, ShareDirection::Mint, ledger.in_supply, ledger.shares).unwrap();
    position.in_balance += amount;
    position.shares += minted;
    ledger.in_supply += amount;
    ledger.shares += minted;
    position
}

#[test]
fn test_linear_release_scenario() {
    let mut ledger = DistributionLedger::new(2000, TimeMs(220));
    ledger.in_supply = 1000;
    ledger.shares = 1;

    let next = tick(&ledger, 250);
    assert_eq!(next.spent_in, 375);
    assert_eq!(next.in_supply, 625);
    assert_eq!(next.out_remaining, 1250);
    assert_eq!(next.out_released(), 750);
    assert_eq!(next.dist_index, Decimal::from_integer(750).unwrap());
    assert_eq!(next.last_updated, TimeMs(250));
}

#[test]
fn test_late_depositor_dilution_scenario() {
    let mut ledger = DistributionLedger::new(2000, TimeMs(100));

    ledger = tick(&ledger, 150);
    let alice = deposit(&mut ledger, &Position::default(), 1000, 150);
    assert_eq!(alice.shares, 1000);

    // Half the window elapsed: half of Alice's input is spent on half the supply.
    ledger = tick(&ledger, 250);
    assert_eq!(ledger.in_supply, 500);
    assert_eq!(ledger.dist_index, Decimal::one());

    let bob = deposit(&mut ledger, &Position::default(), 625, 250);
    assert_eq!(bob.shares, 1250);
    assert_eq!(ledger.in_supply, 1125);
    assert_eq!(ledger.shares, 2250);

    ledger = tick(&ledger, 300);
    assert_eq!(ledger.out_remaining, 0);
    assert_eq!(ledger.in_supply, 0);
    assert_eq!(ledger.dist_index, Decimal::from_str_canonical("1.444444").unwrap());

    let alice = sync_position(&alice, &ledger, TimeMs(300)).unwrap();
    let bob = sync_position(&bob, &ledger, TimeMs(300)).unwrap();
    assert_eq!((alice.purchased, alice.spent_in, alice.in_balance), (1444, 1000, 0));
    assert_eq!((bob.purchased, bob.spent_in, bob.in_balance), (555, 625, 0));
    assert!(alice.purchased + bob.purchased <= ledger.out_released());
}

#[test]
fn test_no_release_without_shares() {
    let ledger = DistributionLedger::new(2000, TimeMs(150));
    let next = tick(&ledger, 250);
    assert_eq!(next.out_remaining, 2000);
    assert!(next.dist_index.is_zero());
    assert_eq!(next.last_updated, TimeMs(250));
}

proptest! {
    #[test]
    fn prop_ticks_conserve_supply_and_keep_index_monotonic(
        supply in 1u128..1_000_000_000_000,
        in_supply in 1u128..1_000_000_000_000,
        shares in 1u128..1_000_000_000,
        mut times in prop::collection::vec(0i64..400, 1..20),
    ) {
        times.sort_unstable();
        let mut ledger = DistributionLedger::new(supply, TimeMs(0));
        ledger.in_supply = in_supply;
        ledger.shares = shares;
        let total_in = in_supply;

        for now in times {
            let next = tick(&ledger, now);
            prop_assert!(next.dist_index >= ledger.dist_index);
            prop_assert_eq!(next.out_remaining + next.out_released(), supply);
            prop_assert_eq!(next.in_supply + next.spent_in, total_in);
            prop_assert!(next.last_updated >= ledger.last_updated);
            ledger = next;
        }

        let ended = tick(&ledger, 300);
        prop_assert_eq!(ended.out_remaining, 0);
        prop_assert_eq!(ended.in_supply, 0);
    }

    #[test]
    fn prop_repeated_tick_is_idempotent(
        in_supply in 1u128..1_000_000_000,
        last in 0i64..300,
        now in 0i64..400,
    ) {
        let mut ledger = DistributionLedger::new(2000, TimeMs(last));
        ledger.in_supply = in_supply;
        ledger.shares = in_supply;
        let once = tick(&ledger, now);
        let twice = tick(&once, now);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_mint_then_burn_never_profits(
        amount in 1u128..1_000_000_000,
        in_supply in 1u128..1_000_000_000_000,
        shares in 1u128..1_000_000_000_000,
    ) {
        let minted = compute_shares(amount, ShareDirection::Mint, in_supply, shares).unwrap();
        let in_after = in_supply + amount;
        let shares_after = shares + minted;
        // The amount redeemable for the minted shares, rounded down.
        let redeemable = streamswap::domain::mul_div_floor(minted, in_after, shares_after).unwrap();
        prop_assert!(redeemable <= amount);
        // Burning what was deposited costs at least the minted shares.
        let burned = compute_shares(amount, ShareDirection::Burn, in_after, shares_after).unwrap();
        prop_assert!(burned >= minted);
    }

    #[test]
    fn prop_synced_balances_never_exceed_pool(
        deposits in prop::collection::vec((1u128..1_000_000, 100i64..300), 1..8),
        end_at in 200i64..320,
    ) {
        let mut ledger = DistributionLedger::new(1_000_000, TimeMs(100));
        let mut positions = Vec::new();
        let mut sorted = deposits;
        sorted.sort_by_key(|(_, at)| *at);
        for (amount, at) in sorted {
            ledger = tick(&ledger, at);
            let position = deposit(&mut ledger, &Position::default(), amount, at);
            positions.push(position);
        }

        let now = end_at.max(ledger.last_updated.as_ms());
        ledger = tick(&ledger, now);
        let synced: Vec<Position> = positions
            .iter()
            .map(|p| sync_position(p, &ledger, TimeMs(now)).unwrap())
            .collect();

        let total_balance: u128 = synced.iter().map(|p| p.in_balance).sum();
        let total_purchased: u128 = synced.iter().map(|p| p.purchased).sum();
        prop_assert!(total_balance <= ledger.in_supply);
        prop_assert!(total_purchased <= ledger.out_released());
        let total_shares: u128 = synced.iter().map(|p| p.shares).sum();
        prop_assert_eq!(total_shares, ledger.shares);
    }
}
