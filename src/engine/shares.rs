use crate::domain::{mul_div_ceil, mul_div_floor, MathError};

/// Whether shares are being created or destroyed.
///
/// Mints round down and burns round up, so neither direction can extract
/// value from the remaining participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareDirection {
    /// Deposit: shares created for the depositor.
    Mint,
    /// Withdrawal: shares destroyed from the withdrawer.
    Burn,
}

/// Shares corresponding to `amount` of input at the current pool ratio.
///
/// An empty pool (or a zero amount) converts 1:1.
pub fn compute_shares(
    amount: u128,
    direction: ShareDirection,
    in_supply: u128,
    total_shares: u128,
) -> Result<u128, MathError> {
    if amount == 0 || total_shares == 0 || in_supply == 0 {
        return Ok(amount);
    }
    match direction {
        ShareDirection::Mint => mul_div_floor(amount, total_shares, in_supply),
        ShareDirection::Burn => mul_div_ceil(amount, total_shares, in_supply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bootstrap_is_one_to_one() {
        assert_eq!(compute_shares(500, ShareDirection::Mint, 0, 0).unwrap(), 500);
        assert_eq!(compute_shares(500, ShareDirection::Mint, 1000, 0).unwrap(), 500);
        assert_eq!(compute_shares(0, ShareDirection::Burn, 1000, 1000).unwrap(), 0);
    }

    #[test]
    fn test_pro_rata_mint() {
        // Pool spent down to 625 input backed by 1000 shares.
        assert_eq!(compute_shares(625, ShareDirection::Mint, 625, 1000).unwrap(), 1000);
        assert_eq!(compute_shares(100, ShareDirection::Mint, 625, 1000).unwrap(), 160);
    }

    #[test]
    fn test_rounding_is_asymmetric() {
        // 10 * 1000 / 3 = 3333.33..
        assert_eq!(compute_shares(10, ShareDirection::Mint, 3, 1000).unwrap(), 3333);
        assert_eq!(compute_shares(10, ShareDirection::Burn, 3, 1000).unwrap(), 3334);
    }

    proptest! {
        #[test]
        fn burn_never_below_mint(
            amount in 1u128..1_000_000_000,
            in_supply in 1u128..1_000_000_000,
            total_shares in 1u128..1_000_000_000,
        ) {
            let minted = compute_shares(amount, ShareDirection::Mint, in_supply, total_shares).unwrap();
            let burned = compute_shares(amount, ShareDirection::Burn, in_supply, total_shares).unwrap();
            prop_assert!(burned >= minted);
            prop_assert!(burned - minted <= 1);
        }
    }
}
