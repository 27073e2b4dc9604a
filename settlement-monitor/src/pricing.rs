//! Reserve pool pricing
//!
//! Pure arithmetic, no side effects. The price for a block is always
//! computed from the parent block's issuance and the pool value as refreshed
//! immediately before the block is processed, so a block's own transfers can
//! never influence the price used to value them.

use rust_decimal::Decimal;

use crate::{Error, Result};

/// USD price per token: `pool / issuance`
///
/// Zero issuance is a fatal precondition violation; it cannot occur on a
/// live chain past genesis.
pub fn pool_price(pool: Decimal, issuance: Decimal) -> Result<Decimal> {
    if issuance <= Decimal::ZERO {
        return Err(Error::ZeroIssuance);
    }
    pool.checked_div(issuance)
        .ok_or_else(|| Error::ArithmeticOverflow("pool / issuance".to_string()))
}

/// Convert a raw base-unit amount into whole tokens
pub fn to_tokens(raw: u128, decimals: u32) -> Result<Decimal> {
    let value = i128::try_from(raw).map_err(|_| Error::AmountRange(raw))?;
    Decimal::try_from_i128_with_scale(value, decimals).map_err(|_| Error::AmountRange(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_price() {
        // $50,000 pool over 1,000,000 tokens -> $0.05 per token
        let price = pool_price(Decimal::new(50_000, 0), Decimal::new(1_000_000, 0)).unwrap();
        assert_eq!(price, Decimal::new(5, 2));
    }

    #[test]
    fn test_pool_price_zero_issuance() {
        let err = pool_price(Decimal::new(50_000, 0), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, Error::ZeroIssuance));
    }

    #[test]
    fn test_to_tokens() {
        // 100 tokens at 10 decimals
        let tokens = to_tokens(1_000_000_000_000, 10).unwrap();
        assert_eq!(tokens, Decimal::new(100, 0));

        // Sub-token amounts keep their precision
        let tokens = to_tokens(5, 1).unwrap();
        assert_eq!(tokens, Decimal::new(5, 1));
    }

    #[test]
    fn test_to_tokens_out_of_range() {
        let err = to_tokens(u128::MAX, 10).unwrap_err();
        assert!(matches!(err, Error::AmountRange(_)));
    }
}
