use alloy::primitives::U256;
use serde::Serialize;

use crate::utils::is_stablecoin;

/// Token metadata the engine values events against.
///
/// Primary Key: contract address
///
/// `decimals` is immutable once set; changing it would silently corrupt
/// every historical human-readable conversion, so the engine assumes it
/// rather than enforcing it.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    // Primary key
    pub address: String,

    // On-chain metadata (immutable after registration)
    pub symbol: String,
    pub name: String,
    pub decimals: u8,

    // Supply, when the harness has resolved it (feeds FDV)
    pub total_supply: Option<U256>,
}

impl Token {
    pub fn new(address: String, symbol: String, name: String, decimals: u8) -> Self {
        Self {
            // Always lowercase addresses for consistent comparisons
            address: address.to_lowercase(),
            symbol,
            name,
            decimals,
            total_supply: None,
        }
    }

    /// Whether this token prices at par on the stable allow-list.
    pub fn is_stable(&self) -> bool {
        is_stablecoin(&self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_normalizes_address() {
        let token = Token::new(
            "0xA0B86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
            "USDC".to_string(),
            "USD Coin".to_string(),
            6,
        );
        assert_eq!(token.address, "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        assert!(token.is_stable());
        assert_eq!(token.total_supply, None);
    }

    #[test]
    fn test_non_stable_token() {
        let token = Token::new("0xweth".to_string(), "WETH".to_string(), "Wrapped Ether".to_string(), 18);
        assert!(!token.is_stable());
    }
}
