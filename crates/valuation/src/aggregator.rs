use solboard_core_types::{Valued, WalletEntry};
use solboard_pricing::{PriceResolver, QuoteCache};
use solboard_sources::{BalanceSource, HoldingsSource};
use tracing::{debug, warn};

use crate::FreezeController;

/// A wallet that has a recorded starting value.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedWallet {
    pub entry: WalletEntry,
    pub start_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenValuation {
    /// Token holdings value in SOL.
    pub value: f64,
    pub holdings_unresolved: bool,
    pub unresolved_prices: usize,
    pub carried_forward: bool,
}

impl TokenValuation {
    pub fn live(value: f64, holdings_unresolved: bool, unresolved_prices: usize) -> Self {
        Self {
            value,
            holdings_unresolved,
            unresolved_prices,
            carried_forward: false,
        }
    }

    pub fn carried(value: f64) -> Self {
        Self {
            value: if value.is_finite() { value } else { 0.0 },
            holdings_unresolved: false,
            unresolved_prices: 0,
            carried_forward: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletValuation {
    pub wallet: TrackedWallet,
    pub sol: Valued,
    pub tokens: TokenValuation,
}

impl WalletValuation {
    pub fn total(&self) -> f64 {
        self.sol.amount() + self.tokens.value
    }
}

/// Combines balance, holdings and prices into one wallet value.
///
/// Lookup failures never propagate: they become zero contributions and are
/// logged with `unresolved = true`.
pub struct WalletValuator<'a> {
    balance: &'a dyn BalanceSource,
    holdings: &'a dyn HoldingsSource,
    prices: &'a PriceResolver,
}

impl<'a> WalletValuator<'a> {
    pub fn new(
        balance: &'a dyn BalanceSource,
        holdings: &'a dyn HoldingsSource,
        prices: &'a PriceResolver,
    ) -> Self {
        Self {
            balance,
            holdings,
            prices,
        }
    }

    pub fn valuate(
        &self,
        wallet: &TrackedWallet,
        native_usd_rate: f64,
        freeze: &FreezeController,
        cache: &QuoteCache,
    ) -> WalletValuation {
        let address = wallet.entry.wallet.as_str();
        let sol = self.native_balance(address);
        let tokens = freeze.holdings_value(address, || {
            self.live_token_value(address, native_usd_rate, cache)
        });
        debug!(
            wallet = %address,
            sol = sol.amount(),
            tokens = tokens.value,
            carried_forward = tokens.carried_forward,
            "wallet valued"
        );
        WalletValuation {
            wallet: wallet.clone(),
            sol,
            tokens,
        }
    }

    pub fn native_balance(&self, wallet: &str) -> Valued {
        match self.balance.balance_sol(wallet) {
            Ok(balance) if balance.is_finite() && balance >= 0.0 => Valued::Resolved(balance),
            Ok(balance) => {
                warn!(wallet, balance, unresolved = true, "invalid sol balance");
                Valued::Unresolved
            }
            Err(error) => {
                warn!(
                    wallet,
                    error = %error,
                    unresolved = true,
                    "sol balance lookup failed"
                );
                Valued::Unresolved
            }
        }
    }

    fn live_token_value(
        &self,
        wallet: &str,
        native_usd_rate: f64,
        cache: &QuoteCache,
    ) -> TokenValuation {
        let holdings = match self.holdings.holdings(wallet) {
            Ok(holdings) => holdings,
            Err(error) => {
                warn!(
                    wallet,
                    source = self.holdings.name(),
                    error = %error,
                    unresolved = true,
                    "holdings lookup failed"
                );
                return TokenValuation::live(0.0, true, 0);
            }
        };

        let mut value = 0.0;
        let mut unresolved_prices = 0;
        for (mint, quantity) in &holdings {
            let resolution = cache.price(self.prices, mint, native_usd_rate);
            if !resolution.valued().is_resolved() {
                unresolved_prices += 1;
                continue;
            }
            value += quantity * resolution.price_native;
        }
        TokenValuation::live(value, false, unresolved_prices)
    }
}
