use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use domain::{TradeReceipt, Wallet, DUST_THRESHOLD};
use thiserror::Error;
use tracing::warn;

/// Demo sign-in pair shown on the login screen. Not authentication; the whole
/// account is simulated and single-user.
pub const DEMO_USERNAME: &str = "demo@coinbase.com";
pub const DEMO_PASSWORD: &str = "demo123456";

pub fn verify_demo_credentials(username: &str, password: &str) -> bool {
    username == DEMO_USERNAME && password == DEMO_PASSWORD
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Amount must be greater than 0.")]
    InvalidAmount,
    #[error("Insufficient funds. You have ${available:.2} available.")]
    InsufficientFunds { available: f64 },
    #[error("Insufficient {asset}. You have {available:.6} available.")]
    InsufficientHoldings { asset: String, available: f64 },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Persistence seam for the wallet record. Whole-record reads and writes only;
/// there are no partial updates and no schema versioning.
pub trait WalletStore: Send + Sync {
    /// Returns the persisted wallet, or `None` when no record exists yet.
    fn load(&self) -> anyhow::Result<Option<Wallet>>;
    fn save(&self, wallet: &Wallet) -> anyhow::Result<()>;
    /// Deletes the persisted record so the next load re-seeds the default.
    fn reset(&self) -> anyhow::Result<()>;
}

/// Fixed storage key the wallet record lives under.
pub const WALLET_STORAGE_KEY: &str = "userWallet";

/// Wallet record as a JSON file at a fixed path, the single-browser
/// local-storage analog. A corrupt record is treated as absent rather than
/// failing the session.
pub struct JsonFileWalletStore {
    path: PathBuf,
}

impl JsonFileWalletStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted in a data directory, named by the fixed storage key.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{WALLET_STORAGE_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WalletStore for JsonFileWalletStore {
    fn load(&self) -> anyhow::Result<Option<Wallet>> {
        let raw = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read wallet at {}", self.path.display()))
            }
        };
        match serde_json::from_slice::<Wallet>(&raw) {
            Ok(wallet) => Ok(Some(wallet)),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "discarding corrupt wallet record");
                Ok(None)
            }
        }
    }

    fn save(&self, wallet: &Wallet) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_vec(wallet).context("failed to serialize wallet")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write wallet at {}", self.path.display()))
    }

    fn reset(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove wallet at {}", self.path.display())),
        }
    }
}

/// In-memory store for tests and embedding.
#[derive(Default)]
pub struct MemoryWalletStore {
    inner: Mutex<Option<Wallet>>,
}

impl WalletStore for MemoryWalletStore {
    fn load(&self) -> anyhow::Result<Option<Wallet>> {
        Ok(self.inner.lock().expect("wallet store poisoned").clone())
    }

    fn save(&self, wallet: &Wallet) -> anyhow::Result<()> {
        *self.inner.lock().expect("wallet store poisoned") = Some(wallet.clone());
        Ok(())
    }

    fn reset(&self) -> anyhow::Result<()> {
        *self.inner.lock().expect("wallet store poisoned") = None;
        Ok(())
    }
}

/// The portfolio ledger: owns the simulated wallet and applies trades against
/// it. All operations are synchronous and single-writer; concurrent external
/// mutation of the underlying store is not arbitrated.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn WalletStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Current wallet, seeding and persisting the default record on first
    /// access.
    pub fn wallet(&self) -> LedgerResult<Wallet> {
        if let Some(wallet) = self.store.load()? {
            return Ok(wallet);
        }
        let wallet = Wallet::default();
        self.store.save(&wallet)?;
        Ok(wallet)
    }

    /// Buys `amount_usd` worth of an asset: deducts cash, adds units.
    /// A rejected trade leaves the persisted wallet untouched.
    pub fn buy(
        &self,
        asset_id: &str,
        amount_usd: f64,
        price_per_unit: f64,
    ) -> LedgerResult<TradeReceipt> {
        validate_trade_inputs(amount_usd, price_per_unit)?;
        let mut wallet = self.wallet()?;
        if wallet.cash < amount_usd {
            return Err(LedgerError::InsufficientFunds {
                available: wallet.cash,
            });
        }
        if amount_usd <= 0.0 {
            return Err(LedgerError::InvalidAmount);
        }

        let quantity = amount_usd / price_per_unit;
        wallet.cash -= amount_usd;
        *wallet.holdings.entry(asset_id.to_string()).or_insert(0.0) += quantity;
        self.store.save(&wallet)?;

        Ok(TradeReceipt {
            quantity,
            message: format!(
                "Successfully bought {:.6} {} for ${:.2}",
                quantity,
                asset_id.to_uppercase(),
                amount_usd
            ),
            wallet,
        })
    }

    /// Sells `amount_usd` worth of an asset: adds cash, deducts units. A
    /// position left below the dust threshold is removed entirely.
    pub fn sell(
        &self,
        asset_id: &str,
        amount_usd: f64,
        price_per_unit: f64,
    ) -> LedgerResult<TradeReceipt> {
        validate_trade_inputs(amount_usd, price_per_unit)?;
        let mut wallet = self.wallet()?;
        let quantity = amount_usd / price_per_unit;
        let held = wallet.holding(asset_id);
        if held < quantity {
            return Err(LedgerError::InsufficientHoldings {
                asset: asset_id.to_uppercase(),
                available: held,
            });
        }
        if amount_usd <= 0.0 {
            return Err(LedgerError::InvalidAmount);
        }

        wallet.cash += amount_usd;
        let remaining = held - quantity;
        if remaining < DUST_THRESHOLD {
            wallet.holdings.remove(asset_id);
        } else {
            wallet.holdings.insert(asset_id.to_string(), remaining);
        }
        self.store.save(&wallet)?;

        Ok(TradeReceipt {
            quantity,
            message: format!(
                "Successfully sold {:.6} {} for ${:.2}",
                quantity,
                asset_id.to_uppercase(),
                amount_usd
            ),
            wallet,
        })
    }

    /// Cash plus the value of every holding at the supplied prices. A holding
    /// with no price entry values at 0; that is the documented degenerate
    /// behavior, not an error.
    pub fn total_portfolio_value(&self, prices: &HashMap<String, f64>) -> LedgerResult<f64> {
        let wallet = self.wallet()?;
        let crypto_value: f64 = wallet
            .holdings
            .iter()
            .map(|(asset_id, amount)| amount * prices.get(asset_id).copied().unwrap_or(0.0))
            .sum();
        Ok(wallet.cash + crypto_value)
    }

    pub fn holding(&self, asset_id: &str) -> LedgerResult<f64> {
        Ok(self.wallet()?.holding(asset_id))
    }

    pub fn cash_balance(&self) -> LedgerResult<f64> {
        Ok(self.wallet()?.cash)
    }

    pub fn reset(&self) -> LedgerResult<()> {
        self.store.reset()?;
        Ok(())
    }
}

// Non-finite or non-positive prices would otherwise flow into the quantity
// division and mint inf/NaN positions.
fn validate_trade_inputs(amount_usd: f64, price_per_unit: f64) -> LedgerResult<()> {
    if !amount_usd.is_finite() || !price_per_unit.is_finite() || price_per_unit <= 0.0 {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryWalletStore::default()))
    }

    fn assert_close(left: f64, right: f64) {
        assert!(
            (left - right).abs() < 1e-9,
            "expected {right}, got {left}"
        );
    }

    #[test]
    fn fresh_wallet_seeds_default_and_persists() {
        let store = Arc::new(MemoryWalletStore::default());
        let ledger = Ledger::new(store.clone());
        let wallet = ledger.wallet().unwrap();
        assert_close(wallet.cash, 1000.0);
        assert!(wallet.holdings.is_empty());
        // First access writes the seed record.
        assert_eq!(store.load().unwrap(), Some(wallet));
    }

    #[test]
    fn buy_deducts_cash_and_credits_holding() {
        let ledger = ledger();
        let receipt = ledger.buy("bitcoin", 500.0, 50_000.0).unwrap();
        assert_close(receipt.quantity, 0.01);
        assert_close(receipt.wallet.cash, 500.0);
        assert_close(receipt.wallet.holding("bitcoin"), 0.01);
        assert!(receipt.message.contains("BITCOIN"));
    }

    #[test]
    fn buy_rejects_insufficient_funds_and_leaves_wallet_unchanged() {
        let ledger = ledger();
        let before = ledger.wallet().unwrap();
        let err = ledger.buy("bitcoin", 1500.0, 50_000.0).unwrap_err();
        match err {
            LedgerError::InsufficientFunds { available } => assert_close(available, 1000.0),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ledger.wallet().unwrap(), before);
    }

    #[test]
    fn non_positive_amounts_are_rejected_by_both_operations() {
        let ledger = ledger();
        let before = ledger.wallet().unwrap();
        for amount in [0.0, -25.0] {
            assert!(matches!(
                ledger.buy("bitcoin", amount, 50_000.0),
                Err(LedgerError::InvalidAmount)
            ));
            assert!(matches!(
                ledger.sell("bitcoin", amount, 50_000.0),
                Err(LedgerError::InvalidAmount)
            ));
        }
        assert_eq!(ledger.wallet().unwrap(), before);
    }

    #[test]
    fn degenerate_prices_are_rejected() {
        let ledger = ledger();
        assert!(matches!(
            ledger.buy("bitcoin", 100.0, 0.0),
            Err(LedgerError::InvalidAmount)
        ));
        assert!(matches!(
            ledger.sell("bitcoin", 100.0, -3.0),
            Err(LedgerError::InvalidAmount)
        ));
        assert!(matches!(
            ledger.buy("bitcoin", f64::NAN, 50_000.0),
            Err(LedgerError::InvalidAmount)
        ));
    }

    #[test]
    fn sell_rejects_more_than_held() {
        let ledger = ledger();
        ledger.buy("bitcoin", 500.0, 50_000.0).unwrap();
        let before = ledger.wallet().unwrap();
        let err = ledger.sell("bitcoin", 600.0, 50_000.0).unwrap_err();
        match err {
            LedgerError::InsufficientHoldings { asset, available } => {
                assert_eq!(asset, "BITCOIN");
                assert_close(available, 0.01);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ledger.wallet().unwrap(), before);
    }

    #[test]
    fn buy_then_sell_at_same_price_round_trips_cash() {
        let ledger = ledger();
        ledger.buy("ethereum", 100.0, 2500.0).unwrap();
        let receipt = ledger.sell("ethereum", 100.0, 2500.0).unwrap();
        assert_close(receipt.wallet.cash, 1000.0);
        assert!(!receipt.wallet.holdings.contains_key("ethereum"));
    }

    #[test]
    fn selling_down_to_dust_removes_the_position() {
        let ledger = ledger();
        ledger.buy("bitcoin", 500.0, 50_000.0).unwrap();
        // Sell all but ~2e-7 BTC, below the dust threshold.
        let receipt = ledger.sell("bitcoin", 499.99, 50_000.0).unwrap();
        assert!(!receipt.wallet.holdings.contains_key("bitcoin"));
    }

    #[test]
    fn repeat_buys_accumulate_one_position() {
        let ledger = ledger();
        ledger.buy("bitcoin", 100.0, 50_000.0).unwrap();
        let receipt = ledger.buy("bitcoin", 300.0, 60_000.0).unwrap();
        assert_eq!(receipt.wallet.holdings.len(), 1);
        assert_close(
            receipt.wallet.holding("bitcoin"),
            100.0 / 50_000.0 + 300.0 / 60_000.0,
        );
    }

    #[test]
    fn valuation_sums_cash_and_priced_holdings() {
        let ledger = ledger();
        ledger.buy("bitcoin", 500.0, 50_000.0).unwrap();
        ledger.buy("ethereum", 200.0, 2_000.0).unwrap();

        let mut prices = HashMap::new();
        prices.insert("bitcoin".to_string(), 60_000.0);
        prices.insert("ethereum".to_string(), 2_500.0);
        let value = ledger.total_portfolio_value(&prices).unwrap();
        assert_close(value, 300.0 + 0.01 * 60_000.0 + 0.1 * 2_500.0);

        // Idempotent with no intervening trade.
        assert_close(ledger.total_portfolio_value(&prices).unwrap(), value);

        // A missing price values that holding at zero.
        prices.remove("ethereum");
        assert_close(
            ledger.total_portfolio_value(&prices).unwrap(),
            300.0 + 0.01 * 60_000.0,
        );
    }

    #[test]
    fn holding_and_cash_accessors() {
        let ledger = ledger();
        assert_close(ledger.holding("bitcoin").unwrap(), 0.0);
        assert_close(ledger.cash_balance().unwrap(), 1000.0);
        ledger.buy("bitcoin", 250.0, 25_000.0).unwrap();
        assert_close(ledger.holding("bitcoin").unwrap(), 0.01);
        assert_close(ledger.cash_balance().unwrap(), 750.0);
    }

    #[test]
    fn file_store_round_trips_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileWalletStore::in_dir(dir.path()));
        assert!(store.path().ends_with("userWallet.json"));
        let ledger = Ledger::new(store.clone());

        ledger.buy("bitcoin", 500.0, 50_000.0).unwrap();
        // A second ledger over the same path sees the persisted record.
        let reopened = Ledger::new(store.clone());
        assert_close(reopened.cash_balance().unwrap(), 500.0);

        ledger.reset().unwrap();
        assert_close(ledger.cash_balance().unwrap(), 1000.0);
        assert!(ledger.wallet().unwrap().holdings.is_empty());
    }

    #[test]
    fn corrupt_file_record_reseeds_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, b"{not json").unwrap();
        let ledger = Ledger::new(Arc::new(JsonFileWalletStore::new(path)));
        let wallet = ledger.wallet().unwrap();
        assert_close(wallet.cash, 1000.0);
    }

    #[test]
    fn demo_credentials_check() {
        assert!(verify_demo_credentials(DEMO_USERNAME, DEMO_PASSWORD));
        assert!(!verify_demo_credentials(DEMO_USERNAME, "wrong"));
        assert!(!verify_demo_credentials("someone@else.com", DEMO_PASSWORD));
    }
}
