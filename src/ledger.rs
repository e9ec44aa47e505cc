//! Client for the external ledger service.
//!
//! Every in-game monetary movement is settled through this service; the game
//! never trusts locally computed balances until the ledger reports success.
//! Amounts cross the wire in fixed-point minor units.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fixed-point scale for amounts on the wire
pub const MINOR_UNITS: i64 = 1_000_000;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ledger rejected request: {0}")]
    Rejected(String),

    #[error("payment not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Initiated,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub payer_account: String,
    pub recipient_account: String,
    pub amount_minor: i64,
    pub asset: String,
    pub network: String,
    /// Opaque snapshot of the game at submission time
    pub trace_context: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentHandle {
    pub id: String,
}

/// Operations the game requires from the ledger
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, LedgerError>;

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, LedgerError>;

    /// Admin operation used once per game to zero-set starting balances
    async fn reset_asset_account(
        &self,
        account_id: &str,
        asset: &str,
        balance_minor: i64,
        network: &str,
    ) -> Result<(), LedgerError>;
}

/// HTTP implementation against the real ledger service
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedger {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: PaymentStatus,
}

#[async_trait]
impl LedgerService for HttpLedger {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, LedgerError> {
        let resp = self
            .client
            .post(format!("{}/payments", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(body));
        }

        Ok(resp.json().await?)
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, LedgerError> {
        let resp = self
            .client
            .get(format!("{}/payments/{}", self.base_url, payment_id))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LedgerError::NotFound(payment_id.to_string()));
        }
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(body));
        }

        let status: StatusResponse = resp.json().await?;
        Ok(status.status)
    }

    async fn reset_asset_account(
        &self,
        account_id: &str,
        asset: &str,
        balance_minor: i64,
        network: &str,
    ) -> Result<(), LedgerError> {
        let resp = self
            .client
            .post(format!("{}/admin/accounts/reset", self.base_url))
            .json(&serde_json::json!({
                "account_id": account_id,
                "asset": asset,
                "balance": balance_minor,
                "network": network,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(body));
        }
        Ok(())
    }
}

/// In-memory ledger that keeps real balances and settles instantly.
/// Used by tests and local play without the external service.
#[derive(Default)]
pub struct InMemoryLedger {
    next_id: AtomicU64,
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    balances: HashMap<String, i64>,
    payments: HashMap<String, PaymentStatus>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_minor(&self, account_id: &str) -> i64 {
        self.inner
            .lock()
            .unwrap()
            .balances
            .get(account_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl LedgerService for InMemoryLedger {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentHandle, LedgerError> {
        if request.amount_minor <= 0 {
            return Err(LedgerError::Rejected("non-positive amount".into()));
        }

        let id = format!("pay-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.inner.lock().unwrap();

        let payer_balance = inner
            .balances
            .get(&request.payer_account)
            .copied()
            .unwrap_or(0);
        // The treasury account is the money source and may go negative.
        let status = if request.payer_account != "treasury" && payer_balance < request.amount_minor
        {
            PaymentStatus::Failed
        } else {
            *inner.balances.entry(request.payer_account).or_insert(0) -= request.amount_minor;
            *inner.balances.entry(request.recipient_account).or_insert(0) +=
                request.amount_minor;
            PaymentStatus::Success
        };
        inner.payments.insert(id.clone(), status);

        Ok(PaymentHandle { id })
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, LedgerError> {
        self.inner
            .lock()
            .unwrap()
            .payments
            .get(payment_id)
            .copied()
            .ok_or_else(|| LedgerError::NotFound(payment_id.to_string()))
    }

    async fn reset_asset_account(
        &self,
        account_id: &str,
        _asset: &str,
        balance_minor: i64,
        _network: &str,
    ) -> Result<(), LedgerError> {
        self.inner
            .lock()
            .unwrap()
            .balances
            .insert(account_id.to_string(), balance_minor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_ledger_moves_balances() {
        let ledger = InMemoryLedger::new();
        ledger
            .reset_asset_account("a", "AMN", 100 * MINOR_UNITS, "solana")
            .await
            .unwrap();
        ledger
            .reset_asset_account("b", "AMN", 0, "solana")
            .await
            .unwrap();

        let handle = ledger
            .create_payment(PaymentRequest {
                payer_account: "a".into(),
                recipient_account: "b".into(),
                amount_minor: 40 * MINOR_UNITS,
                asset: "AMN".into(),
                network: "solana".into(),
                trace_context: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert_eq!(
            ledger.payment_status(&handle.id).await.unwrap(),
            PaymentStatus::Success
        );
        assert_eq!(ledger.balance_minor("a"), 60 * MINOR_UNITS);
        assert_eq!(ledger.balance_minor("b"), 40 * MINOR_UNITS);
    }

    #[tokio::test]
    async fn insufficient_funds_fails_payment() {
        let ledger = InMemoryLedger::new();
        ledger
            .reset_asset_account("a", "AMN", 10 * MINOR_UNITS, "solana")
            .await
            .unwrap();

        let handle = ledger
            .create_payment(PaymentRequest {
                payer_account: "a".into(),
                recipient_account: "b".into(),
                amount_minor: 40 * MINOR_UNITS,
                asset: "AMN".into(),
                network: "solana".into(),
                trace_context: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert_eq!(
            ledger.payment_status(&handle.id).await.unwrap(),
            PaymentStatus::Failed
        );
        assert_eq!(ledger.balance_minor("a"), 10 * MINOR_UNITS);
    }
}
