//! Payment operations: methods, wallet, card payments, transactions

use reqwest::Method;
use validator::Validate;

use parq_protocol::{
    CardPayment, NewPaymentMethod, PaymentMethod, Transaction, Wallet, WalletDeposit,
    WalletPayment,
};

use crate::client::ApiClient;
use crate::error::Result;

/// Payments service
pub struct PaymentsService {
    client: ApiClient,
}

impl PaymentsService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    // --- Payment methods ---

    pub async fn methods(&self) -> Result<Vec<PaymentMethod>> {
        self.client
            .request(Method::GET, "/payments/methods/", None::<&()>)
            .await
    }

    pub async fn add_method(&self, method: NewPaymentMethod) -> Result<PaymentMethod> {
        method.validate()?;
        self.client
            .request(Method::POST, "/payments/methods/", Some(&method))
            .await
    }

    pub async fn delete_method(&self, id: i64) -> Result<()> {
        let endpoint = format!("/payments/methods/{}/", id);
        let _: serde_json::Value = self
            .client
            .request(Method::DELETE, &endpoint, None::<&()>)
            .await?;
        Ok(())
    }

    pub async fn set_default_method(&self, id: i64) -> Result<()> {
        let endpoint = format!("/payments/methods/{}/set-default/", id);
        let _: serde_json::Value = self
            .client
            .request(Method::POST, &endpoint, None::<&()>)
            .await?;
        Ok(())
    }

    // --- Wallet ---

    pub async fn wallet(&self) -> Result<Wallet> {
        self.client
            .request(Method::GET, "/payments/wallet/info/", None::<&()>)
            .await
    }

    pub async fn deposit(&self, deposit: WalletDeposit) -> Result<Wallet> {
        deposit.validate()?;
        let _: serde_json::Value = self
            .client
            .request(Method::POST, "/payments/wallet/deposit/", Some(&deposit))
            .await?;
        self.wallet().await
    }

    pub async fn pay_with_wallet(&self, payment: WalletPayment) -> Result<()> {
        payment.validate()?;
        let _: serde_json::Value = self
            .client
            .request(Method::POST, "/payments/wallet/pay/", Some(&payment))
            .await?;
        Ok(())
    }

    // --- Card payments ---

    pub async fn pay_with_card(&self, payment: CardPayment) -> Result<()> {
        payment.validate()?;
        let _: serde_json::Value = self
            .client
            .request(Method::POST, "/payments/process/", Some(&payment))
            .await?;
        Ok(())
    }

    // --- History ---

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.client
            .request(Method::GET, "/payments/transactions/", None::<&()>)
            .await
    }
}
