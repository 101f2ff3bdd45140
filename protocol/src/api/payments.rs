//! Payments API DTOs
//!
//! Payment methods, wallet operations, card payments and the transaction
//! history.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A stored payment method
///
/// The backend only ever returns the last four digits in `card_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub card_number: String,
    pub expiry_date: String,
    pub cardholder_name: String,
    pub is_default: bool,
}

/// New payment method request for POST /api/payments/methods/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPaymentMethod {
    #[serde(rename = "type")]
    pub kind: String,
    #[validate(length(min = 12, max = 19))]
    pub card_number: String,
    #[validate(length(min = 5, max = 7))]
    pub expiry_date: String,
    #[validate(length(min = 3, max = 4))]
    pub cvv: String,
    #[validate(length(min = 1, max = 128))]
    pub cardholder_name: String,
    pub is_default: bool,
}

/// Wallet state from GET /api/payments/wallet/info/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub balance: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// Wallet deposit request for POST /api/payments/wallet/deposit/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WalletDeposit {
    #[validate(range(min = 0.01))]
    pub amount: f64,
    pub payment_method_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Wallet payment request for POST /api/payments/wallet/pay/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WalletPayment {
    #[validate(range(min = 0.01))]
    pub amount: f64,
    pub reservation_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Card payment request for POST /api/payments/process/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CardPayment {
    #[validate(range(min = 0.01))]
    pub amount: f64,
    pub payment_method_id: i64,
    pub reservation_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// One entry of GET /api/payments/transactions/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    pub status: String,
    pub created_at: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub reservation_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_method_validates_card_number_length() {
        let method = NewPaymentMethod {
            kind: "credit_card".into(),
            card_number: "1234".into(),
            expiry_date: "12/27".into(),
            cvv: "123".into(),
            cardholder_name: "AYAN SERIK".into(),
            is_default: false,
        };
        assert!(method.validate().is_err());
    }

    #[test]
    fn method_kind_serializes_as_type() {
        let method = PaymentMethod {
            id: 3,
            kind: "debit_card".into(),
            card_number: "4242".into(),
            expiry_date: "01/28".into(),
            cardholder_name: "AYAN SERIK".into(),
            is_default: true,
        };
        let json = serde_json::to_value(&method).unwrap();
        assert_eq!(json["type"], "debit_card");
    }
}
