//! Form-boundary parsing.
//!
//! Raw text from the user is turned into typed payloads here, before any request is
//! built. Monetary values and quantities are `f64`; identifiers are `i64`.

use serde::Serialize;

use crate::error::ValidationError;

pub fn require<'a>(field: &'static str, raw: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed)
}

pub fn parse_amount(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    let trimmed = require(field, raw)?;
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Like `parse_amount` but rejects zero and negative values.
pub fn parse_positive_amount(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    let value = parse_amount(field, raw)?;
    if value <= 0.0 {
        return Err(ValidationError::NonPositive { field });
    }
    Ok(value)
}

pub fn parse_id(field: &'static str, raw: &str) -> Result<i64, ValidationError> {
    require(field, raw)?
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

fn optional(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    pub is_active: bool,
}

impl CustomerDraft {
    pub fn parse(
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
        address: &str,
        date_of_birth: &str,
    ) -> Result<Self, ValidationError> {
        let first_name = require("First name", first_name)?.to_string();
        let last_name = require("Last name", last_name)?.to_string();
        let email = require("Email", email)?;
        if !crate::auth::is_valid_email(email) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(Self {
            first_name,
            last_name,
            email: email.to_string(),
            phone: optional(phone),
            address: optional(address),
            date_of_birth: optional(date_of_birth),
            is_active: true,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountDraft {
    pub account_number: String,
    pub account_type: String,
    pub customer_id: i64,
    pub balance: f64,
    pub interest_rate: f64,
    pub status: String,
}

impl AccountDraft {
    pub fn parse(
        account_number: &str,
        account_type: &str,
        customer_id: &str,
        balance: &str,
        interest_rate: &str,
        status: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            account_number: require("Account number", account_number)?.to_string(),
            account_type: require("Account type", account_type)?.to_ascii_uppercase(),
            customer_id: parse_id("Customer", customer_id)?,
            balance: parse_amount("Balance", balance)?,
            interest_rate: if interest_rate.trim().is_empty() {
                0.0
            } else {
                parse_amount("Interest rate", interest_rate)?
            },
            status: optional(status)
                .map(|s| s.to_ascii_uppercase())
                .unwrap_or_else(|| "ACTIVE".to_string()),
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub transaction_type: String,
    pub amount: f64,
    pub account_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransactionDraft {
    /// A `TRANSFER` needs a destination account; other types ignore it.
    pub fn parse(
        transaction_type: &str,
        amount: &str,
        account_id: &str,
        destination_account_id: &str,
        description: &str,
    ) -> Result<Self, ValidationError> {
        let transaction_type = require("Transaction type", transaction_type)?.to_ascii_uppercase();
        let destination_account_id = if transaction_type == "TRANSFER" {
            Some(parse_id("Destination account", destination_account_id)?)
        } else {
            None
        };
        Ok(Self {
            amount: parse_positive_amount("Amount", amount)?,
            account_id: parse_id("Account", account_id)?,
            destination_account_id,
            description: optional(description),
            transaction_type,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// Path segment of the trading endpoint.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub side: TradeSide,
    pub asset_id: i64,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub portfolio_id: i64,
}

impl TradeOrder {
    pub fn parse(
        side: TradeSide,
        asset_id: &str,
        quantity: &str,
        price_per_unit: &str,
        portfolio_id: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            side,
            asset_id: parse_id("Asset", asset_id)?,
            quantity: parse_positive_amount("Quantity", quantity)?,
            price_per_unit: parse_positive_amount("Price per unit", price_per_unit)?,
            portfolio_id: parse_id("Portfolio", portfolio_id)?,
        })
    }

    pub fn total_cost(&self) -> f64 {
        self.quantity * self.price_per_unit
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepositRequest {
    pub amount: f64,
    pub payment_method: String,
}

impl DepositRequest {
    pub fn parse(amount: &str, payment_method: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            amount: parse_positive_amount("Amount", amount)?,
            payment_method: optional(payment_method)
                .map(|m| m.to_ascii_uppercase())
                .unwrap_or_else(|| "BANK_TRANSFER".to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioDraft {
    pub name: String,
}

impl PortfolioDraft {
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            name: require("Portfolio name", name)?.to_string(),
        })
    }
}

/// One row of a payment batch, still as typed.
#[derive(Debug, Clone, Default)]
pub struct PaymentRow {
    pub from_account_id: String,
    pub to_account_id: String,
    pub amount: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstruction {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: f64,
}

impl PaymentRow {
    /// `None` for rows with any blank column; those are left out of the batch.
    pub fn parse(&self) -> Option<Result<PaymentInstruction, ValidationError>> {
        if [&self.from_account_id, &self.to_account_id, &self.amount]
            .iter()
            .any(|col| col.trim().is_empty())
        {
            return None;
        }
        Some(self.parse_complete())
    }

    fn parse_complete(&self) -> Result<PaymentInstruction, ValidationError> {
        Ok(PaymentInstruction {
            from_account_id: parse_id("From account", &self.from_account_id)?,
            to_account_id: parse_id("To account", &self.to_account_id)?,
            amount: parse_amount("Amount", &self.amount)?,
        })
    }
}
