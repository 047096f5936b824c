//! Wire entities exchanged with the banking backend.
//!
//! Records are deserialized leniently: almost every field is optional so a record
//! missing a field still loads, and filtering treats the gap as non-matching.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of the signed-in principal. The backend sends a number, older
/// payloads (and the persisted `userId` key) carry it as a string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl UserId {
    /// Parses a persisted value, preferring the numeric form.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "undefined" || raw == "null" {
            return None;
        }
        Some(
            raw.parse::<i64>()
                .map(Self::Number)
                .unwrap_or_else(|_| Self::Text(raw.to_string())),
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.strip_prefix("ROLE_").unwrap_or(&upper) {
            "ADMIN" => Self::Admin,
            "USER" => Self::User,
            _ => Self::Other(raw),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => "ADMIN".to_string(),
            Role::User => "USER".to_string(),
            Role::Other(raw) => raw,
        }
    }
}

/// Denormalized user attributes persisted under the `user` key.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub customer: Option<Customer>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone().unwrap_or_default(),
        }
    }
}

/// The client's record of the current authenticated principal.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: Option<UserId>,
    pub profile: UserProfile,
}

#[derive(Serialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/login`. Both the current flat shape and the legacy
/// `{token, user}` shape deserialize into this.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub message: Option<String>,
}

impl LoginResponse {
    /// Builds a session, or returns the rejection message.
    pub fn into_session(self) -> Result<Session, String> {
        let rejection = || {
            self.message
                .clone()
                .unwrap_or_else(|| "Login failed".to_string())
        };
        if self.success == Some(false) {
            return Err(rejection());
        }
        let token = match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Err(rejection()),
        };

        let profile = match self.user {
            Some(mut legacy) => {
                if legacy.user_id.is_none() {
                    legacy.user_id = self.user_id.clone();
                }
                legacy
            }
            None => UserProfile {
                user_id: self.user_id.clone(),
                email: self.email,
                first_name: self.first_name,
                last_name: self.last_name,
                roles: self.roles,
                customer: self.customer,
            },
        };
        Ok(Session {
            token,
            user_id: self.user_id.or_else(|| profile.user_id.clone()),
            profile,
        })
    }
}

/// Registration form as typed by the user. `confirm_password` never leaves the client.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub address: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub address: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
}

impl From<RegistrationForm> for RegisterRequest {
    fn from(form: RegistrationForm) -> Self {
        Self {
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email.trim().to_string(),
            password: form.password,
            address: form.address,
            phone: form.phone,
            date_of_birth: form.date_of_birth,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub transaction_id: Option<i64>,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub destination_account_id: Option<i64>,
    #[serde(default)]
    pub destination_account_number: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default)]
    pub asset_id: Option<i64>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, alias = "name")]
    pub asset_name: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub previous_price: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[serde(default)]
    pub trade_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub asset_id: Option<i64>,
    #[serde(default)]
    pub asset: Option<Asset>,
    #[serde(default)]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub trade_status: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub price_per_unit: Option<f64>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub commission: Option<f64>,
    #[serde(default, alias = "executedAt")]
    pub trade_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    #[serde(default)]
    pub deposit_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub deposit_status: Option<String>,
    #[serde(default)]
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(default)]
    pub portfolio_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub portfolio_name: Option<String>,
    #[serde(default)]
    pub total_value: Option<f64>,
    #[serde(default)]
    pub cost_basis: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub position_id: Option<i64>,
    #[serde(default)]
    pub portfolio_id: Option<i64>,
    #[serde(default)]
    pub asset_id: Option<i64>,
    #[serde(default)]
    pub asset: Option<Asset>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub average_buy_price: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub total_value: Option<f64>,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default)]
    pub cost_basis: Option<f64>,
    #[serde(default)]
    pub unrealized_gain_loss: Option<f64>,
    #[serde(default)]
    pub gain_loss_percent: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_customers: u64,
    pub active_customers: u64,
    pub total_accounts: u64,
    pub active_accounts: u64,
    pub total_transactions: u64,
    pub total_balance: f64,
}

/// Outcome of one `process-batch` run as reported by the backend.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchResults {
    pub total_requests: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub retries: u64,
    pub duration_ms: u64,
    pub throughput: f64,
}

/// Cumulative payment processor counters.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentMetrics {
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub retries: u64,
    pub success_rate: f64,
    pub thread_pool_size: u64,
    pub pending_logs: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_login_response_builds_session() {
        let body = json!({
            "success": true,
            "token": "tok-1",
            "userId": 7,
            "email": "ann@bank.test",
            "firstName": "Ann",
            "lastName": "Lee",
            "roles": ["ROLE_USER"],
            "customer": null
        });
        let resp: LoginResponse = serde_json::from_value(body).unwrap();
        let session = resp.into_session().unwrap();
        assert_eq!(session.token, "tok-1");
        assert_eq!(session.user_id, Some(UserId::Number(7)));
        assert!(session.profile.roles.contains(&Role::User));
        assert_eq!(session.profile.display_name(), "Ann Lee");
    }

    #[test]
    fn legacy_login_response_uses_nested_user() {
        let body = json!({
            "token": "tok-legacy",
            "user": { "userId": "42", "email": "old@bank.test", "roles": null }
        });
        let resp: LoginResponse = serde_json::from_value(body).unwrap();
        let session = resp.into_session().unwrap();
        assert_eq!(session.user_id, Some(UserId::Text("42".into())));
        assert_eq!(session.profile.email.as_deref(), Some("old@bank.test"));
        assert!(session.profile.roles.is_empty());
    }

    #[test]
    fn unsuccessful_login_is_rejection_with_message() {
        let body = json!({ "success": false, "message": "Account locked" });
        let resp: LoginResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.into_session().unwrap_err(), "Account locked");

        let resp: LoginResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(resp.into_session().unwrap_err(), "Login failed");
    }

    #[test]
    fn user_id_parse_handles_placeholders() {
        assert_eq!(UserId::parse("12"), Some(UserId::Number(12)));
        assert_eq!(UserId::parse("abc"), Some(UserId::Text("abc".into())));
        assert_eq!(UserId::parse("undefined"), None);
        assert_eq!(UserId::parse("  "), None);
    }

    #[test]
    fn asset_accepts_backend_and_frontend_names() {
        let a: Asset = serde_json::from_value(json!({"symbol": "AAPL", "name": "Apple"})).unwrap();
        let b: Asset =
            serde_json::from_value(json!({"symbol": "AAPL", "assetName": "Apple"})).unwrap();
        assert_eq!(a.asset_name, b.asset_name);
    }

    #[test]
    fn register_request_omits_confirmation() {
        let form = RegistrationForm {
            email: " ann@bank.test ".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            ..Default::default()
        };
        let body = serde_json::to_value(RegisterRequest::from(form)).unwrap();
        assert_eq!(body["email"], "ann@bank.test");
        assert!(body.get("confirmPassword").is_none());
        assert!(body.get("dateOfBirth").is_none());
    }
}
