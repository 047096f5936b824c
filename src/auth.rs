use std::sync::OnceLock;

use chrono::{Local, Months, NaiveDate};
use regex::Regex;
use tracing::{error, info, warn};

use crate::error::{ClientError, ClientResult, ValidationError};
use crate::inflight::InFlight;
use crate::models::{
    Credentials, LoginResponse, RegisterRequest, RegisterResponse, RegistrationForm, Session,
};
use crate::rest::{ApiClient, ApiError, ApiRequest};
use crate::storage::Storage;

pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_AGE_YEARS: u32 = 150;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email.trim()))
}

/// Pre-submission checks for the registration form. `today` is injected so the
/// birth-date bounds are testable.
pub fn validate_registration(
    form: &RegistrationForm,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    if form.confirm_password.is_empty() {
        return Err(ValidationError::PasswordConfirmationMissing);
    }
    if form.password != form.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    if !is_valid_email(&form.email) {
        return Err(ValidationError::InvalidEmail);
    }
    if form.first_name.trim().is_empty() {
        return Err(ValidationError::MissingField("First name"));
    }
    if form.last_name.trim().is_empty() {
        return Err(ValidationError::MissingField("Last name"));
    }
    if let Some(dob) = form.date_of_birth {
        validate_birth_date(dob, today)?;
    }
    Ok(())
}

fn validate_birth_date(dob: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if dob >= today {
        return Err(ValidationError::BirthDateNotInPast);
    }
    let oldest = today
        .checked_sub_months(Months::new(MAX_AGE_YEARS * 12))
        .unwrap_or(NaiveDate::MIN);
    if dob < oldest {
        return Err(ValidationError::BirthDateImplausible);
    }
    Ok(())
}

/// Single authoritative place to read and write "am I logged in, and as whom".
///
/// Reads go straight to persisted storage and never touch the network. The store
/// does not watch for expiry; callers that see a 401/403 call `sign_out`.
#[derive(Clone)]
pub struct SessionStore {
    storage: Storage,
    api: ApiClient,
    signing_in: InFlight,
    registering: InFlight,
}

impl SessionStore {
    pub fn new(storage: Storage, api: ApiClient) -> Self {
        Self {
            storage,
            api,
            signing_in: InFlight::new(),
            registering: InFlight::new(),
        }
    }

    pub fn is_signing_in(&self) -> bool {
        self.signing_in.is_active()
    }

    pub fn is_registering(&self) -> bool {
        self.registering.is_active()
    }

    /// Submits credentials. Storage is written only when a complete session was
    /// obtained; any failure leaves it untouched.
    pub async fn sign_in(&self, credentials: &Credentials) -> ClientResult<Session> {
        if credentials.email.trim().is_empty() {
            return Err(ValidationError::MissingField("Email").into());
        }
        if credentials.password.is_empty() {
            return Err(ValidationError::MissingField("Password").into());
        }
        let _guard = self.signing_in.try_claim().ok_or_else(|| ClientError::Busy {
            action: "sign in".into(),
        })?;

        let request = ApiRequest::post(LOGIN_PATH)
            .json(credentials)
            .map_err(|e| e.into_client_error("sign in"))?;
        let session = match self.api.send(request, None).await {
            Ok(Some(body)) => {
                let parsed: LoginResponse = serde_json::from_value(body).map_err(|e| {
                    ClientError::network("sign in", format!("malformed response: {e}"))
                })?;
                parsed.into_session().map_err(ClientError::InvalidCredentials)?
            }
            Ok(None) => return Err(ClientError::network("sign in", "empty response")),
            Err(err) => return Err(classify_login_failure(err)),
        };

        self.storage.write_session(&session)?;
        info!(user_id = ?session.user_id, "signed in");
        Ok(session)
    }

    /// Clears every session key. Calling it while signed out is a no-op.
    pub fn sign_out(&self) -> ClientResult<()> {
        self.storage.clear_session()?;
        info!("signed out");
        Ok(())
    }

    pub fn try_current_session(&self) -> ClientResult<Option<Session>> {
        self.storage.read_session()
    }

    /// Synchronous snapshot of the persisted session. An unreadable store counts as
    /// signed out.
    pub fn current_session(&self) -> Option<Session> {
        match self.storage.read_session() {
            Ok(session) => session,
            Err(err) => {
                error!(error = %err, "failed to read persisted session");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    /// Validates locally, then submits. Never signs the user in.
    pub async fn register(&self, form: RegistrationForm) -> ClientResult<String> {
        self.register_on(form, Local::now().date_naive()).await
    }

    pub async fn register_on(
        &self,
        form: RegistrationForm,
        today: NaiveDate,
    ) -> ClientResult<String> {
        validate_registration(&form, today)?;
        let _guard = self.registering.try_claim().ok_or_else(|| ClientError::Busy {
            action: "register".into(),
        })?;

        let payload = RegisterRequest::from(form);
        let request = ApiRequest::post(REGISTER_PATH)
            .json(&payload)
            .map_err(|e| e.into_client_error("register"))?;

        let body = self.api.send(request, None).await.map_err(|err| {
            let message = err
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            error!(error = %err, "registration failed");
            ClientError::network("register", message)
        })?;

        let parsed: RegisterResponse = body
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ClientError::network("register", format!("malformed response: {e}")))?
            .unwrap_or_default();
        if parsed.success != Some(true) {
            let message = parsed
                .message
                .unwrap_or_else(|| "Registration failed".to_string());
            warn!(%message, "registration rejected");
            return Err(ClientError::network("register", message));
        }
        info!(email = %payload.email, "registered");
        Ok(parsed
            .message
            .unwrap_or_else(|| "Registration successful! Please login.".to_string()))
    }
}

/// 4xx on the login call is an explicit rejection; anything else has no clear
/// rejection reason.
fn classify_login_failure(err: ApiError) -> ClientError {
    let rejected = matches!(err.status(), Some(status) if status.is_client_error());
    if rejected {
        let message = err
            .server_message()
            .unwrap_or("Invalid email or password")
            .to_string();
        warn!(%message, "login rejected");
        ClientError::InvalidCredentials(message)
    } else {
        error!(error = %err, "login failed");
        let message = err.to_string();
        ClientError::network("sign in", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn valid_form() -> RegistrationForm {
        RegistrationForm {
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            email: "ann@bank.test".into(),
            password: "abc123".into(),
            confirm_password: "abc123".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
            ..Default::default()
        }
    }

    #[test]
    fn valid_form_passes() {
        assert_eq!(validate_registration(&valid_form(), today()), Ok(()));
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let form = RegistrationForm {
            confirm_password: "abc124".into(),
            ..valid_form()
        };
        assert_eq!(
            validate_registration(&form, today()),
            Err(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn short_password_and_bad_email() {
        let form = RegistrationForm {
            password: "abc".into(),
            confirm_password: "abc".into(),
            ..valid_form()
        };
        assert_eq!(
            validate_registration(&form, today()),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );

        let form = RegistrationForm {
            email: "ann@bank".into(),
            ..valid_form()
        };
        assert_eq!(
            validate_registration(&form, today()),
            Err(ValidationError::InvalidEmail)
        );
    }

    #[test]
    fn birth_date_bounds() {
        let mut form = valid_form();
        form.date_of_birth = Some(today());
        assert_eq!(
            validate_registration(&form, today()),
            Err(ValidationError::BirthDateNotInPast)
        );

        form.date_of_birth = NaiveDate::from_ymd_opt(1870, 1, 1);
        assert_eq!(
            validate_registration(&form, today()),
            Err(ValidationError::BirthDateImplausible)
        );

        form.date_of_birth = None;
        assert_eq!(validate_registration(&form, today()), Ok(()));
    }

    #[test]
    fn email_pattern_matches_basic_addresses() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email("missing-at.example"));
    }
}
