//! Guarded navigation.
//!
//! Protected routes are only entered with a stored session; without one the
//! navigator lands on the login route and the caller must not load any data.
//! Public routes are always enterable. Whether a signed-in user visiting a public
//! route is bounced to the dashboard is a configurable policy.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::auth::SessionStore;
use crate::models::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Welcome,
    Login,
    Register,
    Dashboard,
    Customers,
    CustomerNew,
    CustomerEdit(i64),
    Accounts,
    AccountNew,
    AccountEdit(i64),
    Transactions,
    TransactionNew,
    Trading,
    Portfolio,
    Funding,
    TradeHistory,
    Payments,
}

impl Route {
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Welcome | Self::Login | Self::Register)
    }

    pub fn path(&self) -> String {
        match self {
            Self::Welcome => "/welcome".into(),
            Self::Login => "/login".into(),
            Self::Register => "/register".into(),
            Self::Dashboard => "/".into(),
            Self::Customers => "/customers".into(),
            Self::CustomerNew => "/customers/new".into(),
            Self::CustomerEdit(id) => format!("/customers/edit/{id}"),
            Self::Accounts => "/accounts".into(),
            Self::AccountNew => "/accounts/new".into(),
            Self::AccountEdit(id) => format!("/accounts/edit/{id}"),
            Self::Transactions => "/transactions".into(),
            Self::TransactionNew => "/transactions/new".into(),
            Self::Trading => "/trading".into(),
            Self::Portfolio => "/portfolio".into(),
            Self::Funding => "/funding".into(),
            Self::TradeHistory => "/trade-history".into(),
            Self::Payments => "/payments".into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRoute(pub String);

impl fmt::Display for UnknownRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown route '{}'", self.0)
    }
}

impl std::error::Error for UnknownRoute {}

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        let parse_id = |raw: &str| {
            raw.parse::<i64>()
                .map_err(|_| UnknownRoute(path.to_string()))
        };
        let route = match segments.as_slice() {
            [] => Self::Dashboard,
            ["welcome"] => Self::Welcome,
            ["login"] => Self::Login,
            ["register"] => Self::Register,
            ["customers"] => Self::Customers,
            ["customers", "new"] => Self::CustomerNew,
            ["customers", "edit", id] => Self::CustomerEdit(parse_id(*id)?),
            ["accounts"] => Self::Accounts,
            ["accounts", "new"] => Self::AccountNew,
            ["accounts", "edit", id] => Self::AccountEdit(parse_id(*id)?),
            ["transactions"] => Self::Transactions,
            ["transactions", "new"] => Self::TransactionNew,
            ["trading"] => Self::Trading,
            ["portfolio"] => Self::Portfolio,
            ["funding"] => Self::Funding,
            ["trade-history"] => Self::TradeHistory,
            ["payments"] => Self::Payments,
            _ => return Err(UnknownRoute(path.to_string())),
        };
        Ok(route)
    }
}

/// What happens when a signed-in user opens login, register or welcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthenticatedVisitPolicy {
    /// Public routes stay reachable.
    #[default]
    Permissive,
    /// Send the user to the dashboard instead.
    RedirectToDashboard,
}

impl FromStr for AuthenticatedVisitPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "redirect" | "redirect-to-dashboard" => Ok(Self::RedirectToDashboard),
            other => Err(format!("unknown public route policy '{other}'")),
        }
    }
}

/// Outcome of the guard for one mount. The session check is a synchronous
/// storage read, so a mount goes straight from checking to one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardState {
    Denied { redirect: Route },
    Granted { route: Route, session: Option<Session> },
}

impl GuardState {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// Token to attach to the view's data requests, if access was granted with one.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Granted {
                session: Some(session),
                ..
            } => Some(&session.token),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Navigator {
    session: SessionStore,
    policy: AuthenticatedVisitPolicy,
    current: Arc<Mutex<Option<Route>>>,
}

impl Navigator {
    pub fn new(session: SessionStore, policy: AuthenticatedVisitPolicy) -> Self {
        Self {
            session,
            policy,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn policy(&self) -> AuthenticatedVisitPolicy {
        self.policy
    }

    /// Evaluates the guard for `route` without navigating.
    pub fn check(&self, route: &Route) -> GuardState {
        let session = self.session.current_session();
        if route.is_public() {
            if session.is_some() && self.policy == AuthenticatedVisitPolicy::RedirectToDashboard {
                return GuardState::Denied {
                    redirect: Route::Dashboard,
                };
            }
            return GuardState::Granted {
                route: route.clone(),
                session,
            };
        }
        match session {
            Some(session) => GuardState::Granted {
                route: route.clone(),
                session: Some(session),
            },
            None => GuardState::Denied {
                redirect: Route::Login,
            },
        }
    }

    /// Runs the guard for one mount of `route`. A denied mount is terminal: the
    /// redirect target becomes the current route and the caller loads nothing.
    pub fn navigate(&self, route: Route) -> GuardState {
        debug!(%route, "navigating");
        let state = self.check(&route);
        let landed = match &state {
            GuardState::Granted { route, .. } => route.clone(),
            GuardState::Denied { redirect } => {
                info!(from = %route, to = %redirect, "navigation redirected");
                redirect.clone()
            }
        };
        *self.current.lock() = Some(landed);
        state
    }

    /// Forced move to the login route after the session was invalidated.
    pub fn redirect_to_login(&self) {
        info!("redirecting to login");
        *self.current.lock() = Some(Route::Login);
    }

    /// Route the last navigation landed on; `None` before the first one.
    pub fn current(&self) -> Option<Route> {
        self.current.lock().clone()
    }
}
