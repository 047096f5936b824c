//! Resource list synchronizer.
//!
//! One `ResourceList<R>` per view: it owns the view's copy of a backend collection,
//! its filter term, its loading/mutation flags and the pending deletion. Every
//! request goes through `ClientContext::send_authed`, so auth failures are handled
//! the same way for every entity type.
//!
//! Mutations never patch `items` locally; a successful mutation triggers `load` and
//! the backend's answer becomes the new state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::context::ClientContext;
use crate::error::{ClientError, ClientResult};
use crate::inflight::{InFlight, InFlightCounter};
use crate::models::{Account, Asset, Customer, Deposit, Portfolio, Position, Trade, Transaction};
use crate::normalize::{normalize_items, normalize_object};
use crate::query::{FilterTerm, Searchable};
use crate::rest::ApiRequest;

/// Which owner, if any, a list endpoint is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    Global,
    /// `/<...>/user/{userId}` of the signed-in user.
    CurrentUser,
    /// A parent record chosen by the view (e.g. positions of one portfolio).
    Parent,
}

/// A backend collection the synchronizer can load.
pub trait Resource: Searchable + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Singular, lower case; used in action names ("create account").
    const ENTITY: &'static str;
    /// Plural, lower case; used in action names ("fetch accounts").
    const PLURAL: &'static str;
    /// Field holding the array when the list body is wrapped.
    const WRAPPER_FIELD: &'static str;
    const SCOPE: ListScope;

    /// List endpoint. `owner` is the user or parent id for scoped lists.
    fn list_path(owner: Option<&str>) -> String;

    fn id(&self) -> Option<i64>;

    /// Endpoint deleting the record with `id`, for collections that allow it.
    fn delete_path(_id: i64) -> Option<String> {
        None
    }
}

/// Collections with plain `POST base`, `PUT base/{id}`, `DELETE base/{id}` endpoints.
pub trait Writable: Resource {
    const BASE_PATH: &'static str;
}

/// A record awaiting an explicit yes/no before its DELETE is issued.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeletion<T> {
    pub id: i64,
    pub target: T,
}

struct ListState<R> {
    items: Vec<R>,
    filter: FilterTerm,
    pending: Option<PendingDeletion<R>>,
}

struct Inner<R> {
    ctx: ClientContext,
    parent: Option<i64>,
    state: Mutex<ListState<R>>,
    loading: InFlightCounter,
    mutating: InFlight,
    generation: AtomicU64,
    detached: AtomicBool,
}

pub struct ResourceList<R: Resource> {
    inner: Arc<Inner<R>>,
}

impl<R: Resource> Clone for ResourceList<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resource> fmt::Debug for ResourceList<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceList")
            .field("entity", &R::ENTITY)
            .field("parent", &self.inner.parent)
            .field("items", &self.len())
            .field("loading", &self.is_loading())
            .finish()
    }
}

impl<R: Resource> ResourceList<R> {
    pub fn new(ctx: ClientContext) -> Self {
        Self::build(ctx, None)
    }

    /// List scoped to a parent record, for `ListScope::Parent` collections.
    pub fn for_parent(ctx: ClientContext, parent: i64) -> Self {
        Self::build(ctx, Some(parent))
    }

    fn build(ctx: ClientContext, parent: Option<i64>) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                parent,
                state: Mutex::new(ListState {
                    items: Vec::new(),
                    filter: FilterTerm::default(),
                    pending: None,
                }),
                loading: InFlightCounter::default(),
                mutating: InFlight::new(),
                generation: AtomicU64::new(0),
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn context(&self) -> &ClientContext {
        &self.inner.ctx
    }

    pub fn items(&self) -> Vec<R> {
        self.inner.state.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.is_active()
    }

    pub fn is_mutating(&self) -> bool {
        self.inner.mutating.is_active()
    }

    pub fn find(&self, id: i64) -> Option<R> {
        self.inner
            .state
            .lock()
            .items
            .iter()
            .find(|item| item.id() == Some(id))
            .cloned()
    }

    /// Marks the owning view as gone; responses arriving afterwards are dropped.
    pub fn detach(&self) {
        self.inner.detached.store(true, Ordering::Release);
        debug!(entity = R::ENTITY, "list detached");
    }

    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::Acquire)
    }

    fn owner(&self) -> ClientResult<Option<String>> {
        match R::SCOPE {
            ListScope::Global => Ok(None),
            ListScope::CurrentUser => Ok(Some(self.inner.ctx.require_user_id()?.to_string())),
            ListScope::Parent => self
                .inner
                .parent
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| {
                    ClientError::config(format!("{} list needs a parent id", R::PLURAL))
                }),
        }
    }

    /// Fetches the collection and replaces `items` with the normalized result.
    ///
    /// On failure `items` keeps its last value. The loading flag is released on
    /// every path. A response that arrives after `detach`, or after a newer load was
    /// started, is discarded.
    pub async fn load(&self) -> ClientResult<()> {
        let _loading = self.inner.loading.enter();
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let action = format!("fetch {}", R::PLURAL);

        let owner = match self.owner() {
            Ok(owner) => owner,
            Err(err) => {
                self.inner.ctx.handle_failure(&err, &action);
                return Err(err);
            }
        };
        let request = ApiRequest::get(R::list_path(owner.as_deref()));
        let body = self.inner.ctx.send_authed(request, &action).await?;

        if self.is_detached() {
            debug!(entity = R::ENTITY, "discarding response for detached list");
            return Ok(());
        }
        if self.inner.generation.load(Ordering::Acquire) != generation {
            debug!(entity = R::ENTITY, generation, "discarding superseded response");
            return Ok(());
        }

        let items: Vec<R> = normalize_items(body, R::WRAPPER_FIELD);
        info!(entity = R::ENTITY, count = items.len(), "list loaded");
        self.inner.state.lock().items = items;
        Ok(())
    }

    pub fn set_filter(&self, term: &str) {
        self.inner.state.lock().filter = FilterTerm::new(term);
    }

    pub fn filter_term(&self) -> String {
        self.inner.state.lock().filter.raw().to_string()
    }

    /// Items matching the current filter term, in loaded order.
    pub fn filtered(&self) -> Vec<R> {
        let state = self.inner.state.lock();
        state.filter.apply(&state.items)
    }

    /// Sends a mutation for this collection and resynchronizes on success.
    ///
    /// Only one mutation per list may be in flight; a second one fails with
    /// `ClientError::Busy` without touching the network. The returned body is the
    /// mutation's response, the reload's outcome is reported through notices.
    pub async fn submit(
        &self,
        request: ApiRequest,
        action: &str,
        success_message: &str,
    ) -> ClientResult<Option<Value>> {
        let _guard = self.inner.mutating.try_claim().ok_or_else(|| {
            debug!(entity = R::ENTITY, %action, "mutation already in flight");
            ClientError::Busy {
                action: action.to_string(),
            }
        })?;

        let body = self.inner.ctx.send_authed(request, action).await?;
        info!(entity = R::ENTITY, %action, "mutation succeeded");
        self.inner.ctx.notices().success(success_message);

        if !self.is_detached() {
            if let Err(err) = self.load().await {
                debug!(entity = R::ENTITY, error = %err, "resync after mutation failed");
            }
        }
        Ok(body)
    }

    /// Stages `target` for deletion. Nothing is sent until `confirm_delete`.
    pub fn request_delete(&self, target: R) -> ClientResult<PendingDeletion<R>> {
        let id = target.id().ok_or_else(|| {
            ClientError::config(format!("cannot delete a {} without an id", R::ENTITY))
        })?;
        if R::delete_path(id).is_none() {
            return Err(ClientError::config(format!(
                "{} records cannot be deleted",
                R::ENTITY
            )));
        }
        let pending = PendingDeletion { id, target };
        self.inner.state.lock().pending = Some(pending.clone());
        debug!(entity = R::ENTITY, id, "deletion requested");
        Ok(pending)
    }

    pub fn pending_deletion(&self) -> Option<PendingDeletion<R>> {
        self.inner.state.lock().pending.clone()
    }

    /// Drops the staged deletion without contacting the backend.
    pub fn cancel_delete(&self) -> Option<PendingDeletion<R>> {
        let pending = self.inner.state.lock().pending.take();
        if let Some(p) = &pending {
            debug!(entity = R::ENTITY, id = p.id, "deletion cancelled");
        }
        pending
    }

    /// Issues the staged DELETE. The pending deletion is cleared whatever the
    /// outcome. Returns `false` when nothing was staged.
    pub async fn confirm_delete(&self) -> ClientResult<bool> {
        let Some(pending) = self.inner.state.lock().pending.take() else {
            return Ok(false);
        };
        self.remove(pending.id).await?;
        Ok(true)
    }

    async fn remove(&self, id: i64) -> ClientResult<()> {
        let action = format!("delete {}", R::ENTITY);
        let path = R::delete_path(id).ok_or_else(|| {
            ClientError::config(format!("{} records cannot be deleted", R::ENTITY))
        })?;
        let message = format!("{} deleted successfully", capitalize(R::ENTITY));
        self.submit(ApiRequest::delete(path), &action, &message)
            .await?;
        Ok(())
    }
}

impl<R: Writable> ResourceList<R> {
    /// Loads one record, for an edit form. `items` is not touched.
    pub async fn fetch(&self, id: i64) -> ClientResult<Option<R>> {
        let action = format!("fetch {} data", R::ENTITY);
        let request = ApiRequest::get(format!("{}/{}", R::BASE_PATH, id));
        let body = self.inner.ctx.send_authed(request, &action).await?;
        Ok(normalize_object(body, R::ENTITY))
    }

    pub async fn create<P: Serialize + ?Sized>(&self, payload: &P) -> ClientResult<Option<Value>> {
        let action = format!("create {}", R::ENTITY);
        let request = ApiRequest::post(R::BASE_PATH)
            .json(payload)
            .map_err(|e| e.into_client_error(&action))?;
        let message = format!("{} created successfully", capitalize(R::ENTITY));
        self.submit(request, &action, &message).await
    }

    pub async fn update<P: Serialize + ?Sized>(
        &self,
        id: i64,
        payload: &P,
    ) -> ClientResult<Option<Value>> {
        let action = format!("update {}", R::ENTITY);
        let request = ApiRequest::put(format!("{}/{}", R::BASE_PATH, id))
            .json(payload)
            .map_err(|e| e.into_client_error(&action))?;
        let message = format!("{} updated successfully", capitalize(R::ENTITY));
        self.submit(request, &action, &message).await
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Resource for Customer {
    const ENTITY: &'static str = "customer";
    const PLURAL: &'static str = "customers";
    const WRAPPER_FIELD: &'static str = "customers";
    const SCOPE: ListScope = ListScope::Global;

    fn list_path(_owner: Option<&str>) -> String {
        "/customers".into()
    }

    fn id(&self) -> Option<i64> {
        self.customer_id
    }

    fn delete_path(id: i64) -> Option<String> {
        Some(format!("/customers/{id}"))
    }
}

impl Writable for Customer {
    const BASE_PATH: &'static str = "/customers";
}

impl Resource for Account {
    const ENTITY: &'static str = "account";
    const PLURAL: &'static str = "accounts";
    const WRAPPER_FIELD: &'static str = "accounts";
    const SCOPE: ListScope = ListScope::Global;

    fn list_path(_owner: Option<&str>) -> String {
        "/accounts".into()
    }

    fn id(&self) -> Option<i64> {
        self.account_id
    }

    fn delete_path(id: i64) -> Option<String> {
        Some(format!("/accounts/{id}"))
    }
}

impl Writable for Account {
    const BASE_PATH: &'static str = "/accounts";
}

impl Resource for Transaction {
    const ENTITY: &'static str = "transaction";
    const PLURAL: &'static str = "transactions";
    const WRAPPER_FIELD: &'static str = "transactions";
    const SCOPE: ListScope = ListScope::Global;

    fn list_path(_owner: Option<&str>) -> String {
        "/transactions".into()
    }

    fn id(&self) -> Option<i64> {
        self.transaction_id
    }

    fn delete_path(id: i64) -> Option<String> {
        Some(format!("/transactions/{id}"))
    }
}

impl Writable for Transaction {
    const BASE_PATH: &'static str = "/transactions";
}

impl Resource for Trade {
    const ENTITY: &'static str = "trade";
    const PLURAL: &'static str = "trades";
    const WRAPPER_FIELD: &'static str = "trades";
    const SCOPE: ListScope = ListScope::CurrentUser;

    fn list_path(owner: Option<&str>) -> String {
        format!("/trading/user/{}", owner.unwrap_or_default())
    }

    fn id(&self) -> Option<i64> {
        self.trade_id
    }
}

impl Resource for Deposit {
    const ENTITY: &'static str = "deposit";
    const PLURAL: &'static str = "deposits";
    const WRAPPER_FIELD: &'static str = "deposits";
    const SCOPE: ListScope = ListScope::CurrentUser;

    fn list_path(owner: Option<&str>) -> String {
        format!("/deposit/user/{}", owner.unwrap_or_default())
    }

    fn id(&self) -> Option<i64> {
        self.deposit_id
    }
}

impl Resource for Portfolio {
    const ENTITY: &'static str = "portfolio";
    const PLURAL: &'static str = "portfolios";
    const WRAPPER_FIELD: &'static str = "portfolios";
    const SCOPE: ListScope = ListScope::CurrentUser;

    fn list_path(owner: Option<&str>) -> String {
        format!("/portfolio/user/{}", owner.unwrap_or_default())
    }

    fn id(&self) -> Option<i64> {
        self.portfolio_id
    }

    fn delete_path(id: i64) -> Option<String> {
        Some(format!("/portfolio/{id}"))
    }
}

impl Resource for Position {
    const ENTITY: &'static str = "position";
    const PLURAL: &'static str = "positions";
    const WRAPPER_FIELD: &'static str = "positions";
    const SCOPE: ListScope = ListScope::Parent;

    fn list_path(owner: Option<&str>) -> String {
        format!("/portfolio/{}/positions", owner.unwrap_or_default())
    }

    fn id(&self) -> Option<i64> {
        self.position_id
    }
}

impl Resource for Asset {
    const ENTITY: &'static str = "asset";
    const PLURAL: &'static str = "assets";
    const WRAPPER_FIELD: &'static str = "assets";
    const SCOPE: ListScope = ListScope::Global;

    fn list_path(_owner: Option<&str>) -> String {
        "/assets/all".into()
    }

    fn id(&self) -> Option<i64> {
        self.asset_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::models::{Session, UserId, UserProfile};
    use crate::storage::Storage;

    fn context(signed_in: bool) -> ClientContext {
        let storage = Storage::temporary().unwrap();
        if signed_in {
            storage
                .write_session(&Session {
                    token: "tok".into(),
                    user_id: Some(UserId::Number(3)),
                    profile: UserProfile::default(),
                })
                .unwrap();
        }
        let config = ClientConfig {
            api_base_url: "http://127.0.0.1:9".into(),
            ..ClientConfig::default()
        };
        ClientContext::with_storage(&config, storage).unwrap()
    }

    fn account(id: i64) -> Account {
        Account {
            account_id: Some(id),
            account_number: Some(format!("ACC-{id}")),
            ..Default::default()
        }
    }

    #[test]
    fn paths_follow_backend_layout() {
        assert_eq!(Trade::list_path(Some("7")), "/trading/user/7");
        assert_eq!(Position::list_path(Some("2")), "/portfolio/2/positions");
        assert_eq!(Portfolio::delete_path(2).as_deref(), Some("/portfolio/2"));
        assert_eq!(Asset::delete_path(1), None);
        assert_eq!(capitalize("account"), "Account");
    }

    #[test]
    fn cancelled_deletion_clears_pending() {
        let list: ResourceList<Account> = ResourceList::new(context(true));
        let pending = list.request_delete(account(5)).unwrap();
        assert_eq!(pending.id, 5);
        assert_eq!(list.pending_deletion(), Some(pending.clone()));
        assert_eq!(list.cancel_delete(), Some(pending));
        assert_eq!(list.pending_deletion(), None);
    }

    #[test]
    fn deletion_needs_an_id_and_a_deletable_collection() {
        let list: ResourceList<Account> = ResourceList::new(context(true));
        assert!(list.request_delete(Account::default()).is_err());

        let assets: ResourceList<Asset> = ResourceList::new(context(true));
        let asset = Asset {
            asset_id: Some(1),
            ..Default::default()
        };
        assert!(assets.request_delete(asset).is_err());
        assert_eq!(assets.pending_deletion(), None);
    }

    #[tokio::test]
    async fn confirm_without_pending_is_a_no_op() {
        let list: ResourceList<Account> = ResourceList::new(context(true));
        assert!(!list.confirm_delete().await.unwrap());
    }

    #[tokio::test]
    async fn user_scoped_load_without_session_redirects_to_login() {
        let ctx = context(false);
        let list: ResourceList<Trade> = ResourceList::new(ctx.clone());
        let err = list.load().await.unwrap_err();
        assert!(matches!(err, ClientError::NotSignedIn));
        assert!(!list.is_loading());
        assert_eq!(
            ctx.navigator().current(),
            Some(crate::navigator::Route::Login)
        );
    }

    #[tokio::test]
    async fn positions_without_parent_is_a_config_error() {
        let list: ResourceList<Position> = ResourceList::new(context(true));
        assert!(matches!(list.load().await, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn transport_failure_keeps_items_and_releases_flag() {
        let ctx = context(true);
        let list: ResourceList<Account> = ResourceList::new(ctx.clone());
        list.inner.state.lock().items = vec![account(1), account(2)];

        let err = list.load().await.unwrap_err();
        assert!(matches!(err, ClientError::NetworkOrServer { .. }));
        assert_eq!(list.len(), 2);
        assert!(!list.is_loading());
        let notice = ctx.notices().last().unwrap();
        assert!(notice.message.starts_with("Failed to fetch accounts"));
        assert!(ctx.session().is_authenticated());
    }

    #[test]
    fn filter_view_tracks_term() {
        let list: ResourceList<Account> = ResourceList::new(context(true));
        list.inner.state.lock().items = vec![account(100), account(200), account(300)];
        list.set_filter("ACC-2");
        assert_eq!(list.filtered(), vec![account(200)]);
        assert_eq!(list.filter_term(), "ACC-2");
        list.set_filter(" acc-2 ");
        assert!(list.filtered().is_empty());
        list.set_filter("");
        assert_eq!(list.filtered(), list.items());
    }
}
