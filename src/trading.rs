//! Operations that are not plain CRUD: trade execution, deposits, portfolio
//! maintenance, dashboard figures and payment batches, plus the statistics the
//! views derive from loaded collections.
//!
//! Mutations that affect a loaded collection go through that collection's
//! `ResourceList::submit`, so they share its in-flight guard and resync on success.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::context::ClientContext;
use crate::error::{ClientError, ClientResult};
use crate::forms::{DepositRequest, PaymentInstruction, PaymentRow, PortfolioDraft, TradeOrder};
use crate::inflight::InFlight;
use crate::models::{
    Account, BatchResults, DashboardStats, Deposit, PaymentMetrics, Portfolio, Position, Trade,
    UserId,
};
use crate::normalize::{normalize_items, normalize_object};
use crate::resource::ResourceList;
use crate::rest::ApiRequest;

/// Resolves the signed-in user's id, applying the failure policy when there is none.
fn user_id_for(ctx: &ClientContext, action: &str) -> ClientResult<UserId> {
    ctx.require_user_id().map_err(|err| {
        ctx.handle_failure(&err, action);
        err
    })
}

/// Places a buy or sell order and reloads the user's trades. Returns the backend's
/// trade id when it reports one.
pub async fn execute_trade(
    trades: &ResourceList<Trade>,
    order: &TradeOrder,
) -> ClientResult<Option<i64>> {
    let action = format!("execute {} trade", order.side.as_str());
    let user_id = user_id_for(trades.context(), &action)?;
    let request = ApiRequest::post(format!("/trading/{}", order.side.endpoint()))
        .query("userId", &user_id)
        .query("assetId", order.asset_id)
        .query("quantity", order.quantity)
        .query("pricePerUnit", order.price_per_unit)
        .query("portfolioId", order.portfolio_id);
    let message = format!("{} trade executed successfully", order.side.as_str());
    let body = trades.submit(request, &action, &message).await?;

    let trade: Option<Trade> = normalize_object(body, "trade");
    let trade_id = trade.and_then(|t| t.trade_id);
    info!(
        side = order.side.as_str(),
        asset_id = order.asset_id,
        ?trade_id,
        total = order.total_cost(),
        "trade executed"
    );
    Ok(trade_id)
}

/// Funds the user's account and reloads the deposit history.
pub async fn process_deposit(
    deposits: &ResourceList<Deposit>,
    deposit: &DepositRequest,
) -> ClientResult<()> {
    let action = "process deposit";
    let user_id = user_id_for(deposits.context(), action)?;
    let request = ApiRequest::post("/deposit/process")
        .query("userId", &user_id)
        .query("amount", deposit.amount)
        .query("paymentMethod", &deposit.payment_method);
    deposits
        .submit(request, action, "Deposit processed successfully")
        .await?;
    Ok(())
}

pub async fn create_portfolio(
    portfolios: &ResourceList<Portfolio>,
    draft: &PortfolioDraft,
) -> ClientResult<()> {
    let action = "create portfolio";
    let user_id = user_id_for(portfolios.context(), action)?;
    let request = ApiRequest::post("/portfolio/create")
        .query("userId", &user_id)
        .query("portfolioName", &draft.name);
    portfolios
        .submit(request, action, "Portfolio created successfully")
        .await?;
    Ok(())
}

/// Asks the backend to revalue a portfolio at current prices.
pub async fn refresh_portfolio_values(
    ctx: &ClientContext,
    portfolio_id: i64,
) -> ClientResult<PortfolioStats> {
    let action = "update portfolio values";
    let request = ApiRequest::post(format!("/portfolio/{portfolio_id}/update-values"))
        .json(&json!({}))
        .map_err(|e| e.into_client_error(action))?;
    let body = ctx.send_authed(request, action).await?;
    match normalize_object::<Portfolio>(body, "portfolio") {
        Some(portfolio) => Ok(PortfolioStats::from(&portfolio)),
        None => {
            let err = ClientError::network(action, "response did not include the portfolio");
            ctx.handle_failure(&err, action);
            Err(err)
        }
    }
}

/// Headline figures for the dashboard. Anything but an auth failure degrades to
/// all-zero stats.
pub async fn dashboard_stats(ctx: &ClientContext) -> ClientResult<DashboardStats> {
    let action = "fetch dashboard stats";
    match ctx.send_authed(ApiRequest::get("/dashboard/stats"), action).await {
        Ok(body) => Ok(body
            .and_then(|b| match serde_json::from_value(b) {
                Ok(stats) => Some(stats),
                Err(err) => {
                    warn!(error = %err, "malformed dashboard stats");
                    None
                }
            })
            .unwrap_or_default()),
        Err(err) if err.is_session_expired() => Err(err),
        Err(err) => {
            warn!(error = %err, "using empty dashboard stats");
            Ok(DashboardStats::default())
        }
    }
}

/// Balance of the user's first account, shown as the amount available to trade.
pub async fn available_balance(ctx: &ClientContext) -> ClientResult<Option<f64>> {
    let action = "fetch account balance";
    let user_id = user_id_for(ctx, action)?;
    let body = ctx
        .send_authed(ApiRequest::get(format!("/accounts/user/{user_id}")), action)
        .await?;
    let accounts: Vec<Account> = normalize_items(body, "accounts");
    Ok(accounts.first().and_then(|a| a.balance))
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TradeStats {
    pub total: usize,
    pub buys: usize,
    pub sells: usize,
    pub total_commission: f64,
    /// Sell proceeds minus buy spend; ignores cost basis.
    pub profit: f64,
}

impl TradeStats {
    pub fn from_trades(trades: &[Trade]) -> Self {
        trades.iter().fold(
            Self {
                total: trades.len(),
                ..Self::default()
            },
            |mut stats, trade| {
                let notional = trade.quantity.unwrap_or(0.0) * trade.price_per_unit.unwrap_or(0.0);
                stats.total_commission += trade.commission.unwrap_or(0.0);
                match trade.trade_type.as_deref() {
                    Some(t) if t.eq_ignore_ascii_case("BUY") => {
                        stats.buys += 1;
                        stats.profit -= notional;
                    }
                    Some(t) if t.eq_ignore_ascii_case("SELL") => {
                        stats.sells += 1;
                        stats.profit += notional;
                    }
                    _ => {}
                }
                stats
            },
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortfolioStats {
    pub total_value: f64,
    pub cost_basis: f64,
    pub unrealized_gain: f64,
    pub unrealized_gain_percent: f64,
}

impl From<&Portfolio> for PortfolioStats {
    fn from(portfolio: &Portfolio) -> Self {
        let total_value = portfolio.total_value.unwrap_or(0.0);
        let cost_basis = portfolio.cost_basis.unwrap_or(0.0);
        let (gain, percent) = gain_and_percent(total_value, cost_basis);
        Self {
            total_value,
            cost_basis,
            unrealized_gain: gain,
            unrealized_gain_percent: percent,
        }
    }
}

/// Unrealized gain of one position and its percentage of cost basis.
pub fn position_gain(position: &Position) -> (f64, f64) {
    gain_and_percent(
        position.current_value.unwrap_or(0.0),
        position.cost_basis.unwrap_or(0.0),
    )
}

fn gain_and_percent(value: f64, cost_basis: f64) -> (f64, f64) {
    let gain = value - cost_basis;
    let percent = if cost_basis > 0.0 {
        gain / cost_basis * 100.0
    } else {
        0.0
    };
    (gain, percent)
}

pub fn total_deposited(deposits: &[Deposit]) -> f64 {
    deposits.iter().filter_map(|d| d.amount).sum()
}

#[derive(Serialize, Debug)]
struct BatchRequest<'a> {
    count: usize,
    payments: &'a [PaymentInstruction],
}

/// Client for the backend's concurrent payment processor.
#[derive(Clone)]
pub struct PaymentDesk {
    ctx: ClientContext,
    processing: InFlight,
}

impl PaymentDesk {
    pub fn new(ctx: ClientContext) -> Self {
        Self {
            ctx,
            processing: InFlight::new(),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_active()
    }

    /// Submits the complete rows of `rows`; rows with a blank column are left out.
    /// `count` asks the backend to add that many generated payments.
    pub async fn submit_batch(&self, rows: &[PaymentRow], count: usize) -> ClientResult<BatchResults> {
        let action = "process payments";
        let payments = rows
            .iter()
            .filter_map(PaymentRow::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                let err = ClientError::from(err);
                self.ctx.handle_failure(&err, action);
                err
            })?;
        let _guard = self.processing.try_claim().ok_or_else(|| ClientError::Busy {
            action: action.to_string(),
        })?;

        let request = ApiRequest::post("/payments/process-batch")
            .json(&BatchRequest {
                count,
                payments: &payments,
            })
            .map_err(|e| e.into_client_error(action))?;
        let body = self.ctx.send_authed(request, action).await?;
        let results: BatchResults = normalize_object(body, "results").unwrap_or_default();
        self.ctx
            .notices()
            .success(format!("Processed {} payments successfully!", results.processed));
        Ok(results)
    }

    pub async fn metrics(&self) -> ClientResult<PaymentMetrics> {
        let body = self
            .ctx
            .send_authed(ApiRequest::get("/payments/metrics"), "fetch payment metrics")
            .await?;
        Ok(normalize_object(body, "metrics").unwrap_or_default())
    }

    pub async fn reset_metrics(&self) -> ClientResult<()> {
        let action = "reset metrics";
        let request = ApiRequest::post("/payments/reset-metrics")
            .json(&json!({}))
            .map_err(|e| e.into_client_error(action))?;
        self.ctx.send_authed(request, action).await?;
        self.ctx.notices().success("Metrics reset successfully");
        Ok(())
    }
}
