//! Client-side filtering over loaded collections.
//!
//! Text filtering is a case-insensitive substring match over a fixed set of fields
//! per entity. A record missing a field simply does not match on that field.

use std::str::FromStr;

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime};

use crate::models::{Account, Asset, Customer, Deposit, Portfolio, Position, Trade, Transaction};

/// Entities that can be narrowed by a free-text filter.
pub trait Searchable {
    fn search_fields(&self) -> Vec<Option<&str>>;
}

/// Lowercased filter text. A blank term means "no filter"; otherwise the term is
/// matched as typed, surrounding whitespace included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterTerm {
    raw: String,
    needle: String,
}

impl FilterTerm {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            needle: raw.to_lowercase(),
        }
    }

    /// The term as typed.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.needle.trim().is_empty()
    }

    pub fn matches<T: Searchable>(&self, item: &T) -> bool {
        if self.is_empty() {
            return true;
        }
        item.search_fields()
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&self.needle))
    }

    /// Matching items in their original relative order.
    pub fn apply<T: Searchable + Clone>(&self, items: &[T]) -> Vec<T> {
        if self.is_empty() {
            return items.to_vec();
        }
        items.iter().filter(|item| self.matches(*item)).cloned().collect()
    }
}

impl Searchable for Customer {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.email.as_deref(),
            self.phone.as_deref(),
        ]
    }
}

impl Searchable for Account {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            self.account_number.as_deref(),
            self.customer_name.as_deref(),
            self.account_type.as_deref(),
        ]
    }
}

impl Searchable for Transaction {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            self.transaction_type.as_deref(),
            self.account_number.as_deref(),
            self.destination_account_number.as_deref(),
            self.description.as_deref(),
        ]
    }
}

impl Searchable for Trade {
    fn search_fields(&self) -> Vec<Option<&str>> {
        let asset = self.asset.as_ref();
        vec![
            asset.and_then(|a| a.symbol.as_deref()),
            asset.and_then(|a| a.asset_name.as_deref()),
            self.trade_type.as_deref(),
            self.trade_status.as_deref(),
        ]
    }
}

impl Searchable for Deposit {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            self.payment_method.as_deref(),
            self.transaction_reference.as_deref(),
            self.notes.as_deref(),
        ]
    }
}

impl Searchable for Portfolio {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![self.portfolio_name.as_deref()]
    }
}

impl Searchable for Position {
    fn search_fields(&self) -> Vec<Option<&str>> {
        let asset = self.asset.as_ref();
        vec![
            asset.and_then(|a| a.symbol.as_deref()),
            asset.and_then(|a| a.asset_name.as_deref()),
        ]
    }
}

impl Searchable for Asset {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            self.symbol.as_deref(),
            self.asset_name.as_deref(),
            self.asset_type.as_deref(),
        ]
    }
}

/// Look-back window for the trade history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    All,
    Last7Days,
    Last30Days,
    Last90Days,
    LastYear,
}

impl DateRange {
    /// Earliest timestamp still inside the window, or `None` for `All`.
    pub fn start(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::All => None,
            Self::Last7Days => Some(now - Duration::days(7)),
            Self::Last30Days => Some(now - Duration::days(30)),
            Self::Last90Days => Some(now - Duration::days(90)),
            Self::LastYear => now.checked_sub_months(Months::new(12)),
        }
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "7days" => Ok(Self::Last7Days),
            "30days" => Ok(Self::Last30Days),
            "90days" => Ok(Self::Last90Days),
            "1year" => Ok(Self::LastYear),
            other => Err(format!("unknown date range '{other}'")),
        }
    }
}

/// Parses the timestamp formats the backend has been seen to emit.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Trade history filters. `None` for type or status means "ALL".
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub trade_type: Option<String>,
    pub status: Option<String>,
    pub range: DateRange,
    pub text: FilterTerm,
}

impl TradeFilter {
    pub fn matches(&self, trade: &Trade, now: NaiveDateTime) -> bool {
        if !eq_ignore_case(self.trade_type.as_deref(), trade.trade_type.as_deref()) {
            return false;
        }
        if !eq_ignore_case(self.status.as_deref(), trade.trade_status.as_deref()) {
            return false;
        }
        if let Some(start) = self.range.start(now) {
            let executed = trade.trade_date.as_deref().and_then(parse_timestamp);
            match executed {
                Some(at) if at >= start => {}
                _ => return false,
            }
        }
        self.text.matches(trade)
    }

    pub fn apply(&self, trades: &[Trade], now: NaiveDateTime) -> Vec<Trade> {
        trades
            .iter()
            .filter(|t| self.matches(t, now))
            .cloned()
            .collect()
    }
}

fn eq_ignore_case(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(w) if w.eq_ignore_ascii_case("all") => true,
        Some(w) => actual.is_some_and(|a| a.eq_ignore_ascii_case(w)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(number: &str) -> Account {
        Account {
            account_number: Some(number.to_string()),
            account_type: Some("SAVINGS".to_string()),
            ..Default::default()
        }
    }

    fn trade(kind: &str, status: &str, date: &str) -> Trade {
        Trade {
            trade_type: Some(kind.into()),
            trade_status: Some(status.into()),
            trade_date: Some(date.into()),
            ..Default::default()
        }
    }

    fn numbers(accounts: &[Account]) -> Vec<&str> {
        accounts
            .iter()
            .map(|a| a.account_number.as_deref().unwrap_or_default())
            .collect()
    }

    #[test]
    fn substring_filter_is_case_insensitive_and_order_preserving() {
        let items = vec![account("SAV-100"), account("CHK-200"), account("SAV-300")];
        let mut items_chk = items.clone();
        items_chk[1].account_type = Some("CHECKING".into());
        let term = FilterTerm::new("sav-");
        assert_eq!(numbers(&term.apply(&items_chk)), vec!["SAV-100", "SAV-300"]);
    }

    #[test]
    fn filtering_twice_equals_once_and_empty_restores() {
        let items = vec![account("SAV-100"), account("CHK-200"), account("SAV-300")];
        let term = FilterTerm::new("100");
        let once = term.apply(&items);
        let twice = term.apply(&once);
        assert_eq!(once, twice);
        assert_eq!(FilterTerm::new("   ").apply(&items), items);
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_term() {
        let items = vec![account("SAV-100"), account("CHK-200")];
        assert!(FilterTerm::new("sav ").apply(&items).is_empty());
        assert_eq!(numbers(&FilterTerm::new("SAV").apply(&items)), vec!["SAV-100"]);
        assert!(!FilterTerm::new("sav ").is_empty());
        assert!(FilterTerm::new(" \t").is_empty());
    }

    #[test]
    fn missing_fields_do_not_match() {
        let bare = Customer::default();
        assert!(!FilterTerm::new("ann").matches(&bare));
        let ann = Customer {
            email: Some("Ann@Bank.test".into()),
            ..Default::default()
        };
        assert!(FilterTerm::new("ANN@").matches(&ann));
    }

    #[test]
    fn transaction_matches_destination_account() {
        let tx = Transaction {
            transaction_type: Some("TRANSFER".into()),
            destination_account_number: Some("CHK-900".into()),
            ..Default::default()
        };
        assert!(FilterTerm::new("chk-9").matches(&tx));
        assert!(!FilterTerm::new("deposit").matches(&tx));
    }

    #[test]
    fn trade_filter_combines_type_status_and_range() {
        let now = parse_timestamp("2024-06-30T12:00:00").unwrap();
        let trades = vec![
            trade("BUY", "COMPLETED", "2024-06-28T10:00:00"),
            trade("SELL", "COMPLETED", "2024-06-29T10:00:00"),
            trade("BUY", "PENDING", "2024-06-29T11:00:00"),
            trade("BUY", "COMPLETED", "2024-01-01T10:00:00"),
            trade("BUY", "COMPLETED", "not a date"),
        ];
        let filter = TradeFilter {
            trade_type: Some("buy".into()),
            status: Some("COMPLETED".into()),
            range: DateRange::Last7Days,
            ..Default::default()
        };
        let hits = filter.apply(&trades, now);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].trade_date.as_deref(), Some("2024-06-28T10:00:00"));

        let all = TradeFilter {
            trade_type: Some("ALL".into()),
            ..Default::default()
        };
        assert_eq!(all.apply(&trades, now).len(), trades.len());
    }

    #[test]
    fn timestamps_in_several_formats() {
        assert!(parse_timestamp("2024-06-28T10:00:00.123").is_some());
        assert!(parse_timestamp("2024-06-28T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-06-28").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert_eq!("1year".parse::<DateRange>(), Ok(DateRange::LastYear));
    }
}
