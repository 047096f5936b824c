//! Seed script for a VaultX backend
//!
//! Signs in, then creates customers and one account per customer through the
//! same synchronizer the CLI uses (so every create is followed by a resync).
//! Run: cargo run --bin seed_data -- [fixture.json]
//! Credentials come from VAULTX_SEED_EMAIL / VAULTX_SEED_PASSWORD.

use std::env;
use std::error::Error;
use std::fs;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use vaultx_client::config::{ClientConfig, ConfigOverrides};
use vaultx_client::forms::{AccountDraft, CustomerDraft};
use vaultx_client::logging::{init_tracing, LogOptions};
use vaultx_client::models::{Account, Credentials, Customer};
use vaultx_client::{ClientContext, ResourceList};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedCustomer {
    first_name: String,
    last_name: String,
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    accounts: Vec<SeedAccount>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedAccount {
    account_number: String,
    account_type: String,
    balance: String,
    #[serde(default)]
    interest_rate: String,
}

#[derive(Deserialize)]
struct Fixture {
    customers: Vec<SeedCustomer>,
}

fn default_fixture() -> serde_json::Value {
    // Five customers, each with a savings and a checking account
    let names = [
        ("Ada", "Lovelace"),
        ("Grace", "Hopper"),
        ("Alan", "Turing"),
        ("Edsger", "Dijkstra"),
        ("Barbara", "Liskov"),
    ];
    let customers: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, (first, last))| {
            json!({
                "firstName": first,
                "lastName": last,
                "email": format!("{}.{}@vaultx.test", first.to_lowercase(), last.to_lowercase()),
                "phone": format!("555-010{i}"),
                "accounts": [
                    { "accountNumber": format!("SAV-{}", 100 + i), "accountType": "SAVINGS",
                      "balance": format!("{}", 1000 * (i + 1)), "interestRate": "2.5" },
                    { "accountNumber": format!("CHK-{}", 200 + i), "accountType": "CHECKING",
                      "balance": "250" }
                ]
            })
        })
        .collect();
    json!({ "customers": customers })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _log_guard = init_tracing(&LogOptions::default())?;

    let fixture: Fixture = match env::args().nth(1) {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => serde_json::from_value(default_fixture())?,
    };

    let config = ClientConfig::from_env(ConfigOverrides::default())?;
    let ctx = ClientContext::open(&config)?;

    let email = env::var("VAULTX_SEED_EMAIL").unwrap_or_else(|_| "admin@vaultx.test".to_string());
    let password = env::var("VAULTX_SEED_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    ctx.session()
        .sign_in(&Credentials { email, password })
        .await?;

    let customers = ResourceList::<Customer>::new(ctx.clone());
    let accounts = ResourceList::<Account>::new(ctx.clone());
    customers.load().await?;

    for seed in &fixture.customers {
        let existing = customers
            .items()
            .into_iter()
            .find(|c| c.email.as_deref() == Some(seed.email.as_str()));
        let customer = match existing {
            Some(c) => {
                info!(email = %seed.email, "customer exists, skipping create");
                c
            }
            None => {
                let draft = CustomerDraft::parse(
                    &seed.first_name,
                    &seed.last_name,
                    &seed.email,
                    &seed.phone,
                    &seed.address,
                    "",
                )?;
                customers.create(&draft).await?;
                match customers
                    .items()
                    .into_iter()
                    .find(|c| c.email.as_deref() == Some(seed.email.as_str()))
                {
                    Some(c) => c,
                    None => {
                        warn!(email = %seed.email, "created customer not returned by list");
                        continue;
                    }
                }
            }
        };
        let Some(customer_id) = customer.customer_id else {
            warn!(email = %seed.email, "customer has no id");
            continue;
        };

        for account in &seed.accounts {
            let draft = AccountDraft::parse(
                &account.account_number,
                &account.account_type,
                &customer_id.to_string(),
                &account.balance,
                &account.interest_rate,
                "ACTIVE",
            )?;
            if let Err(err) = accounts.create(&draft).await {
                warn!(account = %account.account_number, error = %err, "account not created");
            }
        }
    }

    for notice in ctx.notices().drain() {
        println!("{notice}");
    }
    println!(
        "Seeded: {} customers, {} accounts",
        customers.len(),
        accounts.len()
    );
    Ok(())
}
