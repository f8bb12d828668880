//! Seed script for development: populates a fresh database with sample data.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires `DATABASE_URL` and `JWT_SECRET` environment variables (reads .env).

use std::collections::BTreeMap;

use chrono::Utc;
use utiltrack::models::address::{AddressDoc, ServiceTemplate};
use utiltrack::models::month::{Month, MONTHS};
use utiltrack::models::reading::MeterReadingPayload;
use utiltrack::models::user::{UserProfile, UserRole};
use utiltrack::models::utility::{UtilityDataPayload, DEFAULT_CURRENCY};
use utiltrack::services::auth::issue_token;
use utiltrack::services::{reading as reading_service, utility as utility_service};
use utiltrack::store::{PgStore, UtilityStore};

const ADMIN_UID: &str = "seed-admin";
const ADMIN_EMAIL: &str = "admin@utiltrack.local";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let jwt_secret =
        std::env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;

    let pool = utiltrack::db::create_pool(&db_url, 5).await?;
    utiltrack::db::run_migrations(&pool).await?;
    let store = PgStore::new(pool);

    println!("=== utiltrack Seed Script ===");

    seed_admin_user(&store).await?;
    seed_addresses(&store).await?;
    seed_payments(&store).await?;
    seed_readings(&store).await?;

    let token = issue_token(ADMIN_UID, ADMIN_EMAIL, &jwt_secret, 30 * 24 * 3600)?;
    println!("\n=== Seed complete! ===");
    println!("Admin token (30 days): {token}");

    Ok(())
}

async fn seed_admin_user(store: &PgStore) -> anyhow::Result<()> {
    if store.get_user(ADMIN_UID).await?.is_some() {
        println!("[skip] Admin profile already exists");
        return Ok(());
    }

    store
        .upsert_user(&UserProfile {
            uid: ADMIN_UID.to_string(),
            email: ADMIN_EMAIL.to_string(),
            display_name: Some("Household Administrator".to_string()),
            role: UserRole::Admin,
            allowed_addresses: Vec::new(),
            created_at: Utc::now(),
        })
        .await?;
    println!("[done] Created admin profile");
    Ok(())
}

fn services(names: &[(&str, &str)]) -> Vec<ServiceTemplate> {
    names
        .iter()
        .map(|(name, account)| ServiceTemplate::Detailed {
            name: name.to_string(),
            account_number: account.to_string(),
        })
        .collect()
}

async fn seed_addresses(store: &PgStore) -> anyhow::Result<()> {
    if !store.list_addresses().await?.is_empty() {
        println!("[skip] Addresses already exist");
        return Ok(());
    }

    let addresses = [
        (
            "mazepy-12",
            AddressDoc {
                street: "Mazepy".to_string(),
                house_number: "12".to_string(),
                flat_number: "4".to_string(),
                city: "Lviv".to_string(),
                services: services(&[("gas", "GS-1001"), ("water", "WT-2002"), ("electricity", "EL-3003")]),
            },
        ),
        (
            "levandivska-7",
            AddressDoc {
                street: "Levandivska".to_string(),
                house_number: "7".to_string(),
                flat_number: String::new(),
                city: "Lviv".to_string(),
                services: services(&[("gas", "GS-4004"), ("heating", "HT-5005")]),
            },
        ),
    ];

    for (id, doc) in &addresses {
        store.upsert_address(id, doc).await?;
    }
    println!("[done] Created {} sample addresses", addresses.len());
    Ok(())
}

/// Deterministic seasonal amount: higher in winter, lower in summer.
fn seasonal(base: f64, month: Month) -> f64 {
    let winter = [Month::January, Month::February, Month::December];
    let summer = [Month::June, Month::July, Month::August];
    if winter.contains(&month) {
        base * 1.8
    } else if summer.contains(&month) {
        base * 0.6
    } else {
        base
    }
}

async fn seed_payments(store: &PgStore) -> anyhow::Result<()> {
    let mut written = 0;
    for address in store.list_addresses().await? {
        for year in ["2023", "2024"] {
            if store.list_years(&address.id).await?.iter().any(|y| y.id == year) {
                continue;
            }
            for (i, service) in address.data.services.iter().enumerate() {
                let base = 150.0 + 90.0 * i as f64;
                let amounts: BTreeMap<Month, f64> =
                    MONTHS.iter().map(|m| (*m, seasonal(base, *m))).collect();
                let payload = UtilityDataPayload {
                    service_id: service.name().to_string(),
                    account_number: service.account_number().to_string(),
                    currency: DEFAULT_CURRENCY.to_string(),
                    amounts,
                    address: None,
                };
                utility_service::add_utility_data(store, &address.id, year, &payload).await?;
                written += 1;
            }
        }
    }
    println!("[done] Wrote {written} service payment records");
    Ok(())
}

async fn seed_readings(store: &PgStore) -> anyhow::Result<()> {
    let mut written = 0;
    for address in store.list_addresses().await? {
        for year in store.list_years(&address.id).await? {
            if !store.list_reading_records(&address.id, &year.id).await?.is_empty() {
                continue;
            }
            for (i, service) in address.data.services.iter().enumerate() {
                let mut total = 1000.0 * (i + 1) as f64;
                let mut values = BTreeMap::new();
                for m in MONTHS {
                    total += seasonal(40.0, m);
                    values.insert(m, total);
                }
                let payload = MeterReadingPayload {
                    service_id: service.name().to_string(),
                    meter_number: format!("M-{}", i + 1),
                    values,
                };
                reading_service::add_meter_reading(store, &address.id, &year.id, &payload).await?;
                written += 1;
            }
        }
    }
    println!("[done] Wrote {written} meter reading sheets");
    Ok(())
}
