//! # Seed Data Generator
//!
//! Populates a database with a demo chart of accounts, job numbers and a
//! few documents for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./orbit_dev.db
//! cargo run -p orbit-db --bin seed
//!
//! # Specify database path and config file
//! cargo run -p orbit-db --bin seed -- --db ./data/orbit.db --config orbit.toml
//! ```
//!
//! ## Generated Data
//! - Five level-1 accounts with a few levels of children
//! - One job number per category
//! - A quotation converted into an invoice
//! - A purchase requisition approved and converted into a purchase order,
//!   which is then approved and received in full

use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use orbit_core::identifier::JobCategory;
use orbit_core::money::Money;
use orbit_core::totals::{Discount, LineItemInput};
use orbit_core::{
    Account, AccountType, ApprovalDecision, DocumentKind, DocumentStatus, RecordStatus,
};
use orbit_db::{Database, NewAccount, OrbitConfig, Receipt};

const COMPANY_ID: &str = "demo-company";
const USER_ID: &str = "seed";

/// (name, type, children)
const CHART: &[(&str, AccountType, &[&str])] = &[
    ("Assets", AccountType::Asset, &["Current Assets", "Fixed Assets"]),
    ("Liabilities", AccountType::Liability, &["Current Liabilities", "Long-term Loans"]),
    ("Equity", AccountType::Equity, &["Share Capital", "Retained Earnings"]),
    ("Revenue", AccountType::Revenue, &["Sales", "Services"]),
    ("Expenses", AccountType::Expense, &["Salaries", "Rent", "Utilities"]),
];

/// Level-3 accounts under "Current Assets".
const CURRENT_ASSETS: &[&str] = &["Cash", "Bank", "Accounts Receivable"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orbit=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Orbit ERP Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./orbit_dev.db)");
                println!("  -c, --config <PATH>    TOML config file");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = OrbitConfig::load(config_path.as_deref())?;
    if let Some(path) = db_path {
        config.database.path = PathBuf::from(path);
    } else if env::var("ORBIT_DB_PATH").is_err() && config_path.is_none() {
        config.database.path = PathBuf::from("./orbit_dev.db");
    }

    println!("Orbit ERP Seed Data Generator");
    println!("=============================");
    println!("Database: {}", config.database.path.display());
    println!("Currency: {}", config.documents.default_currency);
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.accounts().count(COMPANY_ID).await?;
    if existing > 0 {
        println!("⚠ Company {} already has {} accounts", COMPANY_ID, existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Chart of accounts
    println!();
    println!("Creating chart of accounts...");
    let accounts = db.accounts();
    let mut created = 0;
    let mut expense_account: Option<Account> = None;

    for (name, account_type, children) in CHART {
        let root = accounts
            .create(NewAccount {
                company_id: COMPANY_ID.to_string(),
                name: name.to_string(),
                account_type: *account_type,
                level: 1,
                parent_id: None,
                description: None,
                status: RecordStatus::Active,
            })
            .await?;
        created += 1;

        for child in children.iter() {
            let node = accounts.create(child_of(&root, child)).await?;
            created += 1;

            if *child == "Current Assets" {
                for leaf in CURRENT_ASSETS {
                    accounts.create(child_of(&node, leaf)).await?;
                    created += 1;
                }
            }
            if *child == "Utilities" {
                expense_account = Some(node);
            }
        }
    }
    println!("✓ Created {} accounts", created);

    let forest = accounts.hierarchy(COMPANY_ID).await?;
    for root in &forest {
        println!("  {} {} ({} children)", root.account.code, root.account.name, root.children.len());
    }

    // Job numbers
    println!();
    println!("Generating job numbers...");
    for category in JobCategory::ALL {
        let job = db
            .job_numbers()
            .generate(category, Some("Seeded job"))
            .await?;
        println!("  {}", job.display_number);
    }

    // Sales flow: quotation → invoice
    println!();
    println!("Creating sales documents...");
    let docs = db.documents();
    let quotation = docs
        .create(
            config
                .new_document(DocumentKind::Quotation, COMPANY_ID, USER_ID)?
                .counterparty("demo-contact")
                .discount(Discount::percent(5)?)
                .item(LineItemInput::new("Network audit", 1, 120_000))
                .item(LineItemInput::new("Patch cables", 24, 450)),
        )
        .await?;
    docs.set_status(&quotation.document.id, DocumentStatus::Accepted)
        .await?;
    let invoice = docs
        .convert_quotation_to_invoice(&quotation.document.id, USER_ID)
        .await?;
    println!(
        "  {} → {} (total {}, job {})",
        quotation.document.number,
        invoice.document.number,
        invoice.document.grand_total(),
        invoice.document.job_number.as_deref().unwrap_or("-")
    );

    // Purchase flow: requisition → order
    println!();
    println!("Creating purchase documents...");
    let mut item = LineItemInput::new("Office electricity", 1, 85_000);
    item.unit = Some("month".to_string());
    item.account_id = expense_account.map(|a| a.id);

    let requisition = docs
        .create(
            config
                .new_document(DocumentKind::PurchaseRequisition, COMPANY_ID, USER_ID)?
                .counterparty("demo-vendor")
                .discount(Discount::fixed(Money::from_cents(5_000))?)
                .item(item),
        )
        .await?;
    docs.approve(
        &requisition.document.id,
        USER_ID,
        ApprovalDecision::Approved,
        Some("Seeded approval"),
    )
    .await?;
    let order = docs
        .convert_requisition_to_order(&requisition.document.id, USER_ID)
        .await?;
    docs.approve(&order.document.id, USER_ID, ApprovalDecision::Approved, None)
        .await?;
    let receipts: Vec<Receipt> = order
        .items
        .iter()
        .map(|item| Receipt::new(item.id.as_str(), item.quantity))
        .collect();
    let received = docs.receive(&order.document.id, &receipts).await?;
    println!(
        "  {} → {} (total {}, {})",
        requisition.document.number,
        order.document.number,
        order.document.grand_total(),
        received.document.status
    );

    println!();
    println!("Issued identifiers: {}", db.identifiers().count().await?);
    println!();
    println!("Chart of accounts (JSON):");
    println!("{}", serde_json::to_string_pretty(&forest)?);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

fn child_of(parent: &Account, name: &str) -> NewAccount {
    NewAccount {
        company_id: parent.company_id.clone(),
        name: name.to_string(),
        account_type: parent.account_type,
        level: parent.level + 1,
        parent_id: Some(parent.id.clone()),
        description: None,
        status: RecordStatus::Active,
    }
}
