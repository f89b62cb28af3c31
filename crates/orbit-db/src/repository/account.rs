//! # Account Repository
//!
//! Chart-of-accounts storage and code allocation.
//!
//! ## Creating a Child Account
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(company, parent = "1.2" (level 2), level 3)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────────────── SINGLE TRANSACTION ─────────────────────────┐  │
//! │  │ 1. SELECT code FROM accounts                                      │  │
//! │  │     WHERE company_id = ? AND parent_id IS ?     → 1.2.1, 1.2.4   │  │
//! │  │ 2. allocate_code("1.2", 3, siblings)            → "1.2.5"        │  │
//! │  │ 3. INSERT INTO accounts (...)                                     │  │
//! │  │ 4. UPDATE accounts SET is_parent = 1 WHERE id = parent            │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │       │                                                                 │
//! │       ├── UNIQUE (company_id, code) failed → retry from step 1         │
//! │       ▼                                                                 │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Codes, levels and parents are immutable once written; only name,
//! description, type, status and balance change.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::retry::with_allocation_retry;
use orbit_core::account::{
    allocate_code, build_forest, code_order, validate_level, AccountCode, AccountNode,
};
use orbit_core::validation::validate_name;
use orbit_core::{
    Account, AccountType, CoreError, Money, RecordStatus, ValidationError, MAX_NAME_LENGTH,
};

const ACCOUNT_COLUMNS: &str = r#"
    id, company_id, code, name, level, account_type, parent_id, is_parent,
    status, description, balance_cents, created_at, updated_at
"#;

// =============================================================================
// Inputs
// =============================================================================

/// Input for [`AccountRepository::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub company_id: String,
    pub name: String,
    pub account_type: AccountType,
    pub level: u8,
    /// Required for levels 2-4, absent for level 1.
    pub parent_id: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
}

/// Mutable fields of an account. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub status: Option<RecordStatus>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for chart-of-accounts operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
    max_attempts: u32,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool, max_attempts: u32) -> Self {
        AccountRepository { pool, max_attempts }
    }

    /// Creates an account with the next free code under its parent.
    ///
    /// ## Errors
    /// - `Validation`: bad name, level outside 1..=4, level/parent mismatch,
    ///   parent belonging to another company
    /// - `NotFound`: parent id doesn't exist
    /// - `Conflict`: allocation retry budget exhausted
    pub async fn create(&self, new: NewAccount) -> DbResult<Account> {
        validate_name("company", &new.company_id, MAX_NAME_LENGTH)?;
        validate_name("name", &new.name, MAX_NAME_LENGTH)?;
        validate_level(new.level)?;

        let parent = match &new.parent_id {
            Some(parent_id) => {
                let parent = self
                    .get_by_id(parent_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Parent account", parent_id.as_str()))?;
                if parent.company_id != new.company_id {
                    return Err(ValidationError::invalid_format(
                        "parent account",
                        "belongs to a different company",
                    )
                    .into());
                }
                Some(parent)
            }
            None => None,
        };
        let parent_code = parent
            .as_ref()
            .map(|p| AccountCode::parse(&p.code))
            .transpose()?;

        // Level rules are checked once up front; siblings come later.
        allocate_code(parent_code.as_ref(), new.level, std::iter::empty())?;

        let repo = self;
        let new_ref = &new;
        let parent_code_ref = parent_code.as_ref();
        let account = with_allocation_retry("account code", self.max_attempts, move |_| {
            repo.try_create(new_ref, parent_code_ref)
        })
        .await?;

        info!(
            company_id = %account.company_id,
            code = %account.code,
            level = account.level,
            "Account created"
        );
        Ok(account)
    }

    async fn try_create(
        &self,
        new: &NewAccount,
        parent_code: Option<&AccountCode>,
    ) -> DbResult<Account> {
        let mut tx = begin_write(&self.pool).await?;

        let siblings: Vec<String> = sqlx::query_scalar(
            "SELECT code FROM accounts WHERE company_id = ?1 AND parent_id IS ?2",
        )
        .bind(&new.company_id)
        .bind(&new.parent_id)
        .fetch_all(&mut *tx)
        .await?;

        let code = allocate_code(parent_code, new.level, siblings.iter().map(String::as_str))?;
        let now = Utc::now();

        let account = Account {
            id: Uuid::new_v4().to_string(),
            company_id: new.company_id.clone(),
            code: code.to_string(),
            name: new.name.trim().to_string(),
            level: new.level,
            account_type: new.account_type,
            parent_id: new.parent_id.clone(),
            is_parent: false,
            status: new.status,
            description: new.description.clone(),
            balance_cents: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(code = %account.code, siblings = siblings.len(), "Allocated account code");

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, company_id, code, name, level, account_type, parent_id, is_parent,
                status, description, balance_cents, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13
            )
            "#,
        )
        .bind(&account.id)
        .bind(&account.company_id)
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.level)
        .bind(account.account_type)
        .bind(&account.parent_id)
        .bind(account.is_parent)
        .bind(account.status)
        .bind(&account.description)
        .bind(account.balance_cents)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(parent_id) = &account.parent_id {
            mark_parent(&mut tx, parent_id).await?;
        }

        tx.commit().await?;
        Ok(account)
    }

    /// Gets an account by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Gets an account by its code within a company.
    pub async fn get_by_code(&self, company_id: &str, code: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE company_id = ?1 AND code = ?2",
            ACCOUNT_COLUMNS
        ))
        .bind(company_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Lists a company's accounts, level by level, codes in numeric order.
    pub async fn list(&self, company_id: &str) -> DbResult<Vec<Account>> {
        let mut accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE company_id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        // Text order would put "1.10" before "1.9".
        accounts.sort_by_cached_key(|a| (a.level, code_order(&a.code)));

        debug!(company_id = %company_id, count = accounts.len(), "Listed accounts");
        Ok(accounts)
    }

    /// Direct children of an account, codes in numeric order.
    pub async fn children(&self, id: &str) -> DbResult<Vec<Account>> {
        let mut children = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE parent_id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        children.sort_by_cached_key(|a| code_order(&a.code));

        Ok(children)
    }

    /// The company's chart of accounts as a forest of level-1 roots.
    pub async fn hierarchy(&self, company_id: &str) -> DbResult<Vec<AccountNode>> {
        let accounts = self.list(company_id).await?;
        Ok(build_forest(accounts))
    }

    /// Updates name, type, status and description.
    ///
    /// Read and write share one write transaction, so concurrent updates of
    /// different fields both land.
    pub async fn update(&self, id: &str, update: AccountUpdate) -> DbResult<Account> {
        if let Some(name) = &update.name {
            validate_name("name", name, MAX_NAME_LENGTH)?;
        }

        let mut tx = begin_write(&self.pool).await?;

        let mut account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Account", id))?;

        if let Some(name) = update.name {
            account.name = name.trim().to_string();
        }
        if let Some(account_type) = update.account_type {
            account.account_type = account_type;
        }
        if let Some(status) = update.status {
            account.status = status;
        }
        if let Some(description) = update.description {
            account.description = description;
        }
        account.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE accounts SET
                name = ?2,
                account_type = ?3,
                status = ?4,
                description = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(account.account_type)
        .bind(account.status)
        .bind(&account.description)
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(code = %account.code, "Account updated");
        Ok(account)
    }

    /// Adds `delta` (which may be negative) to the balance.
    pub async fn adjust_balance(&self, id: &str, delta: Money) -> DbResult<Account> {
        let result = sqlx::query(
            "UPDATE accounts SET balance_cents = balance_cents + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(delta.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Account", id))
    }

    /// Deletes a leaf account.
    ///
    /// ## Errors
    /// - `NotFound`: unknown id
    /// - `Conflict`: the account still has children
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        let code: Option<String> = sqlx::query_scalar("SELECT code FROM accounts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let code = code.ok_or_else(|| DbError::not_found("Account", id))?;

        let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE parent_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if children > 0 {
            return Err(CoreError::AccountHasChildren { code, children }.into());
        }

        // A child committed after the count still trips the FK.
        let deleted = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from);

        match deleted {
            Ok(_) => {}
            Err(DbError::ForeignKeyViolation { .. }) => {
                return Err(CoreError::AccountHasChildren { code, children: 1 }.into());
            }
            Err(e) => return Err(e),
        }

        tx.commit().await?;
        info!(id = %id, code = %code, "Account deleted");
        Ok(())
    }

    /// Number of accounts for a company.
    pub async fn count(&self, company_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE company_id = ?1")
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Sets `is_parent` on an account; never cleared again.
async fn mark_parent(conn: &mut SqliteConnection, parent_id: &str) -> DbResult<()> {
    sqlx::query("UPDATE accounts SET is_parent = 1, updated_at = ?2 WHERE id = ?1 AND is_parent = 0")
        .bind(parent_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use orbit_core::ErrorKind;

    const COMPANY: &str = "company-1";

    fn root(name: &str, account_type: AccountType) -> NewAccount {
        NewAccount {
            company_id: COMPANY.to_string(),
            name: name.to_string(),
            account_type,
            level: 1,
            parent_id: None,
            description: None,
            status: RecordStatus::Active,
        }
    }

    fn child(parent: &Account, name: &str) -> NewAccount {
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

    async fn repo() -> AccountRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().accounts()
    }

    #[tokio::test]
    async fn test_root_codes() {
        let repo = repo().await;

        let assets = repo.create(root("Assets", AccountType::Asset)).await.unwrap();
        let liabilities = repo.create(root("Liabilities", AccountType::Liability)).await.unwrap();

        assert_eq!(assets.code, "1");
        assert_eq!(liabilities.code, "2");
        assert_eq!(assets.level, 1);
        assert!(assets.parent_id.is_none());

        // Another company starts its own series.
        let mut other = root("Assets", AccountType::Asset);
        other.company_id = "company-2".to_string();
        assert_eq!(repo.create(other).await.unwrap().code, "1");
    }

    #[tokio::test]
    async fn test_child_codes_and_parent_flag() {
        let repo = repo().await;
        repo.create(root("Assets", AccountType::Asset)).await.unwrap();
        repo.create(root("Liabilities", AccountType::Liability)).await.unwrap();
        let equity = repo.create(root("Equity", AccountType::Equity)).await.unwrap();
        assert_eq!(equity.code, "3");
        assert!(!equity.is_parent);

        let a = repo.create(child(&equity, "Share Capital")).await.unwrap();
        let b = repo.create(child(&equity, "Retained Earnings")).await.unwrap();
        let c = repo.create(child(&equity, "Reserves")).await.unwrap();

        assert_eq!(a.code, "3.1");
        assert_eq!(b.code, "3.2");
        assert_eq!(c.code, "3.3");

        let equity = repo.get_by_id(&equity.id).await.unwrap().unwrap();
        assert!(equity.is_parent);

        let grandchild = repo.create(child(&a, "Ordinary Shares")).await.unwrap();
        assert_eq!(grandchild.code, "3.1.1");
        assert_eq!(grandchild.level, 3);
    }

    #[tokio::test]
    async fn test_level_rules() {
        let repo = repo().await;
        let assets = repo.create(root("Assets", AccountType::Asset)).await.unwrap();

        let mut skip = child(&assets, "Too Deep");
        skip.level = 3;
        assert_eq!(repo.create(skip).await.unwrap_err().kind(), ErrorKind::Validation);

        let mut orphan = root("Orphan", AccountType::Asset);
        orphan.level = 2;
        assert_eq!(repo.create(orphan).await.unwrap_err().kind(), ErrorKind::Validation);

        let mut five = root("Five", AccountType::Asset);
        five.level = 5;
        assert_eq!(repo.create(five).await.unwrap_err().kind(), ErrorKind::Validation);

        let mut missing = child(&assets, "Missing Parent");
        missing.parent_id = Some("nope".to_string());
        assert_eq!(repo.create(missing).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_max_plus_one_not_gap() {
        let repo = repo().await;
        let one = repo.create(root("One", AccountType::Asset)).await.unwrap();
        let two = repo.create(root("Two", AccountType::Asset)).await.unwrap();
        let three = repo.create(root("Three", AccountType::Asset)).await.unwrap();
        repo.create(root("Four", AccountType::Asset)).await.unwrap();
        assert_eq!(one.code, "1");
        assert_eq!(two.code, "2");

        repo.delete(&three.id).await.unwrap();

        let next = repo.create(root("Five", AccountType::Asset)).await.unwrap();
        assert_eq!(next.code, "5");
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let repo = repo().await;
        let assets = repo.create(root("Assets", AccountType::Asset)).await.unwrap();
        let cash = repo.create(child(&assets, "Cash")).await.unwrap();

        let err = repo.delete(&assets.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("Cannot delete account with children"));

        repo.delete(&cash.id).await.unwrap();
        assert!(repo.get_by_id(&cash.id).await.unwrap().is_none());

        // Parent flag stays set after its last child is gone.
        let assets = repo.get_by_id(&assets.id).await.unwrap().unwrap();
        assert!(assets.is_parent);
        repo.delete(&assets.id).await.unwrap();

        assert_eq!(repo.delete("missing").await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_keeps_code() {
        let repo = repo().await;
        let assets = repo.create(root("Assets", AccountType::Asset)).await.unwrap();

        let updated = repo
            .update(
                &assets.id,
                AccountUpdate {
                    name: Some("Total Assets".to_string()),
                    status: Some(RecordStatus::Inactive),
                    description: Some(Some("Everything we own".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Total Assets");
        assert_eq!(updated.code, "1");
        assert_eq!(updated.status, RecordStatus::Inactive);

        let stored = repo.get_by_code(COMPANY, "1").await.unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("Everything we own"));
    }

    #[tokio::test]
    async fn test_adjust_balance() {
        let repo = repo().await;
        let cash = repo.create(root("Cash", AccountType::Asset)).await.unwrap();

        repo.adjust_balance(&cash.id, Money::from_cents(10_000)).await.unwrap();
        let after = repo
            .adjust_balance(&cash.id, Money::from_cents(-2_550))
            .await
            .unwrap();
        assert_eq!(after.balance(), Money::from_cents(7_450));
    }

    #[tokio::test]
    async fn test_hierarchy() {
        let repo = repo().await;
        let assets = repo.create(root("Assets", AccountType::Asset)).await.unwrap();
        repo.create(root("Liabilities", AccountType::Liability)).await.unwrap();
        let current = repo.create(child(&assets, "Current")).await.unwrap();
        repo.create(child(&assets, "Fixed")).await.unwrap();
        repo.create(child(&current, "Bank")).await.unwrap();

        let forest = repo.hierarchy(COMPANY).await.unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].account.code, "1");
        assert_eq!(forest[0].children.len(), 2);
        assert_eq!(forest[0].children[0].children[0].account.code, "1.1.1");

        let kids = repo.children(&assets.id).await.unwrap();
        assert_eq!(kids.len(), 2);
        assert_eq!(repo.count(COMPANY).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_listing_orders_codes_numerically() {
        let repo = repo().await;
        let assets = repo.create(root("Assets", AccountType::Asset)).await.unwrap();
        for n in 1..=10 {
            repo.create(child(&assets, &format!("Sub {}", n))).await.unwrap();
        }

        let kids: Vec<String> = repo
            .children(&assets.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.code)
            .collect();
        assert_eq!(kids[8], "1.9");
        assert_eq!(kids[9], "1.10");

        let all: Vec<String> = repo
            .list(COMPANY)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.code)
            .collect();
        assert_eq!(all.first().map(String::as_str), Some("1"));
        assert_eq!(all.last().map(String::as_str), Some("1.10"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_keep_both_fields() {
        let path = std::env::temp_dir().join(format!("orbit-account-update-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let assets = db
            .accounts()
            .create(root("Assets", AccountType::Asset))
            .await
            .unwrap();

        let (repo_a, id_a) = (db.accounts(), assets.id.clone());
        let rename = tokio::spawn(async move {
            repo_a
                .update(
                    &id_a,
                    AccountUpdate {
                        name: Some("Total Assets".to_string()),
                        ..Default::default()
                    },
                )
                .await
        });
        let (repo_b, id_b) = (db.accounts(), assets.id.clone());
        let describe = tokio::spawn(async move {
            repo_b
                .update(
                    &id_b,
                    AccountUpdate {
                        description: Some(Some("Everything we own".to_string())),
                        ..Default::default()
                    },
                )
                .await
        });
        rename.await.unwrap().unwrap();
        describe.await.unwrap().unwrap();

        let stored = db.accounts().get_by_id(&assets.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Total Assets");
        assert_eq!(stored.description.as_deref(), Some("Everything we own"));

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_siblings_get_distinct_codes() {
        const WRITERS: usize = 8;

        let path = std::env::temp_dir().join(format!("orbit-accounts-{}.db", Uuid::new_v4()));
        let config = DbConfig::new(&path).max_connections(4);
        let db = Database::new(config).await.unwrap();
        let parent = db
            .accounts()
            .create(root("Expenses", AccountType::Expense))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for n in 0..WRITERS {
            let repo = db.accounts();
            let new = child(&parent, &format!("Cost centre {}", n));
            handles.push(tokio::spawn(async move { repo.create(new).await }));
        }

        let mut codes = Vec::new();
        for handle in handles {
            codes.push(handle.await.unwrap().unwrap().code);
        }
        codes.sort();
        codes.dedup();

        let mut expected: Vec<String> = (1..=WRITERS).map(|k| format!("1.{}", k)).collect();
        expected.sort();
        assert_eq!(codes, expected);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
