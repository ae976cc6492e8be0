//! Database store module for the bank API
//!
//! ## Design Decisions
//!
//! ### Identity aggregate
//! - **Explicit composition**: an identity (`users` row) owns at most one
//!   bank account and one address. [`Profile`] holds the identity with both
//!   sub-records as options, loaded with a single explicit join.
//! - **Two-phase account numbers**: account numbers are derived from the
//!   identity id (`2024000 + id`), so registration inserts the identity
//!   first and then the dependent rows, all inside one transaction.
//! - **Cascading deletes**: `accounts`, `addresses` and `transactions` are
//!   removed by `ON DELETE CASCADE` when their identity goes away. There is
//!   no soft delete.
//!
//! ### Ledger
//! - See [`ledger`]. Balance changes take a row lock on the account for the
//!   duration of the database transaction that validates and applies them.
//!
//! ### Time Source Dependency
//! - Functions that stamp rows accept a `TimeSource` instead of reading the
//!   clock, so tests can control transaction ordering.
//!
//! ### Type Safety
//! - All id types implement `sqlx::Type` and bind directly without
//!   accessing the inner value.

use jiff::Timestamp;
use jiff::civil::Date;
use jiff_sqlx::{Date as SqlxDate, Timestamp as SqlxTs, ToSqlx};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres};

use payloads::{
    AccountId, AccountNumber, AccountType, Gender, TransactionId,
    TransactionType, UserId, requests, responses,
};

use crate::time::TimeSource;

pub mod ledger;

/// A complete user row that stays in the backend.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

/// A bank account. Exactly one per identity once registered.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub account_no: AccountNumber,
    pub account_type: AccountType,
    pub gender: Gender,
    #[sqlx(try_from = "SqlxDate")]
    pub birth_date: Date,
    pub balance: Decimal,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl From<Account> for responses::BankAccount {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id,
            account_no: account.account_no,
            account_type: account.account_type,
            gender: account.gender,
            birth_date: account.birth_date,
            balance: account.balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Address {
    pub user_id: UserId,
    pub street_address: String,
    pub city: String,
    pub postal_code: i32,
    pub country: String,
}

impl From<Address> for responses::Address {
    fn from(address: Address) -> Self {
        Self {
            street_address: address.street_address,
            city: address.city,
            postal_code: address.postal_code,
            country: address.country,
        }
    }
}

/// One immutable ledger entry.
///
/// `balance_after_transaction` is a snapshot of the account balance taken
/// right after this transaction was applied, so it stays correct as the
/// live balance moves on.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub balance_after_transaction: Decimal,
    pub transaction_type: TransactionType,
    #[sqlx(rename = "created_at", try_from = "SqlxTs")]
    pub timestamp: Timestamp,
    pub loan_approved: bool,
    pub loan_repayment: bool,
}

impl From<Transaction> for responses::Transaction {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            account_id: transaction.account_id,
            amount: transaction.amount,
            balance_after_transaction: transaction.balance_after_transaction,
            transaction_type: transaction.transaction_type,
            timestamp: transaction.timestamp,
            loan_approved: transaction.loan_approved,
            loan_repayment: transaction.loan_repayment,
        }
    }
}

/// An identity with its optional bank account and address.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user: User,
    pub account: Option<Account>,
    pub address: Option<Address>,
}

impl From<Profile> for responses::UserProfile {
    fn from(profile: Profile) -> Self {
        Self {
            user_id: profile.user.id,
            username: profile.user.username,
            first_name: profile.user.first_name,
            last_name: profile.user.last_name,
            email: profile.user.email,
            account: profile.account.map(Into::into),
            address: profile.address.map(Into::into),
        }
    }
}

fn check_profile_fields(
    username: &str,
    details: &requests::ProfileDetails,
) -> Result<(), StoreError> {
    if username.len() > requests::USERNAME_MAX_LEN {
        return Err(StoreError::FieldTooLong("username"));
    }
    if let Some(field) = details.blank_field() {
        return Err(StoreError::FieldRequired(field));
    }
    if let Some(field) = details.overlong_field() {
        return Err(StoreError::FieldTooLong(field));
    }
    if !requests::is_valid_email(&details.email) {
        return Err(StoreError::InvalidEmail);
    }
    Ok(())
}

/// Register a new identity with its address and bank account.
///
/// The identity row is inserted first to obtain the id the account number
/// is derived from. Either all three rows are created or none are.
#[tracing::instrument(skip(password_hash, details, pool, time_source))]
pub async fn register_user(
    username: &str,
    password_hash: &str,
    details: &requests::ProfileDetails,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<Profile, StoreError> {
    check_profile_fields(username, details)?;
    let now = time_source.now();
    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            username,
            first_name,
            last_name,
            email,
            password_hash,
            created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(&details.first_name)
    .bind(&details.last_name)
    .bind(&details.email)
    .bind(password_hash)
    .bind(now.to_sqlx())
    .fetch_one(&mut *tx)
    .await
    .map_err(map_username_unique_error)?;

    let address = upsert_address_tx(&user.id, details, &mut tx).await?;
    let account = upsert_account_tx(&user.id, details, now, &mut tx).await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        account_no = %account.account_no,
        "registered user"
    );

    Ok(Profile {
        user,
        account: Some(account),
        address: Some(address),
    })
}

/// Update the identity fields and replace the account and address details.
///
/// Missing account or address rows are created, so this also repairs an
/// identity that was created without them. Balance and account number are
/// never touched.
#[tracing::instrument(skip(update, pool, time_source))]
pub async fn update_profile(
    user_id: &UserId,
    update: &requests::UpdateProfile,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<Profile, StoreError> {
    check_profile_fields(&update.username, &update.profile)?;
    let details = &update.profile;
    let now = time_source.now();
    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            username = $2,
            first_name = $3,
            last_name = $4,
            email = $5,
            updated_at = $6
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&update.username)
    .bind(&details.first_name)
    .bind(&details.last_name)
    .bind(&details.email)
    .bind(now.to_sqlx())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::UserNotFound,
        e => map_username_unique_error(e),
    })?;

    let account = upsert_account_tx(&user.id, details, now, &mut tx).await?;
    let address = upsert_address_tx(&user.id, details, &mut tx).await?;

    tx.commit().await?;

    Ok(Profile {
        user,
        account: Some(account),
        address: Some(address),
    })
}

/// Get-or-create the account for an identity and overwrite its mutable
/// fields.
async fn upsert_account_tx(
    user_id: &UserId,
    details: &requests::ProfileDetails,
    now: Timestamp,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<Account, StoreError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (
            user_id,
            account_no,
            account_type,
            gender,
            birth_date,
            created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (user_id) DO UPDATE SET
            account_type = EXCLUDED.account_type,
            gender = EXCLUDED.gender,
            birth_date = EXCLUDED.birth_date,
            updated_at = EXCLUDED.updated_at
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(AccountNumber::for_user(*user_id))
    .bind(details.account_type)
    .bind(details.gender)
    .bind(details.birth_date.to_sqlx())
    .bind(now.to_sqlx())
    .fetch_one(&mut **tx)
    .await?;
    Ok(account)
}

/// Get-or-create the address for an identity and overwrite its fields.
async fn upsert_address_tx(
    user_id: &UserId,
    details: &requests::ProfileDetails,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<Address, StoreError> {
    let address = sqlx::query_as::<_, Address>(
        r#"
        INSERT INTO addresses (
            user_id,
            street_address,
            city,
            postal_code,
            country
        )
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE SET
            street_address = EXCLUDED.street_address,
            city = EXCLUDED.city,
            postal_code = EXCLUDED.postal_code,
            country = EXCLUDED.country
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&details.street_address)
    .bind(&details.city)
    .bind(details.postal_code)
    .bind(&details.country)
    .fetch_one(&mut **tx)
    .await?;
    Ok(address)
}

pub async fn read_user(
    pool: &PgPool,
    id: &UserId,
) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1;")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::UserNotFound,
            e => StoreError::Database(e),
        })
}

/// Flat result of joining an identity with its account and address.
#[derive(FromRow)]
struct ProfileRow {
    #[sqlx(flatten)]
    user: User,
    account_id: Option<AccountId>,
    account_no: Option<AccountNumber>,
    account_type: Option<AccountType>,
    gender: Option<Gender>,
    birth_date: Option<SqlxDate>,
    balance: Option<Decimal>,
    account_created_at: Option<SqlxTs>,
    account_updated_at: Option<SqlxTs>,
    street_address: Option<String>,
    city: Option<String>,
    postal_code: Option<i32>,
    country: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        let user_id = row.user.id;
        let account = match (
            row.account_id,
            row.account_no,
            row.account_type,
            row.gender,
            row.birth_date,
            row.balance,
            row.account_created_at,
            row.account_updated_at,
        ) {
            (
                Some(id),
                Some(account_no),
                Some(account_type),
                Some(gender),
                Some(birth_date),
                Some(balance),
                Some(created_at),
                Some(updated_at),
            ) => Some(Account {
                id,
                user_id,
                account_no,
                account_type,
                gender,
                birth_date: birth_date.to_jiff(),
                balance,
                created_at: created_at.to_jiff(),
                updated_at: updated_at.to_jiff(),
            }),
            _ => None,
        };
        let address = match (
            row.street_address,
            row.city,
            row.postal_code,
            row.country,
        ) {
            (
                Some(street_address),
                Some(city),
                Some(postal_code),
                Some(country),
            ) => Some(Address {
                user_id,
                street_address,
                city,
                postal_code,
                country,
            }),
            _ => None,
        };
        Profile {
            user: row.user,
            account,
            address,
        }
    }
}

/// Load an identity with its account and address in one query.
pub async fn read_profile(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Profile, StoreError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        r#"
        SELECT
            u.*,
            a.id AS account_id,
            a.account_no,
            a.account_type,
            a.gender,
            a.birth_date,
            a.balance,
            a.created_at AS account_created_at,
            a.updated_at AS account_updated_at,
            ad.street_address,
            ad.city,
            ad.postal_code,
            ad.country
        FROM users u
        LEFT JOIN accounts a ON a.user_id = u.id
        LEFT JOIN addresses ad ON ad.user_id = u.id
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::UserNotFound)?;

    Ok(row.into())
}

/// Delete an identity. Its account, address and transactions are removed
/// by the database's cascading foreign keys.
#[tracing::instrument(skip(pool))]
pub async fn delete_user(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>("DELETE FROM users WHERE id = $1 RETURNING *")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::UserNotFound,
            e => StoreError::Database(e),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Rejected(#[from] payloads::validation::Rejection),
    #[error("Field required: {0}")]
    FieldRequired(&'static str),
    #[error("Field too long: {0}")]
    FieldTooLong(&'static str),
    #[error("Enter a valid email address")]
    InvalidEmail,
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("Unique constraint violation")]
    NotUnique(#[source] sqlx::Error),
    #[error("User not found")]
    UserNotFound,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Recipient account not found")]
    RecipientNotFound,
    #[error("Cannot transfer to your own account")]
    SelfTransfer,
    #[error("{0} transactions must be made through a transfer")]
    UnsupportedTransactionType(TransactionType),
    #[error("Resulting balance exceeds the account limit")]
    BalanceOverflow,
    #[error("Transaction not found")]
    TransactionNotFound,
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

/// Convert a username unique constraint violation into a more specific
/// error. Otherwise returns the original error.
fn map_username_unique_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.is_unique_violation()
        && db_err.constraint() == Some("users_username_key")
    {
        return StoreError::UsernameTaken;
    }
    e.into()
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::NotUnique(e);
        }
        StoreError::Database(e)
    }
}
