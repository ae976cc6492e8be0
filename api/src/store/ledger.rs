//! Account ledger operations
//!
//! Every balance change goes through the same steps inside one database
//! transaction:
//! 1. Lock the account row (`SELECT ... FOR UPDATE`)
//! 2. Validate the amount against the locked balance
//! 3. Update the balance
//! 4. Insert the transaction row with the post-mutation balance snapshot
//!
//! Holding the row lock from validation to commit serializes concurrent
//! requests against the same account, so two withdrawals can't both pass
//! the balance check against a stale snapshot. Transfers lock both accounts
//! in ascending id order to avoid deadlocks.
//!
//! Validation and application are separate stages: [`apply_transaction_tx`]
//! trusts its caller to have run the matching validator.

use jiff::Timestamp;
use jiff_sqlx::ToSqlx;
use payloads::{
    AccountId, AccountNumber, TransactionId, TransactionType, UserId,
    requests::ListTransactions, responses, validation,
};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{Account, StoreError, Transaction};
use crate::time::TimeSource;

type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// Get the account owned by a user.
pub async fn get_account(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Account, StoreError> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::AccountNotFound)
}

/// Get the account owned by a user and lock it for update.
///
/// Must be called inside a transaction; the lock is held until it commits
/// or rolls back.
pub(crate) async fn get_account_for_update_tx(
    user_id: &UserId,
    tx: &mut PgTransaction<'_>,
) -> Result<Account, StoreError> {
    sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::AccountNotFound)
}

async fn lock_account_by_id_tx(
    account_id: &AccountId,
    tx: &mut PgTransaction<'_>,
) -> Result<Account, StoreError> {
    sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE id = $1 FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::AccountNotFound)
}

/// Apply an already validated amount to a locked account.
///
/// Credits add to the balance and debits subtract from it. The inserted
/// row records the balance after the change and is stamped with `now`.
/// Loans start unapproved; approval happens outside this service.
pub async fn apply_transaction_tx(
    account: &mut Account,
    kind: TransactionType,
    amount: Decimal,
    now: Timestamp,
    tx: &mut PgTransaction<'_>,
) -> Result<Transaction, StoreError> {
    let new_balance = if kind.is_credit() {
        account.balance.checked_add(amount)
    } else {
        account.balance.checked_sub(amount)
    };
    let new_balance = new_balance.ok_or(StoreError::BalanceOverflow)?;
    if validation::validate_shape(new_balance).is_err() {
        return Err(StoreError::BalanceOverflow);
    }

    sqlx::query(
        r#"
        UPDATE accounts
        SET balance = $1, updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(new_balance)
    .bind(now.to_sqlx())
    .bind(account.id)
    .execute(&mut **tx)
    .await?;
    account.balance = new_balance;

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            account_id,
            amount,
            balance_after_transaction,
            transaction_type,
            created_at,
            loan_approved,
            loan_repayment
        )
        VALUES ($1, $2, $3, $4, $5, false, $6)
        RETURNING *
        "#,
    )
    .bind(account.id)
    .bind(amount)
    .bind(new_balance)
    .bind(kind)
    .bind(now.to_sqlx())
    .bind(kind == TransactionType::Repayment)
    .fetch_one(&mut **tx)
    .await?;

    Ok(transaction)
}

/// Validate and apply a single-account transaction for a user.
///
/// Transfers and receipts need a counterparty and go through [`transfer`].
#[tracing::instrument(
    skip(time_source, pool),
    fields(account_no = tracing::field::Empty)
)]
pub async fn execute(
    user_id: &UserId,
    kind: TransactionType,
    amount: Decimal,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<Transaction, StoreError> {
    if kind.needs_counterparty() {
        return Err(StoreError::UnsupportedTransactionType(kind));
    }

    let mut tx = pool.begin().await?;
    let mut account = get_account_for_update_tx(user_id, &mut tx).await?;
    tracing::Span::current()
        .record("account_no", tracing::field::display(&account.account_no));

    if let Err(rejection) = validation::validate(kind, amount, account.balance)
    {
        tracing::debug!(%rejection, "transaction rejected");
        return Err(rejection.into());
    }

    let now = time_source.now();
    let transaction =
        apply_transaction_tx(&mut account, kind, amount, now, &mut tx).await?;

    tx.commit().await?;

    Ok(transaction)
}

/// Move money from the user's account to another account.
///
/// Records a `Transfer` on the sender and a `Receive` on the recipient,
/// both or neither. Returns the sender's row.
#[tracing::instrument(skip(time_source, pool))]
pub async fn transfer(
    user_id: &UserId,
    to_account_no: &AccountNumber,
    amount: Decimal,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<Transaction, StoreError> {
    let mut tx = pool.begin().await?;

    let sender_id: AccountId =
        sqlx::query_scalar("SELECT id FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::AccountNotFound)?;
    let recipient_id: AccountId =
        sqlx::query_scalar("SELECT id FROM accounts WHERE account_no = $1")
            .bind(to_account_no)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::RecipientNotFound)?;

    if sender_id == recipient_id {
        return Err(StoreError::SelfTransfer);
    }

    // Lock in id order so opposing transfers can't deadlock
    let mut ordered = [sender_id, recipient_id];
    ordered.sort();
    let mut locked = Vec::with_capacity(ordered.len());
    for account_id in &ordered {
        locked.push(lock_account_by_id_tx(account_id, &mut tx).await?);
    }
    let (mut sender, mut recipient) = match locked.as_slice() {
        [first, second] if first.id == sender_id => {
            (first.clone(), second.clone())
        }
        [first, second] => (second.clone(), first.clone()),
        _ => return Err(StoreError::AccountNotFound),
    };

    if let Err(rejection) =
        validation::validate(TransactionType::Transfer, amount, sender.balance)
    {
        tracing::debug!(%rejection, "transfer rejected");
        return Err(rejection.into());
    }

    // both sides of the transfer share one timestamp
    let now = time_source.now();
    let sent = apply_transaction_tx(
        &mut sender,
        TransactionType::Transfer,
        amount,
        now,
        &mut tx,
    )
    .await?;
    apply_transaction_tx(
        &mut recipient,
        TransactionType::Receive,
        amount,
        now,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    Ok(sent)
}

pub async fn read_transaction(
    transaction_id: &TransactionId,
    pool: &PgPool,
) -> Result<Transaction, StoreError> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1",
    )
    .bind(transaction_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::TransactionNotFound)
}

/// The user's current balance with their transactions, newest first.
///
/// Date bounds are inclusive and compared against the UTC calendar date of
/// each transaction.
pub async fn list_transactions(
    user_id: &UserId,
    filter: &ListTransactions,
    pool: &PgPool,
) -> Result<responses::TransactionReport, StoreError> {
    let account = get_account(user_id, pool).await?;

    let transactions = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE account_id = $1
          AND ($2::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date >= $2)
          AND ($3::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date <= $3)
        ORDER BY created_at DESC, id DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(account.id)
    .bind(filter.start_date.map(|date| date.to_sqlx()))
    .bind(filter.end_date.map(|date| date.to_sqlx()))
    .bind(filter.effective_limit())
    .bind(filter.effective_offset())
    .fetch_all(pool)
    .await?;

    Ok(responses::TransactionReport {
        account_no: account.account_no,
        balance: account.balance,
        transactions: transactions.into_iter().map(Into::into).collect(),
    })
}
