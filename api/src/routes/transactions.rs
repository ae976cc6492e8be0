use actix_identity::Identity;
use actix_web::{HttpResponse, post, web};
use payloads::TransactionType;
use payloads::requests::{ListTransactions, TransactionAmount, Transfer};
use payloads::responses;
use sqlx::PgPool;

use crate::store::ledger;
use crate::time::TimeSource;

use super::{APIError, get_user_id};

async fn execute(
    user: &Identity,
    kind: TransactionType,
    details: &TransactionAmount,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(user)?;
    let transaction =
        ledger::execute(&user_id, kind, details.amount, time_source, pool)
            .await?;
    Ok(HttpResponse::Ok().json(responses::Transaction::from(transaction)))
}

#[tracing::instrument(
    skip(user, pool, time_source),
    fields(user_id = tracing::field::Empty)
)]
#[post("/deposit")]
pub async fn deposit(
    user: Identity,
    details: web::Json<TransactionAmount>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    execute(&user, TransactionType::Deposit, &details, &pool, &time_source)
        .await
}

#[tracing::instrument(
    skip(user, pool, time_source),
    fields(user_id = tracing::field::Empty)
)]
#[post("/withdraw")]
pub async fn withdraw(
    user: Identity,
    details: web::Json<TransactionAmount>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    execute(&user, TransactionType::Withdraw, &details, &pool, &time_source)
        .await
}

/// Take a loan. The amount is credited right away and the row is recorded
/// as not yet approved.
#[tracing::instrument(
    skip(user, pool, time_source),
    fields(user_id = tracing::field::Empty)
)]
#[post("/loan_request")]
pub async fn loan_request(
    user: Identity,
    details: web::Json<TransactionAmount>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    execute(&user, TransactionType::Loan, &details, &pool, &time_source).await
}

#[tracing::instrument(
    skip(user, pool, time_source),
    fields(user_id = tracing::field::Empty)
)]
#[post("/repay_loan")]
pub async fn repay_loan(
    user: Identity,
    details: web::Json<TransactionAmount>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    execute(&user, TransactionType::Repayment, &details, &pool, &time_source)
        .await
}

#[tracing::instrument(
    skip(user, pool, time_source),
    fields(user_id = tracing::field::Empty)
)]
#[post("/transfer")]
pub async fn transfer(
    user: Identity,
    details: web::Json<Transfer>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;
    let sent = ledger::transfer(
        &user_id,
        &details.to_account_no,
        details.amount,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(responses::Transaction::from(sent)))
}

#[tracing::instrument(
    skip(user, pool),
    fields(user_id = tracing::field::Empty)
)]
#[post("/transactions")]
pub async fn list_transactions(
    user: Identity,
    filter: web::Json<ListTransactions>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;
    let report = ledger::list_transactions(&user_id, &filter, &pool).await?;
    Ok(HttpResponse::Ok().json(report))
}
