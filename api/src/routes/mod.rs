pub mod login;
pub mod transactions;

use actix_identity::Identity;
use actix_web::{
    HttpResponse, Responder, ResponseError, body::BoxBody,
    dev::HttpServiceFactory, get, web,
};

use crate::store::StoreError;

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(login::login)
        .service(login::login_check)
        .service(login::logout)
        .service(login::create_account)
        .service(login::user_profile)
        .service(login::update_profile)
        .service(login::delete_user)
        .service(transactions::deposit)
        .service(transactions::withdraw)
        .service(transactions::loan_request)
        .service(transactions::repay_loan)
        .service(transactions::transfer)
        .service(transactions::list_transactions)
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Authentication failed")]
    AuthError(#[source] anyhow::Error),
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Not found")]
    NotFound(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::AuthError(e) => {
                HttpResponse::Unauthorized().body(format!("{self}: {e}"))
            }
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::NotFound(e) => {
                HttpResponse::NotFound().body(format!("{self}: {e}"))
            }
            Self::UnexpectedError(e) => {
                tracing::error!("{e:#}");
                HttpResponse::InternalServerError().body(self.to_string())
            }
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(_) | StoreError::UnexpectedError(_) => {
                APIError::UnexpectedError(e.into())
            }
            StoreError::UserNotFound
            | StoreError::AccountNotFound
            | StoreError::RecipientNotFound
            | StoreError::TransactionNotFound => APIError::NotFound(e.into()),
            StoreError::Rejected(_)
            | StoreError::FieldRequired(_)
            | StoreError::FieldTooLong(_)
            | StoreError::InvalidEmail
            | StoreError::UsernameTaken
            | StoreError::NotUnique(_)
            | StoreError::SelfTransfer
            | StoreError::UnsupportedTransactionType(_)
            | StoreError::BalanceOverflow => APIError::BadRequest(e.into()),
        }
    }
}

fn get_user_id(user: &Identity) -> Result<payloads::UserId, APIError> {
    let id_str = user.id().map_err(|e| {
        APIError::AuthError(
            anyhow::Error::from(e).context("Invalid login session"),
        )
    })?;
    // special case: since this is used in so many routes, the user_id is
    // recorded here, but attaches to the span for the api route itself
    tracing::Span::current()
        .record("user_id", tracing::field::display(&id_str));
    let id = id_str.parse::<i64>().map_err(|e| {
        APIError::AuthError(
            anyhow::Error::from(e).context("Malformed login session"),
        )
    })?;
    Ok(payloads::UserId(id))
}
