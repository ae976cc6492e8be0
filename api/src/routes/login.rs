use actix_identity::Identity;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, get, post, web};
use payloads::responses::UserProfile;
use sqlx::PgPool;

use crate::password::{
    AuthError, Credentials, NewUser, register, validate_credentials,
};
use crate::store;
use crate::time::TimeSource;

use super::{APIError, get_user_id};

#[tracing::instrument(
    skip(credentials, pool),
    fields(username=tracing::field::Empty, user_id=tracing::field::Empty)
)]
#[post("/login")]
pub async fn login(
    request: HttpRequest,
    credentials: web::Json<Credentials>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    tracing::Span::current()
        .record("username", tracing::field::display(&credentials.username));
    let user_id = validate_credentials(credentials.0, &pool)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials(_) => APIError::AuthError(e.into()),
            AuthError::UnexpectedError(_) => {
                APIError::UnexpectedError(e.into())
            }
        })?;
    tracing::Span::current()
        .record("user_id", tracing::field::display(&user_id));
    Identity::login(&request.extensions(), user_id.to_string())
        .map_err(|e| APIError::UnexpectedError(e.into()))?;
    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(user), fields(user_id = tracing::field::Empty))]
#[post("/login_check")]
pub async fn login_check(user: Identity) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(user), fields(user_id = tracing::field::Empty))]
#[post("/logout")]
pub async fn logout(user: Identity) -> Result<HttpResponse, APIError> {
    let _ = get_user_id(&user); // to instrument the user_id, if exists
    user.logout();
    Ok(HttpResponse::Ok().finish())
}

/// Register an identity with its bank account and address, then log it in.
#[tracing::instrument(
    skip(request, new_user, pool, time_source),
    fields(username = %new_user.username)
)]
#[post("/create_account")]
pub async fn create_account(
    request: HttpRequest,
    new_user: web::Json<NewUser>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    check_username(&new_user.username)?;

    let profile = register(new_user.into_inner(), &pool, &time_source).await?;
    Identity::login(&request.extensions(), profile.user.id.to_string())
        .map_err(|e| APIError::UnexpectedError(e.into()))?;

    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(
    skip(user, pool),
    fields(user_id = tracing::field::Empty)
)]
#[get("/user_profile")]
pub async fn user_profile(
    user: Identity,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;
    let profile = store::read_profile(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(profile)))
}

#[tracing::instrument(
    skip(user, request, pool, time_source),
    fields(user_id = tracing::field::Empty)
)]
#[post("/update_profile")]
pub async fn update_profile(
    user: Identity,
    request: web::Json<payloads::requests::UpdateProfile>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;

    check_username(&request.username)?;

    let profile =
        store::update_profile(&user_id, &request, &pool, &time_source).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(profile)))
}

/// Delete the logged in user along with everything they own, and end the
/// session.
#[tracing::instrument(
    skip(user, pool),
    fields(user_id = tracing::field::Empty)
)]
#[post("/delete_user")]
pub async fn delete_user(
    user: Identity,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;
    let deleted = store::delete_user(&user_id, &pool).await?;
    tracing::info!(username = %deleted.username, "deleted user");
    user.logout();
    Ok(HttpResponse::Ok().finish())
}

fn check_username(username: &str) -> Result<(), APIError> {
    match payloads::requests::validate_username(username).error_message() {
        Some(message) => Err(APIError::BadRequest(anyhow::anyhow!(message))),
        None => Ok(()),
    }
}
