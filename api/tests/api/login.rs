use payloads::requests;
use reqwest::StatusCode;
use rust_decimal::dec;

use test_helpers::{
    alice_credentials, alice_login_credentials, assert_bad_request,
    assert_status_code, spawn_app,
};

#[tokio::test]
async fn login_refused() -> anyhow::Result<()> {
    let app = spawn_app().await;

    // test a login with an invalid user
    let body = requests::LoginCredentials {
        username: "random".into(),
        password: "random".into(),
    };
    let result = app.client.login(&body).await;

    match result {
        Err(payloads::ClientError::APIError(code, text)) => {
            assert_eq!(code, StatusCode::UNAUTHORIZED);
            assert_eq!(text, "Authentication failed: Invalid credentials");
        }
        _ => {
            panic!("Expected APIError");
        }
    }

    // login check should fail
    let is_logged_in = app.client.login_check().await?;
    assert!(!is_logged_in);

    Ok(())
}

#[tokio::test]
async fn create_account_logs_in() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;

    // check for valid session
    let is_logged_in = app.client.login_check().await?;
    assert!(is_logged_in);

    Ok(())
}

#[tokio::test]
async fn logout_then_login() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;

    app.client.logout().await?;
    assert!(!app.client.login_check().await?);

    app.client.login(&alice_login_credentials()).await?;
    assert!(app.client.login_check().await?);

    Ok(())
}

#[tokio::test]
async fn wrong_password_refused() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    app.client.logout().await?;

    let body = requests::LoginCredentials {
        username: "alice".into(),
        password: "not-her-password".into(),
    };
    let result = app.client.login(&body).await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);
    assert!(!app.client.login_check().await?);

    Ok(())
}

#[tokio::test]
async fn duplicate_username_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;

    let mut body = alice_credentials();
    body.profile.email = "another-alice@example.com".into();
    let result = app.client.create_account(&body).await;
    assert_bad_request(result, "Username is already taken");

    Ok(())
}

#[tokio::test]
async fn invalid_username_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let mut body = alice_credentials();
    body.username = (0..52).map(|_| "X").collect::<String>();
    let result = app.client.create_account(&body).await;
    assert_bad_request(result, "Username must be at most 30 characters");

    body.username = "9lives".into();
    let result = app.client.create_account(&body).await;
    assert_bad_request(result, "Username must start with a letter");

    Ok(())
}

#[tokio::test]
async fn long_profile_fields_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let mut body = alice_credentials();
    body.profile.first_name = "A".repeat(51);
    let result = app.client.create_account(&body).await;
    assert_bad_request(result, "Field too long: first_name");

    let mut body = alice_credentials();
    body.profile.email =
        format!("{}@example.com", (0..300).map(|_| "X").collect::<String>());
    let result = app.client.create_account(&body).await;
    assert_bad_request(result, "Field too long: email");

    // nothing was half-created
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&app.db_pool)
        .await?;
    assert_eq!(users, 0);

    Ok(())
}

#[tokio::test]
async fn blank_fields_and_bad_email_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let mut body = alice_credentials();
    body.profile.first_name = "".into();
    body.profile.street_address = "".into();
    let result = app.client.create_account(&body).await;
    assert_bad_request(result, "Field required: first_name");

    let mut body = alice_credentials();
    body.profile.country = "  ".into();
    let result = app.client.create_account(&body).await;
    assert_bad_request(result, "Field required: country");

    let mut body = alice_credentials();
    body.profile.email = "not an email".into();
    let result = app.client.create_account(&body).await;
    assert_bad_request(result, "Enter a valid email address");
    assert!(!app.client.login_check().await?);

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&app.db_pool)
        .await?;
    assert_eq!(users, 0);

    // the same rules hold when updating a profile
    app.create_alice_user().await?;
    let mut update = requests::UpdateProfile {
        username: "alice".into(),
        profile: alice_credentials().profile,
    };
    update.profile.email = "alice@localhost".into();
    let result = app.client.update_profile(&update).await;
    assert_bad_request(result, "Enter a valid email address");
    update.profile.email = "alice@example.com".into();
    update.profile.city = "".into();
    let result = app.client.update_profile(&update).await;
    assert_bad_request(result, "Field required: city");

    let profile = app.client.user_profile().await?;
    assert_eq!(profile.email, "alice@example.com");
    assert_eq!(profile.address.expect("address").city, "Springfield");

    Ok(())
}

#[tokio::test]
async fn routes_require_login() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app.client.user_profile().await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    let body = requests::TransactionAmount { amount: dec!(100) };
    let result = app.client.deposit(&body).await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    let result = app
        .client
        .list_transactions(&requests::ListTransactions::default())
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    Ok(())
}
