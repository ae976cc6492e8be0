use payloads::{AccountNumber, TransactionType, requests};
use reqwest::StatusCode;
use rust_decimal::dec;

use test_helpers::{assert_bad_request, assert_status_code, spawn_app};

fn amount(amount: rust_decimal::Decimal) -> requests::TransactionAmount {
    requests::TransactionAmount { amount }
}

#[tokio::test]
async fn deposit_minimum() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;

    let result = app.client.deposit(&amount(dec!(99.99))).await;
    assert_bad_request(result, "Minimum deposit amount is $100");

    let transaction = app.client.deposit(&amount(dec!(100))).await?;
    assert_eq!(transaction.transaction_type, TransactionType::Deposit);
    assert_eq!(transaction.amount, dec!(100));
    assert_eq!(transaction.balance_after_transaction, dec!(100));
    assert_eq!(transaction.timestamp, app.time_source.now());
    assert!(!transaction.loan_approved);
    assert!(!transaction.loan_repayment);

    // the rejected deposit left no trace
    let report = app
        .client
        .list_transactions(&requests::ListTransactions::default())
        .await?;
    assert_eq!(report.balance, dec!(100));
    assert_eq!(report.transactions, vec![transaction]);

    Ok(())
}

#[tokio::test]
async fn amount_shape_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;

    let result = app.client.deposit(&amount(dec!(150.555))).await;
    assert_bad_request(
        result,
        "Ensure that there are no more than 2 decimal places.",
    );

    let result = app.client.deposit(&amount(dec!(12345678901))).await;
    assert_bad_request(
        result,
        "Ensure that there are no more than 10 digits before the decimal point.",
    );

    Ok(())
}

#[tokio::test]
async fn withdraw_rules_in_order() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    app.deposit(dec!(1000)).await?;

    let result = app.client.withdraw(&amount(dec!(499))).await;
    assert_bad_request(result, "Minimum withdraw amount is $500");

    let result = app.client.withdraw(&amount(dec!(50001))).await;
    assert_bad_request(result, "Maximum withdraw amount is $50000");

    let result = app.client.withdraw(&amount(dec!(1500))).await;
    assert_bad_request(
        result,
        "Insufficient balance. Your balance is $1000.00",
    );

    let transaction = app.client.withdraw(&amount(dec!(500))).await?;
    assert_eq!(transaction.transaction_type, TransactionType::Withdraw);
    assert_eq!(transaction.balance_after_transaction, dec!(500));

    Ok(())
}

#[tokio::test]
async fn loan_bounds_follow_balance() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    app.deposit(dec!(1000)).await?;

    let result = app.client.request_loan(&amount(dec!(50))).await;
    assert_bad_request(result, "You have to take minimum $100.00 loan");

    let result = app.client.request_loan(&amount(dec!(500.01))).await;
    assert_bad_request(result, "You can take maximum $500.00 loan");

    // upper bound is inclusive
    let loan = app.client.request_loan(&amount(dec!(500))).await?;
    assert_eq!(loan.transaction_type, TransactionType::Loan);
    assert_eq!(loan.balance_after_transaction, dec!(1500));
    assert!(!loan.loan_approved);
    assert!(!loan.loan_repayment);

    // bounds move with the new balance
    let result = app.client.request_loan(&amount(dec!(100))).await;
    assert_bad_request(result, "You have to take minimum $150.00 loan");

    Ok(())
}

#[tokio::test]
async fn repay_loan() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;
    app.deposit(dec!(1000)).await?;
    app.client.request_loan(&amount(dec!(200))).await?;

    let result = app.client.repay_loan(&amount(dec!(0))).await;
    assert_bad_request(result, "Amount must be positive");

    let result = app.client.repay_loan(&amount(dec!(1200.01))).await;
    assert_bad_request(
        result,
        "Insufficient balance. Your balance is $1200.00",
    );

    let repayment = app.client.repay_loan(&amount(dec!(200))).await?;
    assert_eq!(repayment.transaction_type, TransactionType::Repayment);
    assert_eq!(repayment.balance_after_transaction, dec!(1000));
    assert!(repayment.loan_repayment);

    Ok(())
}

#[tokio::test]
async fn transfer_between_accounts() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_bob_user().await?;
    let bob_account = app.account_no().await?;
    app.create_alice_user().await?;
    let alice_account = app.account_no().await?;
    app.deposit(dec!(1000)).await?;
    app.tick();

    let details = requests::Transfer {
        to_account_no: bob_account,
        amount: dec!(250.25),
    };
    let sent = app.client.transfer(&details).await?;
    assert_eq!(sent.transaction_type, TransactionType::Transfer);
    assert_eq!(sent.amount, dec!(250.25));
    assert_eq!(sent.balance_after_transaction, dec!(749.75));

    assert_eq!(app.balance_of(alice_account).await?, dec!(749.75));
    assert_eq!(app.balance_of(bob_account).await?, dec!(250.25));

    app.login_bob().await?;
    let report = app
        .client
        .list_transactions(&requests::ListTransactions::default())
        .await?;
    assert_eq!(report.account_no, bob_account);
    assert_eq!(report.transactions.len(), 1);
    let received = &report.transactions[0];
    assert_eq!(received.transaction_type, TransactionType::Receive);
    assert_eq!(received.amount, dec!(250.25));
    assert_eq!(received.balance_after_transaction, dec!(250.25));
    assert_eq!(received.timestamp, sent.timestamp);

    app.login_alice().await?;
    let report = app
        .client
        .list_transactions(&requests::ListTransactions::default())
        .await?;
    assert_eq!(report.account_no, alice_account);
    assert_eq!(report.balance, dec!(749.75));
    assert_eq!(report.transactions.first(), Some(&sent));

    Ok(())
}

#[tokio::test]
async fn transfer_refusals() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_bob_user().await?;
    let bob_account = app.account_no().await?;
    app.create_alice_user().await?;
    let alice_account = app.account_no().await?;
    app.deposit(dec!(100)).await?;

    let to_self = requests::Transfer {
        to_account_no: alice_account,
        amount: dec!(10),
    };
    let result = app.client.transfer(&to_self).await;
    assert_bad_request(result, "Cannot transfer to your own account");

    let to_nobody = requests::Transfer {
        to_account_no: AccountNumber(1),
        amount: dec!(10),
    };
    let result = app.client.transfer(&to_nobody).await;
    assert_status_code(result, StatusCode::NOT_FOUND);

    let too_much = requests::Transfer {
        to_account_no: bob_account,
        amount: dec!(100.01),
    };
    let result = app.client.transfer(&too_much).await;
    assert_bad_request(
        result,
        "Insufficient balance. Your balance is $100.00",
    );

    let negative = requests::Transfer {
        to_account_no: bob_account,
        amount: dec!(-5),
    };
    let result = app.client.transfer(&negative).await;
    assert_bad_request(result, "Amount must be positive");

    // neither side moved
    assert_eq!(app.balance_of(alice_account).await?, dec!(100));
    assert_eq!(app.balance_of(bob_account).await?, dec!(0));

    Ok(())
}

#[tokio::test]
async fn transactions_newest_first() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;

    for deposit in [dec!(100), dec!(200), dec!(300)] {
        app.deposit(deposit).await?;
        app.tick();
    }
    // same timestamp as each other, ordered by insertion
    app.deposit(dec!(400)).await?;
    app.deposit(dec!(500)).await?;

    let report = app
        .client
        .list_transactions(&requests::ListTransactions::default())
        .await?;
    assert_eq!(report.balance, dec!(1500));
    let amounts: Vec<_> =
        report.transactions.iter().map(|t| t.amount).collect();
    assert_eq!(
        amounts,
        vec![dec!(500), dec!(400), dec!(300), dec!(200), dec!(100)]
    );
    let snapshots: Vec<_> = report
        .transactions
        .iter()
        .map(|t| t.balance_after_transaction)
        .collect();
    assert_eq!(
        snapshots,
        vec![dec!(1500), dec!(1000), dec!(600), dec!(300), dec!(100)]
    );

    let page = app
        .client
        .list_transactions(&requests::ListTransactions {
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        })
        .await?;
    let amounts: Vec<_> = page.transactions.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec!(400), dec!(300)]);

    Ok(())
}

#[tokio::test]
async fn transactions_date_filter() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user().await?;

    app.time_source.set("2025-01-01T10:00:00Z".parse()?);
    app.deposit(dec!(100)).await?;
    app.time_source.set("2025-01-03T23:59:59Z".parse()?);
    app.deposit(dec!(200)).await?;
    app.time_source.set("2025-01-05T00:00:00Z".parse()?);
    app.deposit(dec!(300)).await?;

    let report = app
        .client
        .list_transactions(&requests::ListTransactions {
            start_date: Some(jiff::civil::date(2025, 1, 2)),
            end_date: Some(jiff::civil::date(2025, 1, 3)),
            ..Default::default()
        })
        .await?;
    let amounts: Vec<_> =
        report.transactions.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec!(200)]);
    // the balance is always the current one
    assert_eq!(report.balance, dec!(600));

    let report = app
        .client
        .list_transactions(&requests::ListTransactions {
            start_date: Some(jiff::civil::date(2025, 1, 3)),
            ..Default::default()
        })
        .await?;
    let amounts: Vec<_> =
        report.transactions.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec!(300), dec!(200)]);

    Ok(())
}
