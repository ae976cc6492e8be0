//! Transaction amount rules.
//!
//! Every validator is a pure function over the proposed amount and the
//! account balance it would be applied to. Rules are checked in a fixed
//! order (lower bound, upper bound, then balance sufficiency) and the first
//! violated rule is the one reported.
//!
//! All arithmetic uses [`Decimal`]; the loan bounds in particular must not
//! go through floating point.

use rust_decimal::{Decimal, RoundingStrategy, dec};

use crate::TransactionType;

pub const MIN_DEPOSIT: Decimal = dec!(100);
pub const MIN_WITHDRAW: Decimal = dec!(500);
pub const MAX_WITHDRAW: Decimal = dec!(50000);
/// Fractions of the current balance bounding a loan request, inclusive.
pub const MIN_LOAN_RATIO: Decimal = dec!(0.1);
pub const MAX_LOAN_RATIO: Decimal = dec!(0.5);

/// Amount columns are NUMERIC(12, 2).
pub const AMOUNT_DECIMAL_PLACES: u32 = 2;
pub const AMOUNT_MAX_DIGITS: u32 = 12;

/// Why a proposed transaction amount was refused.
///
/// The display text is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Ensure that there are no more than {0} decimal places.")]
    TooManyDecimalPlaces(u32),
    #[error(
        "Ensure that there are no more than {0} digits before the decimal point."
    )]
    TooManyDigits(u32),
    #[error("Amount must be positive")]
    NotPositive,
    #[error("Minimum deposit amount is ${0}")]
    BelowMinimumDeposit(Decimal),
    #[error("Minimum withdraw amount is ${0}")]
    BelowMinimumWithdraw(Decimal),
    #[error("Maximum withdraw amount is ${0}")]
    AboveMaximumWithdraw(Decimal),
    #[error("Insufficient balance. Your balance is ${balance}")]
    InsufficientBalance { balance: Decimal },
    #[error("You have to take minimum ${0:.2} loan")]
    BelowMinimumLoan(Decimal),
    #[error("You can take maximum ${0:.2} loan")]
    AboveMaximumLoan(Decimal),
}

/// Check the amount against the rules for `kind`.
///
/// Receipts are the credit side of a transfer and are never requested on
/// their own, so they only get the shape check.
pub fn validate(
    kind: TransactionType,
    amount: Decimal,
    balance: Decimal,
) -> Result<(), Rejection> {
    validate_shape(amount)?;
    match kind {
        TransactionType::Deposit => validate_deposit(amount),
        TransactionType::Withdraw => validate_withdraw(amount, balance),
        TransactionType::Loan => validate_loan(amount, balance),
        TransactionType::Repayment | TransactionType::Transfer => {
            validate_debit(amount, balance)
        }
        TransactionType::Receive => Ok(()),
    }
}

/// Reject amounts that don't fit the NUMERIC(12, 2) amount columns.
///
/// Trailing zeros don't count, so `100.500` is accepted as `100.5`.
pub fn validate_shape(amount: Decimal) -> Result<(), Rejection> {
    if amount.normalize().scale() > AMOUNT_DECIMAL_PLACES {
        return Err(Rejection::TooManyDecimalPlaces(AMOUNT_DECIMAL_PLACES));
    }
    let whole_digits = AMOUNT_MAX_DIGITS - AMOUNT_DECIMAL_PLACES;
    let limit = Decimal::from(10i64.pow(whole_digits));
    if amount.trunc().abs() >= limit {
        return Err(Rejection::TooManyDigits(whole_digits));
    }
    Ok(())
}

pub fn validate_deposit(amount: Decimal) -> Result<(), Rejection> {
    if amount < MIN_DEPOSIT {
        return Err(Rejection::BelowMinimumDeposit(MIN_DEPOSIT));
    }
    Ok(())
}

pub fn validate_withdraw(
    amount: Decimal,
    balance: Decimal,
) -> Result<(), Rejection> {
    if amount < MIN_WITHDRAW {
        return Err(Rejection::BelowMinimumWithdraw(MIN_WITHDRAW));
    }
    if amount > MAX_WITHDRAW {
        return Err(Rejection::AboveMaximumWithdraw(MAX_WITHDRAW));
    }
    if amount > balance {
        return Err(Rejection::InsufficientBalance { balance });
    }
    Ok(())
}

/// A loan must be between 10% and 50% of the current balance, inclusive.
///
/// The comparison uses the exact bounds; only the message rounds them to
/// cents. A minimum of 33.333 therefore rejects 33.33 while reporting
/// "$33.33".
pub fn validate_loan(
    amount: Decimal,
    balance: Decimal,
) -> Result<(), Rejection> {
    let (min_loan, max_loan) = loan_bounds(balance);
    if amount < min_loan {
        return Err(Rejection::BelowMinimumLoan(to_cents(min_loan)));
    }
    if amount > max_loan {
        return Err(Rejection::AboveMaximumLoan(to_cents(max_loan)));
    }
    Ok(())
}

/// Repayments and outgoing transfers only need a positive amount the
/// balance can cover.
pub fn validate_debit(
    amount: Decimal,
    balance: Decimal,
) -> Result<(), Rejection> {
    if amount <= Decimal::ZERO {
        return Err(Rejection::NotPositive);
    }
    if amount > balance {
        return Err(Rejection::InsufficientBalance { balance });
    }
    Ok(())
}

/// Inclusive (min, max) loan amounts for a balance, unrounded.
pub fn loan_bounds(balance: Decimal) -> (Decimal, Decimal) {
    (balance * MIN_LOAN_RATIO, balance * MAX_LOAN_RATIO)
}

/// Round half-up to cents for display.
fn to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(
        AMOUNT_DECIMAL_PLACES,
        RoundingStrategy::MidpointAwayFromZero,
    )
}
