use crate::{
    AccountId, AccountNumber, AccountType, Gender, TransactionId,
    TransactionType, UserId,
};
use jiff::Timestamp;
use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_id: AccountId,
    pub account_no: AccountNumber,
    pub account_type: AccountType,
    pub gender: Gender,
    pub birth_date: Date,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street_address: String,
    pub city: String,
    pub postal_code: i32,
    pub country: String,
}

/// An identity together with its bank account and address, either of which
/// may be missing for identities created outside of registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account: Option<BankAccount>,
    pub address: Option<Address>,
}

/// One entry of an account's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
    /// Account balance right after this transaction was applied.
    pub balance_after_transaction: Decimal,
    pub transaction_type: TransactionType,
    pub timestamp: Timestamp,
    pub loan_approved: bool,
    pub loan_repayment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReport {
    pub account_no: AccountNumber,
    pub balance: Decimal,
    /// Newest first.
    pub transactions: Vec<Transaction>,
}
