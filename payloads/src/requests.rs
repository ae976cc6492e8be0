use crate::{AccountNumber, AccountType, Gender};
use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 100;
pub const ADDRESS_FIELD_MAX_LEN: usize = 100;

pub const DEFAULT_TRANSACTIONS_LIMIT: i64 = 50;
pub const MAX_TRANSACTIONS_LIMIT: i64 = 500;

/// Validation result for usernames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameValidation {
    Valid,
    TooShort,
    TooLong,
    InvalidCharacters,
    MustStartWithLetter,
}

impl UsernameValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::TooShort => Some("Username must be at least 3 characters"),
            Self::TooLong => Some("Username must be at most 30 characters"),
            Self::InvalidCharacters => Some(
                "Username can only contain letters, numbers, and underscores",
            ),
            Self::MustStartWithLetter => {
                Some("Username must start with a letter")
            }
        }
    }
}

/// Validate a username.
///
/// Rules:
/// - 3-30 characters
/// - ASCII letters, numbers, and underscores only
/// - Must start with a letter
pub fn validate_username(username: &str) -> UsernameValidation {
    if username.len() < USERNAME_MIN_LEN {
        return UsernameValidation::TooShort;
    }
    if username.len() > USERNAME_MAX_LEN {
        return UsernameValidation::TooLong;
    }

    let mut chars = username.chars();

    if let Some(first) = chars.next()
        && !first.is_ascii_alphabetic()
    {
        return UsernameValidation::MustStartWithLetter;
    }

    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return UsernameValidation::InvalidCharacters;
        }
    }

    UsernameValidation::Valid
}

#[derive(Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// The bank-specific part of a profile, set at registration and replaced
/// wholesale on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_type: AccountType,
    pub gender: Gender,
    pub birth_date: Date,
    pub street_address: String,
    pub city: String,
    pub postal_code: i32,
    pub country: String,
}

impl ProfileDetails {
    /// Return the name of the first field that exceeds its length limit.
    pub fn overlong_field(&self) -> Option<&'static str> {
        let limits = [
            ("first_name", &self.first_name, NAME_MAX_LEN),
            ("last_name", &self.last_name, NAME_MAX_LEN),
            ("email", &self.email, EMAIL_MAX_LEN),
            ("street_address", &self.street_address, ADDRESS_FIELD_MAX_LEN),
            ("city", &self.city, ADDRESS_FIELD_MAX_LEN),
            ("country", &self.country, ADDRESS_FIELD_MAX_LEN),
        ];
        limits
            .into_iter()
            .find(|(_, value, max)| value.chars().count() > *max)
            .map(|(name, _, _)| name)
    }

    /// Return the name of the first required text field that is empty or
    /// only whitespace.
    pub fn blank_field(&self) -> Option<&'static str> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("street_address", &self.street_address),
            ("city", &self.city),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Shape check for an email address: a non-empty local part, one `@`, and
/// a dotted domain with no empty labels. No whitespace anywhere.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[derive(Serialize, Deserialize)]
pub struct CreateAccount {
    pub username: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub username: String,
    #[serde(flatten)]
    pub profile: ProfileDetails,
}

/// Body for deposit, withdraw, loan request and loan repayment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransactionAmount {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transfer {
    pub to_account_no: AccountNumber,
    pub amount: Decimal,
}

/// Filter for the transaction report. Dates are inclusive and in UTC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTransactions {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListTransactions {
    /// Limit clamped to `1..=MAX_TRANSACTIONS_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_TRANSACTIONS_LIMIT)
            .clamp(1, MAX_TRANSACTIONS_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
