//! Form validation
//!
//! Rules for the auth and product forms. Each check appends a `FieldError`;
//! pages show the first message and highlight every failing field.

use serde::Serialize;

pub const MIN_PASSWORD_LEN: usize = 5;
pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_DESCRIPTION_LEN: usize = 5;
pub const MAX_DESCRIPTION_LEN: usize = 400;

pub const MSG_INVALID_EMAIL: &str = "Please enter a valid email.";
pub const MSG_INVALID_PASSWORD: &str =
    "Please enter a password with only numbers and text and at least 5 characters.";
pub const MSG_PASSWORDS_DIFFER: &str = "Passwords have to match!";
pub const MSG_EMAIL_TAKEN: &str = "E-Mail exists already, please pick a different one.";
pub const MSG_INVALID_TITLE: &str = "Title must be at least 3 characters long.";
pub const MSG_INVALID_PRICE: &str = "Price must be a positive amount with at most two decimals.";
pub const MSG_INVALID_DESCRIPTION: &str = "Description must be between 5 and 400 characters long.";
pub const MSG_NOT_AN_IMAGE: &str = "Attached file is not an image.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Accumulated validation failures, in the order they were found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first_message(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }

    /// Names of failing fields, without duplicates
    pub fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for error in &self.errors {
            if !fields.contains(&error.field) {
                fields.push(error.field.clone());
            }
        }
        fields
    }

    /// `Ok(())` when nothing failed
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first_message().unwrap_or("invalid input"))
    }
}

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose structural check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// At least five characters, letters and digits only
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn is_valid_title(title: &str) -> bool {
    title.trim().chars().count() >= MIN_TITLE_LEN
}

pub fn is_valid_description(description: &str) -> bool {
    let len = description.trim().chars().count();
    (MIN_DESCRIPTION_LEN..=MAX_DESCRIPTION_LEN).contains(&len)
}

/// Parse a price such as `"19.99"` or `"5"` into cents.
///
/// Rejects zero, negatives, exponents and more than two fraction digits.
pub fn parse_price(input: &str) -> Option<i64> {
    let input = input.trim();
    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (input, ""),
    };

    if whole.is_empty() || whole.len() > 9 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if input.ends_with('.') {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let fraction_cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    let cents = whole * 100 + fraction_cents;
    (cents > 0).then_some(cents)
}

/// Validate login input
pub fn validate_login(email: &str, password: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if !is_valid_email(email) {
        errors.add("email", MSG_INVALID_EMAIL);
    }
    if !is_valid_password(password) {
        errors.add("password", MSG_INVALID_PASSWORD);
    }
    errors
}

/// Validate signup input, except for email uniqueness which needs the database
pub fn validate_signup(email: &str, password: &str, confirm_password: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if !is_valid_email(email) {
        errors.add("email", MSG_INVALID_EMAIL);
    }
    if !is_valid_password(password) {
        errors.add("password", MSG_INVALID_PASSWORD);
    }
    if password != confirm_password {
        errors.add("confirmPassword", MSG_PASSWORDS_DIFFER);
    }
    errors
}

pub fn validate_new_password(password: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if !is_valid_password(password) {
        errors.add("password", MSG_INVALID_PASSWORD);
    }
    errors
}

/// Validate product fields, returning the price in cents on success
pub fn validate_product(
    title: &str,
    price: &str,
    description: &str,
) -> Result<i64, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if !is_valid_title(title) {
        errors.add("title", MSG_INVALID_TITLE);
    }
    let price_cents = parse_price(price);
    if price_cents.is_none() {
        errors.add("price", MSG_INVALID_PRICE);
    }
    if !is_valid_description(description) {
        errors.add("description", MSG_INVALID_DESCRIPTION);
    }
    match price_cents {
        Some(cents) if errors.is_empty() => Ok(cents),
        _ => Err(errors),
    }
}
