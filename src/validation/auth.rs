use crate::error::{AppError, Result};

/// Minimum password length accepted at signup.
pub const MIN_PASSWORD_LEN: usize = 6;
/// Maximum password length accepted at signup.
pub const MAX_PASSWORD_LEN: usize = 128;

/// Validates an email address.
///
/// Deliberately shallow: one `@`, something on both sides, a dot in the
/// domain. Deliverability is not checked.
pub fn validate_email(email: &str) -> Result<()> {
    if email.len() > 254 {
        return Err(AppError::Validation(
            "Email must be at most 254 characters".to_string(),
        ));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }

    Ok(())
}

/// Validates a password.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at most {} characters",
            MAX_PASSWORD_LEN
        )));
    }

    Ok(())
}

/// Validates a display name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Name cannot be empty".to_string()));
    }

    if name.chars().count() > 100 {
        return Err(AppError::Validation(
            "Name must be at most 100 characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.org").is_ok());
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in ["", "plain", "@b.com", "a@", "a@b@c.com", "a@localhost", "a @b.com", "a@.com"] {
            assert!(validate_email(email).is_err(), "{email}");
        }
        assert!(validate_email(&format!("{}@b.com", "a".repeat(260))).is_err());
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password(&"x".repeat(128)).is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn name_must_have_content() {
        assert!(validate_name("   ").is_err());
        assert!(validate_name("Ada").is_ok());
    }
}
