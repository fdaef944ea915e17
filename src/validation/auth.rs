use crate::error::{ErrorKind, Result};

/// Validates a username.
///
/// # Arguments
///
/// * `username` - The username to validate.
///
/// # Returns
///
/// `IncorrectLength` unless the username is 3 to 20 bytes long.
pub fn validate_username(username: &str) -> Result<()> {
    if !(3..=20).contains(&username.len()) {
        return Err(ErrorKind::IncorrectLength.into());
    }
    Ok(())
}

/// Validates a password.
///
/// A password needs at least eight characters, a digit, an uppercase and a
/// lowercase ASCII letter, and one character that is not an ASCII letter or
/// digit.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// `InsecurePassword` if any requirement is missing.
pub fn validate_password(password: &str) -> Result<()> {
    let long_enough = password.chars().count() >= 8;
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if long_enough && has_digit && has_upper && has_lower && has_symbol {
        Ok(())
    } else {
        Err(ErrorKind::InsecurePassword.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_bounds_are_inclusive() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(20)).is_ok());
        assert_eq!(validate_username("ab").unwrap_err().kind(), ErrorKind::IncorrectLength);
        assert_eq!(validate_username(&"a".repeat(21)).unwrap_err().kind(), ErrorKind::IncorrectLength);
    }

    #[test]
    fn password_needs_every_class() {
        assert!(validate_password("Passw0rd!").is_ok());
        for weak in ["Pw0!", "password0!", "PASSWORD0!", "Password!!", "Passw0rd12"] {
            assert_eq!(
                validate_password(weak).unwrap_err().kind(),
                ErrorKind::InsecurePassword,
                "{weak}"
            );
        }
    }
}
