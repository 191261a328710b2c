//! Account input validation.
//!
//! Each validator returns the exact problem on failure; those messages are
//! safe to show the caller.

/// Longest email address accepted (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 30;

pub const MIN_PASSWORD_LEN: usize = 8;
/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate and normalize an email address.
pub fn validate_email(email: &str) -> Result<String, String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err("Email is required".into());
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(format!("Email must be at most {MAX_EMAIL_LEN} characters"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Email address is invalid".into());
    };
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err("Email address is invalid".into());
    }
    Ok(email)
}

/// Validate a username: 3 to 30 characters of letters, digits, `_` or `-`.
pub fn validate_username(username: &str) -> Result<String, String> {
    let username = username.trim();
    if username.is_empty() {
        return Err("Username is required".into());
    }
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(format!(
            "Username must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters"
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("Username may only contain letters, numbers, '_' and '-'".into());
    }
    Ok(username.to_string())
}

/// Validate password strength.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".into());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        ));
    }
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err("Password must contain at least one letter and one number".into());
    }
    Ok(())
}

/// The registration form's hidden `website` field. Humans leave it empty.
pub fn honeypot_tripped(website: Option<&str>) -> bool {
    website.is_some_and(|w| !w.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(validate_email("  A@B.com ").unwrap(), "a@b.com");
    }

    #[test]
    fn bad_emails_are_rejected() {
        let bad_inputs = [
            "", "ab.com", "a@", "@b.com", "a@b", "a@b.", "a@.com", "a b@c.com", "a@b@c.com",
        ];
        for bad in bad_inputs {
            assert!(validate_email(bad).is_err(), "{bad:?} should be rejected");
        }
        let long = format!("{}@b.com", "a".repeat(MAX_EMAIL_LEN));
        assert!(validate_email(&long).is_err());
    }

    #[test]
    fn usernames() {
        assert_eq!(validate_username("alice").unwrap(), "alice");
        assert_eq!(validate_username("Al_ice-9").unwrap(), "Al_ice-9");
        assert!(validate_username("al").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username("alïce").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn strong_password_passes() {
        assert!(validate_password("Passw0rd!").is_ok());
    }

    #[test]
    fn weak_passwords_fail_with_reason() {
        assert_eq!(
            validate_password("short1").unwrap_err(),
            "Password must be at least 8 characters"
        );
        assert!(validate_password("allletters").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("").is_err());
        assert!(validate_password(&format!("a1{}", "x".repeat(80))).is_err());
    }

    #[test]
    fn honeypot() {
        assert!(!honeypot_tripped(None));
        assert!(!honeypot_tripped(Some("")));
        assert!(!honeypot_tripped(Some("  ")));
        assert!(honeypot_tripped(Some("http://spam.example")));
    }
}
