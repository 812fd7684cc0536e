/// Minimum password length accepted by the login form
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Check login form input before any request is made.
pub fn validate_login_input(email: &str, password: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required!".to_string());
    }
    if !is_valid_email(email) {
        return Err("Invalid email format!".to_string());
    }
    if password.is_empty() {
        return Err("Password is required!".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters!",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

/// Loose `local@domain.tld` shape check, no whitespace.
pub fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("emily.johnson@x.dummyjson.com"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("emily"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn test_validate_login_input() {
        assert!(validate_login_input("a@b.com", "secret").is_ok());
        assert_eq!(
            validate_login_input("  ", "secret"),
            Err("Email is required!".to_string())
        );
        assert_eq!(
            validate_login_input("nope", "secret"),
            Err("Invalid email format!".to_string())
        );
        assert_eq!(
            validate_login_input("a@b.com", ""),
            Err("Password is required!".to_string())
        );
        assert_eq!(
            validate_login_input("a@b.com", "12345"),
            Err("Password must be at least 6 characters!".to_string())
        );
    }
}
