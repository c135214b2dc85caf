use crate::error::AppError;

/// Checks that a trimmed value has between `min` and `max` characters.
pub fn require_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{} must have between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

pub fn require_present(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must be provided", field)));
    }
    Ok(())
}

/// Loose structural check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

pub fn require_email(email: &str) -> Result<(), AppError> {
    if !is_valid_email(email) {
        return Err(AppError::Validation("Please provide a valid email".to_string()));
    }
    Ok(())
}

/// Password rules shared by signup, reset and password change.
pub fn require_password_pair(password: &str, confirm: &str) -> Result<(), AppError> {
    if password.chars().count() < 8 {
        return Err(AppError::Validation(
            "Password must have at least 8 characters".to_string(),
        ));
    }
    if password != confirm {
        return Err(AppError::Validation("Passwords are not the same".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("jonas@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("jonas"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jonas@example"));
        assert!(!is_valid_email("jonas@@example.com"));
        assert!(!is_valid_email("jo nas@example.com"));
        assert!(!is_valid_email("jonas@example..com"));
    }

    #[test]
    fn test_length_bounds() {
        assert!(require_length("name", "Ann", 3, 40).is_ok());
        assert!(require_length("name", "  Al  ", 3, 40).is_err());
        assert!(require_length("name", &"x".repeat(41), 3, 40).is_err());
    }

    #[test]
    fn test_password_pair() {
        assert!(require_password_pair("pass1234", "pass1234").is_ok());
        assert!(matches!(
            require_password_pair("short", "short"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            require_password_pair("pass1234", "pass12345"),
            Err(AppError::Validation(_))
        ));
    }
}
