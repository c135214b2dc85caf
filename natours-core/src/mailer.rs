use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::auth::reset::RESET_TOKEN_TTL_MINUTES;
use crate::models::User;

/// A plain-text transactional email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn welcome(user: &User, profile_url: &str) -> Self {
        Email {
            to: user.email.clone(),
            subject: "Welcome to the Natours Family!".to_string(),
            body: format!(
                "Hi {},\n\nWelcome to Natours, we're glad to have you.\n\n\
                 Upload a profile photo and start exploring tours: {}\n\n\
                 The Natours Team",
                user.first_name(),
                profile_url
            ),
        }
    }

    pub fn password_reset(user: &User, reset_url: &str) -> Self {
        Email {
            to: user.email.clone(),
            subject: format!(
                "Your password reset token (valid for only {} minutes)",
                RESET_TOKEN_TTL_MINUTES
            ),
            body: format!(
                "Hi {},\n\nForgot your password? Submit a PATCH request with your new \
                 password and password_confirm to: {}\n\n\
                 If you didn't forget your password, please ignore this email.",
                user.first_name(),
                reset_url
            ),
        }
    }

    pub fn booking_confirmation(user: &User, tour_name: &str, price: Decimal, url: &str) -> Self {
        Email {
            to: user.email.clone(),
            subject: format!("Your booking for {} is confirmed", tour_name),
            body: format!(
                "Hi {},\n\nThanks for booking {}. We received your payment of ${}.\n\n\
                 See all your bookings here: {}\n\nThe Natours Team",
                user.first_name(),
                tour_name,
                price,
                url
            ),
        }
    }
}

/// Outbound email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// Development transport: writes each message to the log instead of
/// delivering it.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        info!(
            "Mock email: from {} to {} subject {:?}",
            self.from, email.to, email.subject
        );
        info!("Mock email body:\n{}", email.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Jonas Schmedtmann".to_string(),
            email: "jonas@example.com".to_string(),
            photo: None,
            role: Role::User,
            password_hash: String::new(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_templates_address_first_name() {
        let email = Email::welcome(&user(), "http://localhost:3000/me");
        assert_eq!(email.to, "jonas@example.com");
        assert!(email.body.starts_with("Hi Jonas,"));
    }

    #[test]
    fn test_reset_email_carries_url_and_validity() {
        let url = "http://localhost:3000/api/v1/users/resetPassword/abc";
        let email = Email::password_reset(&user(), url);
        assert!(email.body.contains(url));
        assert!(email.subject.contains("10 minutes"));
    }

    #[test]
    fn test_booking_confirmation() {
        let email = Email::booking_confirmation(
            &user(),
            "The Forest Hiker",
            Decimal::new(397, 0),
            "http://localhost:3000/my-tours",
        );
        assert!(email.subject.contains("The Forest Hiker"));
        assert!(email.body.contains("$397"));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_messages() {
        let mailer = LogMailer::new("hello@natours.io");
        let email = Email::welcome(&user(), "http://localhost:3000/me");
        assert!(mailer.send(&email).await.is_ok());
    }
}
