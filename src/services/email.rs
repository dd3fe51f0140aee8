//! Email service
//!
//! Sends OTP verification codes and reservation confirmations over SMTP.
//! An empty SMTP host disables outgoing mail, which keeps development
//! setups working without a relay.

use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;
use crate::models::Reservation;

/// Email service for outgoing mail
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Whether a relay is configured at all.
    pub fn is_configured(&self) -> bool {
        !self.config.smtp_host.is_empty()
    }

    /// Send a verification code for account registration.
    pub async fn send_otp(&self, to_email: &str, code: &str) -> Result<()> {
        let subject = format!("[{}] Email verification code", self.config.from_name);
        let body = format!(
            "Hello!\n\nYour verification code is: {}\n\nThe code is valid for 10 minutes.\n\nIf you did not request this, you can ignore this email.\n\n{}",
            code, self.config.from_name
        );
        self.send(to_email, &subject, &body).await
    }

    /// Send a confirmation notice for an approved reservation.
    pub async fn send_reservation_confirmed(
        &self,
        to_email: &str,
        reservation: &Reservation,
    ) -> Result<()> {
        let subject = format!("[{}] Your reservation is confirmed", self.config.from_name);
        let body = format!(
            "Hello {}!\n\nYour reservation has been confirmed.\n\nDate: {}\nTime: {}\nGuests: {}\n\nWe look forward to seeing you!\n\n{}",
            reservation.name,
            reservation.scheduled_at.format("%d %b %Y"),
            reservation.scheduled_at.format("%H:%M"),
            reservation.guests,
            self.config.from_name
        );
        self.send(to_email, &subject, &body).await
    }

    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()> {
        if !self.is_configured() {
            return Err(anyhow!("SMTP host not configured"));
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);
        let email = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to_email.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// Generate a random 6-digit verification code.
pub fn generate_otp() -> String {
    let mut bytes = [0u8; 4];
    // Fall back to a time-derived value if the OS entropy source fails.
    if getrandom::fill(&mut bytes).is_err() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        bytes = nanos.to_le_bytes();
    }
    let value = u32::from_le_bytes(bytes);
    format!("{:06}", value % 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_is_six_digits() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_unconfigured_service_refuses_to_send() {
        let service = EmailService::new(EmailConfig::default());
        assert!(!service.is_configured());

        let result = tokio_test::block_on(service.send_otp("a@b.c", "123456"));
        assert!(result.is_err());
    }
}
