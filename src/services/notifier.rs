//! Notification bridge
//!
//! Drives the external messaging client as a child process. The client
//! is invoked as `<program> send <phone> <message...>` (or `status` /
//! `qr`) and reports through line-based stdout tokens plus its exit
//! code. It applies a fixed 5-second startup delay before processing any
//! command, so the per-command timeout must stay above that.
//!
//! Delivery failures are logged and swallowed by the event loop: a lost
//! notification never fails the admin action that triggered it.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;

use crate::config::NotifierConfig;
use crate::models::Reservation;
use crate::services::reservation::ReservationEvent;

/// Stdout tokens emitted by the messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientToken {
    QrCodeGenerated,
    Ready,
    Authenticated,
    Disconnected(String),
    MessageSent,
    MessageSendError(String),
    StatusReady,
    StatusNotReady,
    NoQrYet,
    /// Anything else, e.g. the rendered QR code itself
    Other(String),
}

/// Parse one stdout line into a token.
pub fn parse_token(line: &str) -> ClientToken {
    let line = line.trim();
    match line {
        "QR_CODE_GENERATED" => ClientToken::QrCodeGenerated,
        "WHATSAPP_READY" => ClientToken::Ready,
        "WHATSAPP_AUTHENTICATED" => ClientToken::Authenticated,
        "MESSAGE_SENT_SUCCESS" => ClientToken::MessageSent,
        "STATUS_READY" => ClientToken::StatusReady,
        "STATUS_NOT_READY" => ClientToken::StatusNotReady,
        "NO_QR_YET" => ClientToken::NoQrYet,
        _ => {
            if let Some(reason) = line.strip_prefix("WHATSAPP_DISCONNECTED:") {
                ClientToken::Disconnected(reason.trim().to_string())
            } else if let Some(reason) = line.strip_prefix("MESSAGE_SEND_ERROR:") {
                ClientToken::MessageSendError(reason.trim().to_string())
            } else {
                ClientToken::Other(line.to_string())
            }
        }
    }
}

/// Normalize a phone number the way the messaging client expects:
/// strip `+`, `-` and spaces, and rewrite a leading `0` to the `62`
/// country prefix.
pub fn normalize_phone(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' '))
        .collect();
    if let Some(rest) = cleaned.strip_prefix('0') {
        format!("62{}", rest)
    } else {
        cleaned
    }
}

/// Message body for an approved reservation.
pub fn confirmed_message(reservation: &Reservation) -> String {
    format!(
        "Your reservation has been approved!\n\nName: {}\nDate: {}\nTime: {}\nGuests: {}\n\nWe look forward to seeing you!",
        reservation.name,
        reservation.scheduled_at.format("%d %b %Y"),
        reservation.scheduled_at.format("%H:%M"),
        reservation.guests,
    )
}

/// Message body for a declined reservation.
pub fn declined_message(reservation: &Reservation) -> String {
    format!(
        "We are sorry, your reservation for {} at {} could not be processed. Please pick another time or contact us for details.",
        reservation.scheduled_at.format("%d %b %Y"),
        reservation.scheduled_at.format("%H:%M"),
    )
}

/// Notifier errors
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Messaging client failed to start: {0}")]
    Spawn(std::io::Error),

    #[error("Messaging client timed out after {0:?}")]
    Timeout(Duration),

    #[error("Message delivery failed: {0}")]
    Delivery(String),

    #[error("Messaging client is not ready")]
    NotReady,

    #[error("No QR code available yet")]
    NoQr,
}

/// Bridge to the external messaging client.
pub struct Notifier {
    program: PathBuf,
    timeout: Duration,
    disabled: bool,
}

impl Notifier {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            program: config.program.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            disabled: config.disabled,
        }
    }

    /// Send a message to a phone number.
    pub async fn send(&self, phone: &str, message: &str) -> Result<(), NotifierError> {
        let phone = normalize_phone(phone);
        let tokens = self.run(&["send", &phone, message]).await?;

        for token in &tokens {
            match token {
                ClientToken::MessageSent => return Ok(()),
                ClientToken::MessageSendError(reason) => {
                    return Err(NotifierError::Delivery(reason.clone()))
                }
                _ => {}
            }
        }
        Err(NotifierError::Delivery("no delivery confirmation".to_string()))
    }

    /// Whether the client session is authenticated and ready.
    pub async fn is_ready(&self) -> Result<bool, NotifierError> {
        let tokens = self.run(&["status"]).await?;
        for token in &tokens {
            match token {
                ClientToken::StatusReady => return Ok(true),
                ClientToken::StatusNotReady => return Ok(false),
                _ => {}
            }
        }
        Err(NotifierError::NotReady)
    }

    /// Fetch the pairing QR payload, if one has been generated.
    pub async fn qr(&self) -> Result<String, NotifierError> {
        let tokens = self.run(&["qr"]).await?;
        for token in &tokens {
            match token {
                ClientToken::NoQrYet => return Err(NotifierError::NoQr),
                ClientToken::Other(payload) if !payload.is_empty() => {
                    return Ok(payload.clone())
                }
                _ => {}
            }
        }
        Err(NotifierError::NoQr)
    }

    /// Run one client command and collect its stdout tokens.
    async fn run(&self, args: &[&str]) -> Result<Vec<ClientToken>, NotifierError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(NotifierError::Spawn)?;

        let stdout = child.stdout.take().expect("stdout was requested");

        let collect = async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut tokens = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                tokens.push(parse_token(&line));
            }
            let _ = child.wait().await;
            tokens
        };

        tokio::time::timeout(self.timeout, collect)
            .await
            .map_err(|_| NotifierError::Timeout(self.timeout))
    }
}

/// Subscribe to reservation events and deliver the matching notice.
/// Runs until the service (and with it the sender) is dropped.
pub async fn run_event_loop(
    notifier: Notifier,
    mut events: broadcast::Receiver<ReservationEvent>,
) {
    if notifier.disabled {
        tracing::info!("Notifier disabled; reservation notices will not be sent");
        return;
    }

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Notifier lagged behind reservation events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let (reservation, body) = match &event {
            ReservationEvent::Confirmed(r) => (r, confirmed_message(r)),
            ReservationEvent::Declined(r) => (r, declined_message(r)),
        };

        match notifier.send(&reservation.phone, &body).await {
            Ok(()) => {
                tracing::info!(reservation = %reservation.id, "Reservation notice delivered");
            }
            Err(e) => {
                tracing::warn!(reservation = %reservation.id, error = %e, "Failed to deliver reservation notice");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReservationStatus;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_simple_tokens() {
        assert_eq!(parse_token("WHATSAPP_READY"), ClientToken::Ready);
        assert_eq!(parse_token("WHATSAPP_AUTHENTICATED"), ClientToken::Authenticated);
        assert_eq!(parse_token("QR_CODE_GENERATED"), ClientToken::QrCodeGenerated);
        assert_eq!(parse_token("MESSAGE_SENT_SUCCESS"), ClientToken::MessageSent);
        assert_eq!(parse_token("STATUS_READY"), ClientToken::StatusReady);
        assert_eq!(parse_token("STATUS_NOT_READY"), ClientToken::StatusNotReady);
        assert_eq!(parse_token("NO_QR_YET"), ClientToken::NoQrYet);
    }

    #[test]
    fn test_parse_tokens_with_reasons() {
        assert_eq!(
            parse_token("WHATSAPP_DISCONNECTED: LOGOUT"),
            ClientToken::Disconnected("LOGOUT".to_string())
        );
        assert_eq!(
            parse_token("MESSAGE_SEND_ERROR: number not registered"),
            ClientToken::MessageSendError("number not registered".to_string())
        );
    }

    #[test]
    fn test_parse_unknown_lines_pass_through() {
        assert_eq!(
            parse_token("  some qr payload  "),
            ClientToken::Other("some qr payload".to_string())
        );
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("081234567890"), "6281234567890");
        assert_eq!(normalize_phone("+62 812-3456-7890"), "6281234567890");
        assert_eq!(normalize_phone("6281234567890"), "6281234567890");
    }

    fn reservation() -> Reservation {
        let at = Utc.with_ymd_and_hms(2025, 2, 1, 18, 0, 0).unwrap();
        Reservation {
            id: "r1".to_string(),
            user_id: 1,
            name: "Budi".to_string(),
            phone: "081234567890".to_string(),
            guests: 4,
            scheduled_at: at,
            status: ReservationStatus::Confirmed,
            is_read_by_user: false,
            is_read_by_admin: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_message_templates_carry_booking_details() {
        let r = reservation();
        let confirmed = confirmed_message(&r);
        assert!(confirmed.contains("Budi"));
        assert!(confirmed.contains("01 Feb 2025"));
        assert!(confirmed.contains("18:00"));
        assert!(confirmed.contains('4'));

        let declined = declined_message(&r);
        assert!(declined.contains("01 Feb 2025"));
        assert!(declined.contains("18:00"));
    }

    #[tokio::test]
    async fn test_send_parses_scripted_client_output() {
        // A stand-in client that mimics the real startup banner and
        // success token.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("client.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho WHATSAPP_AUTHENTICATED\necho WHATSAPP_READY\necho MESSAGE_SENT_SUCCESS\nexit 0\n",
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let notifier = Notifier::new(&NotifierConfig {
            program: script,
            timeout_secs: 10,
            disabled: false,
        });
        notifier.send("0812", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_surfaces_delivery_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("client.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'MESSAGE_SEND_ERROR: number not registered'\nexit 1\n",
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let notifier = Notifier::new(&NotifierConfig {
            program: script,
            timeout_secs: 10,
            disabled: false,
        });
        let err = notifier.send("0812", "hello").await.unwrap_err();
        assert!(matches!(err, NotifierError::Delivery(reason) if reason.contains("not registered")));
    }

    #[tokio::test]
    async fn test_status_and_qr() {
        let dir = tempfile::tempdir().unwrap();

        let ready = dir.path().join("ready.sh");
        std::fs::write(&ready, "#!/bin/sh\necho STATUS_READY\nexit 0\n").unwrap();
        let no_qr = dir.path().join("noqr.sh");
        std::fs::write(&no_qr, "#!/bin/sh\necho NO_QR_YET\nexit 1\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for path in [&ready, &no_qr] {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
            }
        }

        let notifier = Notifier::new(&NotifierConfig {
            program: ready,
            timeout_secs: 10,
            disabled: false,
        });
        assert!(notifier.is_ready().await.unwrap());

        let notifier = Notifier::new(&NotifierConfig {
            program: no_qr,
            timeout_secs: 10,
            disabled: false,
        });
        assert!(matches!(notifier.qr().await.unwrap_err(), NotifierError::NoQr));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let notifier = Notifier::new(&NotifierConfig {
            program: PathBuf::from("/nonexistent/wa-client"),
            timeout_secs: 10,
            disabled: false,
        });
        assert!(matches!(
            notifier.send("0812", "hello").await.unwrap_err(),
            NotifierError::Spawn(_)
        ));
    }
}
