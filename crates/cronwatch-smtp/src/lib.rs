// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SMTP email delivery for cronwatch notifications.
//!
//! A thin async client over [`lettre`] used by the notifier to deliver
//! failure alerts and recovery notices. Multipart messages carry both
//! HTML and plain text bodies; passwords are held in [`SecretString`]
//! so they never reach the logs.

use lettre::{
	message::{header::ContentType, Mailbox, MultiPart, SinglePart},
	transport::smtp::authentication::Credentials,
	AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};

use cronwatch_secret::SecretString;

/// Errors that can occur during SMTP operations.
#[derive(Debug, thiserror::Error)]
pub enum SmtpError {
	/// Failed to connect to the SMTP server.
	#[error("connection failed: {0}")]
	Connection(String),

	/// Failed to send an email message.
	#[error("send failed: {0}")]
	Send(String),

	/// Invalid email address format.
	#[error("invalid email address: {0}")]
	Address(String),
}

/// Connection settings for the mailer.
///
/// The `password` field uses [`SecretString`]: Debug and serialization
/// are redacted, and the value is zeroized on drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
	/// SMTP server hostname (e.g. "smtp.gmail.com").
	pub host: String,

	/// SMTP server port. 587 for STARTTLS, 25 for plain.
	pub port: u16,

	/// Optional username for SMTP authentication.
	pub username: Option<String>,

	/// Optional password for SMTP authentication.
	pub password: Option<SecretString>,

	/// Sender address for all notifications.
	pub from_address: String,

	/// Sender display name.
	pub from_name: String,

	/// Whether to use STARTTLS for the connection.
	#[serde(default = "default_use_tls")]
	pub use_tls: bool,
}

fn default_use_tls() -> bool {
	true
}

/// Async SMTP mailer. Built once from config; the connection itself is
/// established lazily on first send.
pub struct Mailer {
	transport: AsyncSmtpTransport<Tokio1Executor>,
	from_mailbox: Mailbox,
}

impl Mailer {
	/// Build a mailer from the given configuration.
	///
	/// Validates the from address and constructs the transport; no
	/// network traffic happens here.
	#[tracing::instrument(
		name = "mailer_new",
		skip(config),
		fields(host = %config.host, port = %config.port, use_tls = %config.use_tls)
	)]
	pub fn new(config: SmtpConfig) -> Result<Self, SmtpError> {
		let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
			.parse()
			.map_err(|e| SmtpError::Address(format!("{e}")))?;

		let builder = if config.use_tls {
			AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
				.map_err(|e| SmtpError::Connection(format!("{e}")))?
		} else {
			AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
		};

		let mut builder = builder.port(config.port);

		if let (Some(username), Some(password)) = (config.username, config.password) {
			let credentials = Credentials::new(username, password.into_inner());
			builder = builder.credentials(credentials);
		}

		Ok(Self {
			transport: builder.build(),
			from_mailbox,
		})
	}

	/// Connect to the server and verify it responds. Used by
	/// `cronwatch notify-test` before sending anything.
	#[tracing::instrument(name = "smtp_check_health", skip(self))]
	pub async fn check_health(&self) -> Result<(), SmtpError> {
		self
			.transport
			.test_connection()
			.await
			.map_err(|e| SmtpError::Connection(format!("{e}")))?;
		tracing::debug!("SMTP server is healthy");
		Ok(())
	}

	/// Send a multipart (HTML + plain text) email to a recipient.
	#[tracing::instrument(
		name = "smtp_send_email",
		skip(self, body_html, body_text),
		fields(to = %to, subject = %subject)
	)]
	pub async fn send_email(
		&self,
		to: &str,
		subject: &str,
		body_html: &str,
		body_text: &str,
	) -> Result<(), SmtpError> {
		let to_mailbox: Mailbox = to.parse().map_err(|e| SmtpError::Address(format!("{e}")))?;

		let message = Message::builder()
			.from(self.from_mailbox.clone())
			.to(to_mailbox)
			.subject(subject)
			.multipart(
				MultiPart::alternative()
					.singlepart(
						SinglePart::builder()
							.header(ContentType::TEXT_PLAIN)
							.body(body_text.to_string()),
					)
					.singlepart(
						SinglePart::builder()
							.header(ContentType::TEXT_HTML)
							.body(body_html.to_string()),
					),
			)
			.map_err(|e| SmtpError::Send(format!("failed to build message: {e}")))?;

		self
			.transport
			.send(message)
			.await
			.map_err(|e| SmtpError::Send(format!("{e}")))?;

		tracing::info!("email sent");
		Ok(())
	}
}

/// Validate an email address format using [`lettre`]'s [`Mailbox`]
/// parser. Checks syntax only, not deliverability.
pub fn is_valid_email(email: &str) -> bool {
	email.parse::<Mailbox>().is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn accepts_common_address_forms() {
		assert!(is_valid_email("ops@example.com"));
		assert!(is_valid_email("Ops Team <ops@example.com>"));
		assert!(is_valid_email("ops+cron@mail.example.com"));
	}

	#[test]
	fn rejects_malformed_addresses() {
		assert!(!is_valid_email(""));
		assert!(!is_valid_email("opsexample.com"));
		assert!(!is_valid_email("ops@"));
		assert!(!is_valid_email("@example.com"));
		assert!(!is_valid_email("ops@@example.com"));
	}

	#[test]
	fn config_debug_does_not_leak_password() {
		let config = SmtpConfig {
			host: "smtp.example.com".to_string(),
			port: 587,
			username: Some("ops".to_string()),
			password: Some(SecretString::new("super-secret-password".to_string())),
			from_address: "cron@example.com".to_string(),
			from_name: "cronwatch".to_string(),
			use_tls: true,
		};

		let debug = format!("{config:?}");
		assert!(!debug.contains("super-secret-password"));
		assert!(debug.contains("[REDACTED]"));
	}

	#[test]
	fn default_use_tls_is_true() {
		assert!(default_use_tls());
	}

	proptest! {
		#[test]
		fn simple_addresses_are_accepted(
			local in "[a-zA-Z][a-zA-Z0-9]{0,30}",
			domain in "[a-zA-Z][a-zA-Z0-9]{0,20}",
			tld in "(com|org|net|io|dev)"
		) {
			let email = format!("{local}@{domain}.{tld}");
			prop_assert!(is_valid_email(&email), "expected valid: {}", email);
		}

		#[test]
		fn no_at_symbol_is_invalid(s in "[a-zA-Z0-9._%+-]{1,50}") {
			prop_assume!(!s.contains('@'));
			prop_assert!(!is_valid_email(&s));
		}

		#[test]
		fn password_never_in_config_debug(password in "[a-zA-Z0-9!#%^*]{8,32}") {
			let config = SmtpConfig {
				host: "smtp.example.com".to_string(),
				port: 587,
				username: Some("ops".to_string()),
				password: Some(SecretString::new(password.clone())),
				from_address: "cron@example.com".to_string(),
				from_name: "cronwatch".to_string(),
				use_tls: true,
			};

			let debug = format!("{config:?}");
			prop_assert!(!debug.contains(&password), "password leaked in debug output");
		}
	}
}
