//! SMTP delivery via lettre.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;

use super::{MailError, Mailer, OutgoingMail};
use crate::config::SmtpSettings;

/// Async SMTP mailer. The connection is made lazily on first send.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_mailbox: Mailbox,
}

impl SmtpMailer {
    #[tracing::instrument(
        name = "smtp_mailer_new",
        skip(settings),
        fields(host = %settings.host, port = %settings.port, use_tls = %settings.use_tls)
    )]
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let from_mailbox: Mailbox = settings
            .from
            .parse()
            .map_err(|e| MailError::Address(format!("{e}")))?;

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| MailError::Config(format!("{e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        let mut builder = builder.port(settings.port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from_mailbox,
        })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    #[tracing::instrument(name = "smtp_send", skip(self, mail), fields(to = %mail.to, subject = %mail.subject))]
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| MailError::Address(format!("{e}")))?;

        let message = Message::builder()
            .from(self.from_mailbox.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html)
            .map_err(|e| MailError::Send(format!("failed to build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Send(format!("{e}")))?;

        tracing::info!("email sent");
        Ok(())
    }
}
