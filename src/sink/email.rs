use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;

use super::{DispatchError, Sink};
use crate::content::{sanitize_html, SanitizePolicy};
use crate::pipeline::Article;
use crate::util::{escape_html, strip_control_chars};

/// Environment variable that overrides the credentials file.
pub const SMTP_SECRET_ENV: &str = "FEEDCOURIER_SMTP_SECRET";

/// Port that speaks TLS from the first byte. Any other port uses STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

pub type SmtpMailer = AsyncSmtpTransport<Tokio1Executor>;

/// How the secret from the credentials file is presented to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpAuth {
    #[default]
    Password,
    /// The secret is an OAuth2 access token obtained out of band.
    Xoauth2,
}

/// Connection details for the SMTP relay.
pub struct SmtpSettings {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub secret: SecretString,
    pub auth: SmtpAuth,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("auth", &self.auth)
            .finish()
    }
}

/// Reads the SMTP password or access token.
///
/// The environment variable wins over the file. Surrounding whitespace is
/// trimmed, so a trailing newline in the file is harmless.
pub fn load_smtp_secret(credentials_file: Option<&Path>) -> Result<SecretString, DispatchError> {
    if let Ok(value) = std::env::var(SMTP_SECRET_ENV) {
        if !value.trim().is_empty() {
            return Ok(SecretString::from(value.trim().to_string()));
        }
    }

    let Some(path) = credentials_file else {
        return Err(DispatchError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no credentials file and {} is not set", SMTP_SECRET_ENV),
        )));
    };

    let contents = std::fs::read_to_string(path)?;
    Ok(SecretString::from(contents.trim().to_string()))
}

/// Builds a pooled async SMTP transport.
///
/// The connection is only opened when the first message is sent.
pub fn smtp_transport(settings: &SmtpSettings) -> Result<SmtpMailer, DispatchError> {
    let port = settings.port.unwrap_or(IMPLICIT_TLS_PORT);

    let builder = if port == IMPLICIT_TLS_PORT {
        SmtpMailer::relay(&settings.host)
    } else {
        SmtpMailer::starttls_relay(&settings.host)
    }
    .map_err(|e| DispatchError::Transport(Box::new(e)))?;

    let credentials = Credentials::new(
        settings.username.clone(),
        settings.secret.expose_secret().to_string(),
    );

    let builder = builder.port(port).credentials(credentials);
    let builder = match settings.auth {
        SmtpAuth::Password => builder,
        SmtpAuth::Xoauth2 => builder.authentication(vec![Mechanism::Xoauth2]),
    };

    Ok(builder.build())
}

/// Sends a finished message. Implemented for the SMTP transport; tests
/// substitute a recorder.
pub trait MailTransport {
    fn send_message(
        &self,
        message: Message,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

impl MailTransport for SmtpMailer {
    async fn send_message(&self, message: Message) -> Result<(), DispatchError> {
        self.send(message)
            .await
            .map(|_| ())
            .map_err(|e| DispatchError::Transport(Box::new(e)))
    }
}

/// HTML body of an article email. Title and author are escaped; the feed
/// content is cleaned with `policy`.
pub fn format_email_body(article: &Article, policy: &SanitizePolicy) -> String {
    let mut body = format!(
        "<h2>{}</h2><p><b>Author:</b> {}<br><a href='{}'>{}</a><br>\
         <i>Estimated Reading Time: {} min</i></p>",
        escape_html(&article.title),
        escape_html(&article.author),
        escape_html(&article.link),
        escape_html(&article.link),
        article.reading_time,
    );

    if !article.content.is_empty() {
        body.push_str("<div>");
        body.push_str(&sanitize_html(&article.content, policy));
        body.push_str("</div>");
    }

    body
}

/// Mails each article to a fixed recipient. The sender shows the article's
/// author as display name with the configured address.
#[derive(Debug)]
pub struct EmailSink<T> {
    transport: T,
    from: Address,
    to: Mailbox,
    policy: SanitizePolicy,
}

impl<T: MailTransport + Sync> EmailSink<T> {
    pub fn new(
        transport: T,
        from: &str,
        to: &str,
        policy: SanitizePolicy,
    ) -> Result<Self, DispatchError> {
        Ok(Self {
            transport,
            from: from.trim().parse()?,
            to: Mailbox::new(None, to.trim().parse()?),
            policy,
        })
    }

    pub fn build_message(&self, article: &Article) -> Result<Message, DispatchError> {
        let display_name = header_text(&article.author);
        let sender = Mailbox::new(
            (!display_name.is_empty()).then_some(display_name),
            self.from.clone(),
        );

        let message = Message::builder()
            .from(sender)
            .to(self.to.clone())
            .subject(header_text(&article.title))
            .header(ContentType::TEXT_HTML)
            .body(format_email_body(article, &self.policy))?;

        Ok(message)
    }
}

impl<T: MailTransport + Sync> Sink for EmailSink<T> {
    async fn deliver(&self, article: &Article) -> Result<(), DispatchError> {
        let message = self.build_message(article)?;
        self.transport.send_message(message).await
    }
}

/// Single-line header value with control characters removed.
fn header_text(value: &str) -> String {
    strip_control_chars(value)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
