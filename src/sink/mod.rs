//! Output sinks for new articles.
//!
//! Every run delivers to exactly one sink:
//!
//! - **Console**: plain-text dump on stdout
//! - **File**: the same layout appended to a log file
//! - **Email**: one sanitized HTML message per article over SMTP
//!
//! Delivery failures are per article. [`dispatch_all`] logs them and moves on,
//! and never touches the seen-article history.

mod console;
mod email;
mod file;

use std::future::Future;
use thiserror::Error;

use crate::pipeline::Article;

pub use console::ConsoleSink;
pub use email::{
    format_email_body, load_smtp_secret, smtp_transport, EmailSink, MailTransport, SmtpAuth,
    SmtpMailer, SmtpSettings, SMTP_SECRET_ENV,
};
pub use file::FileSink;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The email could not be assembled.
    #[error("Invalid email message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The mail server or connection rejected the message.
    #[error("Mail transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Destination for new articles.
pub trait Sink {
    fn deliver(&self, article: &Article) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Per-run delivery counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers `articles` in order. A failed article is logged and counted,
/// and the remaining articles are still attempted.
pub async fn dispatch_all<S: Sink>(sink: &S, articles: &[Article]) -> DispatchReport {
    let mut report = DispatchReport::default();

    for article in articles {
        match sink.deliver(article).await {
            Ok(()) => {
                tracing::debug!(title = %article.title, link = %article.link, "Delivered article");
                report.delivered += 1;
            }
            Err(e) => {
                tracing::warn!(
                    title = %article.title,
                    feed = %article.feed_url,
                    error = %e,
                    "Failed to deliver article"
                );
                report.failed += 1;
            }
        }
    }

    report
}

/// Plain-text rendering shared by the console and file sinks.
pub fn format_plain(article: &Article) -> String {
    let mut out = format!(
        "Title: {}\nAuthor: {}\nLink: {}\nEstimated Reading Time: {} min\n",
        article.title, article.author, article.link, article.reading_time
    );

    if !article.content.is_empty() {
        out.push_str("\nContent:\n");
        out.push_str(&article.content);
        out.push('\n');
    }

    out.push_str(&"-".repeat(40));
    out.push('\n');
    out
}

/// The sink selected for a run.
pub enum OutputSink {
    Console(ConsoleSink),
    File(FileSink),
    Email(EmailSink<SmtpMailer>),
}

impl Sink for OutputSink {
    async fn deliver(&self, article: &Article) -> Result<(), DispatchError> {
        match self {
            OutputSink::Console(sink) => sink.deliver(article).await,
            OutputSink::File(sink) => sink.deliver(article).await,
            OutputSink::Email(sink) => sink.deliver(article).await,
        }
    }
}
