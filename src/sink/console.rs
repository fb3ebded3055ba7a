use std::io::Write;

use super::{format_plain, DispatchError, Sink};
use crate::pipeline::Article;
use crate::util::strip_control_chars;

/// Prints articles to stdout.
///
/// Feed text is untrusted, so terminal escape sequences and other control
/// characters are removed before printing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn render(article: &Article) -> String {
        let text = format!("\n{}", format_plain(article));
        strip_control_chars(&text).into_owned()
    }
}

impl Sink for ConsoleSink {
    async fn deliver(&self, article: &Article) -> Result<(), DispatchError> {
        let text = Self::render(article);
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}
