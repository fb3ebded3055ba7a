//! Small helpers shared by the feed, content and sink modules.
//!
//! - **URL helpers**: feed URL validation and the feed-domain author fallback
//! - **Text helpers**: terminal-safe output and HTML escaping
//!
//! # Examples
//!
//! ```
//! use feedcourier::util::{escape_html, feed_domain, validate_feed_url};
//!
//! assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
//! assert_eq!(feed_domain("https://blog.example.com/rss"), "blog.example.com");
//! assert_eq!(escape_html("<b>"), "&lt;b&gt;");
//! ```

mod text;
mod url_validator;

pub use text::{escape_html, strip_control_chars};
pub use url_validator::{feed_domain, validate_feed_url, UrlValidationError};
