//! feedcourier polls RSS/Atom feeds and delivers every article it has not
//! delivered before, exactly once, to the console, a file or email.
//!
//! The crate is organised around one run:
//!
//! 1. [`feed`] reads the feed list and fetches entries
//! 2. [`pipeline`] selects new entries against the history kept by
//!    [`storage`] and builds [`pipeline::Article`]s with reading times from
//!    [`content`]
//! 3. [`sink`] delivers the articles
//!
//! [`config`] holds the settings shared by all of them.

pub mod config;
pub mod content;
pub mod feed;
pub mod pipeline;
pub mod sink;
pub mod storage;
pub mod util;
