use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use feedcourier::config::{path_or_default, Config, OutputKind, Overrides};
use feedcourier::content::HttpPageFetcher;
use feedcourier::feed::{load_feed_list, FetchPolicy, HttpFeedSource};
use feedcourier::pipeline;
use feedcourier::sink::{
    dispatch_all, load_smtp_secret, smtp_transport, ConsoleSink, EmailSink, FileSink, OutputSink,
    SmtpSettings,
};
use feedcourier::storage::SeenArticleStore;

/// Get the config directory path (~/.config/feedcourier/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedcourier"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedcourier",
    version,
    about = "Deliver new RSS/Atom articles to the console, a file, or email"
)]
struct Args {
    /// File listing one feed URL per line
    #[arg(long, value_name = "FILE")]
    feeds: PathBuf,

    /// Where new articles are delivered
    #[arg(long, value_enum, default_value_t = OutputKind::Console)]
    output: OutputKind,

    /// Output file for `--output file`
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Recipient address for `--output email`
    #[arg(long, value_name = "ADDRESS")]
    to_email: Option<String>,

    /// Sender address for `--output email`
    #[arg(long, value_name = "ADDRESS")]
    from_email: Option<String>,

    /// File holding the SMTP password or OAuth2 access token
    #[arg(long, value_name = "PATH")]
    credentials: Option<PathBuf>,

    /// Entries examined per feed per run
    #[arg(long, value_name = "N")]
    max_articles: Option<usize>,

    /// Article identifiers remembered per feed
    #[arg(long, value_name = "N")]
    history_size: Option<usize>,

    /// Seen-article history file
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Config file (default: ~/.config/feedcourier/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn build_sink(config: &Config, output: OutputKind, file: Option<PathBuf>) -> Result<OutputSink> {
    match output {
        OutputKind::Console => Ok(OutputSink::Console(ConsoleSink)),
        OutputKind::File => {
            let path = file.context("--file is required for file output")?;
            Ok(OutputSink::File(FileSink::new(path)))
        }
        OutputKind::Email => {
            let email = &config.email;
            let secret = load_smtp_secret(email.credentials_file.as_deref())
                .context("Failed to read SMTP credentials")?;

            let settings = SmtpSettings {
                host: email.smtp_host.clone().unwrap_or_default(),
                port: email.smtp_port,
                username: email.username().unwrap_or_default().to_string(),
                secret,
                auth: email.auth,
            };
            tracing::debug!(settings = ?settings, "Configuring SMTP transport");
            let transport =
                smtp_transport(&settings).context("Failed to configure SMTP transport")?;

            let sink = EmailSink::new(
                transport,
                email.from.as_deref().unwrap_or_default(),
                email.to.as_deref().unwrap_or_default(),
                email.sanitize.clone(),
            )
            .context("Invalid email address")?;
            Ok(OutputSink::Email(sink))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the console output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("feedcourier=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = path_or_default(args.config.clone(), "config.toml", get_config_dir)?;
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    config.apply_overrides(Overrides {
        to_email: args.to_email,
        from_email: args.from_email,
        credentials: args.credentials,
        max_articles: args.max_articles,
        history_size: args.history_size,
        state_file: args.state_file,
    });
    config.validate(args.output, args.file.as_deref())?;

    let sink = build_sink(&config, args.output, args.file)?;

    let feeds = load_feed_list(&args.feeds)?;
    if feeds.is_empty() {
        tracing::warn!(path = %args.feeds.display(), "Feed list contains no usable URLs");
    }

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to create HTTP client")?;

    let source = HttpFeedSource::new(
        client.clone(),
        FetchPolicy {
            timeout: config.feed_timeout(),
            ..FetchPolicy::default()
        },
    );
    let pages = HttpPageFetcher::new(client, config.page_timeout());
    let store = SeenArticleStore::new(config.state_file(get_config_dir)?);

    let outcome = pipeline::run(&store, &feeds, &source, &pages, &config.pipeline_options())
        .await
        .with_context(|| format!("Failed to save seen articles to {}", store.path().display()))?;

    let report = dispatch_all(&sink, &outcome.articles).await;
    tracing::info!(
        output = ?args.output,
        delivered = report.delivered,
        failed = report.failed,
        "Dispatch complete"
    );

    Ok(())
}
