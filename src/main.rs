use {
    tokio::io::{
        AsyncBufReadExt as _,
        AsyncWriteExt as _,
        BufReader,
        stdin,
        stdout,
    },
    crate::{
        collector::Collector,
        prelude::*,
        startgg::{
            HttpTransport,
            executor::RetryPolicy,
            rate_limit::RateLimiter,
        },
    },
};

mod collector;
mod config;
mod graph;
mod h2h;
mod history;
mod model;
mod prelude;
mod report;
mod scheduler;
mod startgg;

/// Finds recent tournament placements and head-to-head results for the players of a start.gg tournament.
#[derive(clap::Parser)]
#[clap(version)]
struct Args {
    /// Tournament slug, e.g. `tournament/evo-2024`. Asked for on stdin if omitted.
    slug: Option<String>,
    /// Path to the config file. Defaults to `rival-scout.json` in the XDG config directory.
    #[clap(long)]
    config: Option<PathBuf>,
    /// Directory the CSV files are written to.
    #[clap(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)] Collector(#[from] collector::Error),
    #[error(transparent)] Config(#[from] config::Error),
    #[error(transparent)] Io(#[from] io::Error),
    #[error(transparent)] Report(#[from] report::Error),
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error("no tournament slug given")]
    NoSlug,
}

async fn prompt_slug() -> Result<String, Error> {
    let mut stdout = stdout();
    stdout.write_all(b"Enter tournament slug (e.g. tournament/evo-2024): ").await?;
    stdout.flush().await?;
    let mut line = String::default();
    BufReader::new(stdin()).read_line(&mut line).await?;
    let slug = line.trim();
    if slug.is_empty() {
        return Err(Error::NoSlug)
    }
    Ok(slug.to_owned())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let Args { slug, config, output_dir } = <Args as clap::Parser>::parse();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    let config = Config::load(config.as_deref()).await?;
    let slug = match slug {
        Some(slug) => slug,
        None => prompt_slug().await?,
    };
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("rival-scout/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .use_rustls_tls()
        .build()?;
    let transport = HttpTransport::new(http_client, config.api.endpoint.clone(), config.startgg.clone(), config.api.timeout());
    let executor = Arc::new(RequestExecutor::new(Box::new(transport), RateLimiter::new(config.api.rate_interval()), RetryPolicy::from(&config.api)));
    let started = Utc::now();
    let report = Collector::new(executor, config.collection.clone()).run(&slug).await?;
    report::write(&report, &output_dir, &slug, Utc::now())?;
    log::info!(
        "done in {}s: {} target players in {}, {} shared tournaments, {} head-to-head sets, {} API requests",
        (Utc::now() - started).num_seconds(),
        report.targets.len(),
        report.game,
        report.shared.len(),
        report.head_to_head.len(),
        report.request_count,
    );
    let (with_history, without_history) = report.history_counts();
    log::info!("{with_history} players with history, {without_history} players without history");
    Ok(())
}
