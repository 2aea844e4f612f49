use anyhow::Result;
use buy_alerts::config::{AppConfig, PublisherKind, EXIT_STARTUP_ERROR};
use buy_alerts::publish::{
    ConsolePublisher, SessionPublisher, SessionSettings, WebDriverBrowser, XApiPublisher,
};
use buy_alerts::sources::{CoinGeckoClient, EtherscanSource};
use buy_alerts::{DedupTracker, PipelineError, Publisher, RunnerBuilder};
use colored::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // RUST_LOG wins; otherwise keep webdriver/hyper chatter out of the way
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("buy_alerts=info,fantoccini=warn,hyper=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            let code = e
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(EXIT_STARTUP_ERROR);
            tracing::error!("❌ {:#}", e);
            code
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<()> {
    let config = AppConfig::load()?;
    print_banner(&config);

    let coingecko = Arc::new(CoinGeckoClient::new(&config.coingecko_url));
    let dedup = Arc::new(match config.dedup_capacity {
        Some(capacity) => DedupTracker::bounded(capacity),
        None => DedupTracker::new(),
    });

    let mut session: Option<Arc<SessionPublisher>> = None;
    let publisher: Arc<dyn Publisher> = match config.publisher {
        PublisherKind::Api => {
            let credentials = config
                .x_api
                .clone()
                .ok_or_else(|| PipelineError::Config("missing X API credentials".to_string()))?;
            Arc::new(XApiPublisher::new(&config.x_api_url, credentials))
        }
        PublisherKind::Session => {
            let credentials = config
                .session
                .as_ref()
                .ok_or_else(|| PipelineError::Config("missing X login".to_string()))?;
            let browser = WebDriverBrowser::connect(&config.webdriver_url, true)
                .await
                .map_err(|e| PipelineError::SessionAuthFailed(e.to_string()))?;
            let settings = SessionSettings {
                base_url: config.x_web_url.clone(),
                settle: config.settle,
                ..SessionSettings::default()
            };
            let established =
                Arc::new(SessionPublisher::establish(Box::new(browser), credentials, settings).await?);
            session = Some(established.clone());
            established
        }
        PublisherKind::Console => Arc::new(ConsolePublisher::new()),
    };

    let runner = RunnerBuilder::new()
        .assets(config.assets.clone())
        .chain_source(Arc::new(EtherscanSource::new(
            &config.etherscan_url,
            &config.etherscan_api_key,
        )))
        .price_oracle(coingecko.clone())
        .market_data(coingecko)
        .publisher(publisher)
        .dedup(dedup)
        .min_fiat_value(config.min_fiat_value)
        .sponsor(&config.sponsor_handle, config.sponsor_phrase.as_deref())
        .poll_interval(config.poll_interval)
        .price_ttl(config.price_ttl)
        .build()?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n👋 Shutting down...");
            shutdown.cancel();
        }
    });

    let result = runner.run(cancel).await;

    if let Some(session) = session {
        session.shutdown().await;
    }

    result.map_err(Into::into)
}

fn print_banner(config: &AppConfig) {
    println!("\n{}", "🦀 Buy Alerts".bright_cyan().bold());
    println!("{}", "━".repeat(60).bright_black());
    println!("   Publisher:  {}", config.publisher.as_str().bright_white());
    println!("   Threshold:  {}", format!("${:.2}", config.min_fiat_value).bright_green());
    println!("   Interval:   {}s", config.poll_interval.as_secs());
    for asset in &config.assets {
        println!(
            "   {} {} ({}) → {}",
            "•".bright_yellow(),
            asset.display_name.bold(),
            asset.chain,
            asset.destination.cyan()
        );
    }
    println!("{}\n", "━".repeat(60).bright_black());
}
