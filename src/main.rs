use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use evlog::{meta, LogEventConsolePrinter, Logger};
use tokio::io::{AsyncBufReadExt, BufReader};

use proposal_voting::config::Settings;
use proposal_voting::handler::ConsoleHandler;
use proposal_voting::runtime::{get_logger, set_logger};
use proposal_voting::store::{keys, Store, YamlStore};
use proposal_voting::VotingService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let mut logger = Logger::default();
    logger.register(LogEventConsolePrinter::default());
    set_logger(logger);

    let settings = Settings::from_env()?;

    let store = YamlStore::open(&settings.store_path)
        .with_context(|| format!("failed to open store at {}", settings.store_path.display()))?;
    get_logger().info("Opened store.", meta! {
        "Path" => store.path().display(),
    });
    let store: Arc<dyn Store> = Arc::new(store);

    let service = Arc::new(VotingService::new(store.clone(), Utc::now()));

    if let Some(ms) = settings.default_playtime_requirement {
        if !store.contains(keys::PLAYTIME_REQUIREMENT)? {
            service.eligibility().set_requirement(ms)?;
        }
    }

    get_logger().info("Voting service started.", meta! {
        "WeekCheckSecs" => settings.week_check_interval.as_secs(),
        "Bucket" => service.tracker().current_bucket(),
    });

    let ticker = {
        let service = service.clone();
        let period = settings.week_check_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = service.tick(Utc::now()) {
                    get_logger().error("Week rollover failed.", meta! {
                        "Error" => e,
                    });
                }
            }
        })
    };

    let handler = ConsoleHandler::new(service.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("failed to read from stdin")? {
                Some(line) => {
                    if let Some(reply) = handler.handle_line(&line, Utc::now()) {
                        println!("{}", reply);
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ticker.abort();

    let flushed = service.shutdown(Utc::now())?;
    get_logger().info("Voting service stopped.", meta! {
        "FlushedSessions" => flushed,
    });

    Ok(())
}
