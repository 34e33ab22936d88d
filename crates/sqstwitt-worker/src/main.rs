use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sqstwitt_worker::{HandlerSettings, MessageHandler, PollLoop, PollSettings, SqsQueue};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sqstwitt-worker")]
#[command(about = "Classify queued tweets and store them with their sentiment")]
struct Cli {
    /// Handle a single batch and exit instead of polling forever.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = sqstwitt_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let classifier_url = config
        .classifier_url
        .as_deref()
        .context("SQSTWITT_CLASSIFIER_URL must be set for the worker")?;
    let classifier_token = config
        .classifier_token
        .as_deref()
        .context("SQSTWITT_CLASSIFIER_TOKEN must be set for the worker")?;
    let classifier = sqstwitt_sentiment::ClassifierClient::new(
        classifier_url,
        classifier_token,
        config.call_timeout_secs,
    )?;

    let pool_config = sqstwitt_db::PoolConfig::from_app_config(&config);
    let pool = sqstwitt_db::connect_pool(&config.database_url, pool_config)
        .await
        .context("failed to connect to the document store")?;
    sqstwitt_db::run_migrations(&pool).await?;
    let repository = sqstwitt_db::PgTweetRepository::new(pool);

    let queue = Arc::new(
        SqsQueue::connect(&config)
            .await
            .context("failed to resolve the work queue")?,
    );

    tracing::info!(
        env = %config.env,
        queue = %config.queue_name,
        ack_enabled = config.ack_enabled,
        "worker starting"
    );

    let handler = MessageHandler::new(
        Arc::clone(&queue),
        Arc::new(classifier),
        Arc::new(repository),
        HandlerSettings::from_app_config(&config),
    );
    let poller = PollLoop::new(queue, handler, PollSettings::from_app_config(&config));

    if cli.once {
        poller.run_once().await;
    } else {
        poller.run(shutdown_signal()).await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, finishing in-flight messages");
}
