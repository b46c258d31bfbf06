//! Trivia live monitor
//!
//! Connects to the dashboard broadcaster, keeps the reconciled question list
//! and activity feed in memory, and logs every change.
//!
//! # Usage
//!
//! ```bash
//! trivia-live-monitor
//! trivia-live-monitor --url ws://localhost:3001/ws
//! trivia-live-monitor --production --origin https://admin.example.com
//! ```

use std::cell::Cell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;

use trivia_live_sync::monitor::{event_line, outcome_label, snapshot};
use trivia_live_sync::{
    ClientEvent, ConnectionState, Environment, LiveSession, SyncConfig, SyncError,
};

/// Trivia dashboard live-sync monitor
#[derive(Parser, Debug)]
#[command(name = "trivia-live-monitor")]
#[command(about = "Follow the trivia admin dashboard's live feed")]
struct Args {
    /// Socket URL (overrides environment-based resolution)
    #[arg(short, long, env = "TRIVIA_LIVE_URL")]
    url: Option<String>,

    /// Config file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page origin used to derive the socket URL in production
    #[arg(long)]
    origin: Option<String>,

    /// Resolve the URL for a production deployment
    #[arg(long)]
    production: bool,

    /// Maximum automatic reconnect attempts
    #[arg(long)]
    attempts: Option<u32>,

    /// Base reconnect delay in milliseconds
    #[arg(long)]
    interval: Option<u64>,

    /// Activity feed capacity
    #[arg(long)]
    max_entries: Option<usize>,

    /// Feed lines printed after each change
    #[arg(long, default_value = "5")]
    show: usize,
}

impl Args {
    fn into_config(self) -> Result<SyncConfig, SyncError> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::load_from(path)?,
            None => SyncConfig::load()?,
        };
        if let Some(url) = self.url {
            config = config.with_url(url);
        }
        if let Some(origin) = self.origin {
            config.page_origin = Some(origin);
        }
        if self.production {
            config.environment = Environment::Production;
        }
        if let Some(attempts) = self.attempts {
            config.reconnect_attempts = attempts;
        }
        if let Some(interval) = self.interval {
            config.reconnect_interval_ms = interval;
        }
        if let Some(max) = self.max_entries {
            config = config.with_max_activity_entries(max);
        }
        Ok(config.with_auto_connect(true))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trivia_live_sync=info".parse().unwrap())
                .add_directive("trivia_live_monitor=info".parse().unwrap()),
        )
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            match e.downcast_ref::<SyncError>() {
                Some(err) => err.exit_code(),
                None => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let show = args.show;
    let config = args.into_config()?;

    let (mut session, mut events) = LiveSession::start(&config)?;
    tracing::info!(
        "Monitor {} following {}",
        session.client().client_id(),
        session.client().url()
    );

    let gave_up = Rc::new(Cell::new(None));
    let flag = gave_up.clone();
    session.client_mut().subscribe(move |event| {
        if let Some(line) = event_line(event) {
            tracing::info!("{}", line);
        }
        if let ClientEvent::Failed { attempts } = event {
            flag.set(Some(*attempts));
        }
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                if let Some(outcome) = session.handle(event) {
                    let kind = session
                        .client()
                        .last_message()
                        .map(|frame| frame.kind.clone())
                        .unwrap_or_default();
                    tracing::info!("'{}' {}", kind, outcome_label(outcome));
                    for line in snapshot(session.state(), show) {
                        println!("{}", line);
                    }
                }
                if let Some(attempts) = gave_up.get() {
                    return Err(SyncError::ConnectionExhausted { attempts }.into());
                }
                if session.client().state() == ConnectionState::Disconnected {
                    tracing::info!("Server closed the session");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted; disconnecting");
                session.disconnect();
                break;
            }
        }
    }

    Ok(())
}
