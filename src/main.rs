// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod config;
mod network;
mod scheduler;
mod status;

use clap::Parser;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use config::AppConfig;
use network::{PollingLinkWatcher, RouteLinkSource};
use reachability::{
    Account, HttpProbeClient, LinkStateSource, MetadataSyncJob, ReachabilityTracker, SeafileApi,
    StaticAccountContext, TrackerPorts,
};
use scheduler::SyncScheduler;
use status::{monitor_connectivity, ConnectivityStatus, SharedConnectivityStatus};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Watch connectivity to a Seafile server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Server base URL (overrides config and SEAFILE_SERVER)
    #[arg(long)]
    server: Option<String>,

    /// Account login
    #[arg(long)]
    email: Option<String>,

    /// API token used by the metadata sync
    #[arg(long)]
    token: Option<String>,

    /// Probe once, print the resulting state as JSON and exit
    #[arg(long)]
    once: bool,

    /// Link polling interval in seconds
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Disable the metadata sync scheduler
    #[arg(long)]
    no_sync: bool,

    /// Write the effective configuration back to disk
    #[arg(long)]
    save: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(server) = &self.server {
            let stored = config
                .account
                .take()
                .unwrap_or_else(|| Account::new(server.clone(), ""));
            config.account = Some(Account {
                server: server.clone(),
                ..stored
            });
        }

        if let Some(account) = config.account.as_mut() {
            if let Some(email) = &self.email {
                account.email.clone_from(email);
            }
            if let Some(token) = &self.token {
                account.token = Some(token.clone());
            }
        }

        if let Some(secs) = self.poll_interval_secs {
            config.link_poll_interval_secs = secs;
        }
        if self.no_sync {
            config.sync_enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = AppConfig::load()?;
    args.apply(&mut config);

    if args.save {
        config.save()?;
        info!("Saved configuration to {}", AppConfig::get_config_path()?.display());
    }

    let account = config.resolve_account();
    match &account {
        Some(account) => info!("Monitoring {} ({})", account.server, account.email),
        None => warn!("No account configured; server is assumed reachable"),
    }

    let accounts = Arc::new(StaticAccountContext::new(account));
    let link_target: SocketAddr = config.link_check_address.parse()?;
    let link_source: Arc<dyn LinkStateSource> = Arc::new(RouteLinkSource::new(link_target));
    let probe = Arc::new(HttpProbeClient::new(config.probe_timeouts())?);

    let tracker = ReachabilityTracker::spawn(
        TrackerPorts {
            link_source: Arc::clone(&link_source),
            accounts: accounts.clone(),
            probe,
        },
        &config.tracker_config(),
    );

    if args.once {
        return probe_once(&tracker, &config).await;
    }

    let cancel_token = CancellationToken::new();
    let status: SharedConnectivityStatus = Arc::new(Mutex::new(ConnectivityStatus::new()));

    tokio::spawn(monitor_connectivity(
        tracker.observable().subscribe(),
        status.clone(),
        cancel_token.clone(),
    ));

    // Subscribe before the first reconcile so the scheduler skips only the
    // initial value
    let sync_subscription = config.sync_enabled.then(|| tracker.observable().subscribe());

    let watcher = PollingLinkWatcher::spawn(link_source, config.link_poll_interval());
    tracker.register(&watcher);
    debug!(
        "Polling link state every {}s ({} listener)",
        config.link_poll_interval().as_secs(),
        watcher.listener_count()
    );

    if let Some(subscription) = sync_subscription {
        let job = Arc::new(MetadataSyncJob::new(SeafileApi::new()?));
        let scheduler = SyncScheduler::new(job, accounts, status.clone(), config.sync_interval());
        tokio::spawn(scheduler.run(subscription, cancel_token.clone()));
    } else {
        info!("Metadata sync disabled");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    cancel_token.cancel();
    watcher.shutdown();
    tracker.shutdown();

    if let Ok(status) = status.lock() {
        for diagnostic in status.recent_diagnostics(10) {
            debug!(
                "{} {:?}: {}",
                diagnostic.timestamp.format("%Y-%m-%d %H:%M:%S"),
                diagnostic.level,
                diagnostic.message
            );
        }
        info!("Final state: {}", status.summary());
    }

    Ok(())
}

/// Reconcile once and print the snapshot after the probe settles
async fn probe_once(
    tracker: &ReachabilityTracker,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut subscription = tracker.observable().subscribe();
    // Initial replayed value
    let _ = subscription.recv().await;

    tracker.refresh();

    let timeouts = config.probe_timeouts();
    let deadline = timeouts.connect + timeouts.read + Duration::from_secs(1);
    if tokio::time::timeout(deadline, subscription.recv()).await.is_err() {
        warn!("No probe result within {}s", deadline.as_secs());
    }

    println!("{}", serde_json::to_string_pretty(&tracker.snapshot())?);
    tracker.shutdown();
    Ok(())
}
