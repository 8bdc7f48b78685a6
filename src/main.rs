mod log;
mod config;
mod api;
mod store;
mod audit;
mod import;
mod export;
mod console;

use std::sync::Arc;

use drawdesk_core::{service::OfflineService, DrawEngine, RaffleService};

trait ResultLog {
    type OkType;
    fn expect_log(self, msg: &str) -> Self::OkType;
}
impl<T, S: AsRef<str>> ResultLog for Result<T, S> {
    type OkType=T;
    fn expect_log(self, msg: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) if msg.is_empty() => panic!("{}", e.as_ref()),
            Err(e) => panic!("{}: {}", msg, e.as_ref()),
        }
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| config::Config::DEFAULT_PATH.to_string());
    let config = config::Config::load_or_default(&config_path).expect_log("Could not load the configuration file");
    log::init().map_err(|e| e.to_string()).expect_log("Logger already set");

    let service: Arc<dyn RaffleService> = match &config.api_url {
        Some(url) => {
            log_info!("Raffle service at {}", url);
            Arc::new(api::RestService::new(url.as_str(), config.api_token.clone()))
        }
        None => {
            log_info!("No api_url configured, running offline");
            Arc::new(OfflineService)
        }
    };
    let store = store::SnapshotFile::new(config.snapshot.clone());
    let snapshot = store.load().await.map_err(|e| e.to_string()).expect_log("Could not load the snapshot");
    let engine = Arc::new(DrawEngine::with_snapshot(service, config.resolution.into(), config.timing(), snapshot));

    if !config.is_offline() {
        match engine.refresh().await {
            Ok(_) => {
                if let Err(e) = store.save(&engine.snapshot().await).await {
                    log_warn!("Snapshot not saved: {}", e);
                }
            }
            Err(e) => log_warn!("Service unreachable, using the snapshot: {}", e),
        }
    }

    let console = console::Console::new(
        engine,
        store,
        audit::DrawJournal::new(config.audit_log.clone()),
        config.export_dir.clone(),
    );
    console.run().await.expect_log("Console stopped");
}
