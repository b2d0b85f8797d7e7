use chrono::{Duration, Utc};
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use yieldvault_engine::{events::EventProducers, valuation::SeededJitter, PositionFlowApi, SqliteDatabase};

/// Starts the valuation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The loop awaits each run before asking the timer for the next tick (with missed ticks
/// delayed, not bursted), so two batch instances can never overlap. Individual position failures
/// are isolated inside `revalue_active_positions`.
pub fn start_valuation_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    interval_secs: u64,
    pending_expiry: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let api = PositionFlowApi::new(db, producers);
        let jitter = SeededJitter::default();
        info!("🕰️ Valuation worker started (every {interval_secs}s)");
        loop {
            timer.tick().await;
            let now = Utc::now();
            debug!("🕰️ Running valuation job");
            match api.revalue_active_positions(now, &jitter).await {
                Ok(summary) => {
                    info!(
                        "🕰️ Valuation complete. {} advanced, {} matured, {} reinvested, {} failed",
                        summary.advanced.len(),
                        summary.matured.len(),
                        summary.reinvested.len(),
                        summary.failed.len()
                    );
                    for (id, error) in &summary.failed {
                        warn!("🕰️ Position #{id} failed this run: {error}");
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running valuation job: {e}");
                },
            }
            match api.expire_stale_pending(now, pending_expiry).await {
                Ok(expired) if !expired.is_empty() => {
                    info!("🕰️ {} pending positions expired: {}", expired.len(), position_list(&expired));
                },
                Ok(_) => {},
                Err(e) => {
                    error!("🕰️ Error running pending-expiry job: {e}");
                },
            }
        }
    })
}

fn position_list(positions: &[yieldvault_engine::db_types::Position]) -> String {
    positions
        .iter()
        .map(|p| format!("[{}] user: {} channel: {}", p.id, p.user_id, p.payment_channel))
        .collect::<Vec<String>>()
        .join(", ")
}
