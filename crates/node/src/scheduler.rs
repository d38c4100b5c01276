use std::time::Duration;

use ledger::Ledger;
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info};

/// Periodically reconciles every account's deposits with the wallet.
pub fn spawn_deposit_poller(ledger: Ledger, every: Duration) -> JoinHandle<()> {
    Handle::current().spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match ledger.register_all_deposits().await {
                Ok(0) => debug!("Deposit poll found nothing new"),
                Ok(confirmed) => info!("Deposit poll confirmed {confirmed} sats"),
                Err(e) => error!("Deposit poll failed: {e}"),
            }
        }
    })
}

/// Periodically releases withdraw requests that outlived their TTL.
pub fn spawn_expiration_sweeper(ledger: Ledger, every: Duration) -> JoinHandle<()> {
    Handle::current().spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match ledger.expire_withdraw_requests() {
                Ok(affected) if affected.is_empty() => {}
                Ok(affected) => info!("Expired withdraw requests of {} accounts", affected.len()),
                Err(e) => error!("Expiration sweep failed: {e}"),
            }
        }
    })
}
