use tokio::{
    runtime::Handle,
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{info, warn};
use types::{amount::format_amount, events::LedgerEvent};

/// Human readable notice for the account an event concerns.
#[must_use]
pub fn describe(event: &LedgerEvent) -> String {
    match event {
        LedgerEvent::DepositConfirmed { amount, .. } => {
            format!("Deposit of {} BTC confirmed", format_amount(*amount))
        }
        LedgerEvent::WithdrawRequestExpired { .. } => {
            "Withdraw request expired; the reserved funds are available again".to_string()
        }
        LedgerEvent::WithdrawalCompleted { txid, .. } => {
            format!("Withdrawal broadcast in transaction {txid}")
        }
    }
}

/// Delivers ledger events until the ledger's sender is dropped.
pub fn spawn_notifier(mut events: broadcast::Receiver<LedgerEvent>) -> JoinHandle<()> {
    Handle::current().spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    metrics::counter!("ledger_notifications_total", "type" => event.kind())
                        .increment(1);
                    info!(account = %event.account_id(), kind = event.kind(), "{}", describe(&event));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Notifier lagged behind, {skipped} events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use types::account::AccountId;

    use super::*;

    #[test]
    fn test_describe_formats_amounts() {
        let event = LedgerEvent::DepositConfirmed {
            account_id: AccountId::from("alice"),
            amount: 150_000,
        };
        assert_eq!(describe(&event), "Deposit of 0.00150000 BTC confirmed");
    }

    #[tokio::test]
    async fn test_notifier_stops_when_sender_closes() {
        let (sender, receiver) = broadcast::channel(4);
        let handle = spawn_notifier(receiver);
        sender
            .send(LedgerEvent::WithdrawalCompleted {
                account_id: AccountId::from("alice"),
                txid: "ab".repeat(32),
            })
            .unwrap();
        drop(sender);
        handle.await.unwrap();
    }
}
