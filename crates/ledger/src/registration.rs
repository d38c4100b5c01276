use std::collections::BTreeSet;

use tracing::{debug, error, info};
use types::{
    account::AccountId,
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    events::LedgerEvent,
    operation_metrics,
    utxo::UnspentFilter,
};

use crate::ledger::Ledger;

impl Ledger {
    /// Issues a fresh wallet address and binds it to the account.
    pub async fn assign_deposit_address(&self, account_id: &AccountId) -> Result<String, LedgerError> {
        let address = self.oracle.get_new_address().await?;

        let result = self.run("assign_deposit_address", |uow| {
            let mut account = uow.find_or_create_account(account_id)?;
            if !account.deposit_addresses.contains(&address) {
                account.deposit_addresses.push(address.clone());
            }
            uow.put_account(account);
            Ok(())
        });
        operation_metrics!("assign_deposit_address", result)?;

        info!("Assigned deposit address {address} to {account_id}");
        Ok(address)
    }

    /// Reconciles the account's deposits with what the wallet reports for its
    /// addresses and returns the value that became confirmed.
    ///
    /// New outputs are credited in full to the account. Outputs a withdrawal
    /// already spent are ignored, since the wallet listing may predate the
    /// spend. Unconfirmed deposits the wallet no longer reports are dropped.
    pub async fn register_deposits(&self, account_id: &AccountId) -> Result<u64, LedgerError> {
        let Some(account) = self.db.get_account(account_id)? else {
            return Ok(0);
        };
        if account.deposit_addresses.is_empty() {
            return Ok(0);
        }

        let unspent = self
            .oracle
            .list_unspent(&UnspentFilter::for_addresses(account.deposit_addresses))
            .await?;
        let required = self.config.required_confirmations;

        let result = self.run("register_deposits", |uow| {
            let mut account = uow
                .account(account_id)?
                .ok_or_else(|| LedgerError::InvariantViolation(format!("{account_id} vanished")))?;
            let mut changed = Vec::new();
            let mut confirmed_total: u64 = 0;

            for output in &unspent {
                let id = DepositId::from(output.outpoint);
                let value = output.value.to_sat();
                let confirmed = output.confirmations >= required;

                match uow.deposit(&id)? {
                    None if uow.spending_txid(&id)?.is_some() => {
                        // Spent by a withdrawal after the wallet was asked.
                        debug!("Skipping spent output {id} for {account_id}");
                    }
                    None => {
                        let mut deposit =
                            Deposit::new(id, value, confirmed, Some(output.address.clone()));
                        deposit.set_share(account_id, value)?;
                        if confirmed {
                            confirmed_total += value;
                            uow.emit(LedgerEvent::DepositConfirmed {
                                account_id: account_id.clone(),
                                amount: value,
                            });
                        }
                        debug!("Registered deposit {} of {value} for {account_id}", deposit.id);
                        changed.push(deposit);
                    }
                    Some(mut deposit) if !deposit.confirmed && confirmed => {
                        deposit.confirmed = true;
                        let credited = deposit.share_of(account_id);
                        confirmed_total += credited;
                        uow.emit(LedgerEvent::DepositConfirmed {
                            account_id: account_id.clone(),
                            amount: credited,
                        });
                        changed.push(deposit);
                    }
                    Some(_) => {}
                }
            }

            let reported: BTreeSet<DepositId> = unspent
                .iter()
                .map(|output| DepositId::from(output.outpoint))
                .collect();
            for deposit in uow.get_deposits(&account, true)? {
                let ours = deposit
                    .address
                    .as_ref()
                    .is_some_and(|address| account.deposit_addresses.contains(address));
                if !deposit.confirmed && ours && !reported.contains(&deposit.id) {
                    info!("Dropping vanished unconfirmed deposit {}", deposit.id);
                    uow.remove_deposit(&deposit.id)?;
                    account.deposits.remove(&deposit.id);
                }
            }

            uow.persist_batch(changed, vec![account]);
            Ok(confirmed_total)
        });

        let confirmed = operation_metrics!("register_deposits", result)?;
        if confirmed > 0 {
            info!("Confirmed {confirmed} sats of deposits for {account_id}");
        }
        Ok(confirmed)
    }

    /// Runs deposit registration for every account with an address. A failing
    /// account is logged and skipped.
    pub async fn register_all_deposits(&self) -> Result<u64, LedgerError> {
        let mut confirmed = 0;
        for account in self.db.get_all_accounts()? {
            if account.deposit_addresses.is_empty() {
                continue;
            }
            match self.register_deposits(&account.id).await {
                Ok(amount) => confirmed += amount,
                Err(e) => error!("Deposit registration failed for {}: {e}", account.id),
            }
        }
        Ok(confirmed)
    }
}
