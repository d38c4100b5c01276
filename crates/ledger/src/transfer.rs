use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};
use types::{
    account::{Account, AccountId},
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    operation_metrics,
};

use crate::{
    ledger::Ledger,
    selection::{CoinSelector, DepositEvaluator, InternalTransferPreselector},
    unit_of_work::UnitOfWork,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAmount {
    All,
    Exact(u64),
}

impl Ledger {
    /// Moves `amount` of confirmed balance from `sender` to `receiver`.
    ///
    /// Either the whole amount moves or nothing does. Returns the amount
    /// moved.
    pub fn transfer_balance(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        amount: TransferAmount,
    ) -> Result<u64, LedgerError> {
        let result = self.run("transfer_balance", |uow| {
            self.apply_transfer(uow, sender, receiver, amount)
        });
        if let Ok(moved) = &result {
            info!("Transferred {moved} sats from {sender} to {receiver}");
        }
        operation_metrics!("transfer_balance", result)
    }

    /// Applies a set of signed balance changes that must net to zero.
    ///
    /// Every leg goes through the clearing account, debits first, and the
    /// whole batch commits as one unit of work.
    pub fn batch_transfer(&self, changes: &BTreeMap<AccountId, i64>) -> Result<(), LedgerError> {
        let net: i128 = changes.values().map(|change| i128::from(*change)).sum();
        if net != 0 {
            return operation_metrics!("batch_transfer", Err(LedgerError::UnaccountedFunds));
        }

        let mut legs: Vec<(&AccountId, i64)> = changes
            .iter()
            .filter(|(_, change)| **change != 0)
            .map(|(account, change)| (account, *change))
            .collect();
        legs.sort_by_key(|(_, change)| *change);

        let clearing = &self.config.clearing_account;
        let result = self.run("batch_transfer", |uow| {
            for (account, change) in &legs {
                let amount = TransferAmount::Exact(change.unsigned_abs());
                if *change < 0 {
                    self.apply_transfer(uow, account, clearing, amount)?;
                } else {
                    self.apply_transfer(uow, clearing, account, amount)?;
                }
            }
            Ok(())
        });
        if result.is_ok() {
            info!("Applied batch transfer across {} accounts", legs.len());
        }
        operation_metrics!("batch_transfer", result)
    }

    pub(crate) fn apply_transfer(
        &self,
        uow: &mut UnitOfWork<'_>,
        sender_id: &AccountId,
        receiver_id: &AccountId,
        amount: TransferAmount,
    ) -> Result<u64, LedgerError> {
        if amount == TransferAmount::Exact(0) {
            return Err(LedgerError::InsufficientFunds);
        }
        let Some(sender) = uow.account(sender_id)? else {
            return Err(LedgerError::InsufficientFunds);
        };

        let balance = uow.calculate_balance(&sender, false)?;
        if let TransferAmount::Exact(requested) = amount {
            if requested > balance {
                return Err(LedgerError::InsufficientFunds);
            }
        }

        if sender_id == receiver_id {
            return Ok(match amount {
                TransferAmount::All => balance,
                TransferAmount::Exact(requested) => requested,
            });
        }

        let receiver = uow.find_or_create_account(receiver_id)?;
        let reserved = reserved_inputs(uow, &sender)?;
        let candidates: Vec<_> = uow
            .get_deposits(&sender, false)?
            .into_iter()
            .filter(|deposit| !reserved.contains(&deposit.id) && deposit.share_of(sender_id) > 0)
            .collect();

        let evaluator =
            DepositEvaluator::for_transfer(sender_id.clone(), self.config.selection_order);
        let (selected, owed) = match amount {
            TransferAmount::All => {
                let owed = candidates.iter().map(|d| d.share_of(sender_id)).sum();
                (candidates, owed)
            }
            TransferAmount::Exact(requested) => {
                let preselector =
                    InternalTransferPreselector::new(self.selector.as_ref(), |deposit: &Deposit| {
                        receiver.holds(&deposit.id)
                    });
                let selected = preselector
                    .select_inputs(&evaluator, &candidates, requested)
                    .ok_or(LedgerError::InsufficientFunds)?;
                (selected, requested)
            }
        };

        if owed == 0 {
            return Ok(0);
        }

        let mut remaining = owed;
        let mut mutated = Vec::new();
        for mut deposit in selected {
            if remaining == 0 {
                break;
            }
            let sender_share = deposit.share_of(sender_id);
            let moved = sender_share.min(remaining);
            if moved == 0 {
                continue;
            }
            let receiver_share = deposit.share_of(receiver_id) + moved;
            deposit.set_share(sender_id, sender_share - moved)?;
            deposit.set_share(receiver_id, receiver_share)?;
            remaining -= moved;
            mutated.push(deposit);
        }

        if remaining > 0 {
            debug!("Transfer {sender_id} -> {receiver_id} short by {remaining}");
            return Err(LedgerError::InsufficientFunds);
        }

        uow.persist_batch(mutated, vec![sender, receiver]);
        Ok(owed)
    }
}

/// Deposits held back by the account's own pending withdrawal.
pub(crate) fn reserved_inputs(
    uow: &mut UnitOfWork<'_>,
    account: &Account,
) -> Result<BTreeSet<DepositId>, LedgerError> {
    let Some(request_id) = &account.pending_withdrawal else {
        return Ok(BTreeSet::new());
    };
    Ok(uow
        .withdraw_request(request_id)?
        .filter(|request| request.is_pending())
        .map(|request| request.reserved_inputs.into_iter().collect())
        .unwrap_or_default())
}
