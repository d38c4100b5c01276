use std::collections::{BTreeMap, BTreeSet};

use bitcoin::{Amount, OutPoint, Txid};
use tracing::{error, info};
use types::{
    account::{Account, AccountId},
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    events::LedgerEvent,
    operation_metrics,
    utxo::TxOutput,
    withdraw::{WithdrawQuote, WithdrawRequest},
};
use uuid::Uuid;

use crate::{
    fees,
    ledger::{Ledger, unix_now},
    selection::DepositEvaluator,
    transfer::reserved_inputs,
    unit_of_work::UnitOfWork,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawAmount {
    All,
    Exact(u64),
}

/// The transaction a completion will broadcast, fixed while the request is
/// marked as broadcasting.
struct SpendPlan {
    destination: String,
    withdraw_amount: u64,
    inputs: Vec<OutPoint>,
    input_total: u64,
    change_value: u64,
    keep_change: bool,
}

enum Completion {
    Done(String),
    Broadcast(SpendPlan),
}

impl Ledger {
    /// Reserves funds for an external withdrawal and quotes its fee.
    pub async fn request_withdrawal(
        &self,
        account_id: &AccountId,
        destination: &str,
        amount: WithdrawAmount,
    ) -> Result<WithdrawQuote, LedgerError> {
        let result = self
            .try_request_withdrawal(account_id, destination, amount)
            .await;
        operation_metrics!("request_withdrawal", result)
    }

    async fn try_request_withdrawal(
        &self,
        account_id: &AccountId,
        destination: &str,
        amount: WithdrawAmount,
    ) -> Result<WithdrawQuote, LedgerError> {
        if let WithdrawAmount::Exact(0) = amount {
            return Err(LedgerError::InvalidAmount("withdraw amount must be positive".into()));
        }

        if self
            .db
            .get_account(account_id)?
            .is_some_and(|account| account.pending_withdrawal.is_some())
        {
            return Err(LedgerError::WithdrawRequestAlreadyExists);
        }

        if !self.oracle.validate_address(destination).await? {
            return Err(LedgerError::InvalidAddress);
        }

        let fee_rate = self
            .oracle
            .estimate_fee_rate()
            .await
            .map_err(|e| match e {
                LedgerError::FeeEstimationFailed(_) => e,
                other => LedgerError::FeeEstimationFailed(other.to_string()),
            })
            .and_then(fees::validate_fee_rate)?;

        let request_id = Uuid::new_v4().to_string();
        let quote = self.run("request_withdrawal", |uow| {
            self.reserve_withdrawal(uow, &request_id, account_id, destination, amount, fee_rate)
        })?;

        info!(
            "Withdraw request {} for {account_id}: {} + {} fee",
            quote.request_id, quote.withdraw_amount, quote.fee_amount
        );
        Ok(quote)
    }

    fn reserve_withdrawal(
        &self,
        uow: &mut UnitOfWork<'_>,
        request_id: &str,
        account_id: &AccountId,
        destination: &str,
        amount: WithdrawAmount,
        fee_rate: f64,
    ) -> Result<WithdrawQuote, LedgerError> {
        let Some(mut account) = uow.account(account_id)? else {
            return Err(LedgerError::NotEnoughWithdrawableFunds);
        };
        if account.pending_withdrawal.is_some() {
            return Err(LedgerError::WithdrawRequestAlreadyExists);
        }

        let candidates: Vec<Deposit> = uow
            .get_deposits(&account, false)?
            .into_iter()
            .filter(|deposit| deposit.share_of(account_id) > 0)
            .collect();
        let withdrawable: u64 = candidates.iter().map(|d| d.share_of(account_id)).sum();

        let (selected, withdraw_amount, fee_amount) = match amount {
            WithdrawAmount::All => {
                if withdrawable == 0 {
                    return Err(LedgerError::NotEnoughWithdrawableFunds);
                }
                let fee = fees::withdrawal_fee(fee_rate, candidates.len())?;
                if withdrawable <= fee {
                    return Err(LedgerError::CannotAffordFees);
                }
                (candidates, withdrawable - fee, fee)
            }
            WithdrawAmount::Exact(requested) => {
                if requested > withdrawable {
                    return Err(LedgerError::NotEnoughWithdrawableFunds);
                }
                let evaluator = DepositEvaluator::new(
                    account_id.clone(),
                    fees::input_cost(fee_rate)?,
                    self.config.selection_order,
                );
                let target = requested
                    .checked_add(fees::base_fee(fee_rate)?)
                    .ok_or(LedgerError::CannotAffordFees)?;
                let selected = self
                    .selector
                    .select_inputs(&evaluator, &candidates, target)
                    .ok_or(LedgerError::CannotAffordFees)?;
                let fee = fees::withdrawal_fee(fee_rate, selected.len())?;
                (selected, requested, fee)
            }
        };

        let reserved_amount: u64 = selected.iter().map(|d| d.share_of(account_id)).sum();
        if reserved_amount < withdraw_amount + fee_amount {
            return Err(LedgerError::CannotAffordFees);
        }

        let request = WithdrawRequest {
            id: request_id.to_string(),
            account_id: account_id.clone(),
            destination_address: destination.to_string(),
            withdraw_amount,
            fee_amount,
            created_at: unix_now(),
            txid: None,
            broadcasting: false,
            reserved_inputs: selected.into_iter().map(|d| d.id).collect(),
            reserved_amount,
            version: 0,
        };
        let quote = WithdrawQuote {
            request_id: request.id.clone(),
            withdraw_amount,
            fee_amount,
            total_cost: request.total_cost(),
        };

        account.pending_withdrawal = Some(request.id.clone());
        uow.put_withdraw_request(request);
        uow.put_account(account);
        Ok(quote)
    }

    /// Confirmed balance not held back by the account's pending withdrawal.
    pub fn withdrawable_balance(&self, account_id: &AccountId) -> Result<u64, LedgerError> {
        let mut uow = UnitOfWork::new(self.db.as_ref());
        let Some(account) = uow.account(account_id)? else {
            return Ok(0);
        };
        let reserved = reserved_inputs(&mut uow, &account)?;
        Ok(uow
            .get_deposits(&account, false)?
            .iter()
            .filter(|deposit| !reserved.contains(&deposit.id))
            .map(|deposit| deposit.share_of(account_id))
            .sum())
    }

    pub fn get_withdraw_request(&self, request_id: &str) -> Result<WithdrawRequest, LedgerError> {
        self.db
            .get_withdraw_request(request_id)?
            .ok_or(LedgerError::WithdrawRequestNotFound)
    }

    pub fn get_withdraw_request_by_txid(&self, txid: &str) -> Result<WithdrawRequest, LedgerError> {
        self.db
            .get_withdraw_request_by_txid(txid)?
            .ok_or(LedgerError::WithdrawRequestNotFound)
    }

    /// Broadcasts the transaction backing a pending request and records the
    /// spend. Completing an already completed request returns its txid.
    ///
    /// The request is marked as broadcasting in its own commit before the
    /// wallet is called, and the spend is recorded in a second one.
    pub async fn complete_withdrawal(&self, request_id: &str) -> Result<String, LedgerError> {
        let result = self.try_complete_withdrawal(request_id).await;
        operation_metrics!("complete_withdrawal", result)
    }

    async fn try_complete_withdrawal(&self, request_id: &str) -> Result<String, LedgerError> {
        let plan = match self.run("begin_withdrawal", |uow| self.begin_broadcast(uow, request_id))? {
            Completion::Done(txid) => return Ok(txid),
            Completion::Broadcast(plan) => plan,
        };

        let (txid, change_address) = match self.broadcast_spend(&plan).await {
            Ok(sent) => sent,
            Err(e) => {
                self.abort_broadcast(request_id);
                return Err(e);
            }
        };

        self.run("complete_withdrawal", |uow| {
            self.record_spend(uow, request_id, &plan, change_address.as_deref(), txid)
        })
        .inspect_err(|e| {
            error!("Broadcast {txid} for withdraw request {request_id} but failed to record it: {e}");
        })?;

        info!(
            "Withdraw request {request_id} completed by {txid} ({} sats in, change {})",
            plan.input_total, plan.change_value
        );
        Ok(txid.to_string())
    }

    /// Fixes the spend and marks the request as broadcasting, which keeps its
    /// inputs reserved and the sweep away from it until the spend is recorded.
    fn begin_broadcast(
        &self,
        uow: &mut UnitOfWork<'_>,
        request_id: &str,
    ) -> Result<Completion, LedgerError> {
        let mut request = uow
            .withdraw_request(request_id)?
            .ok_or(LedgerError::WithdrawRequestNotFound)?;
        if let Some(txid) = &request.txid {
            return Ok(Completion::Done(txid.clone()));
        }
        if request.broadcasting {
            return Err(LedgerError::WithdrawalInFlight);
        }

        let mut inputs = Vec::with_capacity(request.reserved_inputs.len());
        let mut input_total: u64 = 0;
        let mut co_owned = false;
        for id in &request.reserved_inputs {
            let deposit = uow.deposit(id)?.ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "withdraw request {request_id} reserves missing deposit {id}"
                ))
            })?;
            co_owned |= deposit
                .holders()
                .any(|(holder, _)| *holder != request.account_id);
            input_total += deposit.total_value;
            inputs.push(id.outpoint()?);
        }

        let change_value = input_total
            .checked_sub(request.total_cost())
            .ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "reserved inputs of {request_id} cannot cover {}",
                    request.total_cost()
                ))
            })?;

        let plan = SpendPlan {
            destination: request.destination_address.clone(),
            withdraw_amount: request.withdraw_amount,
            inputs,
            input_total,
            change_value,
            keep_change: co_owned || change_value > self.config.dust_limit,
        };
        request.broadcasting = true;
        uow.put_withdraw_request(request);
        Ok(Completion::Broadcast(plan))
    }

    async fn broadcast_spend(&self, plan: &SpendPlan) -> Result<(Txid, Option<String>), LedgerError> {
        let mut outputs = vec![TxOutput {
            address: plan.destination.clone(),
            value: Amount::from_sat(plan.withdraw_amount),
        }];
        let change_address = if plan.keep_change {
            let address = self.oracle.get_new_address().await?;
            outputs.push(TxOutput {
                address: address.clone(),
                value: Amount::from_sat(plan.change_value),
            });
            Some(address)
        } else {
            None
        };

        let txid = self
            .oracle
            .create_and_broadcast_transaction(&plan.inputs, &outputs)
            .await?;
        Ok((txid, change_address))
    }

    /// Hands a request whose broadcast failed back to the pending state.
    fn abort_broadcast(&self, request_id: &str) {
        let result = self.run("abort_withdrawal", |uow| {
            if let Some(mut request) = uow.withdraw_request(request_id)? {
                if request.broadcasting && request.txid.is_none() {
                    request.broadcasting = false;
                    uow.put_withdraw_request(request);
                }
            }
            Ok(())
        });
        if let Err(e) = result {
            error!("Failed to release withdraw request {request_id} after a failed broadcast: {e}");
        }
    }

    fn record_spend(
        &self,
        uow: &mut UnitOfWork<'_>,
        request_id: &str,
        plan: &SpendPlan,
        change_address: Option<&str>,
        txid: Txid,
    ) -> Result<(), LedgerError> {
        let mut request = uow
            .withdraw_request(request_id)?
            .filter(|request| request.broadcasting)
            .ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "withdraw request {request_id} is not being broadcast"
                ))
            })?;
        let withdrawer = request.account_id.clone();
        let mut claims: BTreeMap<AccountId, u64> = BTreeMap::new();
        let mut touched: BTreeMap<AccountId, Account> = BTreeMap::new();

        for id in &request.reserved_inputs {
            let deposit = uow.deposit(id)?.ok_or_else(|| {
                LedgerError::InvariantViolation(format!("spent deposit {id} vanished"))
            })?;
            for (holder, share) in deposit.holders() {
                *claims.entry(holder.clone()).or_default() += share;
                if !touched.contains_key(holder) {
                    let account = uow.account(holder)?.ok_or_else(|| {
                        LedgerError::InvariantViolation(format!("holder {holder} of {id} missing"))
                    })?;
                    touched.insert(holder.clone(), account);
                }
            }
            uow.remove_deposit(id)?;
            uow.mark_spent(id, &txid.to_string());
        }

        for account in touched.values_mut() {
            for id in &request.reserved_inputs {
                account.deposits.remove(id);
            }
        }

        // The withdrawer's claim shrinks by what left the wallet on their behalf.
        let withdrawer_claim = claims.get(&withdrawer).copied().unwrap_or(0);
        let leftover = withdrawer_claim
            .checked_sub(request.total_cost())
            .ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "{withdrawer} holds {withdrawer_claim} of the inputs of {request_id}, needs {}",
                    request.total_cost()
                ))
            })?;
        claims.insert(withdrawer.clone(), leftover);

        let mut change_deposits = Vec::new();
        if let Some(address) = change_address {
            let change_id = DepositId::from(OutPoint::new(txid, 1));
            let mut change =
                Deposit::new(change_id, plan.change_value, true, Some(address.to_string()));
            for (holder, claim) in &claims {
                change.set_share(holder, *claim)?;
            }
            change_deposits.push(change);
        } else if claims.iter().any(|(holder, claim)| *holder != withdrawer && *claim > 0) {
            return Err(LedgerError::InvariantViolation(format!(
                "co-owned inputs of {request_id} spent without change"
            )));
        }

        if let Some(account) = touched.get_mut(&withdrawer) {
            if account.pending_withdrawal.as_deref() == Some(request_id) {
                account.pending_withdrawal = None;
            }
        }

        request.txid = Some(txid.to_string());
        request.broadcasting = false;
        uow.put_withdraw_request(request);
        uow.persist_batch(change_deposits, touched.into_values().collect());
        uow.emit(LedgerEvent::WithdrawalCompleted {
            account_id: withdrawer,
            txid: txid.to_string(),
        });
        Ok(())
    }

    /// Removes a completed request once its transaction has settled.
    pub fn settle_withdrawal(&self, txid: &str) -> Result<WithdrawRequest, LedgerError> {
        let result = self.run("settle_withdrawal", |uow| {
            let request = self
                .db
                .get_withdraw_request_by_txid(txid)?
                .ok_or(LedgerError::WithdrawRequestNotFound)?;
            uow.remove_withdraw_request(&request.id)?;
            Ok(request)
        });
        if result.is_ok() {
            info!("Settled withdrawal {txid}");
        }
        operation_metrics!("settle_withdrawal", result)
    }

    pub fn expire_withdraw_requests(&self) -> Result<BTreeSet<AccountId>, LedgerError> {
        self.expire_withdraw_requests_at(unix_now())
    }

    /// Drops pending requests older than the TTL at `now` and returns the
    /// accounts whose reservation was released.
    ///
    /// One failing request is logged and skipped; the sweep carries on.
    pub fn expire_withdraw_requests_at(&self, now: u64) -> Result<BTreeSet<AccountId>, LedgerError> {
        let ttl = self.config.withdraw_request_ttl_secs;
        let mut affected = BTreeSet::new();

        for request in self.db.get_all_withdraw_requests()? {
            if !request.is_expired(now, ttl) {
                continue;
            }

            let expired = self.run("expire_withdraw_request", |uow| {
                let Some(current) = uow.withdraw_request(&request.id)? else {
                    return Ok(false);
                };
                if !current.is_expired(now, ttl) {
                    return Ok(false);
                }

                uow.remove_withdraw_request(&current.id)?;
                if let Some(mut account) = uow.account(&current.account_id)? {
                    if account.pending_withdrawal.as_deref() == Some(current.id.as_str()) {
                        account.pending_withdrawal = None;
                        uow.put_account(account);
                    }
                }
                uow.emit(LedgerEvent::WithdrawRequestExpired {
                    account_id: current.account_id.clone(),
                });
                Ok(true)
            });

            match operation_metrics!("expire_withdraw_request", expired) {
                Ok(true) => {
                    info!(
                        "Expired withdraw request {} for {}",
                        request.id, request.account_id
                    );
                    affected.insert(request.account_id);
                }
                Ok(false) => {}
                Err(e) => error!("Failed to expire withdraw request {}: {e}", request.id),
            }
        }

        Ok(affected)
    }
}
