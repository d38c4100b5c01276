use std::{collections::BTreeMap, path::PathBuf, str::FromStr};

use bitcoin::Network;
use ledger::{Ledger, TransferAmount, WithdrawAmount};
use node::{NodeConfig, NodeConfigBuilder};
use serde_json::{Value, json};
use types::{
    account::AccountId,
    amount::{format_amount, parse_amount},
    withdraw::WithdrawRequest,
};

use crate::errors::CliError;

pub fn parse_transfer_amount(s: &str) -> Result<TransferAmount, CliError> {
    if s.eq_ignore_ascii_case("all") {
        Ok(TransferAmount::All)
    } else {
        Ok(TransferAmount::Exact(parse_amount(s)?))
    }
}

pub fn parse_withdraw_amount(s: &str) -> Result<WithdrawAmount, CliError> {
    if s.eq_ignore_ascii_case("all") {
        Ok(WithdrawAmount::All)
    } else {
        Ok(WithdrawAmount::Exact(parse_amount(s)?))
    }
}

/// Parses `account=+0.00010000` or `account=-0.00010000` into a signed
/// change in sats.
pub fn parse_change(s: &str) -> Result<(AccountId, i64), CliError> {
    let (account, amount) = s
        .split_once('=')
        .ok_or_else(|| CliError::InvalidArgument(format!("expected account=amount, got '{s}'")))?;
    if account.is_empty() {
        return Err(CliError::InvalidArgument(format!("missing account in '{s}'")));
    }

    let (negative, magnitude) = match amount.as_bytes().first() {
        Some(b'-') => (true, &amount[1..]),
        Some(b'+') => (false, &amount[1..]),
        _ => (false, amount),
    };
    let sats = i64::try_from(parse_amount(magnitude)?)
        .map_err(|_| CliError::InvalidArgument(format!("amount out of range in '{s}'")))?;

    Ok((AccountId::from(account), if negative { -sats } else { sats }))
}

pub fn parse_changes(entries: &[String]) -> Result<BTreeMap<AccountId, i64>, CliError> {
    let mut changes = BTreeMap::new();
    for entry in entries {
        let (account, change) = parse_change(entry)?;
        if changes.insert(account.clone(), change).is_some() {
            return Err(CliError::InvalidArgument(format!(
                "account {account} appears more than once"
            )));
        }
    }
    Ok(changes)
}

pub fn setup_config(
    output: Option<String>,
    database: Option<String>,
    network: Option<&str>,
) -> Result<PathBuf, CliError> {
    let path = NodeConfig::get_config_file_path(output)?;
    if path.exists() {
        return Err(CliError::ConfigExists(path.display().to_string()));
    }

    let mut builder = NodeConfigBuilder::new().config_file_path(path.clone());
    if let Some(database) = database {
        builder = builder.database_directory(database);
    }
    if let Some(network) = network {
        let network = Network::from_str(network)
            .map_err(|e| CliError::InvalidArgument(format!("network '{network}': {e}")))?;
        builder = builder.network(network);
    }

    builder.build()?.save_to_file()?;
    Ok(path)
}

pub fn balance(
    ledger: &Ledger,
    account: &AccountId,
    include_unconfirmed: bool,
) -> Result<Value, CliError> {
    Ok(json!({
        "account": account,
        "balance": format_amount(ledger.balance(account, include_unconfirmed)?),
        "withdrawable": format_amount(ledger.withdrawable_balance(account)?),
    }))
}

pub fn transfer(
    ledger: &Ledger,
    from: &AccountId,
    to: &AccountId,
    amount: TransferAmount,
) -> Result<Value, CliError> {
    let moved = ledger.transfer_balance(from, to, amount)?;
    Ok(json!({
        "from": from,
        "to": to,
        "moved": format_amount(moved),
    }))
}

pub fn batch_transfer(ledger: &Ledger, entries: &[String]) -> Result<Value, CliError> {
    let changes = parse_changes(entries)?;
    ledger.batch_transfer(&changes)?;
    Ok(json!({ "applied": changes.len() }))
}

pub async fn request_withdrawal(
    ledger: &Ledger,
    account: &AccountId,
    address: &str,
    amount: WithdrawAmount,
) -> Result<Value, CliError> {
    let quote = ledger.request_withdrawal(account, address, amount).await?;
    Ok(serde_json::to_value(quote)?)
}

fn describe_request(request: &WithdrawRequest) -> Value {
    json!({
        "id": request.id,
        "account": request.account_id,
        "destination": request.destination_address,
        "withdraw_amount": format_amount(request.withdraw_amount),
        "fee_amount": format_amount(request.fee_amount),
        "status": request.status().to_string(),
        "txid": request.txid,
        "broadcasting": request.broadcasting,
        "created_at": request.created_at,
    })
}

pub fn withdrawal_status(
    ledger: &Ledger,
    request_id: Option<&str>,
    txid: Option<&str>,
) -> Result<Value, CliError> {
    let request = match (request_id, txid) {
        (Some(id), None) => ledger.get_withdraw_request(id)?,
        (None, Some(txid)) => ledger.get_withdraw_request_by_txid(txid)?,
        _ => {
            return Err(CliError::InvalidArgument(
                "pass exactly one of a request id or --txid".into(),
            ));
        }
    };
    Ok(describe_request(&request))
}

pub fn expire_withdrawals(ledger: &Ledger) -> Result<Value, CliError> {
    let affected = ledger.expire_withdraw_requests()?;
    Ok(json!({ "expired_accounts": affected }))
}

pub fn audit(ledger: &Ledger) -> Result<Value, CliError> {
    let totals = ledger.audit()?;
    Ok(json!({
        "total_value": format_amount(totals.total_value),
        "confirmed_value": format_amount(totals.confirmed_value),
        "attributed": format_amount(totals.attributed),
        "unattributed": format_amount(totals.unattributed),
    }))
}
