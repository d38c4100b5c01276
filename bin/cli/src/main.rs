mod commands;
mod errors;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use node::{Node, NodeConfig, start_node::start_node};
use serde_json::Value;
use types::account::AccountId;

use crate::errors::CliError;

#[derive(Parser)]
#[command(name = "custodian")]
#[command(about = "Custodial ledger of shared claims on a single Bitcoin wallet.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to the path set by the --output flag
    Setup {
        #[arg(short, long)]
        output: Option<String>,
        #[arg(short, long)]
        database: Option<String>,
        #[arg(short, long)]
        network: Option<String>,
    },
    /// Run the ledger daemon with its deposit poller and expiration sweeper
    Run {
        #[arg(short, long)]
        config: Option<String>,
        #[arg(short, long)]
        log_file: Option<String>,
        #[arg(short, long)]
        metrics_port: Option<u16>,
    },
    /// Show an account's balance and withdrawable balance
    Balance {
        account: String,
        #[arg(long)]
        include_unconfirmed: bool,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Move balance between two accounts; AMOUNT is "all" or e.g. 0.00100000
    Transfer {
        from: String,
        to: String,
        amount: String,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Apply signed changes atomically, e.g. alice=-0.00000005 bob=+0.00000005
    BatchTransfer {
        #[arg(required = true, allow_hyphen_values = true)]
        changes: Vec<String>,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Reserve funds for a withdrawal and print the fee quote
    RequestWithdrawal {
        account: String,
        address: String,
        amount: String,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Look up a withdraw request by id or by transaction id
    WithdrawalStatus {
        request_id: Option<String>,
        #[arg(long)]
        txid: Option<String>,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Release withdraw requests that outlived their TTL
    ExpireWithdrawals {
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Check ledger consistency and print wallet totals
    Audit {
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn open_node(config: Option<String>) -> Result<Node, CliError> {
    let config = NodeConfig::get_config(config)?;
    Ok(Node::open(&config)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Setup {
            output,
            database,
            network,
        } => {
            let path = commands::setup_config(output, database, network.as_deref())?;
            println!("Config has been saved to {}", path.display());
        }
        Commands::Run {
            config,
            log_file,
            metrics_port,
        } => {
            let config = NodeConfig::get_config(config)?;
            start_node(config, log_file.map(PathBuf::from), metrics_port).await?;
        }
        Commands::Balance {
            account,
            include_unconfirmed,
            config,
        } => {
            let node = open_node(config)?;
            let account = AccountId::from(account);
            print_json(&commands::balance(&node.ledger, &account, include_unconfirmed)?)?;
        }
        Commands::Transfer {
            from,
            to,
            amount,
            config,
        } => {
            let amount = commands::parse_transfer_amount(&amount)?;
            let node = open_node(config)?;
            print_json(&commands::transfer(
                &node.ledger,
                &AccountId::from(from),
                &AccountId::from(to),
                amount,
            )?)?;
        }
        Commands::BatchTransfer { changes, config } => {
            let node = open_node(config)?;
            print_json(&commands::batch_transfer(&node.ledger, &changes)?)?;
        }
        Commands::RequestWithdrawal {
            account,
            address,
            amount,
            config,
        } => {
            let amount = commands::parse_withdraw_amount(&amount)?;
            let node = open_node(config)?;
            let quote =
                commands::request_withdrawal(&node.ledger, &AccountId::from(account), &address, amount)
                    .await?;
            print_json(&quote)?;
        }
        Commands::WithdrawalStatus {
            request_id,
            txid,
            config,
        } => {
            let node = open_node(config)?;
            print_json(&commands::withdrawal_status(
                &node.ledger,
                request_id.as_deref(),
                txid.as_deref(),
            )?)?;
        }
        Commands::ExpireWithdrawals { config } => {
            let node = open_node(config)?;
            print_json(&commands::expire_withdrawals(&node.ledger)?)?;
        }
        Commands::Audit { config } => {
            let node = open_node(config)?;
            print_json(&commands::audit(&node.ledger)?)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    run(cli.command).await.inspect_err(|e| {
        eprintln!("Error: {e}");
    })
}
