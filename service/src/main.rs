// Reads one JSON command per stdin line and answers on stdout
use hollow_raffle::{
    config::ServiceSettings,
    ledger::{FileLedger, LedgerStore, MemoryLedger},
    oracle::ChainOracle,
    raffle_error::CommandError,
    raffle_service::FailureResponse,
    rpc_oracle::RpcChainOracle,
    RaffleCommand, RaffleResponse, RaffleService,
};

use std::{process::ExitCode, sync::Arc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> ExitCode {
    solana_logger::setup_with_default("info");

    let settings = match ServiceSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = Arc::new(settings.raffle.clone());
    let oracle = RpcChainOracle::new(&settings.rpc_url, settings.rpc_timeout);

    log::info!("Hollow Raffle service is running");
    log::info!("RPC endpoint: {}", oracle.url());

    let served = match &settings.ledger_path {
        Some(path) => match FileLedger::open(path).await {
            Ok(ledger) => {
                log::info!("Ledger: file {}", ledger.path().display());
                serve(RaffleService::new(config, Arc::new(ledger), oracle)).await
            }
            Err(e) => {
                log::error!("Failed to open ledger {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            log::warn!("Ledger: in-memory, tickets are lost on exit");
            serve(RaffleService::new(config, Arc::new(MemoryLedger::new()), oracle)).await
        }
    };

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("I/O error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve<L: LedgerStore, O: ChainOracle>(service: RaffleService<L, O>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match RaffleCommand::unpack(&line) {
            Ok(command) => service.process(command).await,
            Err(e @ CommandError::Malformed(_)) => {
                log::warn!("Undecodable command: {:?}", e);
                RaffleResponse::Failure(FailureResponse::new(e.to_string()))
            }
        };

        let mut body = serde_json::to_vec(&response)?;
        body.push(b'\n');
        stdout.write_all(&body).await?;
        stdout.flush().await?;
    }
    Ok(())
}
