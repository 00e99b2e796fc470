mod cli;

use alloy::primitives::Address;
use anyhow::Context;
use clap::{Parser, crate_version};
use ev_charging_contract::{
    ChargingNetwork::updateAutomaticRatesCall,
    deployer::{deploy_bytecode, read_bytecode, write_address},
    oracle::Oracle,
    provider::ClientContext,
    rates::{RateSubmission, announced_rates, submit_next_roaming, submit_rates},
    role::{Role, RoleClient},
    tariff::generate_roaming,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();
    info!(version = crate_version!(), "starting…");

    match Args::parse().command {
        Command::Rates(args) => {
            let priced = args.tariff()?.generate()?;
            println!("{}", serde_json::to_string_pretty(&priced)?);
        }

        Command::Deploy(args) => {
            let bytecode = read_bytecode(&args.bytecode)?;
            let ctx = ClientContext::connect(args.node.client_config(Address::ZERO)?).await?;
            let address = deploy_bytecode("Contract", ctx.provider(), bytecode).await?;
            write_address(&args.address_file, address)?;
            info!(%address, file = %args.address_file.display(), "contract address saved");
            ctx.close();
        }

        Command::SubmitRates(args) => {
            let priced = args.tariff.tariff()?.generate()?;
            let ctx = ClientContext::connect(args.contract.client_config()?).await?;
            let client = RoleClient::new(&ctx, Role::Cpo);
            let submission = RateSubmission {
                owner: args.owner.unwrap_or_else(|| client.address()),
                region: args.region,
                priced,
            };
            let receipt = submit_rates(&client, args.registry, &submission).await?;
            info!(tx_hash = %receipt.transaction_hash, "rates registered");
            for announcement in announced_rates(receipt.inner.logs()) {
                info!(cpo = %announcement.cpo, region = %announcement.region, "new rates announced");
            }
            ctx.close();
        }

        Command::Oracle(args) => {
            let tariff = args.tariff.tariff()?;
            // reject a bad tariff before subscribing
            tariff.generate().context("invalid tariff")?;
            let ctx = ClientContext::connect(args.contract.client_config()?).await?;
            let oracle = Oracle {
                tariff,
                owner: args.owner.unwrap_or_else(|| ctx.signer_address()),
                regions: args.regions,
                version: args.registry,
            };
            oracle.run(&ctx).await?;
            ctx.close();
        }

        Command::Register(args) => {
            let ctx = ClientContext::connect(args.contract.client_config()?).await?;
            let receipt = RoleClient::new(&ctx, args.role).register(args.automatic_rates).await?;
            info!(role = %args.role, tx_hash = %receipt.transaction_hash, "registered");
            ctx.close();
        }

        Command::RegisterStation(args) => {
            let ctx = ClientContext::connect(args.contract.client_config()?).await?;
            let receipt = RoleClient::new(&ctx, Role::Cpo)
                .register_station(args.station, args.power_discharge)
                .await?;
            info!(station = %args.station, tx_hash = %receipt.transaction_hash, "station registered");
            ctx.close();
        }

        Command::RequestRates(args) => {
            let ctx = ClientContext::connect(args.client_config()?).await?;
            let receipt = RoleClient::new(&ctx, Role::Ev).send(updateAutomaticRatesCall {}).await?;
            info!(tx_hash = %receipt.transaction_hash, "rate update requested");
            ctx.close();
        }

        Command::NextRoaming(args) => {
            let roaming = generate_roaming(&args.roaming())?;
            let ctx = ClientContext::connect(args.contract.client_config()?).await?;
            let receipt = submit_next_roaming(&RoleClient::new(&ctx, Role::Cpo), roaming).await?;
            info!(%roaming, tx_hash = %receipt.transaction_hash, "next roaming registered");
            ctx.close();
        }

        Command::Connect(args) => {
            let nonce = args.nonce()?;
            let ctx = ClientContext::connect(args.contract.client_config()?).await?;
            let receipt = RoleClient::new(&ctx, args.role).connect(args.peer, nonce).await?;
            info!(peer = %args.peer, %nonce, tx_hash = %receipt.transaction_hash, "connected");
            ctx.close();
        }

        Command::Status(args) => {
            let ctx = ClientContext::connect(args.contract.client_config()?).await?;
            let client = RoleClient::new(&ctx, Role::Ev);
            let account = args.account.unwrap_or_else(|| client.address());
            let registration = client.registration(account).await?;
            println!("{}", serde_json::to_string_pretty(&registration)?);
            ctx.close();
        }
    }

    Ok(())
}
