//! Rate oracle: answers on-chain rate requests with fresh schedules.

use alloy::{eips::BlockNumberOrTag, primitives::Address};
use futures::StreamExt;
use tracing::{error, info};

use crate::{
    pricing::PricingPolicy,
    provider::ClientContext,
    rates::{RateSubmission, RegionTag, RegistryVersion, submit_rates},
    role::{Role, RoleClient},
    sol_types::ChargingNetwork::RateRequest,
    tariff::Tariff,
};

pub struct Oracle<P> {
    pub tariff: Tariff<P>,
    pub owner: Address,
    pub regions: Vec<RegionTag>,
    pub version: RegistryVersion,
}

impl<P: PricingPolicy> Oracle<P> {
    /// Publish one schedule per region, in order. Returns how many regions were
    /// published; a failing region is logged and the rest still go out.
    pub async fn publish(&self, client: &RoleClient<'_>) -> anyhow::Result<usize> {
        let priced = self.tariff.generate()?;
        let mut published = 0;
        for region in &self.regions {
            let submission =
                RateSubmission { owner: self.owner, region: Some(*region), priced: priced.clone() };
            match submit_rates(client, self.version, &submission).await {
                Ok(receipt) => {
                    info!(%region, tx_hash = %receipt.transaction_hash, "rates published");
                    published += 1;
                }
                Err(err) => error!(%region, ?err, "failed to publish rates"),
            }
        }
        Ok(published)
    }

    /// Wait for `RateRequest` events from the latest block on and answer each
    /// one. Returns once the subscription ends.
    pub async fn run(&self, ctx: &ClientContext) -> anyhow::Result<()> {
        let client = RoleClient::new(ctx, Role::Oracle);
        let mut requests = Box::pin(ctx.event_stream::<RateRequest>(BlockNumberOrTag::Latest).await?);
        info!(regions = self.regions.len(), "waiting for rate requests");

        while let Some(request) = requests.next().await {
            info!(block = ?request.block_number, "new rate request");
            let published = self.publish(&client).await?;
            info!(published, total = self.regions.len(), "answered rate request");
        }

        info!("rate request stream ended");
        Ok(())
    }
}
