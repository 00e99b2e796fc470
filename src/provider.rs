//! Client context: a signing websocket provider bound to one contract.
//!
//! The context is built explicitly, handed to whatever needs chain access and
//! closed when the caller is done with it. Nothing here is global.

use std::time::Duration;

use alloy::{
    eips::BlockNumberOrTag,
    network::{Ethereum, EthereumWallet},
    primitives::Address,
    providers::{
        Provider, ProviderBuilder, RootProvider, WalletProvider,
        fillers::{FillProvider, JoinFill, WalletFiller},
        utils::JoinedRecommendedFillers,
    },
    rpc::types::{Filter, Log},
    signers::local::{LocalSignerError, PrivateKeySigner},
    sol_types::SolEvent,
    transports::{http::reqwest::Url, ws::WsConnect},
};
use anyhow::Context;
use futures::{Stream, StreamExt};
use tracing::{error, info};

/// Provider over a websocket connection, with a wallet filler ready to sign.
pub type WsProviderWithWallet = FillProvider<
    JoinFill<JoinedRecommendedFillers, WalletFiller<EthereumWallet>>,
    RootProvider,
    Ethereum,
>;

/// Build a local signer from a hex encoded private key, `0x` prefix optional.
pub fn build_signer(private_key: &str) -> Result<PrivateKeySigner, LocalSignerError> {
    private_key.trim().parse()
}

#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub url: Url,
    pub signer: PrivateKeySigner,
    pub contract: Address,
    pub max_retries: u32,
    pub retry_interval: Duration,
}

impl ClientConfig {
    pub fn new(url: Url, signer: PrivateKeySigner, contract: Address) -> Self {
        Self {
            url,
            signer,
            contract,
            max_retries: 12,
            retry_interval: Duration::from_secs(5),
        }
    }
}

/// An open connection to the node, signing as one account, talking to one contract.
pub struct ClientContext {
    provider: WsProviderWithWallet,
    contract: Address,
}

impl ClientContext {
    pub async fn connect(cfg: ClientConfig) -> anyhow::Result<Self> {
        let ws = WsConnect::new(cfg.url.clone())
            .with_max_retries(cfg.max_retries)
            .with_retry_interval(cfg.retry_interval);
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(cfg.signer))
            .connect_pubsub_with(ws)
            .await
            .map_err(|err| {
                error!(?err, url = %cfg.url, "failed to connect to node");
                err
            })
            .context("websocket connection failed")?;
        let ctx = Self { provider, contract: cfg.contract };
        info!(account = %ctx.signer_address(), contract = %ctx.contract, "connected");
        Ok(ctx)
    }

    pub fn provider(&self) -> &WsProviderWithWallet {
        &self.provider
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Account that signs every transaction sent through this context.
    pub fn signer_address(&self) -> Address {
        self.provider.default_signer_address()
    }

    /// create an event stream of event type `E`, subscribing since `from_block` on the contract
    pub async fn event_stream<E: SolEvent>(
        &self,
        from_block: BlockNumberOrTag,
    ) -> anyhow::Result<impl Stream<Item = Log<E>> + Send + use<E>> {
        let filter = Filter::new()
            .address(self.contract)
            .event(E::SIGNATURE)
            .from_block(from_block);

        let events = self
            .provider
            .subscribe_logs(&filter)
            .await
            .map_err(|err| {
                error!(?err, event = E::SIGNATURE, "pubsub subscription failed");
                err
            })?
            .into_stream();

        let validated = events.filter_map(|log| async move {
            match log.log_decode_validate::<E>() {
                Ok(event) => Some(event),
                Err(err) => {
                    error!(%err, event = E::SIGNATURE, "failed to parse event log");
                    None
                }
            }
        });

        Ok(validated)
    }

    /// Drop the connection. Streams obtained from [`Self::event_stream`] end once
    /// the backend shuts down.
    pub fn close(self) {
        info!(account = %self.signer_address(), "closing connection");
        drop(self.provider);
    }
}
