//! Role-bound access to the charging contract.
//!
//! Every role talks through the same signing client; what differs is the set
//! of contract calls it is allowed to send. A role is therefore just a list of
//! call selectors, checked before anything is signed.

use std::fmt;

use alloy::{
    hex,
    network::TransactionBuilder,
    primitives::{Address, U256},
    providers::Provider,
    rpc::types::{TransactionReceipt, TransactionRequest},
    sol_types::SolCall,
};
use anyhow::{Context, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    provider::ClientContext,
    sol_types::{
        ChargingNetwork::{
            acceptSmartChargingCall, acknowledgeChargingCall, connectCall, disconnectCall,
            isCPOCall, isCSCall, isEVCall, isRegisteredCall, proposeDealCall, registerCPOCall,
            registerCSCall, registerEVCall, registerNextRoamingCall, requestChargingCall,
            respondDealCall, scheduleSmartChargingCall, stopChargingCall,
            updateAutomaticRatesCall,
        },
        RateRegistryV1, RateRegistryV2,
    },
};

type Selector = [u8; 4];

const EV_CALLS: &[Selector] = &[
    registerEVCall::SELECTOR,
    proposeDealCall::SELECTOR,
    connectCall::SELECTOR,
    disconnectCall::SELECTOR,
    updateAutomaticRatesCall::SELECTOR,
    requestChargingCall::SELECTOR,
    stopChargingCall::SELECTOR,
    scheduleSmartChargingCall::SELECTOR,
    acceptSmartChargingCall::SELECTOR,
];

const CS_CALLS: &[Selector] = &[connectCall::SELECTOR, acknowledgeChargingCall::SELECTOR];

const CPO_CALLS: &[Selector] = &[
    registerCPOCall::SELECTOR,
    registerCSCall::SELECTOR,
    respondDealCall::SELECTOR,
    registerNextRoamingCall::SELECTOR,
    RateRegistryV1::setRatesCall::SELECTOR,
    RateRegistryV2::setRatesCall::SELECTOR,
];

const ORACLE_CALLS: &[Selector] =
    &[RateRegistryV1::setRatesCall::SELECTOR, RateRegistryV2::setRatesCall::SELECTOR];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Electric vehicle.
    Ev,
    /// Charging station.
    Cs,
    /// Charge point operator.
    Cpo,
    /// Off-chain rate publisher.
    Oracle,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ev => "ev",
            Self::Cs => "cs",
            Self::Cpo => "cpo",
            Self::Oracle => "oracle",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("role `{role}` may not call `{call}` (0x{})", hex::encode(.selector))]
pub struct OperationNotPermitted {
    pub role: Role,
    pub call: &'static str,
    pub selector: Selector,
}

impl Role {
    /// Selectors of the state-changing calls this role may send.
    pub fn bindings(self) -> &'static [Selector] {
        match self {
            Self::Ev => EV_CALLS,
            Self::Cs => CS_CALLS,
            Self::Cpo => CPO_CALLS,
            Self::Oracle => ORACLE_CALLS,
        }
    }

    pub fn permits(self, selector: Selector) -> bool {
        self.bindings().contains(&selector)
    }

    pub fn check<C: SolCall>(self) -> Result<(), OperationNotPermitted> {
        if self.permits(C::SELECTOR) {
            Ok(())
        } else {
            Err(OperationNotPermitted { role: self, call: C::SIGNATURE, selector: C::SELECTOR })
        }
    }
}

/// Registration flags of one account as reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Registration {
    pub registered: bool,
    pub ev: bool,
    pub cpo: bool,
    pub cs: bool,
}

/// Random nonce a station hands to a vehicle for the connection handshake.
pub fn generate_nonce() -> U256 {
    U256::from(rand::rng().random::<u64>())
}

/// A [`ClientContext`] acting in one role.
#[derive(Clone, Copy)]
pub struct RoleClient<'a> {
    ctx: &'a ClientContext,
    role: Role,
}

impl<'a> RoleClient<'a> {
    pub fn new(ctx: &'a ClientContext, role: Role) -> Self {
        Self { ctx, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn address(&self) -> Address {
        self.ctx.signer_address()
    }

    /// Sign and send `call`, then wait for it to be mined.
    pub async fn send<C: SolCall>(&self, call: C) -> anyhow::Result<TransactionReceipt> {
        self.role.check::<C>()?;

        let tx = TransactionRequest::default()
            .with_to(self.ctx.contract())
            .with_input(call.abi_encode());
        info!(role = %self.role, call = C::SIGNATURE, "sending");
        let pending_tx = self.ctx.provider().send_transaction(tx).await?;
        let tx_hash = *pending_tx.tx_hash();
        info!(%tx_hash, "waiting for tx to be mined");

        let receipt = pending_tx.get_receipt().await?;
        if !receipt.status() {
            bail!("`{}` reverted in tx {tx_hash}", C::SIGNATURE);
        }
        info!(%receipt.gas_used, %tx_hash, "tx mined");
        Ok(receipt)
    }

    /// Read-only call; open to every role.
    pub async fn call<C: SolCall>(&self, call: C) -> anyhow::Result<C::Return> {
        let tx = TransactionRequest::default()
            .with_from(self.address())
            .with_to(self.ctx.contract())
            .with_input(call.abi_encode());
        let output = self.ctx.provider().call(tx).await?;
        C::abi_decode_returns(&output).with_context(|| format!("decoding `{}`", C::SIGNATURE))
    }

    /// Register the signing account under its own role.
    pub async fn register(&self, automatic_rates: bool) -> anyhow::Result<TransactionReceipt> {
        match self.role {
            Role::Ev => self.send(registerEVCall {}).await,
            Role::Cpo => self.send(registerCPOCall { automaticRates: automatic_rates }).await,
            Role::Cs => bail!("charging stations are registered by their operator"),
            Role::Oracle => bail!("the oracle is not a registered participant"),
        }
    }

    /// Register a charging station on behalf of this operator.
    pub async fn register_station(
        &self,
        cs: Address,
        power_discharge: U256,
    ) -> anyhow::Result<TransactionReceipt> {
        self.send(registerCSCall { cs, powerDischarge: power_discharge }).await
    }

    /// One half of the connection handshake; the station picks `nonce`, the
    /// vehicle echoes it.
    pub async fn connect(&self, peer: Address, nonce: U256) -> anyhow::Result<TransactionReceipt> {
        info!(role = %self.role, %peer, %nonce, "connecting");
        self.send(connectCall { peer, nonce }).await
    }

    pub async fn registration(&self, account: Address) -> anyhow::Result<Registration> {
        Ok(Registration {
            registered: self.call(isRegisteredCall { account }).await?,
            ev: self.call(isEVCall { account }).await?,
            cpo: self.call(isCPOCall { account }).await?,
            cs: self.call(isCSCall { account }).await?,
        })
    }
}
