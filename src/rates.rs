//! Publishing priced schedules to the rate registry.

use std::{fmt, str::FromStr};

use alloy::{
    primitives::{Address, B256, U256},
    rpc::types::{Log, TransactionReceipt},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    role::RoleClient,
    sol_types::{
        ChargingNetwork::{NewRates, registerNextRoamingCall},
        RateRegistryV1, RateRegistryV2,
    },
    tariff::{PricedSchedule, RoamingSurcharge},
};

/// Price regions the oracle publishes for when none are configured.
pub const DEFAULT_REGIONS: [&str; 4] = ["SE1", "SE2", "SE3", "SE4"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("region tag must be 1 to 32 ASCII bytes, got {0:?}")]
    InvalidRegion(String),

    #[error("registry {0} requires a region tag")]
    MissingRegion(RegistryVersion),
}

/// ASCII region name, right-padded with zeros into a `bytes32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionTag(B256);

impl RegionTag {
    pub fn as_b256(&self) -> B256 {
        self.0
    }

    pub fn defaults() -> Vec<Self> {
        DEFAULT_REGIONS.iter().filter_map(|name| name.parse().ok()).collect()
    }
}

impl FromStr for RegionTag {
    type Err = SubmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 32 || !s.is_ascii() || s.contains('\0') {
            return Err(SubmissionError::InvalidRegion(s.to_owned()));
        }
        let mut bytes = [0u8; 32];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(B256::from(bytes)))
    }
}

impl TryFrom<String> for RegionTag {
    type Error = SubmissionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for RegionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(32);
        f.write_str(&String::from_utf8_lossy(&self.0[..end]))
    }
}

impl From<RegionTag> for String {
    fn from(tag: RegionTag) -> Self {
        tag.to_string()
    }
}

/// Shape of the registry's `setRates` call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RegistryVersion {
    /// `(owner, rates, roaming, precision)`
    V1,
    /// `(owner, region, rates, roaming, precision)`
    #[default]
    V2,
}

impl fmt::Display for RegistryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSubmission {
    pub owner: Address,
    pub region: Option<RegionTag>,
    pub priced: PricedSchedule,
}

impl RateSubmission {
    pub fn v1_call(&self) -> RateRegistryV1::setRatesCall {
        RateRegistryV1::setRatesCall {
            owner: self.owner,
            rates: self.priced.schedule.to_u256_vec(),
            roaming: self.priced.roaming.into(),
            precision: U256::from(self.priced.precision),
        }
    }

    pub fn v2_call(&self) -> Result<RateRegistryV2::setRatesCall, SubmissionError> {
        let region = self.region.ok_or(SubmissionError::MissingRegion(RegistryVersion::V2))?;
        Ok(RateRegistryV2::setRatesCall {
            owner: self.owner,
            region: region.as_b256(),
            rates: self.priced.schedule.to_u256_vec(),
            roaming: self.priced.roaming.into(),
            precision: U256::from(self.priced.precision),
        })
    }
}

/// Send `submission` in the shape `version` expects and wait for the receipt.
pub async fn submit_rates(
    client: &RoleClient<'_>,
    version: RegistryVersion,
    submission: &RateSubmission,
) -> anyhow::Result<TransactionReceipt> {
    info!(
        owner = %submission.owner,
        region = ?submission.region.map(|r| r.to_string()),
        %version,
        slots = submission.priced.schedule.len(),
        precision = submission.priced.precision,
        "submitting rates"
    );
    match version {
        RegistryVersion::V1 => {
            if let Some(region) = submission.region {
                warn!(%region, "registry v1 has no regions, ignoring the tag");
            }
            client.send(submission.v1_call()).await
        }
        RegistryVersion::V2 => client.send(submission.v2_call()?).await,
    }
}

/// Announce the roaming surcharge that applies from the next rate period on.
pub async fn submit_next_roaming(
    client: &RoleClient<'_>,
    roaming: RoamingSurcharge,
) -> anyhow::Result<TransactionReceipt> {
    info!(%roaming, "submitting next roaming surcharge");
    client.send(registerNextRoamingCall { roaming: roaming.into() }).await
}

/// `NewRates` announcements among `logs`; other events are skipped.
pub fn announced_rates<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Vec<NewRates> {
    logs.into_iter()
        .filter_map(|log| log.log_decode::<NewRates>().ok())
        .map(|log| log.inner.data)
        .collect()
}
