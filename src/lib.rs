//! EV charging contract client and tariff schedule generator.
//!
//! The charging contract itself lives on chain. This crate prices fixed-point
//! tariff schedules for charge point operators and provides the bindings,
//! role-bound client and rate oracle that publish them.

pub mod deployer;
pub mod oracle;
pub mod pricing;
pub mod provider;
pub mod rates;
pub mod role;
mod sol_types;
pub mod tariff;

pub use sol_types::*;
