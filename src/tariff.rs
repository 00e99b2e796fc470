//! Fixed-point tariff schedules.
//!
//! The ledger has no fractional numbers, so a price in currency per
//! energy-hour is rescaled to currency per energy-second and stored as
//! `round_half_up(price * precision / divisor)`. The schedule and the
//! precision it was scaled with always travel together, see [`PricedSchedule`].

use std::fmt;

use alloy::primitives::U256;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::PricingPolicy;

/// Number of slots in every observed schedule.
pub const DEFAULT_SLOT_COUNT: usize = 60;

/// Default fixed-point scaling factor.
pub const DEFAULT_PRECISION: u64 = 1_000_000_000;

pub type Result<T, E = TariffError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TariffError {
    #[error("invalid tariff configuration: {0}")]
    InvalidConfiguration(String),

    #[error("fixed-point rate does not fit in 64 bits")]
    ArithmeticOverflow,
}

/// Conversion from the price input unit to the on-chain unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitConversion {
    /// Per energy-hour to per energy-second: divide by 3600.
    #[default]
    PerHourToPerSecond,
    /// Per kilowatt-hour to per watt-second: divide by 3600 * 1000.
    PerKilowattHourToPerWattSecond,
    Custom(Decimal),
}

impl UnitConversion {
    pub fn divisor(self) -> Decimal {
        match self {
            Self::PerHourToPerSecond => Decimal::from(3600),
            Self::PerKilowattHourToPerWattSecond => Decimal::from(3_600_000),
            Self::Custom(divisor) => divisor,
        }
    }
}

/// Price scaled to an integer at some precision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FixedPointRate(pub u64);

impl FixedPointRate {
    /// `floor(price * precision / divisor + 0.5)`.
    pub fn from_price(price: Decimal, precision: u64, divisor: Decimal) -> Result<Self> {
        let scaled = price
            .checked_mul(Decimal::from(precision))
            .and_then(|product| product.checked_div(divisor))
            .and_then(|quotient| quotient.checked_add(Decimal::new(5, 1)))
            .ok_or(TariffError::ArithmeticOverflow)?;
        scaled.floor().to_u64().map(Self).ok_or(TariffError::ArithmeticOverflow)
    }
}

impl fmt::Display for FixedPointRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<FixedPointRate> for U256 {
    fn from(rate: FixedPointRate) -> Self {
        U256::from(rate.0)
    }
}

/// Slot-ordered rates; the index is the lookup key on chain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateSchedule(Vec<FixedPointRate>);

impl RateSchedule {
    /// All-zero schedule, used to clear previously published rates.
    pub fn zeroed(slot_count: usize) -> Self {
        Self(vec![FixedPointRate::default(); slot_count])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<FixedPointRate> {
        self.0.get(slot).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = FixedPointRate> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[FixedPointRate] {
        &self.0
    }

    pub fn to_u256_vec(&self) -> Vec<U256> {
        self.iter().map(Into::into).collect()
    }
}

impl IntoIterator for RateSchedule {
    type Item = FixedPointRate;
    type IntoIter = std::vec::IntoIter<FixedPointRate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Roaming surcharge, independent of the slot.
pub type RoamingSurcharge = FixedPointRate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffConfig {
    pub slot_count: usize,
    pub precision: u64,
    pub unit: UnitConversion,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            precision: DEFAULT_PRECISION,
            unit: UnitConversion::default(),
        }
    }
}

impl TariffConfig {
    fn validate(&self) -> Result<Decimal> {
        if self.slot_count == 0 {
            return Err(TariffError::InvalidConfiguration("slot count must be positive".into()));
        }
        validate_scaling(self.precision, self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoamingConfig {
    pub precision: u64,
    pub roaming_price: Decimal,
    pub unit: UnitConversion,
}

fn validate_scaling(precision: u64, unit: UnitConversion) -> Result<Decimal> {
    if precision == 0 {
        return Err(TariffError::InvalidConfiguration("precision must be positive".into()));
    }
    let divisor = unit.divisor();
    if divisor <= Decimal::ZERO {
        return Err(TariffError::InvalidConfiguration(format!(
            "unit divisor must be positive, got {divisor}"
        )));
    }
    Ok(divisor)
}

/// Compute one fixed-point rate per slot from the policy.
pub fn generate_rates(config: &TariffConfig, policy: &impl PricingPolicy) -> Result<RateSchedule> {
    let divisor = config.validate()?;
    (0..config.slot_count)
        .map(|slot| {
            let price = policy.price_for_slot(slot).ok_or(TariffError::ArithmeticOverflow)?;
            if price < Decimal::ZERO {
                return Err(TariffError::InvalidConfiguration(format!(
                    "negative price {price} for slot {slot}"
                )));
            }
            FixedPointRate::from_price(price, config.precision, divisor)
        })
        .collect::<Result<_>>()
        .map(RateSchedule)
}

pub fn generate_roaming(config: &RoamingConfig) -> Result<RoamingSurcharge> {
    let divisor = validate_scaling(config.precision, config.unit)?;
    if config.roaming_price < Decimal::ZERO {
        return Err(TariffError::InvalidConfiguration(format!(
            "negative roaming price {}",
            config.roaming_price
        )));
    }
    FixedPointRate::from_price(config.roaming_price, config.precision, divisor)
}

/// A schedule, its roaming surcharge and the precision both were scaled with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedSchedule {
    pub schedule: RateSchedule,
    pub roaming: RoamingSurcharge,
    pub precision: u64,
}

/// Everything needed to price a full tariff.
#[derive(Debug, Clone)]
pub struct Tariff<P> {
    pub config: TariffConfig,
    pub policy: P,
    pub roaming_price: Decimal,
}

impl<P: PricingPolicy> Tariff<P> {
    pub fn new(config: TariffConfig, policy: P, roaming_price: Decimal) -> Self {
        Self { config, policy, roaming_price }
    }

    pub fn generate(&self) -> Result<PricedSchedule> {
        let schedule = generate_rates(&self.config, &self.policy)?;
        let roaming = generate_roaming(&RoamingConfig {
            precision: self.config.precision,
            roaming_price: self.roaming_price,
            unit: self.config.unit,
        })?;
        Ok(PricedSchedule { schedule, roaming, precision: self.config.precision })
    }
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::pricing::{Alternating, QuadraticCurve, Uniform};

    fn config(slot_count: usize, precision: u64) -> TariffConfig {
        TariffConfig { slot_count, precision, unit: UnitConversion::PerHourToPerSecond }
    }

    #[test]
    fn alternates_even_and_odd_slots() {
        let policy = Alternating { even: dec!(0.001), odd: dec!(0.002) };
        let rates = generate_rates(&config(60, 1_000_000_000), &policy).unwrap();

        assert_eq!(rates.len(), 60);
        // 0.001 / 3600 * 1e9 = 277.77..
        assert_eq!(rates.get(0), Some(FixedPointRate(278)));
        assert_eq!(rates.get(1), Some(FixedPointRate(556)));
        assert!(rates.iter().step_by(2).all(|rate| rate == FixedPointRate(278)));
        assert!(rates.iter().skip(1).step_by(2).all(|rate| rate == FixedPointRate(556)));
    }

    #[test]
    fn alternates_at_pico_precision() {
        let policy = Alternating { even: dec!(0.001), odd: dec!(0.002) };
        let rates = generate_rates(&config(2, 1_000_000_000_000), &policy).unwrap();
        assert_eq!(rates.as_slice(), &[FixedPointRate(277_778), FixedPointRate(555_556)]);
    }

    #[test]
    fn roaming_surcharge() {
        let roaming = |precision| {
            generate_roaming(&RoamingConfig {
                precision,
                roaming_price: dec!(0.0001),
                unit: UnitConversion::PerHourToPerSecond,
            })
            .unwrap()
        };
        assert_eq!(roaming(1_000_000_000), FixedPointRate(28));
        assert_eq!(roaming(1_000_000_000_000), FixedPointRate(27_778));
    }

    #[test]
    fn kilowatt_hours_to_watt_seconds() {
        let config = TariffConfig {
            slot_count: 1,
            precision: 1_000_000_000_000,
            unit: UnitConversion::PerKilowattHourToPerWattSecond,
        };
        // 1.8 / 3.6e6 * 1e12 = 500000
        let rates = generate_rates(&config, &Uniform(dec!(1.8))).unwrap();
        assert_eq!(rates.get(0), Some(FixedPointRate(500_000)));
    }

    #[test]
    fn rounds_half_up() {
        let precision = 1_000_000_000;
        let divisor = dec!(3600);
        // 1800 / 3600 = 0.5 exactly
        assert_eq!(
            FixedPointRate::from_price(dec!(0.0000018), precision, divisor).unwrap(),
            FixedPointRate(1)
        );
        // 9000 / 3600 = 2.5 exactly; banker's rounding would give 2
        assert_eq!(
            FixedPointRate::from_price(dec!(0.000009), precision, divisor).unwrap(),
            FixedPointRate(3)
        );
        // just below the half
        assert_eq!(
            FixedPointRate::from_price(dec!(0.0000017999), precision, divisor).unwrap(),
            FixedPointRate(0)
        );
        assert_eq!(FixedPointRate::from_price(dec!(0), precision, divisor).unwrap(), FixedPointRate(0));
    }

    #[test]
    fn matches_rounding_law_for_random_prices() {
        let rng = &mut rand::rng();
        let divisor = dec!(3600);
        for _ in 0..200 {
            let price = Decimal::new(rng.random_range(0..10_000_000), rng.random_range(0..9));
            let precision = 10u64.pow(rng.random_range(0..13));
            let expected =
                (price * Decimal::from(precision) / divisor + dec!(0.5)).floor().to_u64().unwrap();
            assert_eq!(
                FixedPointRate::from_price(price, precision, divisor).unwrap(),
                FixedPointRate(expected),
                "price {price} precision {precision}"
            );
        }
    }

    #[test]
    fn length_and_determinism() {
        let rng = &mut rand::rng();
        for _ in 0..20 {
            let slot_count = rng.random_range(1..500);
            let policy = Alternating {
                even: Decimal::new(rng.random_range(0..1_000_000), 6),
                odd: Decimal::new(rng.random_range(0..1_000_000), 6),
            };
            let config = config(slot_count, DEFAULT_PRECISION);
            let first = generate_rates(&config, &policy).unwrap();
            let second = generate_rates(&config, &policy).unwrap();
            assert_eq!(first.len(), slot_count);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn quadratic_curve_rises_then_falls() {
        let curve = QuadraticCurve::default();
        let rates = generate_rates(&config(60, DEFAULT_PRECISION), &curve).unwrap();
        let rates = rates.as_slice();
        let vertex = 30;

        assert!(rates[..=vertex].windows(2).all(|w| w[0] < w[1]));
        assert!(rates[vertex..].windows(2).all(|w| w[0] > w[1]));
        assert_eq!(rates.iter().max(), Some(&rates[vertex]));
    }

    #[test]
    fn rejects_invalid_configuration() {
        let policy = Uniform(dec!(0.001));
        assert!(matches!(
            generate_rates(&config(0, DEFAULT_PRECISION), &policy),
            Err(TariffError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            generate_rates(&config(60, 0), &policy),
            Err(TariffError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            generate_rates(&config(60, DEFAULT_PRECISION), &Uniform(dec!(-0.001))),
            Err(TariffError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            generate_rates(
                &config(60, DEFAULT_PRECISION),
                &Alternating { even: dec!(0.001), odd: dec!(-0.002) }
            ),
            Err(TariffError::InvalidConfiguration(_))
        ));

        let bad_unit = TariffConfig {
            unit: UnitConversion::Custom(dec!(0)),
            ..TariffConfig::default()
        };
        assert!(matches!(
            generate_rates(&bad_unit, &policy),
            Err(TariffError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_invalid_roaming() {
        let roaming = RoamingConfig {
            precision: DEFAULT_PRECISION,
            roaming_price: dec!(-0.0001),
            unit: UnitConversion::PerHourToPerSecond,
        };
        assert!(matches!(generate_roaming(&roaming), Err(TariffError::InvalidConfiguration(_))));
        assert!(matches!(
            generate_roaming(&RoamingConfig { precision: 0, roaming_price: dec!(0.0001), ..roaming }),
            Err(TariffError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn curve_going_negative_is_rejected() {
        // -0.1 * 61^2 + 6 * 61 + 5 < 0
        let err = generate_rates(&config(62, DEFAULT_PRECISION), &QuadraticCurve::default())
            .unwrap_err();
        assert!(err.to_string().contains("slot 61"), "{err}");
    }

    #[test]
    fn reports_overflow_instead_of_wrapping() {
        let huge = config(1, u64::MAX);
        assert_eq!(
            generate_rates(&huge, &Uniform(dec!(1000000000))),
            Err(TariffError::ArithmeticOverflow)
        );
    }

    #[test]
    fn curve_overflow_is_an_error() {
        let curve = QuadraticCurve::new(Decimal::MAX, Decimal::MAX, dec!(0));
        assert_eq!(
            generate_rates(&config(4, DEFAULT_PRECISION), &curve),
            Err(TariffError::ArithmeticOverflow)
        );
    }

    #[test]
    fn converts_to_contract_words() {
        let policy = Alternating { even: dec!(0.001), odd: dec!(0.002) };
        let rates = generate_rates(&config(3, DEFAULT_PRECISION), &policy).unwrap();
        assert_eq!(rates.to_u256_vec(), vec![U256::from(278), U256::from(556), U256::from(278)]);
    }

    #[test]
    fn tariff_keeps_precision_with_schedule() {
        let tariff = Tariff::new(TariffConfig::default(), Alternating::default(), dec!(0.0001));
        let priced = tariff.generate().unwrap();
        assert_eq!(priced.precision, DEFAULT_PRECISION);
        assert_eq!(priced.schedule.len(), DEFAULT_SLOT_COUNT);
        assert_eq!(priced.roaming, FixedPointRate(28));
    }

    #[test]
    fn zeroed_schedule() {
        let rates = RateSchedule::zeroed(60);
        assert_eq!(rates.len(), 60);
        assert!(rates.iter().all(|rate| rate == FixedPointRate(0)));
        assert!(rates.to_u256_vec().iter().all(|value| value.is_zero()));
    }
}
