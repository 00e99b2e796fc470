//! Per-slot pricing policies.
//!
//! A policy maps a slot index to a price in the input unit (e.g. currency per
//! kilowatt-hour). The tariff generator asks the policy once per slot, so any
//! shape of daily curve can be plugged in.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price source for one slot of a recurring tariff schedule.
pub trait PricingPolicy {
    /// `None` when the price is not representable as a [`Decimal`].
    fn price_for_slot(&self, slot: usize) -> Option<Decimal>;
}

impl<F> PricingPolicy for F
where
    F: Fn(usize) -> Decimal,
{
    fn price_for_slot(&self, slot: usize) -> Option<Decimal> {
        Some(self(slot))
    }
}

/// The same price for every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uniform(pub Decimal);

impl PricingPolicy for Uniform {
    fn price_for_slot(&self, _slot: usize) -> Option<Decimal> {
        Some(self.0)
    }
}

/// Even slots pay `even`, odd slots pay `odd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternating {
    pub even: Decimal,
    pub odd: Decimal,
}

impl Default for Alternating {
    fn default() -> Self {
        Self {
            even: Decimal::new(1, 3),
            odd: Decimal::new(2, 3),
        }
    }
}

impl PricingPolicy for Alternating {
    fn price_for_slot(&self, slot: usize) -> Option<Decimal> {
        Some(if slot % 2 == 0 { self.even } else { self.odd })
    }
}

/// `a * i^2 + b * i + c` evaluated at slot `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadraticCurve {
    pub a: Decimal,
    pub b: Decimal,
    pub c: Decimal,
}

impl QuadraticCurve {
    pub const fn new(a: Decimal, b: Decimal, c: Decimal) -> Self {
        Self { a, b, c }
    }

    /// Slot with the extreme value, if the curve has one and it is representable.
    pub fn vertex(&self) -> Option<Decimal> {
        if self.a.is_zero() {
            return None;
        }
        (-self.b).checked_div(Decimal::TWO.checked_mul(self.a)?)
    }
}

/// Day curve `-0.1 i^2 + 6 i + 5`, peaking at slot 30.
impl Default for QuadraticCurve {
    fn default() -> Self {
        Self::new(Decimal::new(-1, 1), Decimal::from(6), Decimal::from(5))
    }
}

impl PricingPolicy for QuadraticCurve {
    fn price_for_slot(&self, slot: usize) -> Option<Decimal> {
        let i = Decimal::from(slot);
        let square = self.a.checked_mul(i)?.checked_mul(i)?;
        square.checked_add(self.b.checked_mul(i)?)?.checked_add(self.c)
    }
}

/// Serializable choice of one of the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PolicyKind {
    Uniform { price: Decimal },
    Alternating { even: Decimal, odd: Decimal },
    Quadratic { a: Decimal, b: Decimal, c: Decimal },
}

impl Default for PolicyKind {
    fn default() -> Self {
        let Alternating { even, odd } = Alternating::default();
        Self::Alternating { even, odd }
    }
}

impl PricingPolicy for PolicyKind {
    fn price_for_slot(&self, slot: usize) -> Option<Decimal> {
        match *self {
            Self::Uniform { price } => Uniform(price).price_for_slot(slot),
            Self::Alternating { even, odd } => Alternating { even, odd }.price_for_slot(slot),
            Self::Quadratic { a, b, c } => QuadraticCurve::new(a, b, c).price_for_slot(slot),
        }
    }
}
