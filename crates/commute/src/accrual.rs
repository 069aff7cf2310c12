//! Credit accrual policy.
//!
//! One canonical conversion from a commute to credits: carbon saved relative
//! to the car baseline, divided down into whole credits. The original system
//! carried a second distance-multiplier formula in its approval workflow;
//! that variant is deliberately not kept.

use serde::{Deserialize, Serialize};

use crate::record::CommuteMethod;

/// Carbon saved by a commute, in kg CO₂, relative to driving the same
/// distance by car. Never negative; a car commute saves nothing.
pub fn carbon_saved_kg(method: CommuteMethod, distance_km: f64) -> f64 {
    ((CommuteMethod::BASELINE_FACTOR - method.carbon_factor()) * distance_km).max(0.0)
}

/// Conversion policy from carbon saved to whole credits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualPolicy {
    /// Kilograms of CO₂ saved per credit earned
    pub kg_co2_per_credit: f64,
}

impl Default for AccrualPolicy {
    fn default() -> Self {
        Self {
            kg_co2_per_credit: 5.0,
        }
    }
}

impl AccrualPolicy {
    /// Whole credits earned for a commute. Monotonic in carbon saved and
    /// never negative.
    pub fn credits_for(&self, method: CommuteMethod, distance_km: f64) -> f64 {
        (carbon_saved_kg(method, distance_km) / self.kg_co2_per_credit).floor()
    }
}
