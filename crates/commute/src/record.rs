//! Commute record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use greenmile_core::utils::timestamp_secs;

use crate::CommuteError;

/// Transportation method for a commute.
///
/// Each method carries a fixed emission factor in kg CO₂ per km; driving a
/// car is the baseline every other method is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommuteMethod {
    Bike,
    Walk,
    Carpool,
    PublicTransport,
    ElectricVehicle,
    Car,
}

impl CommuteMethod {
    /// Emission factor of the car baseline, in kg CO₂ per km
    pub const BASELINE_FACTOR: f64 = 0.10;

    /// Emission factor for this method, in kg CO₂ per km
    pub fn carbon_factor(&self) -> f64 {
        match self {
            CommuteMethod::Bike => 0.08,
            CommuteMethod::Walk => 0.0,
            CommuteMethod::Carpool => 0.04,
            CommuteMethod::PublicTransport => 0.02,
            CommuteMethod::ElectricVehicle => 0.05,
            CommuteMethod::Car => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommuteMethod::Bike => "bike",
            CommuteMethod::Walk => "walk",
            CommuteMethod::Carpool => "carpool",
            CommuteMethod::PublicTransport => "public_transport",
            CommuteMethod::ElectricVehicle => "electric_vehicle",
            CommuteMethod::Car => "car",
        }
    }
}

impl FromStr for CommuteMethod {
    type Err = CommuteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bike" => Ok(CommuteMethod::Bike),
            "walk" => Ok(CommuteMethod::Walk),
            "carpool" => Ok(CommuteMethod::Carpool),
            "public_transport" => Ok(CommuteMethod::PublicTransport),
            "electric_vehicle" => Ok(CommuteMethod::ElectricVehicle),
            "car" => Ok(CommuteMethod::Car),
            other => Err(CommuteError::Validation(format!(
                "invalid transportation method: {other}"
            ))),
        }
    }
}

impl fmt::Display for CommuteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval status of a commute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommuteStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for CommuteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommuteStatus::Pending => "pending",
            CommuteStatus::Approved => "approved",
            CommuteStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for CommuteStatus {
    type Err = CommuteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommuteStatus::Pending),
            "approved" => Ok(CommuteStatus::Approved),
            "rejected" => Ok(CommuteStatus::Rejected),
            other => Err(CommuteError::Validation(format!("invalid status: {other}"))),
        }
    }
}

/// A logged commute. Immutable once created, except for status transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commute {
    pub id: String,
    /// Owning employee
    pub employee_id: String,
    /// The day the commute happened, supplied by the client
    pub date: DateTime<Utc>,
    pub method: CommuteMethod,
    pub start_location: String,
    pub end_location: String,
    pub distance_km: f64,
    /// Derived at logging time from the method and distance
    pub carbon_saved_kg: f64,
    pub status: CommuteStatus,
    pub created_at: u64,
}

impl Commute {
    pub(crate) fn new(
        employee_id: &str,
        date: DateTime<Utc>,
        method: CommuteMethod,
        start_location: &str,
        end_location: &str,
        distance_km: f64,
        carbon_saved_kg: f64,
    ) -> Self {
        Self {
            id: format!("commute-{}", Uuid::new_v4()),
            employee_id: employee_id.to_string(),
            date,
            method,
            start_location: start_location.to_string(),
            end_location: end_location.to_string(),
            distance_km,
            carbon_saved_kg,
            status: CommuteStatus::Pending,
            created_at: timestamp_secs(),
        }
    }
}
