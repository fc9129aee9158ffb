// SPDX-License-Identifier: MIT

//! Distance helpers and stop ordering for handler routes.

use crate::error::AppError;
use crate::models::PickupRequest;
use geo::{Distance, Haversine, Point};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Great-circle distance in kilometres.
pub fn distance_km(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b) / 1000.0
}

/// Starting point from optional request coordinates.
///
/// Both or neither must be given, and they must be in range.
pub fn origin(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Point<f64>>, AppError> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(AppError::BadRequest("lat/lon out of range".to_string()));
            }
            Ok(Some(Point::new(lon, lat)))
        }
        (None, None) => Ok(None),
        _ => Err(AppError::BadRequest(
            "lat and lon must be given together".to_string(),
        )),
    }
}

/// One stop in a planned route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RouteStop {
    pub pickup_id: String,
    pub display_address: String,
    pub lat: f64,
    pub lon: f64,
    /// Distance from the previous stop (or the origin)
    pub leg_km: f64,
}

/// Order pickups by greedy nearest neighbour.
///
/// Starts from `origin` if given, otherwise from the first pickup.
pub fn order_stops(origin: Option<Point<f64>>, pickups: &[PickupRequest]) -> Vec<RouteStop> {
    let mut remaining: Vec<&PickupRequest> = pickups.iter().collect();
    let mut stops = Vec::with_capacity(remaining.len());
    let mut position = origin;

    while !remaining.is_empty() {
        let next_index = match position {
            Some(here) => remaining
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    distance_km(here, a.location.point())
                        .total_cmp(&distance_km(here, b.location.point()))
                })
                .map(|(i, _)| i)
                .unwrap_or(0),
            None => 0,
        };

        let pickup = remaining.remove(next_index);
        let point = pickup.location.point();
        stops.push(RouteStop {
            pickup_id: pickup.id.clone(),
            display_address: pickup.location.display_address.clone(),
            lat: pickup.location.lat,
            lon: pickup.location.lon,
            leg_km: position.map_or(0.0, |here| distance_km(here, point)),
        });
        position = Some(point);
    }

    stops
}
