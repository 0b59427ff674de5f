//! Geofence evaluation. Pure functions over a zone, a position and the
//! tracked fixes leading up to it; no clock, no storage.

use crate::error::ZoneError;
use crate::types::geo::{Coordinate, DwellSample, Evaluation, GeofenceZone, ZoneShape};
use chrono::Duration;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub inside: bool,
    pub distance_meters: f64,
}

/// Where a single position sits relative to the zone, ignoring dwell.
pub fn place(zone: &GeofenceZone, position: Coordinate) -> Result<Placement, ZoneError> {
    validate_shape(&zone.shape)?;
    let distance_meters = distance_to_zone(zone, position);
    Ok(Placement {
        inside: distance_meters <= zone.shape.effective_radius_meters(),
        distance_meters,
    })
}

/// Evaluates `fix` against the zone. Dwell is the unbroken inside run that
/// ends at `fix.at`; `history` samples later than the fix are ignored and a
/// silence longer than `max_gap` breaks the run.
pub fn evaluate(
    zone: &GeofenceZone,
    fix: DwellSample,
    history: &[DwellSample],
    max_gap: Duration,
) -> Result<Evaluation, ZoneError> {
    let Placement {
        inside,
        distance_meters,
    } = place(zone, fix.position)?;
    let dwelled_seconds = if inside {
        trailing_dwell_seconds(zone, fix.at, history, max_gap)
    } else {
        0
    };
    let dwell_satisfied =
        inside && (zone.required_dwell_seconds == 0 || dwelled_seconds >= zone.required_dwell_seconds);
    Ok(Evaluation {
        inside,
        distance_meters,
        dwell_satisfied,
        dwelled_seconds,
    })
}

pub fn validate_shape(shape: &ZoneShape) -> Result<(), ZoneError> {
    match shape {
        ZoneShape::Circle { radius_meters } => {
            if !radius_meters.is_finite() || *radius_meters <= 0.0 {
                return Err(ZoneError::InvalidZoneConfig {
                    reason: format!("radius must be positive, got {radius_meters}"),
                });
            }
        }
        ZoneShape::Polygon {
            vertices,
            buffer_meters,
        } => {
            if vertices.len() < 3 {
                return Err(ZoneError::InvalidZoneConfig {
                    reason: format!("polygon needs at least 3 vertices, got {}", vertices.len()),
                });
            }
            if vertices.iter().any(|vertex| !vertex.is_valid()) {
                return Err(ZoneError::InvalidZoneConfig {
                    reason: "polygon vertex is not a valid coordinate".to_string(),
                });
            }
            if !buffer_meters.is_finite() || *buffer_meters < 0.0 {
                return Err(ZoneError::InvalidZoneConfig {
                    reason: format!("buffer must be non-negative, got {buffer_meters}"),
                });
            }
        }
    }
    Ok(())
}

/// Great-circle distance (haversine).
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Distance from the zone boundary reference: the center for circles, the
/// nearest edge for polygons (zero when the point lies inside the ring).
pub fn distance_to_zone(zone: &GeofenceZone, position: Coordinate) -> f64 {
    match &zone.shape {
        ZoneShape::Circle { .. } => haversine_meters(position, zone.center),
        ZoneShape::Polygon { vertices, .. } => {
            if point_in_polygon(position, vertices) {
                0.0
            } else {
                nearest_edge_meters(position, vertices)
            }
        }
    }
}

/// Ray casting on the raw lon/lat plane. Points exactly on an edge may land on
/// either side; the buffer absorbs that.
pub fn point_in_polygon(point: Coordinate, vertices: &[Coordinate]) -> bool {
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = vertices.len().wrapping_sub(1);
    for (i, vi) in vertices.iter().enumerate() {
        let vj = vertices[j];
        let (xi, yi) = (vi.longitude, vi.latitude);
        let (xj, yj) = (vj.longitude, vj.latitude);
        if (yi > y) != (yj > y) {
            let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Projects the ring onto a local equirectangular plane centered on `point`
/// and returns the shortest point-to-segment distance. Accurate for zone-sized
/// polygons; does not handle rings crossing the antimeridian.
fn nearest_edge_meters(point: Coordinate, vertices: &[Coordinate]) -> f64 {
    let meters_per_degree = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;
    let lon_scale = point.latitude.to_radians().cos();
    let project = |c: &Coordinate| {
        (
            (c.longitude - point.longitude) * lon_scale * meters_per_degree,
            (c.latitude - point.latitude) * meters_per_degree,
        )
    };

    let mut best = f64::INFINITY;
    for (i, start) in vertices.iter().enumerate() {
        let end = &vertices[(i + 1) % vertices.len()];
        let (ax, ay) = project(start);
        let (bx, by) = project(end);
        best = best.min(origin_to_segment(ax, ay, bx, by));
    }
    best
}

fn origin_to_segment(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (px, py) = (ax + t * dx, ay + t * dy);
    (px * px + py * py).sqrt()
}

fn contains(zone: &GeofenceZone, position: Coordinate) -> bool {
    distance_to_zone(zone, position) <= zone.shape.effective_radius_meters()
}

/// Walks back from `until` through the samples taken at or before it. The
/// run starts at the earliest inside sample reachable without crossing an
/// outside sample or a gap wider than `max_gap`.
fn trailing_dwell_seconds(
    zone: &GeofenceZone,
    until: chrono::DateTime<chrono::Utc>,
    samples: &[DwellSample],
    max_gap: Duration,
) -> u32 {
    let mut ordered: Vec<&DwellSample> = samples.iter().filter(|sample| sample.at <= until).collect();
    ordered.sort_by(|a, b| b.at.cmp(&a.at));

    let mut run_start = until;
    for sample in ordered {
        if run_start - sample.at > max_gap || !contains(zone, sample.position) {
            break;
        }
        run_start = sample.at;
    }
    u32::try_from((until - run_start).num_seconds().max(0)).unwrap_or(u32::MAX)
}
