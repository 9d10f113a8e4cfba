//! Coordinate utilities: resolution test, lenient coercion, centroid and
//! bucket distribution.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A point in floating-point degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// A coordinate pair counts as resolved iff it exists and both components
/// are finite.
pub fn is_resolved(coordinates: Option<&Coordinates>) -> bool {
    coordinates.is_some_and(Coordinates::is_finite)
}

/// Coerce a single JSON component to a finite `f64`.
///
/// Numbers pass through, numeric strings are parsed once; anything else
/// (including `NaN`/`inf` spellings) yields `None`.
pub fn coerce_component(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Coerce a loosely-shaped JSON object into [`Coordinates`].
///
/// Accepts `{lat, lng}` as well as `{latitude, longitude}`; returns `None`
/// unless both components coerce to finite numbers.
pub fn coerce_coordinates(value: &Value) -> Option<Coordinates> {
    let obj = value.as_object()?;
    let lat = obj.get("lat").or_else(|| obj.get("latitude"))?;
    let lng = obj
        .get("lng")
        .or_else(|| obj.get("lon"))
        .or_else(|| obj.get("longitude"))?;
    Some(Coordinates::new(coerce_component(lat)?, coerce_component(lng)?))
}

/// `deserialize_with` helper for `Option<Coordinates>` fields coming from
/// generated content: unusable pairs become `None` instead of failing the
/// whole payload.
pub fn lenient_coordinates<'de, D>(deserializer: D) -> Result<Option<Coordinates>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(coerce_coordinates))
}

/// Arithmetic mean of latitudes and longitudes.
///
/// The empty set is defined as `(0, 0)`; callers should not rely on it.
pub fn centroid(points: &[Coordinates]) -> Coordinates {
    if points.is_empty() {
        return Coordinates::new(0.0, 0.0);
    }
    let n = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    Coordinates::new(lat / n, lng / n)
}

/// Allocate `ceil(N / D)` items per bucket in input order until the items run
/// out. Later buckets may stay empty; every item lands in exactly one bucket.
///
/// Returns `buckets` vectors; with zero buckets nothing can be assigned and
/// an empty vector is returned.
pub fn distribute<T>(items: Vec<T>, buckets: usize) -> Vec<Vec<T>> {
    if buckets == 0 {
        return Vec::new();
    }
    let per_bucket = items.len().div_ceil(buckets).max(1);
    let mut out: Vec<Vec<T>> = (0..buckets).map(|_| Vec::new()).collect();
    for (idx, item) in items.into_iter().enumerate() {
        out[idx / per_bucket].push(item);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn centroid_of_single_point_is_that_point() {
        let p = Coordinates::new(41.9028, 12.4964);
        assert_eq!(centroid(&[p]), p);
    }

    #[test]
    fn centroid_of_two_points_is_midpoint() {
        let c = centroid(&[Coordinates::new(0.0, 0.0), Coordinates::new(2.0, 2.0)]);
        assert_eq!(c, Coordinates::new(1.0, 1.0));
    }

    #[test]
    fn centroid_of_empty_set_is_origin() {
        assert_eq!(centroid(&[]), Coordinates::new(0.0, 0.0));
    }

    #[test]
    fn distribute_seven_over_three() {
        let buckets = distribute((1..=7).collect::<Vec<_>>(), 3);
        let counts: Vec<usize> = buckets.iter().map(Vec::len).collect();
        assert_eq!(counts, vec![3, 3, 1]);
        let flat: Vec<i32> = buckets.into_iter().flatten().collect();
        assert_eq!(flat, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn distribute_leaves_trailing_buckets_empty() {
        let buckets = distribute(vec!['a', 'b', 'c', 'd'], 3);
        let counts: Vec<usize> = buckets.iter().map(Vec::len).collect();
        assert_eq!(counts, vec![2, 2, 0]);
    }

    #[test]
    fn distribute_handles_degenerate_inputs() {
        assert!(distribute(vec![1, 2], 0).is_empty());
        let empty = distribute(Vec::<u8>::new(), 2);
        assert_eq!(empty.len(), 2);
        assert!(empty.iter().all(Vec::is_empty));
    }

    #[test]
    fn string_components_are_coerced_once() {
        let c = coerce_coordinates(&json!({ "lat": "41.9", "lng": 12.5 }));
        assert_eq!(c, Some(Coordinates::new(41.9, 12.5)));
    }

    #[test]
    fn non_numeric_components_stay_unresolved() {
        assert_eq!(coerce_coordinates(&json!({ "lat": "north", "lng": 12.5 })), None);
        assert_eq!(coerce_coordinates(&json!({ "lat": null, "lng": null })), None);
        assert_eq!(coerce_coordinates(&json!({ "lat": "NaN", "lng": "1" })), None);
    }

    #[test]
    fn latitude_longitude_keys_are_accepted() {
        let c = coerce_coordinates(&json!({ "latitude": 1, "longitude": "2" }));
        assert_eq!(c, Some(Coordinates::new(1.0, 2.0)));
    }

    #[test]
    fn resolution_requires_finite_components() {
        assert!(is_resolved(Some(&Coordinates::new(1.0, 2.0))));
        assert!(!is_resolved(Some(&Coordinates::new(f64::NAN, 2.0))));
        assert!(!is_resolved(None));
    }
}
