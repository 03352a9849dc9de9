//! Canonical form of whatever the prediction service sends back.
//!
//! Two coordinate layouts are accepted: a nested `impact_coordinates`
//! object and flat `lat`/`lon` fields. Anything missing or out of range
//! becomes [`Reading::Unavailable`]; nothing is ever defaulted to zero.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading<T> {
    Available(T),
    Unavailable,
}

impl<T> Reading<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Available(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Reading::Available(v) => Some(v),
            Reading::Unavailable => None,
        }
    }

    /// Text for display; `"unavailable"` when the service gave nothing usable.
    pub fn label(&self, fmt: impl Fn(&T) -> String) -> String {
        match self {
            Reading::Available(v) => fmt(v),
            Reading::Unavailable => "unavailable".to_string(),
        }
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Reading::Available(v),
            None => Reading::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImpactCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl ImpactCoordinate {
    /// `None` unless latitude is within ±90 and longitude within ±180.
    pub fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }
}

/// Which coordinate layout the payload used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    Nested,
    Flat,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub shape: ResponseShape,
    pub coordinates: Reading<ImpactCoordinate>,
    pub impact_probability: Reading<f64>,
    pub crater_diameter_km: Reading<f64>,
    pub historical_context: Reading<String>,
    pub population_impact: Reading<String>,
    /// Original payload, kept for diagnostics.
    pub raw: Value,
}

pub fn normalize(raw: Value) -> PredictionResult {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let (shape, coordinates) = read_coordinates(obj);
    if !coordinates.is_available() {
        tracing::warn!(?shape, "prediction response has no usable impact coordinates");
    }

    let impact_probability = number(obj.get("impact_probability"))
        .filter(|p| (0.0..=1.0).contains(p))
        .into();
    let crater_diameter_km = crater_km(obj.get("crater_size"))
        .filter(|d| *d >= 0.0)
        .into();

    let result = PredictionResult {
        shape,
        coordinates,
        impact_probability,
        crater_diameter_km,
        historical_context: text(obj.get("historical_context")).into(),
        population_impact: text(obj.get("population_impact")).into(),
        raw: raw.clone(),
    };
    tracing::debug!(shape = ?result.shape, "normalized prediction response");
    result
}

fn read_coordinates(obj: &Map<String, Value>) -> (ResponseShape, Reading<ImpactCoordinate>) {
    if let Some(Value::Object(nested)) = obj.get("impact_coordinates") {
        return (ResponseShape::Nested, lat_lon(nested));
    }
    if obj.contains_key("lat") || obj.contains_key("lon") {
        return (ResponseShape::Flat, lat_lon(obj));
    }
    (ResponseShape::Missing, Reading::Unavailable)
}

fn lat_lon(obj: &Map<String, Value>) -> Reading<ImpactCoordinate> {
    let lat = number(obj.get("lat"));
    let lon = number(obj.get("lon"));
    match (lat, lon) {
        (Some(lat), Some(lon)) => ImpactCoordinate::checked(lat, lon).into(),
        _ => Reading::Unavailable,
    }
}

/// Finite number, or a string holding one.
fn number(v: Option<&Value>) -> Option<f64> {
    let n = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// `crater_size` may be a bare number or text such as `"1.2 km"`.
fn crater_km(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::String(s) => {
            let s = s.trim();
            let s = s
                .strip_suffix("km")
                .or_else(|| s.strip_suffix("KM"))
                .unwrap_or(s);
            let n = s.trim().parse::<f64>().ok()?;
            n.is_finite().then_some(n)
        }
        other => number(Some(other)),
    }
}

fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_shape() {
        let r = normalize(json!({"impact_coordinates": {"lat": 12.5, "lon": -45.2}}));
        assert_eq!(r.shape, ResponseShape::Nested);
        assert_eq!(
            r.coordinates,
            Reading::Available(ImpactCoordinate {
                latitude: 12.5,
                longitude: -45.2
            })
        );
    }

    #[test]
    fn test_flat_shape_matches_nested() {
        let flat = normalize(json!({"lat": 3.0, "lon": 4.0}));
        let nested = normalize(json!({"impact_coordinates": {"lat": 3.0, "lon": 4.0}}));
        assert_eq!(flat.shape, ResponseShape::Flat);
        assert_eq!(flat.coordinates, nested.coordinates);
    }

    #[test]
    fn test_missing_fields_are_unavailable_not_zero() {
        let r = normalize(json!({"something": "else"}));
        assert_eq!(r.shape, ResponseShape::Missing);
        assert_eq!(r.coordinates, Reading::Unavailable);
        assert_eq!(r.impact_probability, Reading::Unavailable);
        assert_eq!(r.crater_diameter_km, Reading::Unavailable);
        assert_eq!(r.historical_context, Reading::Unavailable);
        assert_eq!(r.population_impact.label(|s| s.clone()), "unavailable");
    }

    #[test]
    fn test_half_coordinate_is_unavailable() {
        let r = normalize(json!({"lat": 10.0}));
        assert_eq!(r.shape, ResponseShape::Flat);
        assert_eq!(r.coordinates, Reading::Unavailable);
    }

    #[test]
    fn test_out_of_range_coordinate_rejected() {
        let r = normalize(json!({"impact_coordinates": {"lat": 95.0, "lon": 0.0}}));
        assert_eq!(r.coordinates, Reading::Unavailable);
    }

    #[test]
    fn test_non_object_payload() {
        let r = normalize(json!([1, 2, 3]));
        assert_eq!(r.shape, ResponseShape::Missing);
        assert_eq!(r.raw, json!([1, 2, 3]));
    }

    #[test]
    fn test_extended_fields() {
        let r = normalize(json!({
            "lat": "1.5",
            "lon": "2.5",
            "impact_probability": 0.42,
            "crater_size": "1.8 km",
            "historical_context": "Comparable to Tunguska",
            "population_impact": "Low",
        }));
        assert!(r.coordinates.is_available());
        assert_eq!(r.impact_probability, Reading::Available(0.42));
        assert_eq!(r.crater_diameter_km, Reading::Available(1.8));
        assert_eq!(
            r.historical_context.as_option().map(String::as_str),
            Some("Comparable to Tunguska")
        );
        assert_eq!(r.population_impact, Reading::Available("Low".to_string()));
    }

    #[test]
    fn test_bad_probability_and_crater() {
        let r = normalize(json!({"impact_probability": 3.0, "crater_size": "huge"}));
        assert_eq!(r.impact_probability, Reading::Unavailable);
        assert_eq!(r.crater_diameter_km, Reading::Unavailable);
        let r = normalize(json!({"crater_size": 12}));
        assert_eq!(r.crater_diameter_km, Reading::Available(12.0));
    }
}
