use serde_json::{Map, Value as JsonValue};

use super::{CastFailure, CastResult, Format};
use crate::data::{GeoPoint, Value};

/// Longitude and latitude bounds are exclusive on every input shape.
fn in_range(lon: f64, lat: f64) -> bool {
    lon > -180.0 && lon < 180.0 && lat > -90.0 && lat < 90.0
}

fn parse_json_text(raw: &JsonValue) -> Option<JsonValue> {
    match raw {
        JsonValue::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

fn pair_from_array(items: &[JsonValue]) -> Option<(f64, f64)> {
    match items {
        [lon, lat] => Some((lon.as_f64()?, lat.as_f64()?)),
        _ => None,
    }
}

pub fn cast_geopoint(format: &Format, raw: &JsonValue) -> CastResult {
    let pair = match format {
        Format::Array => match parse_json_text(raw) {
            Some(JsonValue::Array(items)) => pair_from_array(&items),
            _ => None,
        },
        Format::Object => match parse_json_text(raw) {
            Some(JsonValue::Object(map)) if map.len() == 2 => map
                .get("lon")
                .and_then(JsonValue::as_f64)
                .zip(map.get("lat").and_then(JsonValue::as_f64)),
            _ => None,
        },
        _ => match raw {
            JsonValue::String(s) => s.split_once(',').and_then(|(lon, lat)| {
                Some((lon.trim().parse::<f64>().ok()?, lat.trim().parse::<f64>().ok()?))
            }),
            JsonValue::Array(items) => pair_from_array(items),
            _ => None,
        },
    };
    match pair {
        Some((lon, lat)) if in_range(lon, lat) => Ok(Value::GeoPoint(GeoPoint { lon, lat })),
        Some((lon, lat)) => Err(CastFailure::new(format!(
            "Geopoint ({lon}, {lat}) is outside the valid longitude/latitude range"
        ))),
        None => Err(CastFailure::expected("geopoint", raw)),
    }
}

pub fn cast_geojson(format: &Format, raw: &JsonValue) -> CastResult {
    let object = match parse_json_text(raw) {
        Some(JsonValue::Object(map)) => map,
        _ => return Err(CastFailure::expected("geojson", raw)),
    };
    if *format != Format::TopoJson {
        validate_geojson(&object).map_err(|reason| {
            CastFailure::new(format!("Value is not valid GeoJSON: {reason}"))
        })?;
    }
    Ok(Value::GeoJson(JsonValue::Object(object)))
}

fn validate_geojson(object: &Map<String, JsonValue>) -> Result<(), String> {
    let kind = object
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or("missing 'type' member")?;
    match kind {
        "Feature" => {
            match object.get("geometry") {
                Some(JsonValue::Null) => {}
                Some(JsonValue::Object(geometry)) => validate_geometry(geometry)?,
                _ => return Err("Feature requires a 'geometry' object or null".into()),
            }
            match object.get("properties") {
                None | Some(JsonValue::Null) | Some(JsonValue::Object(_)) => Ok(()),
                _ => Err("Feature 'properties' must be an object or null".into()),
            }
        }
        "FeatureCollection" => {
            let features = object
                .get("features")
                .and_then(JsonValue::as_array)
                .ok_or("FeatureCollection requires a 'features' array")?;
            for feature in features {
                match feature.as_object() {
                    Some(map) if map.get("type").and_then(JsonValue::as_str) == Some("Feature") => {
                        validate_geojson(map)?
                    }
                    _ => return Err("FeatureCollection members must be Features".into()),
                }
            }
            Ok(())
        }
        _ => validate_geometry(object),
    }
}

fn validate_geometry(object: &Map<String, JsonValue>) -> Result<(), String> {
    let kind = object
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or("geometry is missing 'type'")?;
    if kind == "GeometryCollection" {
        let geometries = object
            .get("geometries")
            .and_then(JsonValue::as_array)
            .ok_or("GeometryCollection requires a 'geometries' array")?;
        for geometry in geometries {
            let map = geometry
                .as_object()
                .ok_or("GeometryCollection members must be objects")?;
            validate_geometry(map)?;
        }
        return Ok(());
    }

    let coordinates = object
        .get("coordinates")
        .ok_or_else(|| format!("{kind} requires 'coordinates'"))?;
    let valid = match kind {
        "Point" => is_position(coordinates),
        "MultiPoint" => all_of(coordinates, is_position, 0),
        "LineString" => all_of(coordinates, is_position, 2),
        "MultiLineString" => all_of(coordinates, |line| all_of(line, is_position, 2), 0),
        "Polygon" => all_of(coordinates, is_linear_ring, 0),
        "MultiPolygon" => all_of(coordinates, |poly| all_of(poly, is_linear_ring, 0), 0),
        other => return Err(format!("unknown GeoJSON type '{other}'")),
    };
    if valid {
        Ok(())
    } else {
        Err(format!("{kind} has malformed coordinates"))
    }
}

fn is_position(value: &JsonValue) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.len() >= 2 && items.iter().all(JsonValue::is_number))
}

fn is_linear_ring(value: &JsonValue) -> bool {
    all_of(value, is_position, 4)
}

fn all_of(value: &JsonValue, check: impl Fn(&JsonValue) -> bool, min_len: usize) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.len() >= min_len && items.iter().all(&check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn geopoint_formats() {
        let expected = Ok(Value::GeoPoint(GeoPoint { lon: 10.5, lat: -20.0 }));
        assert_eq!(cast_geopoint(&Format::Default, &json!("10.5, -20")), expected);
        assert_eq!(cast_geopoint(&Format::Default, &json!([10.5, -20])), expected);
        assert_eq!(cast_geopoint(&Format::Array, &json!("[10.5, -20]")), expected);
        assert_eq!(
            cast_geopoint(&Format::Object, &json!({"lon": 10.5, "lat": -20})),
            expected
        );
        assert_eq!(
            cast_geopoint(&Format::Object, &json!("{\"lon\": 10.5, \"lat\": -20}")),
            expected
        );
    }

    #[test]
    fn geopoint_bounds_are_exclusive_everywhere() {
        for raw in ["180,0", "-180,0", "0,90", "0,-90"] {
            assert!(cast_geopoint(&Format::Default, &json!(raw)).is_err(), "{raw}");
        }
        assert!(cast_geopoint(&Format::Array, &json!([180, 0])).is_err());
        assert!(cast_geopoint(&Format::Object, &json!({"lon": 0, "lat": 90})).is_err());
        assert!(cast_geopoint(&Format::Default, &json!("179.999,89.999")).is_ok());
    }

    #[test]
    fn geojson_structure_is_checked() {
        let point = json!({"type": "Point", "coordinates": [1.0, 2.0]});
        assert!(cast_geojson(&Format::Default, &point).is_ok());
        let feature = json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
            "properties": {"name": "road"}
        });
        assert!(cast_geojson(&Format::Default, &feature).is_ok());
        let bad_polygon = json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 1]]]});
        assert!(cast_geojson(&Format::Default, &bad_polygon).is_err());
        assert!(cast_geojson(&Format::Default, &json!({"type": "Circle"})).is_err());
    }

    #[test]
    fn topojson_only_requires_an_object() {
        assert!(cast_geojson(&Format::TopoJson, &json!({"type": "Topology"})).is_ok());
        assert!(cast_geojson(&Format::TopoJson, &json!("[1, 2]")).is_err());
    }
}
