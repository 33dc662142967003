use crate::config::InputConfig;
use crate::error::MapError;
use crate::types::GeoFeature;
use geo::MultiPolygon;
use serde_json::{Map, Value};
use shapefile::Reader;
use std::fs::File;
use std::io::BufReader;
use tracing::{debug, info};

pub fn load_geometry(input: &InputConfig) -> Result<Vec<GeoFeature>, MapError> {
    let path = &input.geometry;
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| MapError::geometry(path, "input geometry file has no extension"))?;

    let features = match extension.as_str() {
        "shp" => load_shapefile(input)?,
        "json" | "geojson" => load_geojson(input)?,
        _ => return Err(MapError::geometry(path, format!("unsupported geometry format: {}", extension))),
    };

    info!(path = ?path, features = features.len(), "loaded municipality boundaries");
    Ok(features)
}

fn load_geojson(input: &InputConfig) -> Result<Vec<GeoFeature>, MapError> {
    use geojson::GeoJson;

    let path = &input.geometry;
    let file = File::open(path).map_err(|e| MapError::geometry(path, e))?;
    let reader = BufReader::new(file);

    // The whole collection is held in memory; prefecture-sized files are small.
    let geojson = GeoJson::from_reader(reader).map_err(|e| MapError::geometry(path, e))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(MapError::geometry(path, "GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::new();

    for feature in collection.features {
        let properties = feature.properties.unwrap_or_default();

        let name = match properties.get(&input.name_property) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                debug!(property = %input.name_property, "skipping feature without a municipality name");
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom.value.try_into()
                    .map_err(|e| MapError::geometry(path, format!("failed to convert geometry of {}: {:?}", name, e)))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        features.push(GeoFeature {
            name,
            properties,
            geometry,
        });
    }

    Ok(features)
}

fn load_shapefile(input: &InputConfig) -> Result<Vec<GeoFeature>, MapError> {
    let path = &input.geometry;
    let mut reader = Reader::from_path(path).map_err(|e| MapError::geometry(path, e))?;

    let mut features = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.map_err(|e| MapError::geometry(path, e))?;

        let name = match record.get(&input.name_property) {
            Some(shapefile::dbase::FieldValue::Character(Some(s))) => s.trim_end().to_string(),
            Some(shapefile::dbase::FieldValue::Character(None)) => continue,
            Some(_) => return Err(MapError::geometry(path, format!("name field '{}' must be a string", input.name_property))),
            None => return Err(MapError::geometry(path, format!("name field '{}' not found in Shapefile", input.name_property))),
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into()
                .map_err(|e| MapError::geometry(path, format!("failed to convert polygon: {:?}", e)))?,
            shapefile::Shape::PolygonM(polygon) => polygon.try_into()
                .map_err(|e| MapError::geometry(path, format!("failed to convert polygonM: {:?}", e)))?,
            shapefile::Shape::PolygonZ(polygon) => polygon.try_into()
                .map_err(|e| MapError::geometry(path, format!("failed to convert polygonZ: {:?}", e)))?,
            _ => continue, // Skip non-polygon shapes
        };

        let mut properties = Map::new();
        properties.insert(input.name_property.clone(), Value::String(name.clone()));

        features.push(GeoFeature {
            name,
            properties,
            geometry,
        });
    }

    Ok(features)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn square(x: f64, y: f64) -> String {
        format!(
            "[[[{x},{y}],[{x1},{y}],[{x1},{y1}],[{x},{y1}],[{x},{y}]]]",
            x1 = x + 0.1,
            y1 = y + 0.1
        )
    }

    /// Writes a FeatureCollection with one square polygon per name into `dir`.
    pub(crate) fn write_geojson(dir: &std::path::Path, names: &[&str]) -> PathBuf {
        let features: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                format!(
                    r#"{{"type":"Feature","properties":{{"N03_001":"石川県","N03_004":"{name}"}},"geometry":{{"type":"Polygon","coordinates":{coords}}}}}"#,
                    coords = square(136.5 + i as f64 * 0.2, 36.5)
                )
            })
            .collect();
        let path = dir.join("boundaries.json");
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
        .unwrap();
        path
    }

    fn input(path: PathBuf) -> InputConfig {
        InputConfig {
            geometry: path,
            name_property: "N03_004".to_string(),
        }
    }

    #[test]
    fn loads_features_in_file_order_with_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_geojson(dir.path(), &["輪島市", "珠洲市", "能登町"]);

        let features = load_geometry(&input(path)).unwrap();
        let names: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["輪島市", "珠洲市", "能登町"]);
        assert_eq!(features[0].properties["N03_001"], "石川県");
        assert_eq!(features[0].geometry.0.len(), 1);
    }

    #[test]
    fn skips_features_with_null_name_and_non_polygons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.geojson");
        std::fs::write(
            &path,
            format!(
                r#"{{"type":"FeatureCollection","features":[
                    {{"type":"Feature","properties":{{"N03_004":null}},"geometry":{{"type":"Polygon","coordinates":{sq}}}}},
                    {{"type":"Feature","properties":{{"N03_004":"七尾市"}},"geometry":{{"type":"Point","coordinates":[136.9,37.0]}}}},
                    {{"type":"Feature","properties":{{"N03_004":"穴水町"}},"geometry":{{"type":"MultiPolygon","coordinates":[{sq},{sq2}]}}}}
                ]}}"#,
                sq = square(136.8, 37.2),
                sq2 = square(137.0, 37.2)
            ),
        )
        .unwrap();

        let features = load_geometry(&input(path)).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].name, "穴水町");
        assert_eq!(features[0].geometry.0.len(), 2);
    }

    #[test]
    fn missing_file_is_a_geometry_error() {
        let err = load_geometry(&input(PathBuf::from("/nonexistent/boundaries.json"))).unwrap_err();
        assert!(matches!(err, MapError::GeometryLoad { .. }));
    }

    #[test]
    fn malformed_and_non_collection_files_are_geometry_errors() {
        let dir = tempfile::tempdir().unwrap();

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            load_geometry(&input(broken)),
            Err(MapError::GeometryLoad { .. })
        ));

        let single = dir.path().join("single.json");
        std::fs::write(
            &single,
            r#"{"type":"Point","coordinates":[136.9,37.0]}"#,
        )
        .unwrap();
        assert!(matches!(
            load_geometry(&input(single)),
            Err(MapError::GeometryLoad { .. })
        ));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_geometry(&input(PathBuf::from("boundaries.kml"))).unwrap_err();
        assert!(err.to_string().contains("unsupported geometry format"));
    }
}
