use crate::config::StatusColumns;
use crate::types::{Acceptance, GeoFeature, JoinedFeature, StatusRow};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Inner join of boundaries and status rows on exact municipality name.
///
/// Output follows the boundary file's order. Features without a row and rows
/// without a feature are dropped. When a name appears twice in the sheet the
/// first row wins. Sheet columns, including name and status under their
/// header names, are added to the feature's properties unless the boundary
/// file already has a property of that name.
pub fn join_features(
    features: &[GeoFeature],
    rows: &[StatusRow],
    columns: &StatusColumns,
) -> Vec<JoinedFeature> {
    let mut by_name: HashMap<&str, &StatusRow> = HashMap::with_capacity(rows.len());
    for row in rows {
        if by_name.contains_key(row.municipality_name.as_str()) {
            warn!(municipality = %row.municipality_name, "duplicate status row ignored");
            continue;
        }
        by_name.insert(row.municipality_name.as_str(), row);
    }

    let mut matched_rows: HashSet<&str> = HashSet::new();
    let joined: Vec<JoinedFeature> = features
        .iter()
        .filter_map(|feature| {
            let row: &StatusRow = by_name.get(feature.name.as_str()).copied()?;
            matched_rows.insert(row.municipality_name.as_str());

            let mut properties = feature.properties.clone();
            let sheet_columns = [
                (&columns.name, &row.municipality_name),
                (&columns.status, &row.acceptance_status),
            ]
            .into_iter()
            .chain(row.extra.iter().map(|(column, value)| (column, value)));
            for (column, value) in sheet_columns {
                properties
                    .entry(column.clone())
                    .or_insert_with(|| Value::String(value.clone()));
            }

            Some(JoinedFeature {
                name: feature.name.clone(),
                status: row.acceptance_status.clone(),
                acceptance: Acceptance::classify(&row.acceptance_status),
                properties,
                geometry: feature.geometry.clone(),
            })
        })
        .collect();

    debug!(
        joined = joined.len(),
        unmatched_features = features.len() - joined.len(),
        unmatched_rows = by_name.len() - matched_rows.len(),
        "joined boundaries with status rows"
    );

    joined
}
