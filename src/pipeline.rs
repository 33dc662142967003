use crate::config::AppConfig;
use crate::data;
use crate::error::MapError;
use crate::processing;
use crate::render;
use crate::status::StatusSource;
use crate::timestamp;
use crate::types::GeoFeature;
use tracing::info;

/// Loads both datasets, joins them and renders the full page.
///
/// Runs from scratch on every call. Any failure aborts the render.
pub async fn build_page<S: StatusSource>(config: &AppConfig, source: &S) -> Result<String, MapError> {
    let features = load_geometry_blocking(config).await?;
    let sheet = source.fetch().await?;
    let last_updated = timestamp::format_jst(&sheet.last_modified)?;

    let joined = processing::join_features(&features, &sheet.rows, &config.status.columns());
    info!(
        features = features.len(),
        rows = sheet.rows.len(),
        shown = joined.len(),
        last_updated = %last_updated,
        "rendering map page"
    );

    Ok(render::render_page(&config.page, &config.map, &joined, &last_updated))
}

// File read and GeoJSON parse stay off the async workers.
async fn load_geometry_blocking(config: &AppConfig) -> Result<Vec<GeoFeature>, MapError> {
    let input = config.input.clone();
    tokio::task::spawn_blocking(move || data::load_geometry(&input))
        .await
        .map_err(|e| MapError::geometry(&config.input.geometry, e))?
}
