//! HTML page with an embedded Leaflet choropleth.
//!
//! Styling is resolved here so the browser script only applies what each
//! feature carries in its `display` property.

use crate::config::{MapConfig, PageConfig};
use crate::types::{Acceptance, JoinedFeature};
use geojson::{Feature, FeatureCollection, Geometry};
use serde::Serialize;
use serde_json::{json, Value};

const STROKE_COLOR: &str = "black";
const STROKE_WEIGHT: u32 = 1;
const HIGHLIGHT_WEIGHT: u32 = 2;
const FILL_OPACITY: f64 = 0.5;
const HIGHLIGHT_FILL_OPACITY: f64 = 0.7;

const LEAFLET_CSS: &str = r#"<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" integrity="sha256-p4NxAoJBhIIN+hmNHrzRCf9tD/miZyoHS5obTRR9BMY=" crossorigin="">"#;
const LEAFLET_JS: &str = r#"<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js" integrity="sha256-20nQCchB9co0qIjJZRGuk2/Z9VM+kNiyxNV1lvTlZBo=" crossorigin=""></script>"#;

const WARNING: [&str; 3] = [
    "手動更新のため、情報に抜け、漏れがある可能性があります。",
    "必ず自治体からの最新の情報を確認してください。",
    "ボランティアを募集していないと表記している自治体には募集状況が不明な自治体も含まれます。",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonStyle {
    pub fill_color: &'static str,
    pub color: &'static str,
    pub weight: u32,
    pub fill_opacity: f64,
}

impl PolygonStyle {
    pub fn normal(acceptance: Acceptance) -> Self {
        Self {
            fill_color: acceptance.fill_color(),
            color: STROKE_COLOR,
            weight: STROKE_WEIGHT,
            fill_opacity: FILL_OPACITY,
        }
    }

    pub fn highlight(acceptance: Acceptance) -> Self {
        Self {
            fill_color: acceptance.fill_color(),
            color: STROKE_COLOR,
            weight: HIGHLIGHT_WEIGHT,
            fill_opacity: HIGHLIGHT_FILL_OPACITY,
        }
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Joined features as GeoJSON, each carrying its resolved style, tooltip and popup.
pub fn feature_collection(features: &[JoinedFeature]) -> FeatureCollection {
    let features = features
        .iter()
        .map(|f| {
            let mut properties = f.properties.clone();
            properties.insert(
                "display".to_string(),
                json!({
                    "style": PolygonStyle::normal(f.acceptance),
                    "highlight": PolygonStyle::highlight(f.acceptance),
                    "tooltip": format!("{}<br>{}", html_escape(&f.name), html_escape(&f.status)),
                    "popup": html_escape(&f.name),
                }),
            );

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&f.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// JSON that can sit inside a `<script>` element.
fn script_safe_json(value: &Value) -> String {
    value
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

pub fn render_page(
    page: &PageConfig,
    map: &MapConfig,
    features: &[JoinedFeature],
    last_updated: &str,
) -> String {
    let map_data = json!({
        "center": map.center,
        "zoom": map.zoom,
        "features": feature_collection(features),
    });

    format!(
        r#"<!DOCTYPE html>
<html lang="ja">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="icon" href="data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>{icon}</text></svg>">
    {leaflet_css}
    <style>{css}</style>
</head>
<body>
    <main class="container">
        <h1>{icon}{title}</h1>
        <p class="updated">最終更新: {last_updated}</p>
        {legend}
        {warning}
        <div id="map" style="width: {width}px; height: {height}px;"></div>
    </main>
    <script id="map-data" type="application/json">{map_data}</script>
    {leaflet_js}
    <script>{js}</script>
</body>
</html>"#,
        title = html_escape(&page.title),
        icon = html_escape(&page.icon),
        last_updated = html_escape(last_updated),
        leaflet_css = LEAFLET_CSS,
        leaflet_js = LEAFLET_JS,
        css = inline_css(),
        js = inline_javascript(),
        legend = render_legend(),
        warning = render_warning(),
        width = map.width,
        height = map.height,
        map_data = script_safe_json(&map_data),
    )
}

fn render_legend() -> String {
    let items: String = Acceptance::ALL
        .iter()
        .map(|a| {
            format!(
                r#"<li><span class="swatch" style="background: {color};"></span><strong style="color: {color};">{label}</strong>・・・{text}</li>"#,
                color = a.fill_color(),
                label = a.legend_label(),
                text = a.legend_text(),
            )
        })
        .collect();

    format!(
        r#"<section class="legend">
            <h2>地図の見方</h2>
            <ul>{items}</ul>
        </section>"#
    )
}

fn render_warning() -> String {
    let lines: Vec<String> = WARNING.iter().map(|line| html_escape(line)).collect();
    format!(r#"<div class="warning" role="alert">{}</div>"#, lines.join("<br>"))
}

fn inline_css() -> &'static str {
    r#"
body {
    font-family: system-ui, -apple-system, 'Hiragino Sans', 'Noto Sans JP', sans-serif;
    color: #111827;
    margin: 0;
}

.container {
    max-width: 730px;
    margin: 0 auto;
    padding: 2rem 1rem;
}

h1 { font-size: 1.75rem; }
h2 { font-size: 1.25rem; }

.updated { color: #4b5563; }

.legend ul {
    list-style: none;
    padding: 0;
}

.legend li { margin: 0.25rem 0; }

.swatch {
    display: inline-block;
    width: 0.9em;
    height: 0.9em;
    margin-right: 0.4em;
    vertical-align: middle;
    opacity: 0.7;
}

.warning {
    background: #fffbeb;
    border: 1px solid #fcd34d;
    color: #92400e;
    border-radius: 0.5rem;
    padding: 1rem;
    margin: 1rem 0;
}
"#
}

fn inline_javascript() -> &'static str {
    r#"
(function () {
    var data = JSON.parse(document.getElementById('map-data').textContent);
    var map = L.map('map').setView(data.center, data.zoom);

    L.tileLayer('https://tile.openstreetmap.org/{z}/{x}/{y}.png', {
        maxZoom: 19,
        attribution: '&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors'
    }).addTo(map);

    var layer = L.geoJSON(data.features, {
        style: function (feature) {
            return feature.properties.display.style;
        },
        onEachFeature: function (feature, lyr) {
            var display = feature.properties.display;
            lyr.bindTooltip(display.tooltip, { sticky: true });
            lyr.bindPopup(display.popup);
            lyr.on('mouseover', function () { lyr.setStyle(display.highlight); });
            lyr.on('mouseout', function () {
                if (!lyr.isPopupOpen()) { layer.resetStyle(lyr); }
            });
            lyr.on('popupopen', function () { lyr.setStyle(display.highlight); });
            lyr.on('popupclose', function () { layer.resetStyle(lyr); });
        }
    }).addTo(map);
})();
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use regex::Regex;
    use serde_json::Map;

    fn joined(name: &str, status: &str) -> JoinedFeature {
        JoinedFeature {
            name: name.to_string(),
            status: status.to_string(),
            acceptance: Acceptance::classify(status),
            properties: Map::new(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: 136.9, y: 37.3),
                (x: 137.0, y: 37.3),
                (x: 137.0, y: 37.4),
                (x: 136.9, y: 37.3),
            ]]),
        }
    }

    fn page() -> String {
        render_page(
            &PageConfig::default(),
            &MapConfig::default(),
            &[joined("輪島市", "募集している"), joined("<b>町</b>", "制限付きで募集している")],
            "2024年01月15日 12時00分 JST",
        )
    }

    #[test]
    fn styles_follow_acceptance() {
        let normal = PolygonStyle::normal(Acceptance::Conditional);
        assert_eq!(normal.fill_color, "#D97706");
        assert_eq!(normal.weight, 1);
        assert_eq!(normal.fill_opacity, 0.5);

        let hover = PolygonStyle::highlight(Acceptance::Conditional);
        assert_eq!(hover.fill_color, "#D97706");
        assert_eq!(hover.weight, 2);
        assert_eq!(hover.fill_opacity, 0.7);
        assert_eq!(hover.color, "black");
    }

    #[test]
    fn features_carry_display_properties() {
        let fc = feature_collection(&[joined("輪島市", "募集している")]);
        assert_eq!(fc.features.len(), 1);

        let props = fc.features[0].properties.as_ref().unwrap();
        let display = &props["display"];
        assert_eq!(display["style"]["fillColor"], "#059669");
        assert_eq!(display["style"]["fillOpacity"], 0.5);
        assert_eq!(display["highlight"]["fillOpacity"], 0.7);
        assert_eq!(display["tooltip"], "輪島市<br>募集している");
        assert_eq!(display["popup"], "輪島市");

        let geometry = fc.features[0].geometry.as_ref().unwrap();
        assert!(matches!(geometry.value, geojson::Value::MultiPolygon(_)));
    }

    #[test]
    fn page_contains_header_legend_warning_and_timestamp() {
        let html = page();
        assert!(html.contains("<title>石川県ボランティア受け入れ情報マップ</title>"));
        assert!(html.contains("最終更新: 2024年01月15日 12時00分 JST"));
        assert!(html.contains("地図の見方"));
        for a in Acceptance::ALL {
            assert!(html.contains(a.fill_color()));
            assert!(html.contains(a.legend_text()));
        }
        assert!(html.contains("手動更新のため"));
        assert!(html.contains(r#"style="width: 700px; height: 700px;""#));
        assert!(html.contains(r#""center":[36.8,136.8]"#));
        assert!(html.contains(r#""zoom":9"#));
    }

    #[test]
    fn embedded_data_cannot_close_the_script_element() {
        let html = page();
        let start = html.find(r#"<script id="map-data" type="application/json">"#).unwrap();
        let data = &html[start..];
        let end = data.find("</script>").unwrap();
        let json_text = &data[data.find('>').unwrap() + 1..end];

        assert!(!json_text.contains('<'));
        let parsed: Value = serde_json::from_str(json_text).unwrap();
        let tooltip = &parsed["features"]["features"][1]["properties"]["display"]["tooltip"];
        assert_eq!(tooltip, "&lt;b&gt;町&lt;/b&gt;<br>制限付きで募集している");
    }

    #[test]
    fn cdn_assets_use_sri() {
        let html = page();
        let tag_re =
            Regex::new(r#"<(?:script|link)[^>]+(?:src|href)="https?://[^">]+"[^>]*>"#).unwrap();

        let tags: Vec<&str> = tag_re.find_iter(&html).map(|m| m.as_str()).collect();
        assert_eq!(tags.len(), 2);
        for tag in tags {
            assert!(tag.contains("integrity="), "External asset missing integrity attribute: {tag}");
        }
    }
}
