use geo::MultiPolygon;
use serde_json::{Map, Value};

/// One administrative polygon from the boundary file.
#[derive(Debug, Clone)]
pub struct GeoFeature {
    pub name: String,
    pub properties: Map<String, Value>,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub municipality_name: String,
    pub acceptance_status: String,
    // Remaining sheet columns in header order
    pub extra: Vec<(String, String)>,
}

/// Rows of the status worksheet plus its last-modified time (UTC, as sent by the source).
#[derive(Debug, Clone)]
pub struct StatusSheet {
    pub rows: Vec<StatusRow>,
    pub last_modified: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Acceptance {
    Accepting,
    Conditional,
    NotAccepting,
}

impl Acceptance {
    pub const ALL: [Acceptance; 3] = [
        Acceptance::Accepting,
        Acceptance::Conditional,
        Acceptance::NotAccepting,
    ];

    pub const ACCEPTING_STATUS: &'static str = "募集している";
    pub const CONDITIONAL_STATUS: &'static str = "制限付きで募集している";

    /// Exact match only; anything unrecognised (including empty) is `NotAccepting`.
    pub fn classify(status: &str) -> Self {
        match status {
            Self::ACCEPTING_STATUS => Acceptance::Accepting,
            Self::CONDITIONAL_STATUS => Acceptance::Conditional,
            _ => Acceptance::NotAccepting,
        }
    }

    pub fn fill_color(self) -> &'static str {
        match self {
            Acceptance::Accepting => "#059669",
            Acceptance::Conditional => "#D97706",
            Acceptance::NotAccepting => "#1F2937",
        }
    }

    pub fn legend_label(self) -> &'static str {
        match self {
            Acceptance::Accepting => "緑",
            Acceptance::Conditional => "オレンジ",
            Acceptance::NotAccepting => "グレー",
        }
    }

    pub fn legend_text(self) -> &'static str {
        match self {
            Acceptance::Accepting => "現在ボランティアを募集している自治体です。",
            Acceptance::Conditional => "現在ボランティアを条件付きで募集している自治体です。",
            Acceptance::NotAccepting => "現在ボランティアを募集していない自治体です。",
        }
    }
}

/// A boundary feature that found its status row.
#[derive(Debug, Clone)]
pub struct JoinedFeature {
    pub name: String,
    pub status: String,
    pub acceptance: Acceptance,
    pub properties: Map<String, Value>,
    pub geometry: MultiPolygon<f64>,
}
