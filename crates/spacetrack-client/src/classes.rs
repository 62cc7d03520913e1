//! Static catalogue of Space-Track request classes.
//!
//! Each request class lives under a controller, which forms the first path
//! segment of both its query and modeldef endpoints:
//!
//! ```text
//! {base}/{controller}/query/class/{class}/...
//! {base}/{controller}/modeldef/class/{class}
//! ```

use crate::error::{ClientError, Result};

/// Request class → controller table.
const REQUEST_CLASSES: &[(&str, &str)] = &[
    ("announcement", "basicspacedata"),
    ("boxscore", "basicspacedata"),
    ("cdm_public", "basicspacedata"),
    ("decay", "basicspacedata"),
    ("gp", "basicspacedata"),
    ("gp_history", "basicspacedata"),
    ("launch_site", "basicspacedata"),
    ("omm", "basicspacedata"),
    ("satcat", "basicspacedata"),
    ("satcat_change", "basicspacedata"),
    ("satcat_debut", "basicspacedata"),
    ("tip", "basicspacedata"),
    ("tle", "basicspacedata"),
    ("tle_latest", "basicspacedata"),
    ("tle_publish", "basicspacedata"),
    ("car", "expandedspacedata"),
    ("cdm", "expandedspacedata"),
    ("maneuver", "expandedspacedata"),
    ("maneuver_history", "expandedspacedata"),
    ("organization", "expandedspacedata"),
    ("satellite", "expandedspacedata"),
    ("delete", "fileshare"),
    ("download", "fileshare"),
    ("file", "fileshare"),
    ("folder", "fileshare"),
    ("file_history", "spephemeris"),
];

/// Classes whose payload is binary; they are never decoded as text.
const BINARY_CLASSES: &[&str] = &["download"];

/// Predicates accepted by every request class (pagination, ordering, output
/// shaping). They are not part of any class's modeldef.
pub const REST_PREDICATES: &[&str] = &[
    "predicate",
    "metadata",
    "limit",
    "orderby",
    "distinct",
    "format",
    "emptyresult",
    "favorites",
];

/// Iterate over `(class, controller)` pairs.
pub fn request_classes() -> impl Iterator<Item = (&'static str, &'static str)> {
    REQUEST_CLASSES.iter().copied()
}

/// Look up the controller for a request class.
///
/// Fails fast with a configuration error for unknown classes.
pub fn controller_for(class: &str) -> Result<&'static str> {
    REQUEST_CLASSES
        .iter()
        .find(|(name, _)| *name == class)
        .map(|(_, controller)| *controller)
        .ok_or_else(|| ClientError::Config(format!("Unknown request class '{}'", class)))
}

/// Whether responses for this class should be decoded as text.
pub fn is_text_class(class: &str) -> bool {
    !BINARY_CLASSES.contains(&class)
}

/// Whether `name` is a rest predicate.
pub fn is_rest_predicate(name: &str) -> bool {
    REST_PREDICATES.contains(&name)
}
