//! Modules d'export (CSV, GeoJSON)

pub mod csv;
pub mod geojson;

pub use self::csv::{write_facilities, write_objectives, write_slice};
pub use self::geojson::export_facilities;
