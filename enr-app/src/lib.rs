//! # enr-app
//!
//! Construction, interrogation et export des indicateurs territoriaux de
//! production d'énergie renouvelable.
//!
//! ## Features
//!
//! - Configuration JSON (presets embarqués ou fichier), surcharge `ENR_DATA_DIR`
//! - Rapport de construction (avertissements par catégorie, statut)
//! - Export CSV des extraits et des installations, export GeoJSON
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # Construire l'instantané et sauvegarder le rapport
//! enr build --report ./rapport.json
//!
//! # Puissance éolienne de deux départements
//! enr query -t Départements -z Isère -z 73 -f Eolien -i puiss_MW
//!
//! # Installations d'un EPCI en GeoJSON
//! enr facilities -t Epci -z "CA du Pays Voironnais" -o voironnais.geojson
//! ```

pub mod cli;
pub mod config;
pub mod export;
pub mod report;

pub use config::Config;
pub use report::{BuildReport, BuildStatus};
