//! # enr-indicateurs
//!
//! Indicateurs territoriaux de production d'énergie renouvelable (éolien,
//! photovoltaïque, méthanisation, injection de biométhane) pour les régions,
//! départements et EPCI français.
//!
//! ## Features
//!
//! - Catalogue des territoires avec sentinelles "Toutes" / "Tous"
//! - Installations ponctuelles chargées depuis des couches GeoJSON (`geo`)
//! - Fusion de sources statistiques concurrentes avec priorité fixe
//!   (registre ODRÉ < GRDF < ODRÉ gaz < SDES) et agrégat national calculé
//! - Requêtes filtrées et comparaisons, export CSV
//! - Citations des sources par indicateur
//!
//! ## Usage
//!
//! ```rust,ignore
//! use enr_indicateurs::{IndicatorQuery, Snapshot, TerritoryType, Zone};
//!
//! let snapshot = Snapshot::build(&paths)?;
//! let query = IndicatorQuery::new(TerritoryType::Region)
//!     .zones(Zone::named("Grand Est"))
//!     .indicators(Indicator::Power);
//! let slice = snapshot.query().query(&query);
//! println!("{}", slice.to_csv()?);
//! ```

pub mod attribution;
pub mod error;
pub mod facility;
pub mod indicator;
pub mod objectives;
pub mod parse;
pub mod snapshot;
pub mod territory;
pub mod types;

pub use attribution::sources_for;
pub use error::{DataWarning, Diagnostics, EnrError};
pub use facility::{Facility, FacilityLayer, FacilityStore, LayerKind};
pub use indicator::{
    IndicatorKey, IndicatorQuery, IndicatorRow, IndicatorTable, IndicatorValue, QueryService,
    SliceRow, SourceFile, TableSlice,
};
pub use objectives::{ObjectiveRow, Objectives};
pub use snapshot::{ObjectivesFile, Snapshot, SnapshotCache, SnapshotPaths};
pub use territory::{Selection, Territory, TerritoryCatalog, TerritoryPaths};
pub use types::{EnergySource, Indicator, Provenance, Selector, TerritoryType, Zone};

/// Construit un instantané complet depuis ses fichiers d'entrée.
///
/// # Errors
///
/// Retourne `EnrError` si une source de référence est absente ou illisible.
/// Les lignes invalides ne sont pas des erreurs: elles sont comptées dans
/// `Snapshot::diagnostics`.
pub fn build(paths: &SnapshotPaths) -> Result<Snapshot, EnrError> {
    Snapshot::build(paths)
}
