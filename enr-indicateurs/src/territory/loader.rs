//! Lecture des tables de référence des territoires

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Diagnostics;
use crate::parse::read_records;
use crate::territory::TerritoryCatalog;
use crate::EnrError;

/// Région (`code`, `nom`)
#[derive(Debug, Clone, Deserialize)]
pub struct RegionRecord {
    pub code: String,
    #[serde(rename = "nom")]
    pub name: String,
}

/// Département (`code`, `nom`, `codeRegion`)
#[derive(Debug, Clone, Deserialize)]
pub struct DepartmentRecord {
    pub code: String,
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "codeRegion")]
    pub region_code: String,
}

/// EPCI avec son champ départements brut (code seul ou liste sérialisée)
#[derive(Debug, Clone, Deserialize)]
pub struct EpciRecord {
    #[serde(rename = "EPCI")]
    pub code: String,
    #[serde(rename = "NOM_EPCI")]
    pub name: String,
    #[serde(rename = "DEPARTEMENTS_DE_L_EPCI", default)]
    pub departments: String,
}

/// Chemins des trois tables de référence (CSV UTF-8, séparateur virgule)
#[derive(Debug, Clone)]
pub struct TerritoryPaths {
    pub regions: PathBuf,
    pub departements: PathBuf,
    pub epcis: PathBuf,
}

/// Charge les trois tables et construit le catalogue
///
/// Une table absente est fatale; les lignes invalides sont écartées et
/// comptées dans les diagnostics.
pub fn load(paths: &TerritoryPaths) -> Result<(TerritoryCatalog, Diagnostics), EnrError> {
    let mut diagnostics = Diagnostics::new();
    let utf8 = encoding_rs::UTF_8;

    let regions: Vec<RegionRecord> =
        read_records(&paths.regions, b',', utf8, &["code", "nom"], &mut diagnostics)?;
    let departments: Vec<DepartmentRecord> = read_records(
        &paths.departements,
        b',',
        utf8,
        &["code", "nom", "codeRegion"],
        &mut diagnostics,
    )?;
    let epcis: Vec<EpciRecord> = read_records(
        &paths.epcis,
        b',',
        utf8,
        &["EPCI", "NOM_EPCI", "DEPARTEMENTS_DE_L_EPCI"],
        &mut diagnostics,
    )?;

    tracing::info!(
        regions = regions.len(),
        departments = departments.len(),
        epci_rows = epcis.len(),
        "Territory tables loaded"
    );

    let (catalog, build_diagnostics) = TerritoryCatalog::from_records(regions, departments, epcis);
    diagnostics.extend(build_diagnostics);
    Ok((catalog, diagnostics))
}
