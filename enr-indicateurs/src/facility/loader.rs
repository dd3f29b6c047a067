//! Chargement des couches GeoJSON d'installations

use std::path::PathBuf;

use chrono::NaiveDate;
use geo::Centroid;
use geojson::{GeoJson, JsonObject, JsonValue};

use crate::error::{DataWarning, Diagnostics};
use crate::facility::{Facility, FacilityStore};
use crate::parse::{file_label, parse_number, read_text};
use crate::territory::TerritoryCatalog;
use crate::types::{EnergySource, TerritoryType};
use crate::EnrError;

/// Nombre d'heures dans une année, pour convertir une capacité annuelle en puissance
const HOURS_PER_YEAR: f64 = 365.0 * 24.0;

/// Schéma d'attributs d'une couche
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Registre des installations (`nominstallation`, `Filière`, `puiss_MW`, ...)
    Installations,
    /// Points d'injection de biométhane (capacité en GWh/an, quantité en MWh)
    Biomethane,
}

/// Une couche d'installations à charger
#[derive(Debug, Clone)]
pub struct FacilityLayer {
    pub path: PathBuf,
    pub kind: LayerKind,
}

/// Charge toutes les couches en un seul instantané
///
/// Les installations sans géométrie, de filière inconnue ou dont les
/// territoires ne sont pas cohérents avec le catalogue sont écartées.
pub fn load(
    layers: &[FacilityLayer],
    catalog: &TerritoryCatalog,
) -> Result<(FacilityStore, Diagnostics), EnrError> {
    let mut diagnostics = Diagnostics::new();
    let mut facilities = Vec::new();

    for layer in layers {
        let file = file_label(&layer.path);
        let text = read_text(&layer.path, encoding_rs::UTF_8)?;
        let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| EnrError::GeoJson {
            file: file.clone(),
            reason: e.to_string(),
        })?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(EnrError::GeoJson {
                file,
                reason: "expected a FeatureCollection".to_string(),
            });
        };

        let before = facilities.len();
        for (idx, feature) in collection.features.into_iter().enumerate() {
            match read_feature(layer.kind, &file, idx, feature, catalog) {
                Ok(facility) => facilities.push(facility),
                Err(warning) => diagnostics.record(warning),
            }
        }
        tracing::info!(
            file = %file,
            kind = ?layer.kind,
            facilities = facilities.len() - before,
            "Facility layer loaded"
        );
    }

    Ok((FacilityStore::new(facilities), diagnostics))
}

fn read_feature(
    kind: LayerKind,
    file: &str,
    idx: usize,
    feature: geojson::Feature,
    catalog: &TerritoryCatalog,
) -> Result<Facility, DataWarning> {
    let props = feature.properties.as_ref();
    let name_keys: &[&str] = match kind {
        LayerKind::Installations => &["nominstallation"],
        LayerKind::Biomethane => &["nom_du_projet", "site"],
    };
    let name = prop_str(props, name_keys).unwrap_or_else(|| format!("#{}", idx + 1));

    let location = feature
        .geometry
        .map(|g| {
            geo::Geometry::<f64>::try_from(g).map_err(|e| {
                DataWarning::malformed_row(file, idx as u64 + 1, format!("invalid geometry: {e}"))
            })
        })
        .transpose()?
        .and_then(|g| g.centroid())
        .ok_or_else(|| DataWarning::EmptyGeometry {
            file: file.to_string(),
            name: name.clone(),
        })?;

    let (region, department, epci) = resolve_territories(file, props, catalog)?;

    let facility = match kind {
        LayerKind::Installations => {
            let raw = prop_str(props, &["Filière", "filiere"]).unwrap_or_default();
            let energy_source = EnergySource::normalize(&raw).ok_or_else(|| {
                DataWarning::malformed_row(
                    file,
                    idx as u64 + 1,
                    format!("unknown energy source '{raw}'"),
                )
            })?;
            Facility {
                name,
                energy_source,
                raw_type: prop_str(props, &["typo"]),
                commissioning_date: prop_str(props, &["date_inst"]).and_then(|s| parse_date(&s)),
                power_mw: prop_f64(props, &["puiss_MW"]),
                energy_gwh: prop_f64(props, &["energie_GWh"]),
                location,
                epci,
                department,
                region,
            }
        }
        LayerKind::Biomethane => Facility {
            name,
            energy_source: EnergySource::BiomethaneInjection,
            raw_type: prop_str(props, &["type", "typo"]),
            commissioning_date: prop_str(props, &["date_de_mes"]).and_then(|s| parse_date(&s)),
            power_mw: prop_f64(props, &["capacite_de_production_gwh_an"])
                .map(|gwh_per_year| gwh_per_year / HOURS_PER_YEAR * 1e3),
            energy_gwh: prop_f64(props, &["quantite_annuelle_injectee_en_mwh"])
                .map(|mwh| mwh * 1e-3),
            location,
            epci,
            department,
            region,
        },
    };
    Ok(facility)
}

/// Vérifie que (région, département, EPCI) forme une chaîne cohérente du catalogue
fn resolve_territories(
    file: &str,
    props: Option<&JsonObject>,
    catalog: &TerritoryCatalog,
) -> Result<(String, String, Option<String>), DataWarning> {
    let region_name = prop_str(props, &["NOM_REG", "region"]).unwrap_or_default();
    let department_name = prop_str(props, &["NOM_DEP", "departement"]).unwrap_or_default();
    let epci_name = prop_str(props, &["NOM_EPCI", "nom_epci"]);

    let region = catalog
        .resolve(TerritoryType::Region, &region_name)
        .ok()
        .filter(|r| !r.is_sentinel())
        .ok_or_else(|| DataWarning::unresolved(file, TerritoryType::Region, &region_name))?;
    let department = catalog
        .resolve(TerritoryType::Department, &department_name)
        .ok()
        .filter(|d| d.region_code.as_deref() == Some(region.code.as_str()))
        .ok_or_else(|| DataWarning::unresolved(file, TerritoryType::Department, &department_name))?;
    let epci = match epci_name {
        Some(epci_name) => {
            let epci = catalog
                .resolve(TerritoryType::Epci, &epci_name)
                .ok()
                .filter(|e| e.department_codes.contains(&department.code))
                .ok_or_else(|| DataWarning::unresolved(file, TerritoryType::Epci, &epci_name))?;
            Some(epci.name.clone())
        }
        None => None,
    };

    Ok((region.name.clone(), department.name.clone(), epci))
}

/// Premier attribut texte non vide parmi les clés candidates
fn prop_str(props: Option<&JsonObject>, keys: &[&str]) -> Option<String> {
    let props = props?;
    keys.iter().find_map(|key| match props.get(*key)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Premier attribut numérique parmi les clés candidates
fn prop_f64(props: Option<&JsonObject>, keys: &[&str]) -> Option<f64> {
    let props = props?;
    keys.iter().find_map(|key| match props.get(*key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => parse_number(s),
        _ => None,
    })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::territory::tests::sample_catalog;
    use crate::types::Zone;

    const INSTALLATIONS: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.59, 45.36]},
         "properties": {"nominstallation": "Parc de Voiron", "Filière": "Eolien", "typo": "Eolien terrestre",
                        "date_inst": "2019-06-01", "puiss_MW": 12.5, "energie_GWh": "25,2",
                        "NOM_EPCI": "CA du Pays Voironnais", "NOM_DEP": "Isère", "NOM_REG": "Auvergne-Rhône-Alpes"}},
        {"type": "Feature", "geometry": null,
         "properties": {"nominstallation": "Sans géométrie", "Filière": "Photovoltaïque",
                        "NOM_DEP": "Isère", "NOM_REG": "Auvergne-Rhône-Alpes"}},
        {"type": "Feature", "geometry": {"type": "Polygon", "coordinates": [[[6.0, 45.0], [6.2, 45.0], [6.2, 45.2], [6.0, 45.2], [6.0, 45.0]]]},
         "properties": {"nominstallation": "Toiture Chambéry", "Filière": "Solaire",
                        "NOM_DEP": "Savoie", "NOM_REG": "Auvergne-Rhône-Alpes"}},
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [7.75, 48.58]},
         "properties": {"nominstallation": "Incohérente", "Filière": "Eolien",
                        "NOM_DEP": "Bas-Rhin", "NOM_REG": "Auvergne-Rhône-Alpes"}},
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [7.75, 48.58]},
         "properties": {"nominstallation": "Barrage", "Filière": "Hydraulique",
                        "NOM_DEP": "Bas-Rhin", "NOM_REG": "Grand Est"}}
      ]
    }"#;

    const BIOMETHANE: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [7.7, 48.5]},
         "properties": {"nom_du_projet": "Biogaz Strasbourg", "type": "Agricole autonome",
                        "date_de_mes": "2020-03-15", "capacite_de_production_gwh_an": 87.6,
                        "quantite_annuelle_injectee_en_mwh": 52000,
                        "NOM_EPCI": "Eurométropole de Strasbourg", "NOM_DEP": "Bas-Rhin", "NOM_REG": "Grand Est"}}
      ]
    }"#;

    fn write_layer(name: &str, content: &str, kind: LayerKind) -> FacilityLayer {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, content).unwrap();
        FacilityLayer { path, kind }
    }

    #[test]
    fn test_load_installations_layer() {
        let catalog = sample_catalog();
        let layer = write_layer(
            "enr_facility_installations.geojson",
            INSTALLATIONS,
            LayerKind::Installations,
        );
        let (store, diagnostics) = load(&[layer.clone()], &catalog).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(diagnostics.count("empty_geometry"), 1);
        assert_eq!(diagnostics.count("unresolved_territory"), 1);
        assert_eq!(diagnostics.count("malformed_row"), 1);

        let voiron = store.iter().find(|f| f.name == "Parc de Voiron").unwrap();
        assert_eq!(voiron.energy_source, EnergySource::Wind);
        assert_eq!(voiron.energy_gwh, Some(25.2));
        assert_eq!(voiron.commissioning_date, NaiveDate::from_ymd_opt(2019, 6, 1));
        assert_eq!(voiron.epci.as_deref(), Some("CA du Pays Voironnais"));

        let toiture = store.iter().find(|f| f.name == "Toiture Chambéry").unwrap();
        assert!((toiture.location.x() - 6.1).abs() < 1e-9);
        assert_eq!(toiture.epci, None);

        std::fs::remove_file(layer.path).ok();
    }

    #[test]
    fn test_load_biomethane_layer_converts_units() {
        let catalog = sample_catalog();
        let layer =
            write_layer("enr_facility_biomethane.geojson", BIOMETHANE, LayerKind::Biomethane);
        let (store, diagnostics) = load(&[layer.clone()], &catalog).unwrap();

        assert!(diagnostics.is_empty());
        let site = store
            .select(
                TerritoryType::Region,
                &Zone::named("Grand Est"),
                &[EnergySource::BiomethaneInjection],
            )
            .pop()
            .unwrap();
        assert!((site.power_mw.unwrap() - 10.0).abs() < 1e-9);
        assert!((site.energy_gwh.unwrap() - 52.0).abs() < 1e-9);
        assert_eq!(site.raw_type.as_deref(), Some("Agricole autonome"));

        std::fs::remove_file(layer.path).ok();
    }

    #[test]
    fn test_load_rejects_non_collection() {
        let catalog = sample_catalog();
        let layer = write_layer(
            "enr_facility_point.geojson",
            r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#,
            LayerKind::Installations,
        );
        assert!(matches!(load(&[layer.clone()], &catalog), Err(EnrError::GeoJson { .. })));
        std::fs::remove_file(layer.path).ok();
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2021-02-03"), NaiveDate::from_ymd_opt(2021, 2, 3));
        assert_eq!(parse_date("03/02/2021"), NaiveDate::from_ymd_opt(2021, 2, 3));
        assert_eq!(parse_date("2021-02-03T00:00:00"), NaiveDate::from_ymd_opt(2021, 2, 3));
        assert_eq!(parse_date("inconnue"), None);
    }
}
