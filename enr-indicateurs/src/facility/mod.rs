//! Installations de production (points) et leur filtrage par territoire et filière

pub mod loader;

use chrono::NaiveDate;
use geo::Point;

use crate::types::{EnergySource, TerritoryType, Zone};

pub use loader::{load, FacilityLayer, LayerKind};

/// Une installation de production
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub name: String,
    pub energy_source: EnergySource,

    /// Sous-type brut de la source (`typo`, `type`)
    pub raw_type: Option<String>,
    pub commissioning_date: Option<NaiveDate>,
    pub power_mw: Option<f64>,
    pub energy_gwh: Option<f64>,

    /// Localisation (WGS84)
    pub location: Point<f64>,

    /// Noms canoniques des territoires contenant l'installation
    pub epci: Option<String>,
    pub department: String,
    pub region: String,
}

impl Facility {
    /// Nom du territoire contenant l'installation au niveau demandé
    pub fn territory(&self, kind: TerritoryType) -> Option<&str> {
        match kind {
            TerritoryType::Region => Some(&self.region),
            TerritoryType::Department => Some(&self.department),
            TerritoryType::Epci => self.epci.as_deref(),
        }
    }
}

/// Instantané immuable des installations
#[derive(Debug, Clone, Default)]
pub struct FacilityStore {
    facilities: Vec<Facility>,
}

impl FacilityStore {
    pub fn new(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }

    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.iter()
    }

    /// Sélectionne les installations d'un territoire et d'un ensemble de filières
    ///
    /// - Région + sentinelle: aucune restriction territoriale (France entière)
    /// - autre niveau + sentinelle: installations rattachées à un territoire de ce niveau
    /// - filières vides: toutes les filières
    ///
    /// Le résultat n'est jamais tronqué.
    pub fn select(
        &self,
        kind: TerritoryType,
        zone: &Zone,
        energy_sources: &[EnergySource],
    ) -> Vec<&Facility> {
        self.facilities
            .iter()
            .filter(|f| match (kind, zone) {
                (TerritoryType::Region, Zone::All) => true,
                (_, Zone::All) => f.territory(kind).is_some(),
                (_, Zone::Named(name)) => f.territory(kind) == Some(name.as_str()),
            })
            .filter(|f| energy_sources.is_empty() || energy_sources.contains(&f.energy_source))
            .collect()
    }
}
