//! Types de données partagés: territoires, filières, indicateurs, provenances

use std::fmt;
use std::str::FromStr;

use crate::parse::fold;
use crate::EnrError;

/// Niveau administratif d'un territoire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TerritoryType {
    Region,
    Department,
    Epci,
}

impl TerritoryType {
    pub const ALL: [TerritoryType; 3] = [Self::Region, Self::Department, Self::Epci];

    /// Libellé utilisé dans les sources et les exports (`TypeZone`)
    pub fn label(self) -> &'static str {
        match self {
            Self::Region => "Régions",
            Self::Department => "Départements",
            Self::Epci => "Epci",
        }
    }

    /// Nom de la sentinelle "tous les territoires" de ce niveau
    pub fn sentinel_name(self) -> &'static str {
        match self {
            Self::Region => "Toutes",
            Self::Department | Self::Epci => "Tous",
        }
    }

    /// Le libellé désigne-t-il la sentinelle de ce niveau ?
    ///
    /// `France` est un alias de la sentinelle régionale (agrégat national).
    pub fn is_sentinel_label(self, value: &str) -> bool {
        let value = value.trim();
        value == SENTINEL_CODE
            || fold(value) == fold(self.sentinel_name())
            || (self == Self::Region && fold(value) == "france")
    }

    /// Niveau immédiatement inférieur
    pub fn child(self) -> Option<TerritoryType> {
        match self {
            Self::Region => Some(Self::Department),
            Self::Department => Some(Self::Epci),
            Self::Epci => None,
        }
    }
}

/// Code réservé aux sentinelles, jamais utilisé par un territoire réel
pub const SENTINEL_CODE: &str = "*";

impl fmt::Display for TerritoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TerritoryType {
    type Err = EnrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold(s.trim()).as_str() {
            "regions" | "region" => Ok(Self::Region),
            "departements" | "departement" | "department" | "departments" => {
                Ok(Self::Department)
            }
            "epci" | "epcis" => Ok(Self::Epci),
            _ => Err(EnrError::UnknownTerritoryType(s.to_string())),
        }
    }
}

/// Territoire désigné dans une clé: la sentinelle ou un territoire nommé
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Zone {
    All,
    Named(String),
}

impl Zone {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Interprète un libellé: sentinelle du niveau ou nom de territoire
    pub fn parse(kind: TerritoryType, value: &str) -> Self {
        if kind.is_sentinel_label(value) {
            Self::All
        } else {
            Self::Named(value.trim().to_string())
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(name) => Some(name),
        }
    }

    /// Libellé d'affichage et d'export
    pub fn label(&self, kind: TerritoryType) -> &str {
        match self {
            Self::All => kind.sentinel_name(),
            Self::Named(name) => name,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Filière de production renouvelable
///
/// L'ordre de déclaration suit l'ordre alphabétique des libellés.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnergySource {
    Wind,
    BiomethaneInjection,
    ElectricMethanization,
    Photovoltaic,
}

impl EnergySource {
    pub const ALL: [EnergySource; 4] = [
        Self::Wind,
        Self::BiomethaneInjection,
        Self::ElectricMethanization,
        Self::Photovoltaic,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Wind => "Eolien",
            Self::BiomethaneInjection => "Injection de biométhane",
            Self::ElectricMethanization => "Méthanisation électrique",
            Self::Photovoltaic => "Photovoltaïque",
        }
    }

    /// Normalise un libellé brut de source (sous-types compris)
    pub fn normalize(raw: &str) -> Option<Self> {
        let folded = fold(raw.trim());
        if folded.is_empty() {
            return None;
        }
        if folded.contains("eolien") || folded.contains("wind") {
            Some(Self::Wind)
        } else if folded.contains("injection") || folded.contains("biomethane") {
            Some(Self::BiomethaneInjection)
        } else if folded.contains("methanisation")
            || folded.contains("methanization")
            || folded.contains("biogaz")
        {
            Some(Self::ElectricMethanization)
        } else if folded.contains("photovolta")
            || folded.contains("solaire")
            || folded.contains("solar")
            || folded == "pv"
        {
            Some(Self::Photovoltaic)
        } else {
            None
        }
    }
}

impl fmt::Display for EnergySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EnergySource {
    type Err = EnrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s).ok_or_else(|| EnrError::UnknownEnergySource(s.to_string()))
    }
}

/// Indicateur canonique, chacun dans une unité fixe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Indicator {
    /// Puissance installée (MW)
    Power,
    /// Énergie produite (GWh)
    Energy,
    /// Nombre de sites
    SiteCount,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [Self::Power, Self::Energy, Self::SiteCount];

    /// Nom de colonne canonique
    pub fn column(self) -> &'static str {
        match self {
            Self::Power => "puiss_MW",
            Self::Energy => "energie_GWh",
            Self::SiteCount => "Nombre de sites",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Power => "MW",
            Self::Energy => "GWh",
            Self::SiteCount => "sites",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Power => 0,
            Self::Energy => 1,
            Self::SiteCount => 2,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Strict: seuls les noms canoniques et leurs équivalents anglais sont acceptés
impl FromStr for Indicator {
    type Err = EnrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "puiss_MW" | "power" => Ok(Self::Power),
            "energie_GWh" | "energy" => Ok(Self::Energy),
            "Nombre de sites" | "site-count" => Ok(Self::SiteCount),
            _ => Err(EnrError::UnknownIndicator(s.to_string())),
        }
    }
}

/// Origine d'une valeur d'indicateur
///
/// L'ordre de déclaration est l'ordre de priorité: en cas de doublon, la
/// provenance la plus tardive l'emporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provenance {
    /// Estimation dérivée du registre national des installations (ODRÉ)
    Registre,
    /// Capacités d'injection GRDF
    Grdf,
    /// Points d'injection de biométhane ODRÉ
    OdreGaz,
    /// Statistiques régionales et départementales du SDES
    Sdes,
    /// Somme calculée des lignes régionales
    ComputedSum,
}

impl Provenance {
    /// Sources primaires, de la moins à la plus prioritaire
    pub const PRECEDENCE: [Provenance; 4] =
        [Self::Registre, Self::Grdf, Self::OdreGaz, Self::Sdes];

    pub fn label(self) -> &'static str {
        match self {
            Self::Registre => "ODRÉ registre",
            Self::Grdf => "GRDF",
            Self::OdreGaz => "ODRÉ gaz",
            Self::Sdes => "SDES",
            Self::ComputedSum => "computed sum",
        }
    }

    pub fn priority(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Provenance {
    type Err = EnrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold(s.trim()).replace([' ', '-'], "_").as_str() {
            "registre" | "odre" | "odre_registre" => Ok(Self::Registre),
            "grdf" => Ok(Self::Grdf),
            "odre_gaz" => Ok(Self::OdreGaz),
            "sdes" => Ok(Self::Sdes),
            "computed_sum" => Ok(Self::ComputedSum),
            _ => Err(EnrError::UnknownProvenance(s.to_string())),
        }
    }
}

/// Critère sur une dimension de requête: tout, une valeur, ou une liste
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector<T> {
    #[default]
    All,
    One(T),
    Many(Vec<T>),
}

impl<T: PartialEq> Selector<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::One(v) => v == value,
            Self::Many(values) => values.contains(value),
        }
    }
}

impl<T> From<T> for Selector<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}
