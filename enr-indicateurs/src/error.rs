//! Types d'erreurs et d'avertissements pour le crate enr-indicateurs

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::TerritoryType;

/// Erreurs fatales (données de référence) ou erreurs de l'appelant
#[derive(Debug, Error)]
pub enum EnrError {
    /// Source de données de référence absente: la construction échoue
    #[error("Missing reference source: {}", .0.display())]
    MissingSource(PathBuf),

    /// Erreur d'I/O lors de la lecture d'une source
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fichier CSV illisible (en-tête invalide, encodage, ...)
    #[error("CSV error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    /// Couche GeoJSON invalide
    #[error("Invalid GeoJSON in {file}: {reason}")]
    GeoJson { file: String, reason: String },

    /// Colonne obligatoire absente
    #[error("Missing column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    /// Encodage non supporté
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Indicateur hors de l'énumération connue
    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    /// Type de territoire inconnu
    #[error("Unknown territory type: {0}")]
    UnknownTerritoryType(String),

    /// Filière inconnue
    #[error("Unknown energy source: {0}")]
    UnknownEnergySource(String),

    /// Source statistique inconnue
    #[error("Unknown provenance: {0}")]
    UnknownProvenance(String),

    /// Territoire absent du catalogue
    #[error("Territory not found: {kind} '{name}'")]
    TerritoryNotFound { kind: TerritoryType, name: String },

    /// Extrait CSV relu invalide
    #[error("Invalid table slice at line {line}: {reason}")]
    InvalidSlice { line: u64, reason: String },

    /// Cache de snapshot inutilisable après une construction interrompue
    #[error("Snapshot cache poisoned")]
    CachePoisoned,
}

impl EnrError {
    /// Crée une erreur d'I/O avec le chemin en contexte
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Crée une erreur CSV avec le fichier en contexte
    pub fn csv(file: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            file: file.into(),
            source,
        }
    }

    pub fn not_found(kind: TerritoryType, name: impl Into<String>) -> Self {
        Self::TerritoryNotFound {
            kind,
            name: name.into(),
        }
    }
}

/// Problèmes de qualité de données non fatals: la ligne ou l'entité est
/// écartée, la construction continue
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataWarning {
    /// Une ligne référence un territoire absent du catalogue
    #[error("{file}: unresolved territory {kind} '{zone}'")]
    UnresolvedTerritory {
        file: String,
        kind: TerritoryType,
        zone: String,
    },

    /// Champ départements d'un EPCI sans aucun code valide
    #[error("EPCI {code} ({name}): no valid department in '{raw}'")]
    MalformedEpciDepartments {
        code: String,
        name: String,
        raw: String,
    },

    /// Ligne illisible dans une source par ailleurs valide
    #[error("{file} line {line}: {reason}")]
    MalformedRow {
        file: String,
        line: u64,
        reason: String,
    },

    /// Installation sans géométrie
    #[error("{file}: facility '{name}' has no geometry")]
    EmptyGeometry { file: String, name: String },

    /// Territoire réel dont le code ou le nom entre en collision avec la sentinelle
    #[error("{kind} '{value}' collides with the sentinel territory")]
    SentinelCollision { kind: TerritoryType, value: String },
}

impl DataWarning {
    /// Catégorie stable utilisée pour les compteurs du rapport
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnresolvedTerritory { .. } => "unresolved_territory",
            Self::MalformedEpciDepartments { .. } => "malformed_epci_departments",
            Self::MalformedRow { .. } => "malformed_row",
            Self::EmptyGeometry { .. } => "empty_geometry",
            Self::SentinelCollision { .. } => "sentinel_collision",
        }
    }

    pub fn malformed_row(file: impl Into<String>, line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn unresolved(
        file: impl Into<String>,
        kind: TerritoryType,
        zone: impl Into<String>,
    ) -> Self {
        Self::UnresolvedTerritory {
            file: file.into(),
            kind,
            zone: zone.into(),
        }
    }
}

/// Diagnostics accumulés pendant la construction
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub warnings: Vec<DataWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un avertissement
    pub fn record(&mut self, warning: DataWarning) {
        tracing::debug!(category = warning.category(), "{}", warning);
        self.warnings.push(warning);
    }

    /// Fusionne les diagnostics d'une autre étape
    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Nombre d'avertissements d'une catégorie
    pub fn count(&self, category: &str) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.category() == category)
            .count()
    }

    /// Compteurs par catégorie
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for warning in &self.warnings {
            *counts.entry(warning.category()).or_insert(0) += 1;
        }
        counts
    }
}
