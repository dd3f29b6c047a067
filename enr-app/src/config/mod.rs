//! Configuration des fichiers d'entrée

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use enr_indicateurs::parse::encoding_for_label;
use enr_indicateurs::{
    FacilityLayer, LayerKind, ObjectivesFile, Provenance, SnapshotPaths, SourceFile,
    TerritoryPaths,
};

/// Variable d'environnement remplaçant le répertoire de données
pub const DATA_DIR_ENV: &str = "ENR_DATA_DIR";

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Répertoire de base des chemins relatifs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    pub territories: TerritoryFiles,

    #[serde(default)]
    pub facilities: Vec<LayerConfig>,

    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub objectives: Vec<ObjectivesConfig>,
}

/// Tables de référence des territoires
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TerritoryFiles {
    pub regions: PathBuf,
    pub departements: PathBuf,
    pub epcis: PathBuf,
}

/// Couche GeoJSON d'installations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayerConfig {
    pub path: PathBuf,

    /// Schéma d'attributs: `installations` ou `biomethane`
    #[serde(default = "default_layer_kind")]
    pub kind: String,
}

/// Source statistique au format long
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Provenance (registre, grdf, odre_gaz, sdes)
    pub provenance: String,

    pub path: PathBuf,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Encodage du fichier (utf-8, windows-1252, ...)
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

/// Objectifs SRADDET d'une région (code ou nom)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectivesConfig {
    pub region: String,
    pub path: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_layer_kind() -> String {
    "installations".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "default" => Self::load_embedded(include_str!("presets/default.json")),
            "indicateurs" => Self::load_embedded(include_str!("presets/indicateurs.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: default, indicateurs", preset),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Preset embarqué ou chemin vers un fichier JSON, puis surcharge par l'environnement
    pub fn resolve(spec: &str) -> Result<Self> {
        let mut config = match spec {
            "default" | "indicateurs" => Self::from_preset(spec)?,
            _ => Self::load(Path::new(spec))?,
        };
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        Ok(config)
    }

    fn path(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.data_dir.join(relative)
        }
    }

    /// Convertit la configuration en entrées d'instantané
    pub fn snapshot_paths(&self) -> Result<SnapshotPaths> {
        let territories = TerritoryPaths {
            regions: self.path(&self.territories.regions),
            departements: self.path(&self.territories.departements),
            epcis: self.path(&self.territories.epcis),
        };

        let facilities = self
            .facilities
            .iter()
            .map(|layer| {
                let kind = match layer.kind.as_str() {
                    "installations" => LayerKind::Installations,
                    "biomethane" => LayerKind::Biomethane,
                    other => anyhow::bail!(
                        "Unknown layer kind: {}. Use: installations, biomethane",
                        other
                    ),
                };
                Ok(FacilityLayer {
                    path: self.path(&layer.path),
                    kind,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let sources = self
            .sources
            .iter()
            .map(|source| {
                let provenance: Provenance = source
                    .provenance
                    .parse()
                    .with_context(|| format!("Invalid source {}", source.path.display()))?;
                if !source.delimiter.is_ascii() {
                    anyhow::bail!("Delimiter must be ASCII: '{}'", source.delimiter);
                }
                Ok(SourceFile {
                    provenance,
                    path: self.path(&source.path),
                    delimiter: source.delimiter as u8,
                    encoding: encoding_for_label(&source.encoding)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let objectives = self
            .objectives
            .iter()
            .map(|o| ObjectivesFile {
                region: o.region.clone(),
                path: self.path(&o.path),
            })
            .collect();

        Ok(SnapshotPaths {
            territories,
            facilities,
            sources,
            objectives,
        })
    }
}
