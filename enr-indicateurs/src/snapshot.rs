//! Instantané complet des données et cache partagé par processus
//!
//! Un instantané regroupe catalogue, installations, table d'indicateurs et
//! objectifs. Il est construit une fois puis partagé en lecture seule; un
//! rechargement explicite le remplace en bloc.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use blake3::Hasher;

use crate::error::Diagnostics;
use crate::facility::{self, FacilityLayer, FacilityStore};
use crate::indicator::merge::{self, SourceFile, SourceSummary};
use crate::indicator::{IndicatorTable, QueryService};
use crate::objectives::Objectives;
use crate::parse::fold;
use crate::territory::{self, TerritoryCatalog, TerritoryPaths};
use crate::EnrError;

/// Fichier d'objectifs rattaché à une région
#[derive(Debug, Clone)]
pub struct ObjectivesFile {
    pub region: String,
    pub path: PathBuf,
}

/// Ensemble des entrées d'un instantané
#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    pub territories: TerritoryPaths,
    pub facilities: Vec<FacilityLayer>,
    pub sources: Vec<SourceFile>,
    pub objectives: Vec<ObjectivesFile>,
}

impl SnapshotPaths {
    /// Tous les fichiers d'entrée, dans un ordre stable
    pub fn files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = vec![
            &self.territories.regions,
            &self.territories.departements,
            &self.territories.epcis,
        ];
        files.extend(self.facilities.iter().map(|l| l.path.as_path()));
        files.extend(self.sources.iter().map(|s| s.path.as_path()));
        files.extend(self.objectives.iter().map(|o| o.path.as_path()));
        files
    }
}

/// Empreinte blake3 (hexadécimale) du contenu de tous les fichiers d'entrée
pub fn fingerprint(paths: &SnapshotPaths) -> Result<String, EnrError> {
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 65536];

    for path in paths.files() {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EnrError::MissingSource(path.to_path_buf()),
            _ => EnrError::io(path, e),
        })?;
        hasher.update(path.to_string_lossy().as_bytes());
        loop {
            let bytes_read = file.read(&mut buffer).map_err(|e| EnrError::io(path, e))?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
    }

    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Données chargées et fusionnées, immuables
#[derive(Debug)]
pub struct Snapshot {
    pub catalog: TerritoryCatalog,
    pub facilities: FacilityStore,
    pub table: IndicatorTable,
    pub objectives: Vec<Objectives>,
    pub diagnostics: Diagnostics,
    pub sources: Vec<SourceSummary>,

    /// Valeurs remplacées lors du dédoublonnage
    pub overridden: usize,
    pub fingerprint: String,
    pub build_ms: u64,
}

impl Snapshot {
    /// Charge et fusionne toutes les entrées
    ///
    /// Une entrée absente fait échouer la construction; les problèmes de
    /// qualité sont accumulés dans `diagnostics`.
    pub fn build(paths: &SnapshotPaths) -> Result<Self, EnrError> {
        let start = Instant::now();
        let fingerprint = fingerprint(paths)?;

        let (catalog, mut diagnostics) = territory::load(&paths.territories)?;
        let (facilities, facility_diagnostics) = facility::load(&paths.facilities, &catalog)?;
        diagnostics.extend(facility_diagnostics);

        let merged = merge::build(&paths.sources, &catalog)?;
        diagnostics.extend(merged.diagnostics);

        let mut objectives = Vec::with_capacity(paths.objectives.len());
        for file in &paths.objectives {
            let region = catalog.resolve(crate::TerritoryType::Region, &file.region)?;
            objectives.push(Objectives::load(&file.path, &region.name, &mut diagnostics)?);
        }

        let build_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            facilities = facilities.len(),
            rows = merged.table.len(),
            warnings = diagnostics.len(),
            build_ms,
            fingerprint = %&fingerprint[..12],
            "Snapshot built"
        );

        Ok(Self {
            catalog,
            facilities,
            table: merged.table,
            objectives,
            diagnostics,
            sources: merged.sources,
            overridden: merged.overridden,
            fingerprint,
            build_ms,
        })
    }

    /// Service de requêtes sur cet instantané
    pub fn query(&self) -> QueryService<'_> {
        QueryService::new(&self.table, &self.facilities)
    }

    /// Objectifs d'une région, s'ils sont configurés
    pub fn objectives_for(&self, region: &str) -> Option<&Objectives> {
        let region = fold(region.trim());
        self.objectives.iter().find(|o| fold(&o.region) == region)
    }
}

/// Cache d'instantané partagé par processus
///
/// Le premier accès construit l'instantané; les lecteurs suivants partagent
/// le même `Arc`. `reload` reconstruit et remplace, les lecteurs en cours
/// gardent l'ancien instantané.
#[derive(Debug)]
pub struct SnapshotCache {
    paths: SnapshotPaths,
    current: Mutex<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new(paths: SnapshotPaths) -> Self {
        Self {
            paths,
            current: Mutex::new(None),
        }
    }

    pub fn paths(&self) -> &SnapshotPaths {
        &self.paths
    }

    /// Instantané courant, construit au premier appel
    pub fn get(&self) -> Result<Arc<Snapshot>, EnrError> {
        let mut current = self.current.lock().map_err(|_| EnrError::CachePoisoned)?;
        if let Some(snapshot) = current.as_ref() {
            return Ok(Arc::clone(snapshot));
        }
        let snapshot = Arc::new(Snapshot::build(&self.paths)?);
        *current = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Reconstruit l'instantané et remplace le courant
    ///
    /// En cas d'échec, l'instantané courant est conservé.
    pub fn reload(&self) -> Result<Arc<Snapshot>, EnrError> {
        let snapshot = Arc::new(Snapshot::build(&self.paths)?);
        let mut current = self.current.lock().map_err(|_| EnrError::CachePoisoned)?;
        *current = Some(Arc::clone(&snapshot));
        tracing::info!(fingerprint = %snapshot.fingerprint, "Snapshot reloaded");
        Ok(snapshot)
    }

    /// Les fichiers d'entrée ont-ils changé depuis la construction ?
    ///
    /// Toujours vrai si aucun instantané n'a encore été construit.
    pub fn is_stale(&self) -> Result<bool, EnrError> {
        let built = {
            let current = self.current.lock().map_err(|_| EnrError::CachePoisoned)?;
            current.as_ref().map(|s| s.fingerprint.clone())
        };
        match built {
            Some(built) => Ok(fingerprint(&self.paths)? != built),
            None => Ok(true),
        }
    }
}
