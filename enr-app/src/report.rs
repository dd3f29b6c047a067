//! Rapport de construction d'un instantané
//!
//! Collecte les compteurs du chargement (territoires, installations, faits
//! par source) et les avertissements de qualité de données.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use enr_indicateurs::{Provenance, Snapshot, TerritoryType};
use serde::Serialize;

/// Statut global de la construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildStatus {
    /// Construction sans avertissement
    Success,
    /// Construction réussie, lignes écartées
    PartialSuccess,
    /// Construction échouée (source de référence absente ou illisible)
    Failed,
}

/// Statistiques d'une source d'indicateurs
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub file: String,
    pub provenance: String,
    /// Faits retenus après normalisation
    pub facts: usize,
}

/// Rapport complet de construction
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Preset ou fichier de configuration utilisé
    pub config: String,
    /// Empreinte des fichiers d'entrée
    pub fingerprint: Option<String>,
    pub duration_secs: f64,
    pub status: BuildStatus,

    /// Territoires par niveau
    pub territories: BTreeMap<String, usize>,
    /// Installations par filière
    pub facilities: BTreeMap<String, usize>,
    pub sources: Vec<SourceStats>,

    /// Lignes de la table fusionnée
    pub rows: usize,
    /// Valeurs nationales calculées
    pub computed_values: usize,
    /// Valeurs remplacées par une source prioritaire
    pub overridden: usize,

    /// Avertissements par catégorie
    pub warnings_by_category: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl BuildReport {
    /// Crée un rapport vide pour une configuration
    pub fn new(config: &str) -> Self {
        Self {
            config: config.to_string(),
            fingerprint: None,
            duration_secs: 0.0,
            status: BuildStatus::Success,
            territories: BTreeMap::new(),
            facilities: BTreeMap::new(),
            sources: Vec::new(),
            rows: 0,
            computed_values: 0,
            overridden: 0,
            warnings_by_category: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Remplit le rapport depuis un instantané construit
    pub fn record_snapshot(&mut self, snapshot: &Snapshot) {
        self.fingerprint = Some(snapshot.fingerprint.clone());
        for kind in TerritoryType::ALL {
            self.territories
                .insert(kind.label().to_string(), snapshot.catalog.count(kind));
        }
        for facility in snapshot.facilities.iter() {
            *self
                .facilities
                .entry(facility.energy_source.label().to_string())
                .or_default() += 1;
        }
        self.sources = snapshot
            .sources
            .iter()
            .map(|s| SourceStats {
                file: s.file.clone(),
                provenance: s.provenance.label().to_string(),
                facts: s.facts,
            })
            .collect();
        self.rows = snapshot.table.len();
        self.computed_values = snapshot.table.count_provenance(Provenance::ComputedSum);
        self.overridden = snapshot.overridden;

        for (category, count) in snapshot.diagnostics.counts() {
            self.warnings_by_category.insert(category.to_string(), count);
        }
        self.warnings = snapshot
            .diagnostics
            .warnings
            .iter()
            .map(|w| w.to_string())
            .collect();
    }

    /// Enregistre une erreur fatale
    pub fn record_failure(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    /// Définit la durée de la construction
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if !self.errors.is_empty() {
            BuildStatus::Failed
        } else if !self.warnings.is_empty() {
            BuildStatus::PartialSuccess
        } else {
            BuildStatus::Success
        };
    }

    /// Nombre total d'installations
    pub fn total_facilities(&self) -> usize {
        self.facilities.values().sum()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("BUILD REPORT - {}", self.config);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        if let Some(ref fingerprint) = self.fingerprint {
            println!("Fingerprint: {}", fingerprint);
        }

        println!("\n--- TERRITORIES ---");
        for (kind, count) in &self.territories {
            println!("  {}: {}", kind, count);
        }

        println!("\n--- FACILITIES ({}) ---", self.total_facilities());
        for (source, count) in &self.facilities {
            println!("  {}: {}", source, count);
        }

        println!("\n--- INDICATORS ---");
        for s in &self.sources {
            println!("  {} [{}]: {} facts", s.file, s.provenance, s.facts);
        }
        println!(
            "Table: {} rows, {} computed values, {} overridden",
            self.rows, self.computed_values, self.overridden
        );

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for (category, count) in &self.warnings_by_category {
                println!("  {}: {}", category, count);
            }
            for w in self.warnings.iter().take(10) {
                println!("  {}", w);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in &self.errors {
                println!("  {}", e);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} rows, {} facilities, {} warnings, {} errors",
            self.config,
            self.rows,
            self.total_facilities(),
            self.warnings.len(),
            self.errors.len()
        )
    }
}
