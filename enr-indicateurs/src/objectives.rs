//! Objectifs régionaux de production (SRADDET)
//!
//! Fichier large `Filière;2021;2026;2030;...`, valeurs en GWh. Seules les
//! filières connues sont retenues.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DataWarning, Diagnostics};
use crate::indicator::TableSlice;
use crate::parse::{file_label, parse_number, read_text};
use crate::types::{EnergySource, Indicator};
use crate::EnrError;

/// Objectifs d'une région, par (filière, année)
#[derive(Debug, Clone, PartialEq)]
pub struct Objectives {
    pub region: String,
    values: BTreeMap<(EnergySource, u16), f64>,
}

/// Ligne de la jointure réalisé / objectif
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveRow {
    pub energy_source: EnergySource,
    pub year: u16,
    pub actual: Option<f64>,
    pub objective: Option<f64>,
}

impl Objectives {
    /// Charge le fichier d'objectifs d'une région
    pub fn load(
        path: &Path,
        region: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, EnrError> {
        let file = file_label(path);
        let text = read_text(path, encoding_rs::UTF_8)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers().map_err(|e| EnrError::csv(&file, e))?.clone();
        if headers.get(0) != Some("Filière") {
            return Err(EnrError::MissingColumn {
                file,
                column: "Filière".to_string(),
            });
        }
        let mut years = Vec::with_capacity(headers.len());
        for header in headers.iter().skip(1) {
            let year = header.parse::<u16>().ok();
            if year.is_none() {
                let reason = format!("invalid year column '{header}'");
                diagnostics.record(DataWarning::malformed_row(&file, 1, reason));
            }
            years.push(year);
        }

        let mut values = BTreeMap::new();
        for (idx, record) in reader.records().enumerate() {
            let line = idx as u64 + 2;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    diagnostics.record(DataWarning::malformed_row(&file, line, e.to_string()));
                    continue;
                }
            };
            let raw_source = record.get(0).unwrap_or("");
            let Some(energy_source) = EnergySource::normalize(raw_source) else {
                tracing::debug!(file = %file, source = raw_source, "Objective row ignored");
                continue;
            };
            for (year, cell) in years.iter().zip(record.iter().skip(1)) {
                let Some(year) = year else { continue };
                if cell.is_empty() {
                    continue;
                }
                match parse_number(cell) {
                    Some(value) => {
                        values.insert((energy_source, *year), value);
                    }
                    None => diagnostics.record(DataWarning::malformed_row(
                        &file,
                        line,
                        format!("invalid objective '{cell}'"),
                    )),
                }
            }
        }

        tracing::info!(region, objectives = values.len(), "Objectives loaded");
        Ok(Self {
            region: region.to_string(),
            values,
        })
    }

    pub fn get(&self, energy_source: EnergySource, year: u16) -> Option<f64> {
        self.values.get(&(energy_source, year)).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Jointure externe avec un extrait de production, triée par (filière, année)
    ///
    /// Seules les filières présentes dans l'extrait ou les objectifs
    /// apparaissent; une valeur absente d'un côté reste vide.
    pub fn join(&self, slice: &TableSlice) -> Vec<ObjectiveRow> {
        let mut joined: BTreeMap<(EnergySource, u16), ObjectiveRow> = BTreeMap::new();
        for row in &slice.rows {
            let Some(actual) = slice.value(row, Indicator::Energy) else {
                continue;
            };
            joined
                .entry((row.energy_source, row.year))
                .or_insert_with(|| ObjectiveRow {
                    energy_source: row.energy_source,
                    year: row.year,
                    actual: None,
                    objective: None,
                })
                .actual = Some(actual);
        }
        for (&(energy_source, year), &objective) in &self.values {
            joined
                .entry((energy_source, year))
                .or_insert_with(|| ObjectiveRow {
                    energy_source,
                    year,
                    actual: None,
                    objective: None,
                })
                .objective = Some(objective);
        }
        joined.into_values().collect()
    }
}
