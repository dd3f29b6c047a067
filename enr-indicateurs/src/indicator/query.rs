//! Requêtes sur la table fusionnée et les installations
//!
//! Chaque requête porte ses critères explicitement; aucun état de sélection
//! n'est partagé entre deux appels.

use std::collections::BTreeSet;
use std::io::{Read, Write};

use crate::facility::{Facility, FacilityStore};
use crate::indicator::{IndicatorKey, IndicatorRow, IndicatorTable};
use crate::territory::TerritoryCatalog;
use crate::types::{EnergySource, Indicator, Selector, TerritoryType, Zone};
use crate::EnrError;

/// Colonnes de clé d'un extrait, avant les colonnes d'indicateurs
pub const KEY_COLUMNS: [&str; 4] = ["TypeZone", "Zone", "Filière", "annee"];

/// Critères d'une requête d'indicateurs
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorQuery {
    pub kind: TerritoryType,
    pub zones: Selector<Zone>,
    pub energy_sources: Selector<EnergySource>,
    pub years: Selector<u16>,
    pub indicators: Selector<Indicator>,
}

impl IndicatorQuery {
    /// Toutes les lignes d'un niveau, tous indicateurs
    pub fn new(kind: TerritoryType) -> Self {
        Self {
            kind,
            zones: Selector::All,
            energy_sources: Selector::All,
            years: Selector::All,
            indicators: Selector::All,
        }
    }

    pub fn zones(mut self, zones: impl Into<Selector<Zone>>) -> Self {
        self.zones = zones.into();
        self
    }

    pub fn energy_sources(mut self, sources: impl Into<Selector<EnergySource>>) -> Self {
        self.energy_sources = sources.into();
        self
    }

    pub fn years(mut self, years: impl Into<Selector<u16>>) -> Self {
        self.years = years.into();
        self
    }

    pub fn indicators(mut self, indicators: impl Into<Selector<Indicator>>) -> Self {
        self.indicators = indicators.into();
        self
    }

    /// Construit une requête depuis des libellés textuels
    ///
    /// Les zones sont des codes ou des noms résolus par le catalogue. Un type
    /// de territoire, un territoire, un indicateur ou une filière inconnus
    /// sont des erreurs de l'appelant, jamais un résultat vide. Une liste vide
    /// signifie "toutes les valeurs".
    pub fn from_labels(
        catalog: &TerritoryCatalog,
        type_zone: &str,
        zones: &[&str],
        energy_sources: &[&str],
        indicators: &[&str],
    ) -> Result<Self, EnrError> {
        let kind: TerritoryType = type_zone.parse()?;
        let query = Self::new(kind);
        let query = if zones.is_empty() {
            query
        } else {
            query.zones(Selector::Many(
                zones
                    .iter()
                    .map(|z| catalog.resolve(kind, z).map(|t| t.zone()))
                    .collect::<Result<Vec<Zone>, _>>()?,
            ))
        };
        let query = if energy_sources.is_empty() {
            query
        } else {
            query.energy_sources(Selector::Many(
                energy_sources
                    .iter()
                    .map(|s| s.parse())
                    .collect::<Result<Vec<EnergySource>, _>>()?,
            ))
        };
        Ok(if indicators.is_empty() {
            query
        } else {
            query.indicators(Selector::Many(
                indicators
                    .iter()
                    .map(|s| s.parse())
                    .collect::<Result<Vec<Indicator>, _>>()?,
            ))
        })
    }

    /// Indicateurs sélectionnés, dans l'ordre canonique
    pub fn selected_indicators(&self) -> Vec<Indicator> {
        Indicator::ALL
            .into_iter()
            .filter(|i| self.indicators.matches(i))
            .collect()
    }

    /// Zones demandées explicitement, sans doublon, dans l'ordre de l'appelant
    fn listed_zones(&self) -> Option<Vec<&Zone>> {
        let zones: Vec<&Zone> = match &self.zones {
            Selector::All => return None,
            Selector::One(zone) => vec![zone],
            Selector::Many(zones) => zones.iter().collect(),
        };
        let mut seen = BTreeSet::new();
        Some(zones.into_iter().filter(|z| seen.insert(*z)).collect())
    }

    fn matches_key(&self, key: &IndicatorKey) -> bool {
        self.energy_sources.matches(&key.energy_source) && self.years.matches(&key.year)
    }
}

/// Une ligne d'extrait: clé et valeurs alignées sur les colonnes d'indicateurs
#[derive(Debug, Clone, PartialEq)]
pub struct SliceRow {
    pub kind: TerritoryType,
    pub zone: Zone,
    pub energy_source: EnergySource,
    pub year: u16,
    pub values: Vec<Option<f64>>,
}

/// Résultat tabulaire d'une requête
///
/// Les colonnes sont toujours présentes, même sans aucune ligne.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSlice {
    pub indicators: Vec<Indicator>,
    pub rows: Vec<SliceRow>,
}

impl TableSlice {
    pub fn empty(indicators: Vec<Indicator>) -> Self {
        Self {
            indicators,
            rows: Vec::new(),
        }
    }

    /// Noms des colonnes: clé puis indicateurs
    pub fn columns(&self) -> Vec<&'static str> {
        KEY_COLUMNS
            .into_iter()
            .chain(self.indicators.iter().map(|i| i.column()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Valeur d'un indicateur dans une ligne
    pub fn value(&self, row: &SliceRow, indicator: Indicator) -> Option<f64> {
        let idx = self.indicators.iter().position(|i| *i == indicator)?;
        row.values.get(idx).copied().flatten()
    }

    /// Écrit l'extrait en CSV (UTF-8, virgule, en-tête)
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), EnrError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns())
            .map_err(|e| EnrError::csv("slice", e))?;
        for row in &self.rows {
            let mut record = vec![
                row.kind.label().to_string(),
                row.zone.label(row.kind).to_string(),
                row.energy_source.label().to_string(),
                row.year.to_string(),
            ];
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            wtr.write_record(&record)
                .map_err(|e| EnrError::csv("slice", e))?;
        }
        wtr.flush().map_err(|e| EnrError::io("slice", e))?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, EnrError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| EnrError::InvalidSlice {
            line: 0,
            reason: e.to_string(),
        })
    }

    /// Relit un extrait écrit par `write_csv`
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, EnrError> {
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| EnrError::csv("slice", e))?
            .clone();
        let invalid = |line: u64, reason: String| EnrError::InvalidSlice { line, reason };

        let names: Vec<&str> = headers.iter().collect();
        if names.len() < KEY_COLUMNS.len() || names[..KEY_COLUMNS.len()] != KEY_COLUMNS {
            return Err(invalid(1, format!("unexpected header {names:?}")));
        }
        let indicators = names[KEY_COLUMNS.len()..]
            .iter()
            .map(|name| name.parse::<Indicator>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let line = idx as u64 + 2;
            let record = record.map_err(|e| EnrError::csv("slice", e))?;
            let field = |i: usize| record.get(i).unwrap_or("");

            let kind: TerritoryType = field(0).parse()?;
            let year = field(3)
                .parse()
                .map_err(|_| invalid(line, format!("invalid year '{}'", field(3))))?;
            let values = (KEY_COLUMNS.len()..KEY_COLUMNS.len() + indicators.len())
                .map(|i| match field(i) {
                    "" => Ok(None),
                    raw => raw
                        .parse::<f64>()
                        .map(Some)
                        .map_err(|_| invalid(line, format!("invalid value '{raw}'"))),
                })
                .collect::<Result<Vec<_>, _>>()?;

            rows.push(SliceRow {
                kind,
                zone: Zone::parse(kind, field(1)),
                energy_source: field(2).parse()?,
                year,
                values,
            });
        }

        Ok(Self { indicators, rows })
    }

    pub fn from_csv(text: &str) -> Result<Self, EnrError> {
        Self::read_csv(text.as_bytes())
    }
}

/// Service de requêtes en lecture seule sur un instantané
#[derive(Debug, Clone, Copy)]
pub struct QueryService<'a> {
    table: &'a IndicatorTable,
    facilities: &'a FacilityStore,
}

impl<'a> QueryService<'a> {
    pub fn new(table: &'a IndicatorTable, facilities: &'a FacilityStore) -> Self {
        Self { table, facilities }
    }

    /// Lignes d'un niveau correspondant à une zone demandée
    ///
    /// La sentinelle désigne la ligne nationale pour les régions, et toutes
    /// les lignes du niveau pour les départements et EPCI.
    fn rows_for_zone(
        &self,
        kind: TerritoryType,
        zone: &Zone,
    ) -> Vec<(&'a IndicatorKey, &'a IndicatorRow)> {
        let table = self.table;
        match (kind, zone) {
            (TerritoryType::Region, _) | (_, Zone::Named(_)) => {
                table.zone_rows(kind, zone).collect()
            }
            (_, Zone::All) => table.kind_rows(kind).collect(),
        }
    }

    fn slice_row(
        key: &IndicatorKey,
        row: &IndicatorRow,
        indicators: &[Indicator],
    ) -> Option<SliceRow> {
        let values: Vec<Option<f64>> = indicators.iter().map(|i| row.value(*i)).collect();
        if values.iter().all(Option::is_none) {
            return None;
        }
        Some(SliceRow {
            kind: key.kind,
            zone: key.zone.clone(),
            energy_source: key.energy_source,
            year: key.year,
            values,
        })
    }

    /// Extrait filtré de la table
    ///
    /// Une ligne n'est retenue que si au moins un indicateur sélectionné y est
    /// renseigné. Avec une liste de zones, les lignes sont groupées par zone
    /// dans l'ordre de l'appelant, puis par (filière, année).
    pub fn query(&self, query: &IndicatorQuery) -> TableSlice {
        let indicators = query.selected_indicators();
        let mut slice = TableSlice::empty(indicators);

        let keyed: Vec<(&IndicatorKey, &IndicatorRow)> = match query.listed_zones() {
            None => self.table.kind_rows(query.kind).collect(),
            Some(zones) => zones
                .into_iter()
                .flat_map(|zone| self.rows_for_zone(query.kind, zone))
                .collect(),
        };
        slice.rows = keyed
            .into_iter()
            .filter(|(key, _)| query.matches_key(key))
            .filter_map(|(key, row)| Self::slice_row(key, row, &slice.indicators))
            .collect();

        tracing::debug!(
            kind = %query.kind,
            rows = slice.rows.len(),
            "Indicator query"
        );
        slice
    }

    /// Comparaison de plusieurs territoires d'un même niveau
    ///
    /// Les zones sans données sont absentes du résultat.
    pub fn compare(&self, query: &IndicatorQuery, zones: &[Zone]) -> TableSlice {
        let batch = query.clone().zones(Selector::Many(zones.to_vec()));
        let indicators = batch.selected_indicators();
        let mut slice = TableSlice::empty(indicators);
        let Some(listed) = batch.listed_zones() else {
            return slice;
        };
        for zone in listed {
            slice.rows.extend(
                self.rows_for_zone(batch.kind, zone)
                    .into_iter()
                    .filter(|(key, _)| batch.matches_key(key))
                    .filter_map(|(key, row)| Self::slice_row(key, row, &slice.indicators)),
            );
        }
        slice
    }

    /// Valeur agrégée d'un indicateur pour une zone, une année et des filières
    ///
    /// `None` lorsqu'aucune ligne ne porte de valeur (affiché "N/A").
    pub fn total(
        &self,
        kind: TerritoryType,
        zone: &Zone,
        energy_sources: &Selector<EnergySource>,
        year: u16,
        indicator: Indicator,
    ) -> Option<f64> {
        let values: Vec<f64> = self
            .rows_for_zone(kind, zone)
            .into_iter()
            .filter(|(key, _)| key.year == year && energy_sources.matches(&key.energy_source))
            .filter_map(|(_, row)| row.value(indicator))
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum())
        }
    }

    /// Années disponibles pour un ensemble de zones, triées
    pub fn years(&self, kind: TerritoryType, zones: &[Zone]) -> Vec<u16> {
        let years: BTreeSet<u16> = if zones.is_empty() {
            self.table.kind_rows(kind).map(|(key, _)| key.year).collect()
        } else {
            zones
                .iter()
                .flat_map(|zone| self.rows_for_zone(kind, zone))
                .map(|(key, _)| key.year)
                .collect()
        };
        years.into_iter().collect()
    }

    /// Installations d'un territoire pour des filières (toutes si vide)
    pub fn facilities(
        &self,
        kind: TerritoryType,
        zone: &Zone,
        energy_sources: &[EnergySource],
    ) -> Vec<&'a Facility> {
        self.facilities.select(kind, zone, energy_sources)
    }
}
