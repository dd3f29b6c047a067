//! Table d'indicateurs fusionnée, indexée par (type, territoire, filière, année)

pub mod merge;
pub mod query;

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::types::{EnergySource, Indicator, Provenance, TerritoryType, Zone};

pub use merge::{build, canonical_indicator, merge, Fact, MergeOutcome, SourceFile, SourceSummary};
pub use query::{IndicatorQuery, QueryService, SliceRow, TableSlice};

/// Clé unique d'une ligne après fusion
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndicatorKey {
    pub kind: TerritoryType,
    pub zone: Zone,
    pub energy_source: EnergySource,
    pub year: u16,
}

impl IndicatorKey {
    pub fn new(kind: TerritoryType, zone: Zone, energy_source: EnergySource, year: u16) -> Self {
        Self {
            kind,
            zone,
            energy_source,
            year,
        }
    }

    /// Clé de la ligne nationale correspondante
    pub fn nationwide(energy_source: EnergySource, year: u16) -> Self {
        Self::new(TerritoryType::Region, Zone::All, energy_source, year)
    }
}

/// Valeur d'un indicateur avec sa provenance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorValue {
    pub value: f64,
    pub provenance: Provenance,
}

/// Ligne en forme large: une colonne par indicateur
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorRow {
    values: [Option<IndicatorValue>; 3],
}

impl IndicatorRow {
    pub fn get(&self, indicator: Indicator) -> Option<IndicatorValue> {
        self.values[indicator.index()]
    }

    pub fn value(&self, indicator: Indicator) -> Option<f64> {
        self.get(indicator).map(|v| v.value)
    }

    pub fn set(&mut self, indicator: Indicator, value: IndicatorValue) {
        self.values[indicator.index()] = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// Table fusionnée, en lecture seule une fois construite
#[derive(Debug, Clone, Default)]
pub struct IndicatorTable {
    rows: BTreeMap<IndicatorKey, IndicatorRow>,
}

impl IndicatorTable {
    pub(crate) fn from_rows(rows: BTreeMap<IndicatorKey, IndicatorRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &IndicatorKey) -> Option<&IndicatorRow> {
        self.rows.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndicatorKey, &IndicatorRow)> {
        self.rows.iter()
    }

    /// Lignes d'un territoire, triées par (filière, année)
    pub fn zone_rows(
        &self,
        kind: TerritoryType,
        zone: &Zone,
    ) -> impl Iterator<Item = (&IndicatorKey, &IndicatorRow)> {
        let zone = zone.clone();
        let start = IndicatorKey::new(kind, zone.clone(), EnergySource::ALL[0], u16::MIN);
        self.rows
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |(key, _)| key.kind == kind && key.zone == zone)
    }

    /// Toutes les lignes d'un niveau
    pub fn kind_rows(
        &self,
        kind: TerritoryType,
    ) -> impl Iterator<Item = (&IndicatorKey, &IndicatorRow)> {
        let start = IndicatorKey::new(kind, Zone::All, EnergySource::ALL[0], u16::MIN);
        self.rows
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |(key, _)| key.kind == kind)
    }

    /// Nombre de valeurs portant une provenance donnée
    pub fn count_provenance(&self, provenance: Provenance) -> usize {
        self.rows
            .values()
            .flat_map(|row| row.values.iter().flatten())
            .filter(|v| v.provenance == provenance)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: f64) -> IndicatorValue {
        IndicatorValue {
            value: v,
            provenance: Provenance::Sdes,
        }
    }

    fn table() -> IndicatorTable {
        let mut rows = BTreeMap::new();
        for (kind, zone, year) in [
            (TerritoryType::Region, Zone::All, 2020),
            (TerritoryType::Region, Zone::named("Bretagne"), 2020),
            (TerritoryType::Region, Zone::named("Bretagne"), 2021),
            (TerritoryType::Region, Zone::named("Normandie"), 2020),
            (TerritoryType::Department, Zone::named("Finistère"), 2020),
        ] {
            let mut row = IndicatorRow::default();
            row.set(Indicator::Power, value(1.0));
            rows.insert(IndicatorKey::new(kind, zone, EnergySource::Wind, year), row);
        }
        IndicatorTable::from_rows(rows)
    }

    #[test]
    fn test_zone_rows() {
        let table = table();
        let zone = Zone::named("Bretagne");
        let years: Vec<_> = table
            .zone_rows(TerritoryType::Region, &zone)
            .map(|(k, _)| k.year)
            .collect();
        assert_eq!(years, vec![2020, 2021]);
        assert_eq!(table.zone_rows(TerritoryType::Region, &Zone::All).count(), 1);
        assert_eq!(table.zone_rows(TerritoryType::Region, &Zone::named("Corse")).count(), 0);
    }

    #[test]
    fn test_kind_rows() {
        let table = table();
        assert_eq!(table.kind_rows(TerritoryType::Region).count(), 4);
        assert_eq!(table.kind_rows(TerritoryType::Department).count(), 1);
        assert_eq!(table.kind_rows(TerritoryType::Epci).count(), 0);
    }

    #[test]
    fn test_row_accessors() {
        let mut row = IndicatorRow::default();
        assert!(row.is_empty());
        row.set(Indicator::Energy, value(3.5));
        assert_eq!(row.value(Indicator::Energy), Some(3.5));
        assert_eq!(row.value(Indicator::Power), None);
        assert_eq!(table().count_provenance(Provenance::Sdes), 5);
    }
}
