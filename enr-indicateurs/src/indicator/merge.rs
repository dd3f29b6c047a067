//! Fusion des sources statistiques annuelles en une table d'indicateurs
//!
//! 1. lecture de chaque source, résolution des territoires via le catalogue
//! 2. normalisation des noms d'indicateurs et des unités (MW, GWh, sites)
//! 3. concaténation des faits
//! 4. dédoublonnage par priorité fixe de provenance (la plus tardive gagne)
//! 5. passage en forme large
//! 6. synthèse des lignes nationales manquantes par somme des régions

use std::collections::BTreeMap;
use std::path::PathBuf;

use encoding_rs::Encoding;
use serde::Deserialize;

use crate::error::{DataWarning, Diagnostics};
use crate::indicator::{IndicatorKey, IndicatorRow, IndicatorTable, IndicatorValue};
use crate::parse::{file_label, fold, parse_number, read_records};
use crate::territory::TerritoryCatalog;
use crate::types::{EnergySource, Indicator, Provenance, TerritoryType, Zone};
use crate::EnrError;

/// Un fichier source d'indicateurs (format long)
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub provenance: Provenance,
    pub path: PathBuf,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl SourceFile {
    /// Source CSV UTF-8 séparée par des virgules
    pub fn csv(provenance: Provenance, path: impl Into<PathBuf>) -> Self {
        Self {
            provenance,
            path: path.into(),
            delimiter: b',',
            encoding: encoding_rs::UTF_8,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFact {
    #[serde(rename = "TypeZone")]
    type_zone: String,
    #[serde(rename = "Zone")]
    zone: String,
    #[serde(rename = "Filière")]
    energy_source: String,
    annee: String,
    indicateur: String,
    valeur: String,
    #[serde(default)]
    unite: Option<String>,
}

const REQUIRED_COLUMNS: [&str; 6] =
    ["TypeZone", "Zone", "Filière", "annee", "indicateur", "valeur"];

/// Un fait normalisé: une valeur d'un indicateur canonique pour une clé
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub key: IndicatorKey,
    pub indicator: Indicator,
    pub value: f64,
}

/// Statistiques de lecture d'une source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub file: String,
    pub provenance: Provenance,
    pub facts: usize,
}

/// Résultat de la construction de la table
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: IndicatorTable,
    pub diagnostics: Diagnostics,
    pub sources: Vec<SourceSummary>,

    /// Nombre de faits remplacés par une source plus prioritaire
    pub overridden: usize,
}

/// Puissance de dix vers l'unité canonique de l'indicateur
fn unit_exponent(indicator: Indicator, unit: &str) -> Option<i32> {
    let unit = fold(unit.trim());
    match (indicator, unit.as_str()) {
        (Indicator::Power, "w") => Some(-6),
        (Indicator::Power, "kw") => Some(-3),
        (Indicator::Power, "mw") => Some(0),
        (Indicator::Power, "gw") => Some(3),
        (Indicator::Energy, "kwh") => Some(-6),
        (Indicator::Energy, "mwh") => Some(-3),
        (Indicator::Energy, "gwh") => Some(0),
        (Indicator::Energy, "twh") => Some(3),
        (Indicator::SiteCount, "" | "sites" | "nombre") => Some(0),
        _ => None,
    }
}

/// Applique une puissance de dix (division pour les exposants négatifs)
fn rescale(value: f64, exponent: i32) -> f64 {
    if exponent >= 0 {
        value * 10f64.powi(exponent)
    } else {
        value / 10f64.powi(-exponent)
    }
}

/// Normalise un nom d'indicateur de source et son unité éventuelle
///
/// Retourne l'indicateur canonique et la puissance de dix à appliquer.
/// Une colonne `unite` renseignée prime sur l'unité portée par le nom.
pub fn canonical_indicator(name: &str, unit: Option<&str>) -> Result<(Indicator, i32), String> {
    let folded = fold(name.trim()).replace([' ', '-'], "_");
    let (indicator, implied_unit) = match folded.as_str() {
        "puiss_mw" => (Indicator::Power, "MW"),
        "puiss_kw" => (Indicator::Power, "kW"),
        "puiss_gw" => (Indicator::Power, "GW"),
        "puissance" | "power" => (Indicator::Power, "MW"),
        "energie_gwh" => (Indicator::Energy, "GWh"),
        "energie_mwh" => (Indicator::Energy, "MWh"),
        "energie_kwh" => (Indicator::Energy, "kWh"),
        "energie" | "production" | "energy" => (Indicator::Energy, "GWh"),
        "nombre_de_sites" | "nb_sites" | "nombre_sites" | "site_count" => {
            (Indicator::SiteCount, "")
        }
        _ => return Err(format!("unknown indicator '{}'", name.trim())),
    };
    let unit = unit.map(str::trim).filter(|u| !u.is_empty()).unwrap_or(implied_unit);
    unit_exponent(indicator, unit)
        .map(|exponent| (indicator, exponent))
        .ok_or_else(|| format!("unit '{unit}' is not valid for {indicator}"))
}

fn normalize(
    raw: RawFact,
    file: &str,
    line: u64,
    catalog: &TerritoryCatalog,
) -> Result<Fact, DataWarning> {
    let malformed = |reason: String| DataWarning::malformed_row(file, line, reason);

    let kind: TerritoryType = raw
        .type_zone
        .parse()
        .map_err(|e: EnrError| malformed(e.to_string()))?;
    let energy_source = EnergySource::normalize(&raw.energy_source)
        .ok_or_else(|| malformed(format!("unknown energy source '{}'", raw.energy_source)))?;
    let year: u16 = raw
        .annee
        .trim()
        .parse()
        .map_err(|_| malformed(format!("invalid year '{}'", raw.annee)))?;
    let (indicator, exponent) =
        canonical_indicator(&raw.indicateur, raw.unite.as_deref()).map_err(malformed)?;
    let value = parse_number(&raw.valeur)
        .ok_or_else(|| malformed(format!("invalid value '{}'", raw.valeur)))?;

    let territory = catalog
        .resolve(kind, &raw.zone)
        .ok()
        // seule la sentinelle régionale (agrégat national) a un sens dans une source
        .filter(|t| !t.is_sentinel() || kind == TerritoryType::Region)
        .ok_or_else(|| DataWarning::unresolved(file, kind, raw.zone.trim()))?;

    Ok(Fact {
        key: IndicatorKey::new(kind, territory.zone(), energy_source, year),
        indicator,
        value: rescale(value, exponent),
    })
}

/// Lit et normalise une source
pub fn load_source(
    source: &SourceFile,
    catalog: &TerritoryCatalog,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Fact>, EnrError> {
    let file = file_label(&source.path);
    let raws: Vec<RawFact> = read_records(
        &source.path,
        source.delimiter,
        source.encoding,
        &REQUIRED_COLUMNS,
        diagnostics,
    )?;

    let mut facts = Vec::with_capacity(raws.len());
    for (idx, raw) in raws.into_iter().enumerate() {
        match normalize(raw, &file, idx as u64 + 2, catalog) {
            Ok(fact) => facts.push(fact),
            Err(warning) => diagnostics.record(warning),
        }
    }
    Ok(facts)
}

/// Fusionne des faits normalisés (étapes 3 à 6)
///
/// Les sources sont appliquées par priorité croissante de provenance, à
/// priorité égale dans l'ordre fourni; à clé égale la dernière valeur est
/// conservée. Retourne la table et le nombre de valeurs remplacées.
pub fn merge(mut sources: Vec<(Provenance, Vec<Fact>)>) -> (IndicatorTable, usize) {
    sources.sort_by_key(|(provenance, _)| provenance.priority());

    let mut long: BTreeMap<(IndicatorKey, Indicator), IndicatorValue> = BTreeMap::new();
    let mut overridden = 0;
    for (provenance, facts) in sources {
        for fact in facts {
            let value = IndicatorValue {
                value: fact.value,
                provenance,
            };
            if long.insert((fact.key, fact.indicator), value).is_some() {
                overridden += 1;
            }
        }
    }

    let mut rows: BTreeMap<IndicatorKey, IndicatorRow> = BTreeMap::new();
    for ((key, indicator), value) in long {
        rows.entry(key).or_default().set(indicator, value);
    }

    synthesize_nationwide(&mut rows);
    (IndicatorTable::from_rows(rows), overridden)
}

/// Complète les lignes nationales par la somme des lignes régionales réelles
fn synthesize_nationwide(rows: &mut BTreeMap<IndicatorKey, IndicatorRow>) {
    let mut sums: BTreeMap<(EnergySource, u16, Indicator), f64> = BTreeMap::new();
    for (key, row) in rows.iter() {
        if key.kind != TerritoryType::Region || key.zone == Zone::All {
            continue;
        }
        for indicator in Indicator::ALL {
            if let Some(value) = row.value(indicator) {
                *sums.entry((key.energy_source, key.year, indicator)).or_insert(0.0) += value;
            }
        }
    }

    for ((energy_source, year, indicator), total) in sums {
        let row = rows
            .entry(IndicatorKey::nationwide(energy_source, year))
            .or_default();
        if row.get(indicator).is_none() {
            row.set(
                indicator,
                IndicatorValue {
                    value: total,
                    provenance: Provenance::ComputedSum,
                },
            );
        }
    }
}

/// Construit la table à partir des fichiers sources
///
/// Toute source absente est fatale; les lignes invalides ou non résolues
/// sont écartées et comptées.
pub fn build(sources: &[SourceFile], catalog: &TerritoryCatalog) -> Result<MergeOutcome, EnrError> {
    if let Some(missing) = sources.iter().find(|s| !s.path.exists()) {
        return Err(EnrError::MissingSource(missing.path.clone()));
    }
    if let Some(reserved) = sources.iter().find(|s| s.provenance == Provenance::ComputedSum) {
        return Err(EnrError::UnknownProvenance(format!(
            "{} (reserved for computed rows)",
            file_label(&reserved.path)
        )));
    }

    let mut diagnostics = Diagnostics::new();
    let mut summaries = Vec::with_capacity(sources.len());
    let mut loaded = Vec::with_capacity(sources.len());
    for source in sources {
        let facts = load_source(source, catalog, &mut diagnostics)?;
        tracing::info!(
            file = %source.path.display(),
            provenance = %source.provenance,
            facts = facts.len(),
            "Indicator source loaded"
        );
        summaries.push(SourceSummary {
            file: file_label(&source.path),
            provenance: source.provenance,
            facts: facts.len(),
        });
        loaded.push((source.provenance, facts));
    }

    let (table, overridden) = merge(loaded);
    tracing::info!(
        rows = table.len(),
        overridden,
        computed = table.count_provenance(Provenance::ComputedSum),
        "Indicator table built"
    );

    Ok(MergeOutcome {
        table,
        diagnostics,
        sources: summaries,
        overridden,
    })
}
