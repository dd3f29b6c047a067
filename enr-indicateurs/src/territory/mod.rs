//! Catalogue des territoires: Régions → Départements → EPCI
//!
//! Le catalogue est construit une fois depuis les tables de référence puis
//! partagé en lecture seule. Chaque niveau possède une sentinelle
//! ("Toutes" / "Tous") qui représente l'agrégat non filtré.

pub mod loader;

use std::collections::{BTreeSet, HashMap};

use crate::error::{DataWarning, Diagnostics};
use crate::parse::fold;
use crate::types::{TerritoryType, Zone, SENTINEL_CODE};
use crate::EnrError;

pub use loader::{load, DepartmentRecord, EpciRecord, RegionRecord, TerritoryPaths};

/// Une unité administrative
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Territory {
    pub kind: TerritoryType,
    pub code: String,
    pub name: String,

    /// Région parente (Départements, EPCI)
    pub region_code: Option<String>,

    /// Départements couverts (EPCI uniquement, au moins un)
    pub department_codes: BTreeSet<String>,
}

impl Territory {
    fn sentinel(kind: TerritoryType) -> Self {
        Self {
            kind,
            code: SENTINEL_CODE.to_string(),
            name: kind.sentinel_name().to_string(),
            region_code: None,
            department_codes: BTreeSet::new(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.code == SENTINEL_CODE
    }

    /// Zone correspondante dans les clés d'indicateurs
    pub fn zone(&self) -> Zone {
        if self.is_sentinel() {
            Zone::All
        } else {
            Zone::Named(self.name.clone())
        }
    }

    /// Département principal d'un EPCI (plus petit code)
    pub fn primary_department(&self) -> Option<&str> {
        self.department_codes.iter().next().map(String::as_str)
    }
}

/// Chaîne des ancêtres d'un territoire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorChain<'a> {
    pub epci: Option<&'a Territory>,
    pub department: Option<&'a Territory>,
    pub region: &'a Territory,
}

/// Critères de sélection en cascade (région, département, EPCI)
///
/// Une valeur absente ou égale à la sentinelle signifie "non filtré".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub region: Option<String>,
    pub department: Option<String>,
    pub epci: Option<String>,
}

impl Selection {
    /// Territoire le plus fin sélectionné: EPCI, sinon département, sinon région
    pub fn target(&self) -> (TerritoryType, Zone) {
        let pick = |kind: TerritoryType, value: &Option<String>| {
            value
                .as_deref()
                .map(|v| Zone::parse(kind, v))
                .filter(|z| !z.is_all())
        };
        if let Some(zone) = pick(TerritoryType::Epci, &self.epci) {
            (TerritoryType::Epci, zone)
        } else if let Some(zone) = pick(TerritoryType::Department, &self.department) {
            (TerritoryType::Department, zone)
        } else {
            let zone = pick(TerritoryType::Region, &self.region).unwrap_or(Zone::All);
            (TerritoryType::Region, zone)
        }
    }
}

/// Catalogue indexé des territoires
#[derive(Debug, Clone)]
pub struct TerritoryCatalog {
    territories: Vec<Territory>,
    sentinels: [Territory; 3],
    by_code: HashMap<(TerritoryType, String), usize>,
    by_name: HashMap<(TerritoryType, String), usize>,
}

impl TerritoryCatalog {
    /// Construit le catalogue depuis les trois tables brutes
    ///
    /// Les départements dont la région est inconnue et les EPCI sans
    /// département valide sont écartés avec un avertissement.
    pub fn from_records(
        regions: Vec<RegionRecord>,
        departments: Vec<DepartmentRecord>,
        epcis: Vec<EpciRecord>,
    ) -> (Self, Diagnostics) {
        let mut catalog = Self {
            territories: Vec::new(),
            sentinels: TerritoryType::ALL.map(Territory::sentinel),
            by_code: HashMap::new(),
            by_name: HashMap::new(),
        };
        let mut diagnostics = Diagnostics::new();

        for record in regions {
            catalog.insert(
                Territory {
                    kind: TerritoryType::Region,
                    code: record.code.trim().to_string(),
                    name: record.name.trim().to_string(),
                    region_code: None,
                    department_codes: BTreeSet::new(),
                },
                &mut diagnostics,
            );
        }

        for record in departments {
            let region_code = record.region_code.trim().to_string();
            if !catalog
                .by_code
                .contains_key(&(TerritoryType::Region, region_code.clone()))
            {
                diagnostics.record(DataWarning::unresolved(
                    "departements",
                    TerritoryType::Region,
                    region_code,
                ));
                continue;
            }
            catalog.insert(
                Territory {
                    kind: TerritoryType::Department,
                    code: record.code.trim().to_string(),
                    name: record.name.trim().to_string(),
                    region_code: Some(region_code),
                    department_codes: BTreeSet::new(),
                },
                &mut diagnostics,
            );
        }

        // Une ligne par couple (EPCI, département) dans la source: regroupement
        // par code avant insertion
        let mut grouped: Vec<(String, String, BTreeSet<String>, Vec<String>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for record in epcis {
            let code = record.code.trim().to_string();
            let idx = *positions.entry(code.clone()).or_insert_with(|| {
                grouped.push((code, record.name.trim().to_string(), BTreeSet::new(), Vec::new()));
                grouped.len() - 1
            });
            let entry = &mut grouped[idx];
            for dep in crate::parse::parse_department_codes(&record.departments) {
                if catalog
                    .by_code
                    .contains_key(&(TerritoryType::Department, dep.clone()))
                {
                    entry.2.insert(dep);
                }
            }
            entry.3.push(record.departments);
        }

        for (code, name, department_codes, raw) in grouped {
            if department_codes.is_empty() {
                diagnostics.record(DataWarning::MalformedEpciDepartments {
                    code,
                    name,
                    raw: raw.join(" | "),
                });
                continue;
            }
            let region_code = department_codes
                .iter()
                .next()
                .and_then(|dep| catalog.get(TerritoryType::Department, dep))
                .and_then(|dep| dep.region_code.clone());
            catalog.insert(
                Territory {
                    kind: TerritoryType::Epci,
                    code,
                    name,
                    region_code,
                    department_codes,
                },
                &mut diagnostics,
            );
        }

        tracing::debug!(
            regions = catalog.count(TerritoryType::Region),
            departments = catalog.count(TerritoryType::Department),
            epcis = catalog.count(TerritoryType::Epci),
            warnings = diagnostics.len(),
            "Territory catalog built"
        );

        (catalog, diagnostics)
    }

    fn insert(&mut self, territory: Territory, diagnostics: &mut Diagnostics) {
        let kind = territory.kind;
        if territory.code.is_empty() || territory.name.is_empty() {
            diagnostics.record(DataWarning::malformed_row(
                kind.label(),
                0,
                format!("empty code or name for '{}{}'", territory.code, territory.name),
            ));
            return;
        }
        for value in [&territory.code, &territory.name] {
            if kind.is_sentinel_label(value) {
                diagnostics.record(DataWarning::SentinelCollision {
                    kind,
                    value: value.clone(),
                });
                return;
            }
        }
        if let Some(&idx) = self.by_code.get(&(kind, territory.code.clone())) {
            // une répétition à l'identique n'est pas une anomalie
            if fold(&self.territories[idx].name) != fold(&territory.name) {
                diagnostics.record(DataWarning::malformed_row(
                    kind.label(),
                    0,
                    format!(
                        "duplicate code {} for '{}' (kept '{}')",
                        territory.code, territory.name, self.territories[idx].name
                    ),
                ));
            }
            return;
        }
        if self.by_name.contains_key(&(kind, fold(&territory.name))) {
            diagnostics.record(DataWarning::malformed_row(
                kind.label(),
                0,
                format!("duplicate name '{}' (code {})", territory.name, territory.code),
            ));
            return;
        }

        let idx = self.territories.len();
        self.by_code.insert((kind, territory.code.clone()), idx);
        self.by_name.insert((kind, fold(&territory.name)), idx);
        self.territories.push(territory);
    }

    fn get(&self, kind: TerritoryType, code: &str) -> Option<&Territory> {
        self.by_code
            .get(&(kind, code.to_string()))
            .map(|&idx| &self.territories[idx])
    }

    /// Sentinelle d'un niveau
    pub fn sentinel(&self, kind: TerritoryType) -> &Territory {
        &self.sentinels[kind as usize]
    }

    /// Résout un territoire par code, puis par nom (insensible aux accents)
    pub fn resolve(&self, kind: TerritoryType, code_or_name: &str) -> Result<&Territory, EnrError> {
        let value = code_or_name.trim();
        if kind.is_sentinel_label(value) {
            return Ok(self.sentinel(kind));
        }
        self.get(kind, value)
            .or_else(|| {
                self.by_name
                    .get(&(kind, fold(value)))
                    .map(|&idx| &self.territories[idx])
            })
            .ok_or_else(|| EnrError::not_found(kind, value))
    }

    /// Résout la zone d'une clé d'indicateur
    pub fn resolve_zone(&self, kind: TerritoryType, zone: &Zone) -> Result<&Territory, EnrError> {
        match zone {
            Zone::All => Ok(self.sentinel(kind)),
            Zone::Named(name) => self.resolve(kind, name),
        }
    }

    /// Résout une sélection en cascade vers son territoire cible
    pub fn resolve_selection(&self, selection: &Selection) -> Result<&Territory, EnrError> {
        let (kind, zone) = selection.target();
        self.resolve_zone(kind, &zone)
    }

    /// Tous les territoires réels d'un niveau, triés par nom
    pub fn all(&self, kind: TerritoryType) -> Vec<&Territory> {
        sort_by_name(self.territories.iter().filter(|t| t.kind == kind))
    }

    /// Nombre de territoires réels d'un niveau
    pub fn count(&self, kind: TerritoryType) -> usize {
        self.territories.iter().filter(|t| t.kind == kind).count()
    }

    /// Enfants directs, triés par nom
    ///
    /// Les enfants d'une sentinelle sont tous les territoires réels de son
    /// propre niveau (pour "Toutes" les régions: la liste des régions).
    pub fn children(&self, territory: &Territory) -> Vec<&Territory> {
        if territory.is_sentinel() {
            return self.all(territory.kind);
        }
        match territory.kind {
            TerritoryType::Region => sort_by_name(self.territories.iter().filter(|t| {
                t.kind == TerritoryType::Department
                    && t.region_code.as_deref() == Some(territory.code.as_str())
            })),
            TerritoryType::Department => sort_by_name(self.territories.iter().filter(|t| {
                t.kind == TerritoryType::Epci && t.department_codes.contains(&territory.code)
            })),
            TerritoryType::Epci => Vec::new(),
        }
    }

    /// Chaîne (EPCI?, Département?, Région) d'un territoire
    pub fn ancestor_chain<'a>(&'a self, territory: &'a Territory) -> AncestorChain<'a> {
        let region_of = |code: Option<&String>| {
            code.and_then(|c| self.get(TerritoryType::Region, c))
                .unwrap_or_else(|| self.sentinel(TerritoryType::Region))
        };
        if territory.is_sentinel() {
            return AncestorChain {
                epci: None,
                department: None,
                region: self.sentinel(TerritoryType::Region),
            };
        }
        match territory.kind {
            TerritoryType::Region => AncestorChain {
                epci: None,
                department: None,
                region: territory,
            },
            TerritoryType::Department => AncestorChain {
                epci: None,
                department: Some(territory),
                region: region_of(territory.region_code.as_ref()),
            },
            TerritoryType::Epci => {
                let department = territory
                    .primary_department()
                    .and_then(|code| self.get(TerritoryType::Department, code));
                AncestorChain {
                    epci: Some(territory),
                    department,
                    region: region_of(department.and_then(|d| d.region_code.as_ref())),
                }
            }
        }
    }

    /// Territoires d'un niveau restreints à une région et/ou un département
    ///
    /// Les filtres sentinelles ou absents ne restreignent pas.
    pub fn within(
        &self,
        kind: TerritoryType,
        region: Option<&Territory>,
        department: Option<&Territory>,
    ) -> Vec<&Territory> {
        let region = region.filter(|r| !r.is_sentinel());
        let department = department.filter(|d| !d.is_sentinel());
        sort_by_name(self.territories.iter().filter(|t| {
            if t.kind != kind {
                return false;
            }
            let in_region = region.map_or(true, |r| match t.kind {
                TerritoryType::Region => t.code == r.code,
                TerritoryType::Department => t.region_code.as_deref() == Some(r.code.as_str()),
                TerritoryType::Epci => t.department_codes.iter().any(|dep| {
                    self.get(TerritoryType::Department, dep)
                        .and_then(|d| d.region_code.as_deref())
                        == Some(r.code.as_str())
                }),
            });
            let in_department = department.map_or(true, |d| match t.kind {
                TerritoryType::Region => t.code.as_str() == d.region_code.as_deref().unwrap_or(""),
                TerritoryType::Department => t.code == d.code,
                TerritoryType::Epci => t.department_codes.contains(&d.code),
            });
            in_region && in_department
        }))
    }

    /// Liste de choix: la sentinelle suivie de `within`
    pub fn choices(
        &self,
        kind: TerritoryType,
        region: Option<&Territory>,
        department: Option<&Territory>,
    ) -> Vec<&Territory> {
        let mut choices = vec![self.sentinel(kind)];
        choices.extend(self.within(kind, region, department));
        choices
    }
}

fn sort_by_name<'a>(it: impl Iterator<Item = &'a Territory>) -> Vec<&'a Territory> {
    let mut list: Vec<&Territory> = it.collect();
    list.sort_by_cached_key(|t| (fold(&t.name), t.code.clone()));
    list
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn region(code: &str, name: &str) -> RegionRecord {
        RegionRecord {
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn department(code: &str, name: &str, region: &str) -> DepartmentRecord {
        DepartmentRecord {
            code: code.to_string(),
            name: name.to_string(),
            region_code: region.to_string(),
        }
    }

    pub(crate) fn epci(code: &str, name: &str, departments: &str) -> EpciRecord {
        EpciRecord {
            code: code.to_string(),
            name: name.to_string(),
            departments: departments.to_string(),
        }
    }

    /// Petit catalogue: deux régions, trois départements, trois EPCI
    pub(crate) fn sample_catalog() -> TerritoryCatalog {
        let (catalog, _) = TerritoryCatalog::from_records(
            vec![
                region("84", "Auvergne-Rhône-Alpes"),
                region("44", "Grand Est"),
            ],
            vec![
                department("38", "Isère", "84"),
                department("73", "Savoie", "84"),
                department("67", "Bas-Rhin", "44"),
            ],
            vec![
                epci("200040715", "CA du Pays Voironnais", "38"),
                epci("200068997", "CC Cœur de Savoie", r#"c("73", "38")"#),
                epci("246700488", "Eurométropole de Strasbourg", "67"),
            ],
        );
        catalog
    }

    #[test]
    fn test_resolve_by_code_and_name() {
        let catalog = sample_catalog();
        let isere = catalog.resolve(TerritoryType::Department, "38").unwrap();
        assert_eq!(isere.name, "Isère");
        let same = catalog.resolve(TerritoryType::Department, "isere").unwrap();
        assert_eq!(same.code, "38");
        assert!(matches!(
            catalog.resolve(TerritoryType::Region, "Bretagne"),
            Err(EnrError::TerritoryNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_decomposed_name() {
        let catalog = sample_catalog();
        let isere = catalog
            .resolve(TerritoryType::Department, "Ise\u{300}re")
            .unwrap();
        assert_eq!(isere.code, "38");
        let coeur = catalog
            .resolve(TerritoryType::Epci, "cc coeur de savoie")
            .unwrap();
        assert_eq!(coeur.code, "200068997");
        let ara = catalog
            .resolve(TerritoryType::Region, "AUVERGNE-RHO\u{302}NE-ALPES")
            .unwrap();
        assert_eq!(ara.code, "84");
    }

    #[test]
    fn test_duplicate_code_recorded() {
        let (catalog, diagnostics) = TerritoryCatalog::from_records(
            vec![
                region("84", "Auvergne-Rhône-Alpes"),
                region("84", "Auvergne-Rhône-Alpes"),
                region("84", "Rhône-Alpes"),
            ],
            vec![],
            vec![],
        );
        assert_eq!(catalog.count(TerritoryType::Region), 1);
        assert_eq!(
            catalog.resolve(TerritoryType::Region, "84").unwrap().name,
            "Auvergne-Rhône-Alpes"
        );
        assert_eq!(diagnostics.count("malformed_row"), 1);
    }

    #[test]
    fn test_resolve_sentinel() {
        let catalog = sample_catalog();
        let all = catalog.resolve(TerritoryType::Region, "Toutes").unwrap();
        assert!(all.is_sentinel());
        assert_eq!(all.zone(), Zone::All);
        let all_epci = catalog.resolve(TerritoryType::Epci, "Tous").unwrap();
        assert_eq!(all_epci.kind, TerritoryType::Epci);
    }

    #[test]
    fn test_children_of_region_sentinel_lists_real_regions() {
        let catalog = sample_catalog();
        let all = catalog.sentinel(TerritoryType::Region);
        let names: Vec<_> = catalog.children(all).iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Auvergne-Rhône-Alpes", "Grand Est"]);
    }

    #[test]
    fn test_children_sorted_by_name() {
        let catalog = sample_catalog();
        let ara = catalog.resolve(TerritoryType::Region, "84").unwrap();
        let names: Vec<_> = catalog.children(ara).iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Isère", "Savoie"]);

        let isere = catalog.resolve(TerritoryType::Department, "38").unwrap();
        let epcis: Vec<_> = catalog.children(isere).iter().map(|t| t.code.as_str()).collect();
        assert_eq!(epcis, vec!["200040715", "200068997"]);
    }

    #[test]
    fn test_department_ancestor_is_parent_region() {
        let catalog = sample_catalog();
        for dep in catalog.all(TerritoryType::Department) {
            let chain = catalog.ancestor_chain(dep);
            assert_eq!(chain.department, Some(dep));
            assert!(!chain.region.is_sentinel());
            assert!(catalog.children(chain.region).contains(&dep));
        }
    }

    #[test]
    fn test_epci_spanning_departments() {
        let catalog = sample_catalog();
        let coeur = catalog.resolve(TerritoryType::Epci, "200068997").unwrap();
        assert_eq!(coeur.department_codes.len(), 2);
        let chain = catalog.ancestor_chain(coeur);
        assert_eq!(chain.epci, Some(coeur));
        assert_eq!(chain.department.unwrap().code, "38");
        assert_eq!(chain.region.code, "84");
    }

    #[test]
    fn test_epci_rows_exploded_and_deduplicated() {
        let (catalog, diagnostics) = TerritoryCatalog::from_records(
            vec![region("84", "Auvergne-Rhône-Alpes")],
            vec![department("38", "Isère", "84"), department("73", "Savoie", "84")],
            vec![
                epci("200068997", "CC Cœur de Savoie", "73"),
                epci("200068997", "CC Cœur de Savoie", "38"),
                epci("200068997", "CC Cœur de Savoie", "73"),
            ],
        );
        assert!(diagnostics.is_empty());
        let coeur = catalog.resolve(TerritoryType::Epci, "200068997").unwrap();
        let deps: Vec<_> = coeur.department_codes.iter().cloned().collect();
        assert_eq!(deps, vec!["38", "73"]);
        assert_eq!(catalog.count(TerritoryType::Epci), 1);
    }

    #[test]
    fn test_malformed_epci_dropped_with_warning() {
        let (catalog, diagnostics) = TerritoryCatalog::from_records(
            vec![region("84", "Auvergne-Rhône-Alpes")],
            vec![department("38", "Isère", "84")],
            vec![
                epci("200000001", "CC Fantôme", "c()"),
                epci("200000002", "CC Ailleurs", "99"),
            ],
        );
        assert_eq!(catalog.count(TerritoryType::Epci), 0);
        assert_eq!(diagnostics.count("malformed_epci_departments"), 2);
    }

    #[test]
    fn test_department_with_unknown_region_dropped() {
        let (catalog, diagnostics) = TerritoryCatalog::from_records(
            vec![region("84", "Auvergne-Rhône-Alpes")],
            vec![department("38", "Isère", "84"), department("2A", "Corse-du-Sud", "94")],
            vec![],
        );
        assert_eq!(catalog.count(TerritoryType::Department), 1);
        assert_eq!(diagnostics.count("unresolved_territory"), 1);
    }

    #[test]
    fn test_sentinel_collision_rejected() {
        let (catalog, diagnostics) = TerritoryCatalog::from_records(
            vec![region("84", "Auvergne-Rhône-Alpes"), region("99", "Toutes")],
            vec![],
            vec![],
        );
        assert_eq!(catalog.count(TerritoryType::Region), 1);
        assert_eq!(diagnostics.count("sentinel_collision"), 1);
    }

    #[test]
    fn test_within_and_choices() {
        let catalog = sample_catalog();
        let ara = catalog.resolve(TerritoryType::Region, "84").unwrap();
        let epcis: Vec<_> = catalog
            .within(TerritoryType::Epci, Some(ara), None)
            .iter()
            .map(|t| t.code.as_str())
            .collect();
        assert_eq!(epcis, vec!["200040715", "200068997"]);

        let savoie = catalog.resolve(TerritoryType::Department, "73").unwrap();
        let choices = catalog.choices(TerritoryType::Epci, Some(ara), Some(savoie));
        assert!(choices[0].is_sentinel());
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[1].code, "200068997");
    }

    #[test]
    fn test_selection_target() {
        let selection = Selection {
            region: Some("Auvergne-Rhône-Alpes".to_string()),
            department: Some("Tous".to_string()),
            epci: None,
        };
        assert_eq!(
            selection.target(),
            (TerritoryType::Region, Zone::named("Auvergne-Rhône-Alpes"))
        );

        let selection = Selection {
            region: Some("Auvergne-Rhône-Alpes".to_string()),
            department: Some("Isère".to_string()),
            epci: Some("Tous".to_string()),
        };
        assert_eq!(selection.target(), (TerritoryType::Department, Zone::named("Isère")));
        assert_eq!(Selection::default().target(), (TerritoryType::Region, Zone::All));

        let catalog = sample_catalog();
        let target = catalog.resolve_selection(&selection).unwrap();
        assert_eq!(target.code, "38");
    }
}
