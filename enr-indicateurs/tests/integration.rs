//! Tests d'intégration: construction d'un instantané complet depuis des fichiers

use std::path::{Path, PathBuf};

use enr_indicateurs::{
    sources_for, EnergySource, FacilityLayer, Indicator, IndicatorQuery, LayerKind,
    ObjectivesFile, Provenance, Selector, Snapshot, SnapshotCache, SnapshotPaths, SourceFile,
    TableSlice, TerritoryPaths, TerritoryType, Zone,
};

const REGIONS: &str = "code,nom\n84,Auvergne-Rhône-Alpes\n44,Grand Est\n";

const DEPARTEMENTS: &str = "code,nom,codeRegion\n38,Isère,84\n73,Savoie,84\n67,Bas-Rhin,44\n";

const EPCIS: &str = "EPCI,NOM_EPCI,DEPARTEMENTS_DE_L_EPCI\n\
200040715,CA du Pays Voironnais,38\n\
200068997,CC Cœur de Savoie,\"c(\"\"73\"\", \"\"38\"\")\"\n\
246700488,Eurométropole de Strasbourg,67\n";

const REGISTRE: &str = "TypeZone,Zone,Filière,annee,indicateur,valeur\n\
Régions,Auvergne-Rhône-Alpes,Eolien,2020,puiss_MW,10\n\
Régions,Grand Est,Eolien,2020,puiss_MW,5\n\
Régions,Grand Est,Eolien,2020,energie_GWh,9\n\
Départements,Isère,Eolien,2020,puiss_MW,4\n\
Epci,CA du Pays Voironnais,Eolien,2020,puiss_MW,n/a\n\
Epci,CA du Pays Voironnais,Photovoltaïque,2021,energie_MWh,1200\n\
Régions,Occitanie,Eolien,2020,puiss_MW,99\n";

const SDES: &str = "TypeZone;Zone;Filière;annee;indicateur;valeur;unite\n\
Régions;Grand Est;Eolien;2020;energie;9500;MWh\n\
Départements;38;Eolien;2020;puissance;4,5;MW\n\
Départements;Isère;Photovoltaïque;2021;Nombre de sites;120;\n";

const INSTALLATIONS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.59, 45.36]},
     "properties": {"nominstallation": "Parc A", "Filière": "Eolien", "puiss_MW": 2.0,
                    "NOM_EPCI": "CA du Pays Voironnais", "NOM_DEP": "Isère", "NOM_REG": "Auvergne-Rhône-Alpes"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.60, 45.37]},
     "properties": {"nominstallation": "Parc B", "Filière": "Eolien", "puiss_MW": 2.0,
                    "NOM_EPCI": "CA du Pays Voironnais", "NOM_DEP": "Isère", "NOM_REG": "Auvergne-Rhône-Alpes"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.61, 45.38]},
     "properties": {"nominstallation": "Parc C", "Filière": "Eolien", "puiss_MW": 0.5,
                    "NOM_DEP": "Isère", "NOM_REG": "Auvergne-Rhône-Alpes"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.70, 45.20]},
     "properties": {"nominstallation": "Centrale PV 1", "Filière": "Photovoltaïque",
                    "NOM_DEP": "Isère", "NOM_REG": "Auvergne-Rhône-Alpes"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.71, 45.21]},
     "properties": {"nominstallation": "Centrale PV 2", "Filière": "Photovoltaïque",
                    "NOM_DEP": "Isère", "NOM_REG": "Auvergne-Rhône-Alpes"}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [7.75, 48.58]},
     "properties": {"nominstallation": "Parc Alsace", "Filière": "Eolien",
                    "NOM_DEP": "Bas-Rhin", "NOM_REG": "Grand Est"}}
  ]
}"#;

const OBJECTIFS: &str = "Filière;2021;2030\nEolien;10;20\n";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn fixture(name: &str) -> (PathBuf, SnapshotPaths) {
    let dir = std::env::temp_dir().join(format!("enr_integration_{name}"));
    std::fs::create_dir_all(&dir).unwrap();
    let paths = SnapshotPaths {
        territories: TerritoryPaths {
            regions: write(&dir, "regions.csv", REGIONS),
            departements: write(&dir, "departements.csv", DEPARTEMENTS),
            epcis: write(&dir, "epcis.csv", EPCIS),
        },
        facilities: vec![FacilityLayer {
            path: write(&dir, "installations.geojson", INSTALLATIONS),
            kind: LayerKind::Installations,
        }],
        sources: vec![
            SourceFile {
                provenance: Provenance::Sdes,
                path: write(&dir, "sdes.csv", SDES),
                delimiter: b';',
                encoding: encoding_rs::UTF_8,
            },
            SourceFile::csv(Provenance::Registre, write(&dir, "registre.csv", REGISTRE)),
        ],
        objectives: vec![ObjectivesFile {
            region: "44".to_string(),
            path: write(&dir, "objectifs_SRADDET_GrandEst.csv", OBJECTIFS),
        }],
    };
    (dir, paths)
}

#[test]
fn test_snapshot_end_to_end() {
    let (dir, paths) = fixture("end_to_end");
    let snapshot = Snapshot::build(&paths).unwrap();

    assert_eq!(snapshot.catalog.count(TerritoryType::Epci), 3);
    assert_eq!(snapshot.facilities.len(), 6);
    assert_eq!(snapshot.fingerprint.len(), 64);
    // Occitanie absente du catalogue, valeur EPCI illisible
    assert_eq!(snapshot.diagnostics.count("unresolved_territory"), 1);
    assert_eq!(snapshot.diagnostics.count("malformed_row"), 1);

    let service = snapshot.query();

    // agrégat national calculé: 10 + 5
    let france = service.query(
        &IndicatorQuery::new(TerritoryType::Region)
            .zones(Zone::All)
            .energy_sources(EnergySource::Wind)
            .years(2020u16)
            .indicators(Indicator::Power),
    );
    assert_eq!(france.len(), 1);
    assert_eq!(france.rows[0].values, vec![Some(15.0)]);
    let key = enr_indicateurs::IndicatorKey::nationwide(EnergySource::Wind, 2020);
    assert_eq!(
        snapshot.table.get(&key).unwrap().get(Indicator::Power).unwrap().provenance,
        Provenance::ComputedSum
    );

    // le SDES l'emporte sur le registre, en unités canoniques
    let grand_est = Zone::named("Grand Est");
    assert_eq!(
        service.total(TerritoryType::Region, &grand_est, &Selector::All, 2020, Indicator::Energy),
        Some(9.5)
    );
    let isere = Zone::named("Isère");
    let wind: Selector<EnergySource> = EnergySource::Wind.into();
    assert_eq!(
        service.total(TerritoryType::Department, &isere, &wind, 2020, Indicator::Power),
        Some(4.5)
    );
    let voironnais = Zone::named("CA du Pays Voironnais");
    assert_eq!(
        service.total(TerritoryType::Epci, &voironnais, &Selector::All, 2021, Indicator::Energy),
        Some(1.2)
    );
    let savoie = Zone::named("CC Cœur de Savoie");
    assert_eq!(
        service.total(TerritoryType::Epci, &savoie, &Selector::All, 2021, Indicator::Energy),
        None
    );

    // installations: 3 éoliennes + 2 centrales PV en Isère
    assert_eq!(
        service
            .facilities(TerritoryType::Department, &isere, &[EnergySource::Wind])
            .len(),
        3
    );
    assert_eq!(
        service
            .facilities(TerritoryType::Region, &Zone::named("Auvergne-Rhône-Alpes"), &[])
            .len(),
        5
    );
    assert_eq!(service.facilities(TerritoryType::Region, &Zone::All, &[]).len(), 6);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_compare_and_csv_export() {
    let (dir, paths) = fixture("compare");
    let snapshot = Snapshot::build(&paths).unwrap();
    let service = snapshot.query();

    let base = IndicatorQuery::new(TerritoryType::Region).indicators(Indicator::Power);
    let compared = [Zone::named("Grand Est"), Zone::named("Auvergne-Rhône-Alpes")];
    let slice = service.compare(&base, &compared);
    let zones: Vec<_> = slice.rows.iter().map(|r| r.zone.label(r.kind).to_string()).collect();
    assert_eq!(zones, vec!["Grand Est", "Auvergne-Rhône-Alpes"]);

    let csv = slice.to_csv().unwrap();
    assert_eq!(
        csv,
        "TypeZone,Zone,Filière,annee,puiss_MW\n\
         Régions,Grand Est,Eolien,2020,5\n\
         Régions,Auvergne-Rhône-Alpes,Eolien,2020,10\n"
    );
    assert_eq!(TableSlice::from_csv(&csv).unwrap(), slice);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_objectives_and_attribution() {
    let (dir, paths) = fixture("objectives");
    let snapshot = Snapshot::build(&paths).unwrap();

    let objectives = snapshot.objectives_for("grand est").unwrap();
    assert_eq!(objectives.get(EnergySource::Wind, 2030), Some(20.0));
    assert!(snapshot.objectives_for("Auvergne-Rhône-Alpes").is_none());

    let energy = snapshot.query().query(
        &IndicatorQuery::new(TerritoryType::Region)
            .zones(Zone::named("Grand Est"))
            .indicators(Indicator::Energy),
    );
    let joined = objectives.join(&energy);
    assert_eq!(joined.len(), 3);
    assert_eq!(joined[0].year, 2020);
    assert_eq!(joined[0].actual, Some(9.5));

    let citation = sources_for("puiss_MW", TerritoryType::Epci).unwrap();
    assert!(!citation.contains("SDES"));
    assert!(sources_for("emplois", TerritoryType::Region).is_err());

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_cache_reload_after_change() {
    let (dir, paths) = fixture("cache");
    let cache = SnapshotCache::new(paths.clone());
    assert!(cache.is_stale().unwrap());

    let first = cache.get().unwrap();
    let again = cache.get().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &again));
    assert!(!cache.is_stale().unwrap());

    write(
        &dir,
        "registre.csv",
        &format!("{REGISTRE}Régions,Auvergne-Rhône-Alpes,Photovoltaïque,2022,puiss_MW,3\n"),
    );
    assert!(cache.is_stale().unwrap());

    let reloaded = cache.reload().unwrap();
    assert_ne!(reloaded.fingerprint, first.fingerprint);
    assert!(reloaded.table.len() > first.table.len());
    // les lecteurs existants gardent l'ancien instantané
    assert_eq!(first.query().years(TerritoryType::Region, &[]), vec![2020]);
    assert_eq!(reloaded.query().years(TerritoryType::Region, &[]), vec![2020, 2022]);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_cache_concurrent_first_access_builds_once() {
    let (dir, paths) = fixture("cache_concurrent");
    let cache = SnapshotCache::new(paths);

    let snapshots: Vec<std::sync::Arc<Snapshot>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| cache.get().unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(snapshots.len(), 8);
    for snapshot in &snapshots[1..] {
        assert!(std::sync::Arc::ptr_eq(&snapshots[0], snapshot));
    }
    assert!(std::sync::Arc::ptr_eq(&snapshots[0], &cache.get().unwrap()));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_missing_source_fails_build() {
    let (dir, mut paths) = fixture("missing");
    paths.sources.push(SourceFile::csv(Provenance::Grdf, dir.join("grdf.csv")));
    assert!(matches!(
        Snapshot::build(&paths),
        Err(enr_indicateurs::EnrError::MissingSource(_))
    ));
    std::fs::remove_dir_all(dir).ok();
}
