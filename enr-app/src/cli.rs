//! Définition et implémentation des commandes CLI
//!
//! - `build`: construit l'instantané et affiche le rapport
//! - `query` / `compare` / `total`: interrogation de la table d'indicateurs
//! - `facilities`: export des installations (CSV ou GeoJSON)
//! - `territories`, `sources`, `objectives`: listes de choix, citations, objectifs

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use enr_indicateurs::{
    sources_for, EnergySource, Indicator, IndicatorQuery, Selector, Snapshot, SnapshotCache,
    TableSlice, TerritoryCatalog, TerritoryType,
};

use crate::config::Config;
use crate::export;
use crate::report::BuildReport;

/// Nombre maximal de territoires comparés en une fois
pub const MAX_COMPARED_ZONES: usize = 10;

/// Critères communs aux extraits d'indicateurs
#[derive(Args, Debug, Clone)]
pub struct SliceArgs {
    /// Territory level (Régions, Départements, Epci)
    #[arg(short = 't', long = "type", default_value = "Régions")]
    pub type_zone: String,

    /// Energy source (repeatable, all when omitted)
    #[arg(short = 'f', long = "filiere")]
    pub energy_sources: Vec<String>,

    /// Indicator column: puiss_MW, energie_GWh, "Nombre de sites" (repeatable)
    #[arg(short, long = "indicator")]
    pub indicators: Vec<String>,

    /// Year (repeatable, all when omitted)
    #[arg(short, long = "year")]
    pub years: Vec<u16>,

    /// Output CSV file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the snapshot and print the build report
    Build {
        /// Save the report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Extract indicator rows for a territory level
    Query {
        /// Territory code or name (repeatable, all when omitted)
        #[arg(short, long = "zone")]
        zones: Vec<String>,

        #[command(flatten)]
        slice: SliceArgs,
    },

    /// Compare several territories of the same level
    Compare {
        /// Territory codes or names (at most 10)
        #[arg(short, long = "zone", required = true)]
        zones: Vec<String>,

        #[command(flatten)]
        slice: SliceArgs,
    },

    /// Aggregated value of one indicator for a territory and a year
    Total {
        /// Territory level
        #[arg(short = 't', long = "type", default_value = "Régions")]
        type_zone: String,

        /// Territory code or name (sentinel by default)
        #[arg(short, long, default_value = "Toutes")]
        zone: String,

        /// Energy source (repeatable, all when omitted)
        #[arg(short = 'f', long = "filiere")]
        energy_sources: Vec<String>,

        #[arg(short, long)]
        year: u16,

        #[arg(short, long, default_value = "energie_GWh")]
        indicator: String,
    },

    /// Export the facilities of a territory (CSV, or GeoJSON for .geojson outputs)
    Facilities {
        #[arg(short = 't', long = "type", default_value = "Régions")]
        type_zone: String,

        #[arg(short, long, default_value = "Toutes")]
        zone: String,

        #[arg(short = 'f', long = "filiere")]
        energy_sources: Vec<String>,

        /// Output file (CSV on stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List territories: children of a zone, or the choice list of a level
    Territories {
        #[arg(short = 't', long = "type", default_value = "Régions")]
        type_zone: String,

        /// Territory whose children and ancestors are listed
        #[arg(short, long)]
        zone: Option<String>,

        /// Restrict the choice list to a region
        #[arg(long)]
        region: Option<String>,

        /// Restrict the choice list to a department
        #[arg(long)]
        department: Option<String>,
    },

    /// Print the source citation of an indicator
    Sources {
        #[arg(short, long)]
        indicator: String,

        #[arg(short = 't', long = "type", default_value = "Régions")]
        type_zone: String,
    },

    /// Join the energy production of a region with its objectives
    Objectives {
        /// Region code or name
        #[arg(short, long)]
        region: String,

        /// Output CSV file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Exécute une commande
pub fn run(config_spec: &str, command: Commands) -> Result<()> {
    match command {
        Commands::Build { report } => cmd_build(config_spec, report.as_deref()),
        Commands::Query { zones, slice } => cmd_query(config_spec, &zones, &slice),
        Commands::Compare { zones, slice } => cmd_compare(config_spec, &zones, &slice),
        Commands::Total {
            type_zone,
            zone,
            energy_sources,
            year,
            indicator,
        } => {
            let snapshot = open(config_spec)?;
            let value = cmd_total(&snapshot, &type_zone, &zone, &energy_sources, year, &indicator)?;
            println!("{}", format_total(value));
            Ok(())
        }
        Commands::Facilities {
            type_zone,
            zone,
            energy_sources,
            output,
        } => cmd_facilities(config_spec, &type_zone, &zone, &energy_sources, output.as_deref()),
        Commands::Territories {
            type_zone,
            zone,
            region,
            department,
        } => {
            let snapshot = open(config_spec)?;
            let lines = cmd_territories(
                &snapshot.catalog,
                &type_zone,
                zone.as_deref(),
                region.as_deref(),
                department.as_deref(),
            )?;
            for line in lines {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::Sources {
            indicator,
            type_zone,
        } => {
            let kind: TerritoryType = type_zone.parse()?;
            println!("{}", sources_for(&indicator, kind)?);
            Ok(())
        }
        Commands::Objectives { region, output } => {
            cmd_objectives(config_spec, &region, output.as_deref())
        }
    }
}

/// Charge la configuration et construit l'instantané
pub fn open(config_spec: &str) -> Result<Arc<Snapshot>> {
    let config = Config::resolve(config_spec)?;
    let cache = SnapshotCache::new(config.snapshot_paths()?);
    cache
        .get()
        .context(format!("Failed to build snapshot from config '{}'", config_spec))
}

/// Exécute la commande build
pub fn cmd_build(config_spec: &str, report_path: Option<&Path>) -> Result<()> {
    let start = Instant::now();
    let mut report = BuildReport::new(config_spec);

    match open(config_spec) {
        Ok(snapshot) => report.record_snapshot(&snapshot),
        Err(e) => {
            warn!(error = %e, "Build failed");
            report.record_failure(&format!("{:#}", e));
        }
    }

    report.set_duration(start.elapsed());
    report.finalize();
    report.display();
    info!("{}", report.summary());

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .context(format!("Failed to save report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    if !report.errors.is_empty() {
        anyhow::bail!("Build failed: {}", report.errors.join("; "));
    }
    Ok(())
}

/// Exécute la commande query
pub fn cmd_query(config_spec: &str, zones: &[String], args: &SliceArgs) -> Result<()> {
    let snapshot = open(config_spec)?;
    let slice = query_slice(&snapshot, zones, args)?;
    info!(rows = slice.len(), "Query done");
    write_output(&slice, args.output.as_deref())
}

/// Exécute la commande compare
pub fn cmd_compare(config_spec: &str, zones: &[String], args: &SliceArgs) -> Result<()> {
    let snapshot = open(config_spec)?;
    let slice = compare_slice(&snapshot, zones, args)?;
    info!(zones = zones.len(), rows = slice.len(), "Comparison done");
    write_output(&slice, args.output.as_deref())
}

/// Extrait d'indicateurs pour une liste de zones (toutes si vide)
pub fn query_slice(snapshot: &Snapshot, zones: &[String], args: &SliceArgs) -> Result<TableSlice> {
    let query = base_query(&snapshot.catalog, zones, args)?;
    Ok(snapshot.query().query(&query))
}

/// Comparaison de territoires, limitée à `MAX_COMPARED_ZONES`
pub fn compare_slice(
    snapshot: &Snapshot,
    zones: &[String],
    args: &SliceArgs,
) -> Result<TableSlice> {
    if zones.is_empty() {
        anyhow::bail!("At least one zone is required for a comparison");
    }
    if zones.len() > MAX_COMPARED_ZONES {
        anyhow::bail!(
            "Too many zones: {} (at most {} can be compared)",
            zones.len(),
            MAX_COMPARED_ZONES
        );
    }
    let query = base_query(&snapshot.catalog, zones, args)?;
    let compared = match &query.zones {
        Selector::All => Vec::new(),
        Selector::One(zone) => vec![zone.clone()],
        Selector::Many(zones) => zones.clone(),
    };
    Ok(snapshot.query().compare(&query, &compared))
}

/// Requête construite depuis les arguments, zones résolues par le catalogue
fn base_query(
    catalog: &TerritoryCatalog,
    zones: &[String],
    args: &SliceArgs,
) -> Result<IndicatorQuery> {
    let zones: Vec<&str> = zones.iter().map(String::as_str).collect();
    let sources: Vec<&str> = args.energy_sources.iter().map(String::as_str).collect();
    let indicators: Vec<&str> = args.indicators.iter().map(String::as_str).collect();
    let query =
        IndicatorQuery::from_labels(catalog, &args.type_zone, &zones, &sources, &indicators)?;
    Ok(if args.years.is_empty() {
        query
    } else {
        query.years(Selector::Many(args.years.clone()))
    })
}

/// Analyse une liste de filières
pub fn parse_energy_sources(labels: &[String]) -> Result<Vec<EnergySource>> {
    let sources = labels
        .iter()
        .map(|label| label.parse())
        .collect::<Result<Vec<EnergySource>, _>>()?;
    Ok(sources)
}

fn write_output(slice: &TableSlice, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            export::write_slice(slice, path)?;
            info!(path = %path.display(), rows = slice.len(), "CSV written");
        }
        None => slice.write_csv(std::io::stdout().lock())?,
    }
    Ok(())
}

/// Valeur agrégée d'un indicateur
pub fn cmd_total(
    snapshot: &Snapshot,
    type_zone: &str,
    zone: &str,
    energy_sources: &[String],
    year: u16,
    indicator: &str,
) -> Result<Option<f64>> {
    let kind: TerritoryType = type_zone.parse()?;
    let zone = snapshot.catalog.resolve(kind, zone)?.zone();
    let indicator: Indicator = indicator.parse()?;
    let sources = parse_energy_sources(energy_sources)?;
    let sources = if sources.is_empty() {
        Selector::All
    } else {
        Selector::Many(sources)
    };
    Ok(snapshot.query().total(kind, &zone, &sources, year, indicator))
}

/// Affichage d'un total: "N/A" lorsqu'aucune donnée n'existe
pub fn format_total(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", (v * 100.0).round() / 100.0),
        None => "N/A".to_string(),
    }
}

/// Exécute la commande facilities
pub fn cmd_facilities(
    config_spec: &str,
    type_zone: &str,
    zone: &str,
    energy_sources: &[String],
    output: Option<&Path>,
) -> Result<()> {
    let snapshot = open(config_spec)?;
    let kind: TerritoryType = type_zone.parse()?;
    let zone = snapshot.catalog.resolve(kind, zone)?.zone();
    let sources = parse_energy_sources(energy_sources)?;
    let facilities = snapshot.query().facilities(kind, &zone, &sources);
    info!(zone = zone.label(kind), count = facilities.len(), "Facilities selected");

    match output {
        Some(path) if is_geojson(path) => export::export_facilities(&facilities, path)?,
        Some(path) => {
            let file = std::fs::File::create(path)
                .context(format!("Failed to create file: {}", path.display()))?;
            export::write_facilities(&facilities, std::io::BufWriter::new(file))?;
        }
        None => export::write_facilities(&facilities, std::io::stdout().lock())?,
    }
    Ok(())
}

fn is_geojson(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("geojson") || e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Lignes "code<TAB>nom" des territoires demandés
///
/// Avec une zone: ses ancêtres puis ses enfants. Sans zone: la liste de
/// choix du niveau, filtrée par région et département.
pub fn cmd_territories(
    catalog: &TerritoryCatalog,
    type_zone: &str,
    zone: Option<&str>,
    region: Option<&str>,
    department: Option<&str>,
) -> Result<Vec<String>> {
    let kind: TerritoryType = type_zone.parse()?;
    let line = |t: &enr_indicateurs::Territory| format!("{}\t{}", t.code, t.name);

    if let Some(zone) = zone {
        let territory = catalog.resolve(kind, zone)?;
        let chain = catalog.ancestor_chain(territory);
        let mut lines = vec![format!("# {} ({})", territory.name, kind)];
        lines.push(format!("region\t{}", chain.region.name));
        if let Some(d) = chain.department {
            lines.push(format!("department\t{}", d.name));
        }
        if let Some(e) = chain.epci {
            lines.push(format!("epci\t{}", e.name));
        }
        lines.extend(catalog.children(territory).into_iter().map(line));
        return Ok(lines);
    }

    let region = region
        .map(|r| catalog.resolve(TerritoryType::Region, r))
        .transpose()?;
    let department = department
        .map(|d| catalog.resolve(TerritoryType::Department, d))
        .transpose()?;
    Ok(catalog
        .choices(kind, region, department)
        .into_iter()
        .map(line)
        .collect())
}

/// Exécute la commande objectives
pub fn cmd_objectives(config_spec: &str, region: &str, output: Option<&Path>) -> Result<()> {
    let snapshot = open(config_spec)?;
    let region = snapshot.catalog.resolve(TerritoryType::Region, region)?;
    let objectives = snapshot
        .objectives_for(&region.name)
        .with_context(|| format!("No objectives configured for region {}", region.name))?;

    let query = IndicatorQuery::new(TerritoryType::Region)
        .zones(region.zone())
        .indicators(Indicator::Energy);
    let rows = objectives.join(&snapshot.query().query(&query));

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .context(format!("Failed to create file: {}", path.display()))?;
            export::write_objectives(&rows, std::io::BufWriter::new(file))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            export::write_objectives(&rows, &mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
