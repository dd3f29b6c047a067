//! Export CSV: extraits d'indicateurs, installations, objectifs

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use enr_indicateurs::{Facility, ObjectiveRow, TableSlice};

/// Colonnes de l'export des installations
pub const FACILITY_COLUMNS: [&str; 9] = [
    "nominstallation",
    "Filière",
    "typo",
    "date_inst",
    "puiss_MW",
    "energie_GWh",
    "NOM_EPCI",
    "NOM_DEP",
    "NOM_REG",
];

fn create(output_path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    Ok(BufWriter::new(file))
}

/// Écrit un extrait d'indicateurs dans un fichier
pub fn write_slice(slice: &TableSlice, output_path: &Path) -> Result<()> {
    let writer = create(output_path)?;
    slice
        .write_csv(writer)
        .context(format!("Failed to write {}", output_path.display()))
}

fn number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Écrit la liste des installations
pub fn write_facilities<W: Write>(facilities: &[&Facility], writer: W) -> Result<()> {
    let mut wtr = ::csv::Writer::from_writer(writer);
    wtr.write_record(FACILITY_COLUMNS)?;
    for f in facilities {
        wtr.write_record([
            f.name.clone(),
            f.energy_source.label().to_string(),
            f.raw_type.clone().unwrap_or_default(),
            f.commissioning_date.map(|d| d.to_string()).unwrap_or_default(),
            number(f.power_mw),
            number(f.energy_gwh),
            f.epci.clone().unwrap_or_default(),
            f.department.clone(),
            f.region.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Écrit la jointure production / objectifs
pub fn write_objectives<W: Write>(rows: &[ObjectiveRow], writer: W) -> Result<()> {
    let mut wtr = ::csv::Writer::from_writer(writer);
    wtr.write_record(["Filière", "annee", "energie_GWh", "Objectif"])?;
    for row in rows {
        wtr.write_record([
            row.energy_source.label().to_string(),
            row.year.to_string(),
            number(row.actual),
            number(row.objective),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
