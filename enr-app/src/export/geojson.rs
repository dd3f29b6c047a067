//! Export des installations en GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use enr_indicateurs::Facility;

/// Exporte des installations en GeoJSON (WGS84)
pub fn export_facilities(facilities: &[&Facility], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::4326"}}}},"features":["#
    )?;

    for (i, facility) in facilities.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(&mut writer, facility)?;
    }

    write!(writer, "]}}")?;
    writer.flush()?;

    Ok(())
}

/// Écrit une installation en GeoJSON
fn write_feature<W: Write>(writer: &mut W, facility: &Facility) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    geo::Geometry::Point(facility.location).process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    write!(
        writer,
        r#","properties":{{"nominstallation":"{}","Filière":"{}""#,
        escape_json(&facility.name),
        facility.energy_source.label()
    )?;
    write_text(writer, "typo", facility.raw_type.as_deref())?;
    let date = facility.commissioning_date.map(|d| d.to_string());
    write_text(writer, "date_inst", date.as_deref())?;
    write_number(writer, "puiss_MW", facility.power_mw)?;
    write_number(writer, "energie_GWh", facility.energy_gwh)?;
    write_text(writer, "NOM_EPCI", facility.epci.as_deref())?;
    write_text(writer, "NOM_DEP", Some(&facility.department))?;
    write_text(writer, "NOM_REG", Some(&facility.region))?;
    write!(writer, "}}}}")?;

    Ok(())
}

fn write_text<W: Write>(writer: &mut W, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) => write!(writer, r#","{}":"{}""#, key, escape_json(v))?,
        None => write!(writer, r#","{}":null"#, key)?,
    }
    Ok(())
}

fn write_number<W: Write>(writer: &mut W, key: &str, value: Option<f64>) -> Result<()> {
    match value.filter(|v| v.is_finite()) {
        Some(v) => write!(writer, r#","{}":{}"#, key, v)?,
        None => write!(writer, r#","{}":null"#, key)?,
    }
    Ok(())
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
