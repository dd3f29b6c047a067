//! Utilitaires de lecture: décodage, nombres au format français, codes départements

use std::path::Path;
use std::sync::OnceLock;

use encoding_rs::Encoding;
use regex::Regex;
use serde::de::DeserializeOwned;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{DataWarning, Diagnostics};
use crate::EnrError;

/// Minuscules sans diacritiques, pour comparer et trier des libellés français
///
/// Décomposition NFD puis suppression des marques combinantes: les formes
/// précomposées et décomposées d'un même nom donnent la même clé.
pub fn fold(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
    {
        match c {
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            '\u{2019}' => out.push('\''),
            c => out.push(c),
        }
    }
    out
}

/// Parse un nombre en acceptant la virgule décimale et les séparateurs de milliers
/// par espace (y compris insécables)
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    fast_float::parse::<f64, _>(&cleaned)
        .ok()
        .filter(|v| v.is_finite())
}

fn department_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(2[ab]|\d{1,3})\b").expect("valid regex"))
}

/// Extrait les codes départements d'un champ simple ou d'une liste sérialisée
///
/// Formats rencontrés: `38`, `c("38", "73")`, `['38', '73']`, `38|73`.
/// Les codes à un chiffre sont complétés (`1` -> `01`), la Corse est en majuscules.
/// Les doublons sont supprimés en conservant l'ordre d'apparition.
pub fn parse_department_codes(raw: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for m in department_code_regex().find_iter(raw) {
        let token = m.as_str().to_uppercase();
        let code = if token.len() == 1 {
            format!("0{token}")
        } else {
            token
        };
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

/// Résout un libellé d'encodage (`utf-8`, `windows-1252`, `latin1`, ...)
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, EnrError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| EnrError::UnsupportedEncoding(label.to_string()))
}

/// Lit un fichier texte complet dans l'encodage donné
///
/// Un fichier absent est une erreur fatale de données de référence.
pub fn read_text(path: &Path, encoding: &'static Encoding) -> Result<String, EnrError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EnrError::MissingSource(path.to_path_buf()),
        _ => EnrError::io(path, e),
    })?;
    let (decoded, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        tracing::warn!(
            path = %path.display(),
            encoding = encoding.name(),
            "Invalid byte sequences replaced while decoding"
        );
    }
    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Nom court d'un fichier pour les messages de diagnostic
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Lit une table CSV typée
///
/// Les colonnes obligatoires absentes de l'en-tête sont fatales; une ligne
/// non désérialisable est écartée et comptée.
pub fn read_records<T: DeserializeOwned>(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    required: &[&str],
    diagnostics: &mut Diagnostics,
) -> Result<Vec<T>, EnrError> {
    let file = file_label(path);
    let text = read_text(path, encoding)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(|e| EnrError::csv(&file, e))?.clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(EnrError::MissingColumn {
                file,
                column: column.to_string(),
            });
        }
    }

    let mut records = Vec::new();
    for (idx, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => diagnostics.record(DataWarning::malformed_row(
                &file,
                idx as u64 + 2,
                e.to_string(),
            )),
        }
    }
    Ok(records)
}
