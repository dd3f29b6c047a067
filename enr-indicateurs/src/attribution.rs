//! Citations des sources de données, affichées avec chaque indicateur

use crate::types::TerritoryType;
use crate::EnrError;

/// Registre national des installations et points d'injection de biométhane
pub const ODRE: &str = "ODRÉ [[1]](https://odre.opendatasoft.com/explore/dataset/registre-national-installation-production-stockage-electricite-agrege-311220/information/?disjunctive.epci&disjunctive.departement&disjunctive.region&disjunctive.filiere&disjunctive.combustible&disjunctive.combustiblessecondaires&disjunctive.technologie&disjunctive.regime&disjunctive.gestionnaire) [[2]](https://odre.opendatasoft.com/explore/dataset/points-dinjection-de-biomethane-en-france/information/?disjunctive.site&disjunctive.nom_epci&disjunctive.departement&disjunctive.region&disjunctive.type_de_reseau&disjunctive.grx_demandeur) [[3]](https://opendata.reseaux-energies.fr/explore/dataset/injection-annuelle-biomethane-pitp-grtgaz)";

/// Points d'injection de biométhane seuls
pub const ODRE_GAZ: &str = "ODRÉ [[1]](https://odre.opendatasoft.com/explore/dataset/points-dinjection-de-biomethane-en-france/information/?disjunctive.site&disjunctive.nom_epci&disjunctive.departement&disjunctive.region&disjunctive.type_de_reseau&disjunctive.grx_demandeur) [[2]](https://opendata.reseaux-energies.fr/explore/dataset/injection-annuelle-biomethane-pitp-grtgaz)";

pub const GRDF: &str =
    "[GRDF](https://opendata.grdf.fr/explore/dataset/capacite-et-quantite-dinjection-de-biomethane)";

/// Tableaux de bord solaire et éolien
pub const SDES: &str = "SDES [[1]](https://www.statistiques.developpement-durable.gouv.fr/tableau-de-bord-solaire-photovoltaique-quatrieme-trimestre-2021?rubrique=21&dossier=172) [[2]](https://www.statistiques.developpement-durable.gouv.fr/tableau-de-bord-eolien-quatrieme-trimestre-2021)";

/// Pseudo-indicateur désignant la carte et la liste des installations
pub const INSTALLATIONS: &str = "installations";

/// Citation des sources d'un indicateur pour un niveau de territoire
///
/// Les puissances et nombres de sites régionaux et départementaux viennent
/// du SDES; au niveau EPCI ils sont reconstitués depuis le registre.
pub fn sources_for(indicator: &str, kind: TerritoryType) -> Result<String, EnrError> {
    match indicator {
        INSTALLATIONS | "energie_GWh" => Ok(format!("{ODRE}, {GRDF}")),
        "puiss_MW" | "Nombre de sites" => Ok(match kind {
            TerritoryType::Region | TerritoryType::Department => {
                format!("{SDES}, {ODRE_GAZ}, {GRDF}")
            }
            TerritoryType::Epci => format!("{ODRE}, {GRDF}"),
        }),
        _ => Err(EnrError::UnknownIndicator(indicator.to_string())),
    }
}
