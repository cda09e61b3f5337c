//! Core domain model for jobsync: the four row shapes derived from one listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "jobsync-core";

/// Root record for one upstream listing. `id` is the upstream identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub intitule: Option<String>,
    pub description: Option<String>,
    pub date_creation: Option<DateTime<Utc>>,
    /// Last-refreshed timestamp; drives retention.
    pub date_actualisation: Option<DateTime<Utc>>,
    pub rome_code: Option<String>,
    pub rome_libelle: Option<String>,
    pub appellation_libelle: Option<String>,
    pub type_contrat: Option<String>,
    pub type_contrat_libelle: Option<String>,
    pub nature_contrat: Option<String>,
    pub experience_exige: Option<String>,
    pub experience_libelle: Option<String>,
    pub nombre_postes: Option<i32>,
    pub accessible_th: Option<bool>,
    pub deplacement_code: Option<String>,
    pub deplacement_libelle: Option<String>,
    pub qualification_code: Option<String>,
    pub qualification_libelle: Option<String>,
    pub code_naf: Option<String>,
    pub secteur_activite: Option<String>,
    pub secteur_activite_libelle: Option<String>,
    pub origine_offre: Option<String>,
    pub url_origine: Option<String>,
}

impl Offer {
    /// An offer carrying only its identifier, every other column null.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            intitule: None,
            description: None,
            date_creation: None,
            date_actualisation: None,
            rome_code: None,
            rome_libelle: None,
            appellation_libelle: None,
            type_contrat: None,
            type_contrat_libelle: None,
            nature_contrat: None,
            experience_exige: None,
            experience_libelle: None,
            nombre_postes: None,
            accessible_th: None,
            deplacement_code: None,
            deplacement_libelle: None,
            qualification_code: None,
            qualification_libelle: None,
            code_naf: None,
            secteur_activite: None,
            secteur_activite_libelle: None,
            origine_offre: None,
            url_origine: None,
        }
    }
}

/// Work location row (`lieu_travail`), one-to-one with its offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkLocation {
    pub offer_id: String,
    pub libelle: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub code_postal: Option<String>,
    pub commune: Option<String>,
}

/// Employer row (`entreprise`), one-to-one with its offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employer {
    pub offer_id: String,
    pub nom: Option<String>,
    pub logo: Option<String>,
    pub entreprise_adaptee: Option<bool>,
}

/// Compensation row (`salaire`), one-to-one with its offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compensation {
    pub offer_id: String,
    pub libelle: Option<String>,
}

/// Handoff contract from the normalizer into the persistence writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedListing {
    pub offer: Offer,
    pub location: WorkLocation,
    pub employer: Employer,
    pub compensation: Compensation,
}

impl NormalizedListing {
    pub fn offer_id(&self) -> &str {
        &self.offer.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_offer_has_only_an_id() {
        let offer = Offer::bare("A1");
        assert_eq!(offer.id, "A1");
        assert!(offer.intitule.is_none());
        assert!(offer.date_actualisation.is_none());
        assert!(offer.url_origine.is_none());
    }
}
