//! France Travail API adapter: OAuth2 client-credentials token handling,
//! offer search and normalization of raw listings into row shapes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use jobsync_core::{Compensation, Employer, NormalizedListing, Offer, WorkLocation};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const CRATE_NAME: &str = "jobsync-adapters";

pub const DEFAULT_TOKEN_URL: &str =
    "https://entreprise.francetravail.fr/connexion/oauth2/access_token?realm=%2Fpartenaire";
pub const DEFAULT_SEARCH_URL: &str =
    "https://api.francetravail.io/partenaire/offresdemploi/v2/offres/search";

/// Raw listing as returned under `resultats` by the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawListing {
    pub id: String,
    pub intitule: Option<String>,
    pub description: Option<String>,
    pub date_creation: Option<String>,
    pub date_actualisation: Option<String>,
    pub lieu_travail: Option<RawWorkLocation>,
    pub rome_code: Option<String>,
    pub rome_libelle: Option<String>,
    pub appellationlibelle: Option<String>,
    pub entreprise: Option<RawEmployer>,
    pub type_contrat: Option<String>,
    pub type_contrat_libelle: Option<String>,
    pub nature_contrat: Option<String>,
    pub experience_exige: Option<String>,
    pub experience_libelle: Option<String>,
    pub salaire: Option<RawCompensation>,
    pub nombre_postes: Option<i32>,
    #[serde(rename = "accessibleTH")]
    pub accessible_th: Option<bool>,
    pub deplacement_code: Option<String>,
    pub deplacement_libelle: Option<String>,
    pub qualification_code: Option<String>,
    pub qualification_libelle: Option<String>,
    #[serde(rename = "codeNAF")]
    pub code_naf: Option<String>,
    pub secteur_activite: Option<String>,
    pub secteur_activite_libelle: Option<String>,
    pub origine_offre: Option<RawOrigin>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawWorkLocation {
    pub libelle: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub code_postal: Option<String>,
    pub commune: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEmployer {
    pub nom: Option<String>,
    pub logo: Option<String>,
    pub entreprise_adaptee: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCompensation {
    pub libelle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOrigin {
    pub origine: Option<String>,
    pub url_origine: Option<String>,
}

impl RawListing {
    pub fn postal_code(&self) -> Option<&str> {
        self.lieu_travail
            .as_ref()
            .and_then(|l| l.code_postal.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    resultats: Vec<RawListing>,
}

/// Blank values become `None`; anything else is kept verbatim.
fn text_or_none(value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Upstream timestamps are RFC 3339 (`2024-05-10T14:30:22.000Z`); a missing
/// offset is read as UTC.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Maps one raw listing into its four row shapes. Absent sub-objects and
/// empty strings become `None`; the upstream id is copied into every row.
pub fn normalize(raw: &RawListing) -> NormalizedListing {
    let id = raw.id.clone();
    let location = raw.lieu_travail.clone().unwrap_or_default();
    let employer = raw.entreprise.clone().unwrap_or_default();
    let salary = raw.salaire.clone().unwrap_or_default();
    let origin = raw.origine_offre.clone().unwrap_or_default();

    NormalizedListing {
        offer: Offer {
            id: id.clone(),
            intitule: text_or_none(raw.intitule.as_deref()),
            description: text_or_none(raw.description.as_deref()),
            date_creation: parse_timestamp(raw.date_creation.as_deref()),
            date_actualisation: parse_timestamp(raw.date_actualisation.as_deref()),
            rome_code: text_or_none(raw.rome_code.as_deref()),
            rome_libelle: text_or_none(raw.rome_libelle.as_deref()),
            appellation_libelle: text_or_none(raw.appellationlibelle.as_deref()),
            type_contrat: text_or_none(raw.type_contrat.as_deref()),
            type_contrat_libelle: text_or_none(raw.type_contrat_libelle.as_deref()),
            nature_contrat: text_or_none(raw.nature_contrat.as_deref()),
            experience_exige: text_or_none(raw.experience_exige.as_deref()),
            experience_libelle: text_or_none(raw.experience_libelle.as_deref()),
            nombre_postes: raw.nombre_postes,
            accessible_th: raw.accessible_th,
            deplacement_code: text_or_none(raw.deplacement_code.as_deref()),
            deplacement_libelle: text_or_none(raw.deplacement_libelle.as_deref()),
            qualification_code: text_or_none(raw.qualification_code.as_deref()),
            qualification_libelle: text_or_none(raw.qualification_libelle.as_deref()),
            code_naf: text_or_none(raw.code_naf.as_deref()),
            secteur_activite: text_or_none(raw.secteur_activite.as_deref()),
            secteur_activite_libelle: text_or_none(raw.secteur_activite_libelle.as_deref()),
            origine_offre: text_or_none(origin.origine.as_deref()),
            url_origine: text_or_none(origin.url_origine.as_deref()),
        },
        location: WorkLocation {
            offer_id: id.clone(),
            libelle: text_or_none(location.libelle.as_deref()),
            latitude: location.latitude,
            longitude: location.longitude,
            code_postal: text_or_none(location.code_postal.as_deref()),
            commune: text_or_none(location.commune.as_deref()),
        },
        employer: Employer {
            offer_id: id.clone(),
            nom: text_or_none(employer.nom.as_deref()),
            logo: text_or_none(employer.logo.as_deref()),
            entreprise_adaptee: employer.entreprise_adaptee,
        },
        compensation: Compensation {
            offer_id: id,
            libelle: text_or_none(salary.libelle.as_deref()),
        },
    }
}

/// Bearer token from the client-credentials exchange. No expiry is tracked.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("upstream rejected the access token")]
    Unauthorized,
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token response carried no access_token")]
    MissingToken,
    #[error("decoding {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait ListingApi: Send + Sync {
    /// Performs the client-credentials exchange.
    async fn request_token(&self) -> Result<AccessToken, ApiError>;

    /// Fetches one page of listings. A 401 surfaces as `ApiError::Unauthorized`.
    async fn search(&self, token: &AccessToken) -> Result<Vec<RawListing>, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub token_url: String,
    pub search_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug)]
pub struct FranceTravailClient {
    client: reqwest::Client,
    credentials: ApiCredentials,
    endpoints: ApiEndpoints,
}

impl FranceTravailClient {
    pub fn new(
        credentials: ApiCredentials,
        endpoints: ApiEndpoints,
        config: HttpClientConfig,
    ) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            credentials,
            endpoints,
        })
    }
}

#[async_trait]
impl ListingApi for FranceTravailClient {
    async fn request_token(&self) -> Result<AccessToken, ApiError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", self.credentials.scope.as_str()),
        ];
        let resp = self
            .client
            .post(&self.endpoints.token_url)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "token request rejected");
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                url: self.endpoints.token_url.clone(),
            });
        }

        let bytes = resp.bytes().await?;
        let parsed: TokenResponse = serde_json::from_slice(&bytes).map_err(|source| {
            ApiError::Decode {
                what: "token response",
                source,
            }
        })?;
        parsed
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or(ApiError::MissingToken)
    }

    async fn search(&self, token: &AccessToken) -> Result<Vec<RawListing>, ApiError> {
        let resp = self
            .client
            .get(&self.endpoints.search_url)
            .bearer_auth(token.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        // 206 Partial Content is the normal answer for a paged search.
        let bytes = resp.bytes().await?;
        let page: SearchResponse = serde_json::from_slice(&bytes).map_err(|source| {
            ApiError::Decode {
                what: "search response",
                source,
            }
        })?;
        debug!(listings = page.resultats.len(), %final_url, "search page received");
        Ok(page.resultats)
    }
}

/// Cached token cell. Owned by the sync session, lent to the token manager.
#[derive(Debug, Default)]
pub struct TokenSlot {
    current: RwLock<Option<AccessToken>>,
}

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<AccessToken> {
        self.current.read().await.clone()
    }

    pub async fn store(&self, token: AccessToken) {
        *self.current.write().await = Some(token);
    }

    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub listings: Vec<RawListing>,
    /// The first attempt was rejected and a fresh token was used.
    pub reauthenticated: bool,
}

#[derive(Clone)]
pub struct TokenManager {
    api: Arc<dyn ListingApi>,
}

impl TokenManager {
    pub fn new(api: Arc<dyn ListingApi>) -> Self {
        Self { api }
    }

    pub async fn ensure_token(&self, slot: &TokenSlot) -> Result<AccessToken, ApiError> {
        if let Some(token) = slot.current().await {
            return Ok(token);
        }
        self.acquire(slot).await
    }

    async fn acquire(&self, slot: &TokenSlot) -> Result<AccessToken, ApiError> {
        let token = self.api.request_token().await?;
        slot.store(token.clone()).await;
        info!("acquired access token");
        Ok(token)
    }

    /// Fetches a page, re-acquiring the token and retrying exactly once when
    /// the first attempt is rejected as unauthorized.
    pub async fn search(&self, slot: &TokenSlot) -> Result<SearchPage, ApiError> {
        let token = self.ensure_token(slot).await?;
        match self.api.search(&token).await {
            Ok(listings) => Ok(SearchPage {
                listings,
                reauthenticated: false,
            }),
            Err(ApiError::Unauthorized) => {
                warn!("access token expired or invalid; renewing");
                slot.invalidate().await;
                let token = self.acquire(slot).await?;
                let listings = self.api.search(&token).await?;
                Ok(SearchPage {
                    listings,
                    reauthenticated: true,
                })
            }
            Err(err) => Err(err),
        }
    }
}
