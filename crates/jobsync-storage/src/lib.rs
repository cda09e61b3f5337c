//! Offer persistence: ordered four-table writer, retention sweeper and the
//! Postgres / in-memory stores behind them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jobsync_core::{Compensation, Employer, NormalizedListing, Offer, WorkLocation};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const CRATE_NAME: &str = "jobsync-storage";

pub const DEFAULT_RETENTION_DAYS: i64 = 30;
pub const MAX_RETENTION_DAYS: i64 = 36_500;

pub fn default_retention_window() -> Duration {
    Duration::days(DEFAULT_RETENTION_DAYS)
}

/// Tables in bootstrap order. Dependent tables cascade from `offres`.
pub const SCHEMA_STATEMENTS: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS offres (
        id TEXT PRIMARY KEY,
        intitule TEXT,
        description TEXT,
        date_creation TIMESTAMPTZ,
        date_actualisation TIMESTAMPTZ,
        rome_code TEXT,
        rome_libelle TEXT,
        appellation_libelle TEXT,
        type_contrat TEXT,
        type_contrat_libelle TEXT,
        nature_contrat TEXT,
        experience_exige TEXT,
        experience_libelle TEXT,
        nombre_postes INTEGER,
        accessible_th BOOLEAN,
        deplacement_code TEXT,
        deplacement_libelle TEXT,
        qualification_code TEXT,
        qualification_libelle TEXT,
        code_naf TEXT,
        secteur_activite TEXT,
        secteur_activite_libelle TEXT,
        origine_offre TEXT,
        url_origine TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lieu_travail (
        id TEXT PRIMARY KEY,
        offre_id TEXT NOT NULL REFERENCES offres(id) ON DELETE CASCADE,
        libelle TEXT,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        code_postal TEXT,
        commune TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entreprise (
        id TEXT PRIMARY KEY,
        offre_id TEXT NOT NULL REFERENCES offres(id) ON DELETE CASCADE,
        nom TEXT,
        logo TEXT,
        entreprise_adaptee BOOLEAN
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS salaire (
        id TEXT PRIMARY KEY,
        offre_id TEXT NOT NULL REFERENCES offres(id) ON DELETE CASCADE,
        libelle TEXT
    )
    "#,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{table} row {id} already exists")]
    Duplicate { table: &'static str, id: String },
    #[error("{table} row {id} references missing offer")]
    MissingParent { table: &'static str, id: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("retention window {days} days puts the cutoff out of range")]
    CutoffOutOfRange { days: i64 },
}

/// Result of the root insert. A conflict on the primary key is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub offers: u64,
    pub locations: u64,
    pub employers: u64,
    pub compensations: u64,
}

#[async_trait]
pub trait OfferStore: Send + Sync {
    async fn insert_offer(&self, offer: &Offer) -> Result<InsertOutcome, StoreError>;
    async fn insert_location(&self, location: &WorkLocation) -> Result<(), StoreError>;
    async fn insert_employer(&self, employer: &Employer) -> Result<(), StoreError>;
    async fn insert_compensation(&self, compensation: &Compensation) -> Result<(), StoreError>;

    /// Deletes offers whose `date_actualisation` is strictly before `cutoff`.
    /// Offers without a refresh timestamp are kept.
    async fn delete_offers_refreshed_before(&self, cutoff: DateTime<Utc>)
        -> Result<u64, StoreError>;

    async fn table_counts(&self) -> Result<TableCounts, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WriteStage {
    Offer,
    Location,
    Employer,
    Compensation,
}

impl WriteStage {
    /// Dependent rows carry a foreign key to the offer, so it goes first.
    pub const ORDER: [WriteStage; 4] = [
        WriteStage::Offer,
        WriteStage::Location,
        WriteStage::Employer,
        WriteStage::Compensation,
    ];

    pub fn table(self) -> &'static str {
        match self {
            WriteStage::Offer => "offres",
            WriteStage::Location => "lieu_travail",
            WriteStage::Employer => "entreprise",
            WriteStage::Compensation => "salaire",
        }
    }
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted,
    /// The offer was ingested by an earlier cycle; dependent writes skipped.
    Duplicate,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("offer {offer_id}: {stage} write failed: {source}")]
    Write {
        offer_id: String,
        stage: WriteStage,
        #[source]
        source: StoreError,
    },
}

impl PersistError {
    pub fn stage(&self) -> WriteStage {
        match self {
            PersistError::Write { stage, .. } => *stage,
        }
    }

    /// True when the offer row exists but at least one dependent row does not.
    pub fn is_partial(&self) -> bool {
        self.stage() != WriteStage::Offer
    }
}

/// Writes the four rows of one listing in `WriteStage::ORDER`, without a
/// surrounding transaction.
#[derive(Clone)]
pub struct PersistenceWriter {
    store: Arc<dyn OfferStore>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn OfferStore>) -> Self {
        Self { store }
    }

    pub async fn persist(&self, listing: &NormalizedListing) -> Result<PersistOutcome, PersistError> {
        let offer_id = listing.offer_id();
        for stage in WriteStage::ORDER {
            let result = match stage {
                WriteStage::Offer => match self.store.insert_offer(&listing.offer).await {
                    Ok(InsertOutcome::AlreadyPresent) => {
                        debug!(offer_id, "offer already ingested; skipping");
                        return Ok(PersistOutcome::Duplicate);
                    }
                    Ok(InsertOutcome::Inserted) => Ok(()),
                    Err(err) => Err(err),
                },
                WriteStage::Location => self.store.insert_location(&listing.location).await,
                WriteStage::Employer => self.store.insert_employer(&listing.employer).await,
                WriteStage::Compensation => {
                    self.store.insert_compensation(&listing.compensation).await
                }
            };

            if let Err(source) = result {
                if stage != WriteStage::Offer {
                    warn!(offer_id, %stage, "offer row left without all dependent rows");
                }
                return Err(PersistError::Write {
                    offer_id: offer_id.to_string(),
                    stage,
                    source,
                });
            }
        }
        Ok(PersistOutcome::Inserted)
    }
}

#[derive(Clone)]
pub struct RetentionSweeper {
    store: Arc<dyn OfferStore>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn OfferStore>) -> Self {
        Self { store }
    }

    pub fn cutoff(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>, StoreError> {
        now.checked_sub_signed(window)
            .ok_or(StoreError::CutoffOutOfRange {
                days: window.num_days(),
            })
    }

    pub async fn sweep(&self, window: Duration) -> Result<u64, StoreError> {
        self.sweep_as_of(window, Utc::now()).await
    }

    pub async fn sweep_as_of(&self, window: Duration, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = Self::cutoff(now, window)?;
        let deleted = self.store.delete_offers_refreshed_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted, %cutoff, "swept stale offers");
        }
        Ok(deleted)
    }
}

#[derive(Debug, Clone)]
pub struct PgOfferStore {
    pool: PgPool,
}

impl PgOfferStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        Ok(Self::new(pool))
    }

    /// Defers connecting until the first query, so an unreachable database
    /// surfaces per cycle instead of at startup.
    pub fn connect_lazy(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .context("parsing DATABASE_URL")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the four tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("applying schema statement")?;
        }
        info!("schema ready");
        Ok(())
    }
}

fn map_insert_error(table: &'static str, id: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                table,
                id: id.to_string(),
            };
        }
        if db.is_foreign_key_violation() {
            return StoreError::MissingParent {
                table,
                id: id.to_string(),
            };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl OfferStore for PgOfferStore {
    async fn insert_offer(&self, offer: &Offer) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO offres (
                id, intitule, description, date_creation, date_actualisation,
                rome_code, rome_libelle, appellation_libelle, type_contrat,
                type_contrat_libelle, nature_contrat, experience_exige,
                experience_libelle, nombre_postes, accessible_th, deplacement_code,
                deplacement_libelle, qualification_code, qualification_libelle,
                code_naf, secteur_activite, secteur_activite_libelle,
                origine_offre, url_origine
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&offer.id)
        .bind(&offer.intitule)
        .bind(&offer.description)
        .bind(offer.date_creation)
        .bind(offer.date_actualisation)
        .bind(&offer.rome_code)
        .bind(&offer.rome_libelle)
        .bind(&offer.appellation_libelle)
        .bind(&offer.type_contrat)
        .bind(&offer.type_contrat_libelle)
        .bind(&offer.nature_contrat)
        .bind(&offer.experience_exige)
        .bind(&offer.experience_libelle)
        .bind(offer.nombre_postes)
        .bind(offer.accessible_th)
        .bind(&offer.deplacement_code)
        .bind(&offer.deplacement_libelle)
        .bind(&offer.qualification_code)
        .bind(&offer.qualification_libelle)
        .bind(&offer.code_naf)
        .bind(&offer.secteur_activite)
        .bind(&offer.secteur_activite_libelle)
        .bind(&offer.origine_offre)
        .bind(&offer.url_origine)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error("offres", &offer.id, err))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyPresent)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn insert_location(&self, location: &WorkLocation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO lieu_travail (id, offre_id, libelle, latitude, longitude, code_postal, commune)
            VALUES ($1, $1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&location.offer_id)
        .bind(&location.libelle)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.code_postal)
        .bind(&location.commune)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error("lieu_travail", &location.offer_id, err))?;
        Ok(())
    }

    async fn insert_employer(&self, employer: &Employer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO entreprise (id, offre_id, nom, logo, entreprise_adaptee)
            VALUES ($1, $1, $2, $3, $4)
            "#,
        )
        .bind(&employer.offer_id)
        .bind(&employer.nom)
        .bind(&employer.logo)
        .bind(employer.entreprise_adaptee)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error("entreprise", &employer.offer_id, err))?;
        Ok(())
    }

    async fn insert_compensation(&self, compensation: &Compensation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO salaire (id, offre_id, libelle)
            VALUES ($1, $1, $2)
            "#,
        )
        .bind(&compensation.offer_id)
        .bind(&compensation.libelle)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error("salaire", &compensation.offer_id, err))?;
        Ok(())
    }

    async fn delete_offers_refreshed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM offres WHERE date_actualisation < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn table_counts(&self) -> Result<TableCounts, StoreError> {
        let (offers, locations, employers, compensations): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM offres),
                   (SELECT COUNT(*) FROM lieu_travail),
                   (SELECT COUNT(*) FROM entreprise),
                   (SELECT COUNT(*) FROM salaire)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(TableCounts {
            offers: offers.max(0) as u64,
            locations: locations.max(0) as u64,
            employers: employers.max(0) as u64,
            compensations: compensations.max(0) as u64,
        })
    }
}

#[derive(Debug, Default)]
struct MemoryTables {
    offers: BTreeMap<String, Offer>,
    locations: BTreeMap<String, WorkLocation>,
    employers: BTreeMap<String, Employer>,
    compensations: BTreeMap<String, Compensation>,
}

/// In-process store with the same key and cascade rules as the Postgres schema.
#[derive(Debug, Default)]
pub struct MemoryOfferStore {
    tables: Mutex<MemoryTables>,
    failing_stage: Option<WriteStage>,
}

impl MemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write to `stage` fails with `StoreError::Unavailable`.
    pub fn failing_at(stage: WriteStage) -> Self {
        Self {
            tables: Mutex::default(),
            failing_stage: Some(stage),
        }
    }

    pub async fn offer(&self, id: &str) -> Option<Offer> {
        self.tables.lock().await.offers.get(id).cloned()
    }

    pub async fn location(&self, offer_id: &str) -> Option<WorkLocation> {
        self.tables.lock().await.locations.get(offer_id).cloned()
    }

    pub async fn employer(&self, offer_id: &str) -> Option<Employer> {
        self.tables.lock().await.employers.get(offer_id).cloned()
    }

    pub async fn compensation(&self, offer_id: &str) -> Option<Compensation> {
        self.tables.lock().await.compensations.get(offer_id).cloned()
    }

    fn check_failure(&self, stage: WriteStage) -> Result<(), StoreError> {
        if self.failing_stage == Some(stage) {
            return Err(StoreError::Unavailable(format!("{stage} rejected write")));
        }
        Ok(())
    }
}

fn insert_dependent<T>(
    table: &'static str,
    offers: &BTreeMap<String, Offer>,
    rows: &mut BTreeMap<String, T>,
    offer_id: &str,
    row: T,
) -> Result<(), StoreError> {
    if !offers.contains_key(offer_id) {
        return Err(StoreError::MissingParent {
            table,
            id: offer_id.to_string(),
        });
    }
    if rows.contains_key(offer_id) {
        return Err(StoreError::Duplicate {
            table,
            id: offer_id.to_string(),
        });
    }
    rows.insert(offer_id.to_string(), row);
    Ok(())
}

#[async_trait]
impl OfferStore for MemoryOfferStore {
    async fn insert_offer(&self, offer: &Offer) -> Result<InsertOutcome, StoreError> {
        self.check_failure(WriteStage::Offer)?;
        let mut tables = self.tables.lock().await;
        if tables.offers.contains_key(&offer.id) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        tables.offers.insert(offer.id.clone(), offer.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_location(&self, location: &WorkLocation) -> Result<(), StoreError> {
        self.check_failure(WriteStage::Location)?;
        let mut tables = self.tables.lock().await;
        let MemoryTables {
            offers, locations, ..
        } = &mut *tables;
        insert_dependent("lieu_travail", offers, locations, &location.offer_id, location.clone())
    }

    async fn insert_employer(&self, employer: &Employer) -> Result<(), StoreError> {
        self.check_failure(WriteStage::Employer)?;
        let mut tables = self.tables.lock().await;
        let MemoryTables {
            offers, employers, ..
        } = &mut *tables;
        insert_dependent("entreprise", offers, employers, &employer.offer_id, employer.clone())
    }

    async fn insert_compensation(&self, compensation: &Compensation) -> Result<(), StoreError> {
        self.check_failure(WriteStage::Compensation)?;
        let mut tables = self.tables.lock().await;
        let MemoryTables {
            offers,
            compensations,
            ..
        } = &mut *tables;
        insert_dependent(
            "salaire",
            offers,
            compensations,
            &compensation.offer_id,
            compensation.clone(),
        )
    }

    async fn delete_offers_refreshed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let stale: Vec<String> = tables
            .offers
            .values()
            .filter(|offer| offer.date_actualisation.is_some_and(|ts| ts < cutoff))
            .map(|offer| offer.id.clone())
            .collect();
        for id in &stale {
            tables.offers.remove(id);
            tables.locations.remove(id);
            tables.employers.remove(id);
            tables.compensations.remove(id);
        }
        Ok(stale.len() as u64)
    }

    async fn table_counts(&self) -> Result<TableCounts, StoreError> {
        let tables = self.tables.lock().await;
        Ok(TableCounts {
            offers: tables.offers.len() as u64,
            locations: tables.locations.len() as u64,
            employers: tables.employers.len() as u64,
            compensations: tables.compensations.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn listing(id: &str, refreshed: Option<DateTime<Utc>>) -> NormalizedListing {
        let mut offer = Offer::bare(id);
        offer.intitule = Some("Cook".to_string());
        offer.date_actualisation = refreshed;
        NormalizedListing {
            offer,
            location: WorkLocation {
                offer_id: id.to_string(),
                libelle: Some("76 - ROUEN".to_string()),
                latitude: Some(49.44),
                longitude: Some(1.09),
                code_postal: Some("76000".to_string()),
                commune: Some("76540".to_string()),
            },
            employer: Employer {
                offer_id: id.to_string(),
                nom: None,
                logo: None,
                entreprise_adaptee: Some(false),
            },
            compensation: Compensation {
                offer_id: id.to_string(),
                libelle: None,
            },
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn write_order_puts_offer_first() {
        assert_eq!(WriteStage::ORDER[0], WriteStage::Offer);
        assert_eq!(
            WriteStage::ORDER.iter().map(|s| s.table()).collect::<Vec<_>>(),
            vec!["offres", "lieu_travail", "entreprise", "salaire"]
        );
    }

    #[tokio::test]
    async fn new_listing_creates_one_row_per_table() {
        let store = Arc::new(MemoryOfferStore::new());
        let writer = PersistenceWriter::new(store.clone());

        let outcome = writer.persist(&listing("A1", Some(now()))).await.unwrap();
        assert_eq!(outcome, PersistOutcome::Inserted);

        let counts = store.table_counts().await.unwrap();
        assert_eq!(
            counts,
            TableCounts {
                offers: 1,
                locations: 1,
                employers: 1,
                compensations: 1
            }
        );
        assert_eq!(store.location("A1").await.unwrap().offer_id, "A1");
        assert_eq!(store.compensation("A1").await.unwrap().libelle, None);
    }

    #[tokio::test]
    async fn reingesting_known_id_is_a_silent_noop() {
        let store = Arc::new(MemoryOfferStore::new());
        let writer = PersistenceWriter::new(store.clone());
        writer.persist(&listing("A1", Some(now()))).await.unwrap();
        let before = store.table_counts().await.unwrap();

        let mut again = listing("A1", Some(now()));
        again.offer.intitule = Some("Chef".to_string());
        let outcome = writer.persist(&again).await.unwrap();

        assert_eq!(outcome, PersistOutcome::Duplicate);
        assert_eq!(store.table_counts().await.unwrap(), before);
        assert_eq!(store.offer("A1").await.unwrap().intitule.as_deref(), Some("Cook"));
    }

    #[tokio::test]
    async fn offer_failure_attempts_no_dependent_write() {
        let store = Arc::new(MemoryOfferStore::failing_at(WriteStage::Offer));
        let writer = PersistenceWriter::new(store.clone());

        let err = writer.persist(&listing("B2", None)).await.unwrap_err();
        assert_eq!(err.stage(), WriteStage::Offer);
        assert!(!err.is_partial());
        assert!(err.to_string().contains("B2"));
        assert_eq!(store.table_counts().await.unwrap(), TableCounts::default());
    }

    #[tokio::test]
    async fn dependent_failure_leaves_partial_offer() {
        let store = Arc::new(MemoryOfferStore::failing_at(WriteStage::Employer));
        let writer = PersistenceWriter::new(store.clone());

        let err = writer.persist(&listing("C3", None)).await.unwrap_err();
        assert_eq!(err.stage(), WriteStage::Employer);
        assert!(err.is_partial());

        let counts = store.table_counts().await.unwrap();
        assert_eq!(counts.offers, 1);
        assert_eq!(counts.locations, 1);
        assert_eq!(counts.employers, 0);
        assert_eq!(counts.compensations, 0);
    }

    #[tokio::test]
    async fn sweep_respects_boundary_and_cascades() {
        let store = Arc::new(MemoryOfferStore::new());
        let writer = PersistenceWriter::new(store.clone());
        let window = default_retention_window();
        let cutoff = RetentionSweeper::cutoff(now(), window).unwrap();

        writer
            .persist(&listing("fresh", Some(cutoff + Duration::seconds(1))))
            .await
            .unwrap();
        writer.persist(&listing("edge", Some(cutoff))).await.unwrap();
        writer
            .persist(&listing("stale", Some(cutoff - Duration::seconds(1))))
            .await
            .unwrap();
        writer.persist(&listing("undated", None)).await.unwrap();

        let sweeper = RetentionSweeper::new(store.clone());
        let deleted = sweeper.sweep_as_of(window, now()).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(store.offer("fresh").await.is_some());
        assert!(store.offer("edge").await.is_some());
        assert!(store.offer("undated").await.is_some());
        assert!(store.offer("stale").await.is_none());
        assert!(store.location("stale").await.is_none());
        assert!(store.employer("stale").await.is_none());
        assert!(store.compensation("stale").await.is_none());
        assert_eq!(store.table_counts().await.unwrap().locations, 3);
    }

    #[tokio::test]
    async fn oversized_window_is_an_error_not_a_panic() {
        let store = Arc::new(MemoryOfferStore::new());
        PersistenceWriter::new(store.clone())
            .persist(&listing("kept", Some(now())))
            .await
            .unwrap();

        let sweeper = RetentionSweeper::new(store.clone());
        let err = sweeper
            .sweep_as_of(Duration::days(200_000_000), now())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::CutoffOutOfRange { days: 200_000_000 }));
        assert!(store.offer("kept").await.is_some());
    }

    #[tokio::test]
    async fn dependent_rows_require_their_offer() {
        let store = MemoryOfferStore::new();
        let err = store
            .insert_compensation(&Compensation {
                offer_id: "ghost".to_string(),
                libelle: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingParent { table: "salaire", .. }));
    }
}
