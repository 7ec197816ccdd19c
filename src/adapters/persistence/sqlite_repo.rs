//! SQLite-backed repository via libsql.
//!
//! Implements `ReviewSource`, `ClaimSource`, `AnalysisSink` and `ImportSink` over one
//! database file (`claim_audit.db`). Analysis records are append-only: each run is a new
//! row keyed by its run id, and "latest" means the highest `analyzed_at` for a product.

use crate::domain::marketing::extract_claims_from_text;
use crate::domain::{
    ClaimCategory, ContradictionReport, DomainError, MarketingClaim, Product, ProductAnalysis,
    Review,
};
use crate::ports::{AnalysisSink, ClaimSource, ImportSink, ReviewSource};
use libsql::{Connection, Database, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "claim_audit.db";

const PRODUCTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    detail_document TEXT
)"#;

const REVIEWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL,
    rating INTEGER NOT NULL,
    text TEXT NOT NULL
)"#;
const REVIEWS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_reviews_product ON reviews (product_id, id)";

/// Curated claims. When a product has none, claims are derived from its detail document.
const CLAIMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS marketing_claims (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL,
    category TEXT NOT NULL,
    text TEXT NOT NULL
)"#;

const ANALYSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS product_analyses (
    run_id TEXT PRIMARY KEY,
    product_id INTEGER NOT NULL,
    analyzed_at_us INTEGER NOT NULL,
    weighted_score REAL NOT NULL,
    grade TEXT NOT NULL,
    trust_level TEXT NOT NULL,
    payload TEXT NOT NULL
)"#;
const ANALYSES_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_analyses_product \
     ON product_analyses (product_id, analyzed_at_us DESC)";

const REPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS contradiction_reports (
    run_id TEXT PRIMARY KEY,
    product_id INTEGER NOT NULL,
    analysis_run_id TEXT NOT NULL,
    analyzed_at_us INTEGER NOT NULL,
    final_score REAL NOT NULL,
    trust_level TEXT NOT NULL,
    payload TEXT NOT NULL
)"#;
const REPORTS_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_reports_product \
     ON contradiction_reports (product_id, analyzed_at_us DESC)";

fn repo_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Repo(e.to_string())
}

/// SQLite repository. One database file in the given base directory.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned repo is safe to share via Arc.
    ///
    /// Sets WAL mode and synchronous=NORMAL so report reads do not block run writes.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(repo_err)?;
        let db_path = base.join(DB_FILE_NAME);
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;
        let conn = db.connect().map_err(repo_err)?;

        // PRAGMA returns a row (new value); use query and consume rows (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows.next().await.map_err(repo_err)?.is_some() {}
        }

        for ddl in [
            PRODUCTS_TABLE,
            REVIEWS_TABLE,
            REVIEWS_INDEX,
            CLAIMS_TABLE,
            ANALYSES_TABLE,
            ANALYSES_INDEX,
            REPORTS_TABLE,
            REPORTS_INDEX,
        ] {
            conn.execute(ddl, ()).await.map_err(repo_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db, db_path })
    }

    fn conn(&self) -> Result<Connection, DomainError> {
        self.db.connect().map_err(repo_err)
    }

    async fn latest_payload(&self, sql: &str, product_id: i64) -> Result<Option<String>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn.query(sql, params![product_id]).await.map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(repo_err)?)),
            None => Ok(None),
        }
    }

    async fn detail_document(&self, product_id: i64) -> Result<Option<String>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT detail_document FROM products WHERE id = ?1",
                params![product_id],
            )
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(row.get::<String>(0).ok()),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl ReviewSource for SqliteRepo {
    async fn fetch_reviews(&self, product_id: i64) -> Result<Vec<Review>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT id, product_id, rating, text FROM reviews WHERE product_id = ?1 ORDER BY id",
                params![product_id],
            )
            .await
            .map_err(repo_err)?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            let rating: i64 = row.get(2).map_err(repo_err)?;
            reviews.push(Review {
                id: row.get(0).map_err(repo_err)?,
                product_id: row.get(1).map_err(repo_err)?,
                // Out-of-range values are kept out of u8 wraparound; the grouper rejects them.
                rating: u8::try_from(rating).unwrap_or(0),
                text: row.get::<String>(3).unwrap_or_default(),
            });
        }
        debug!(product_id, count = reviews.len(), "reviews loaded");
        Ok(reviews)
    }

    async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT p.id, p.name, COUNT(r.id)
                FROM products p
                LEFT JOIN reviews r ON r.product_id = p.id
                GROUP BY p.id, p.name
                ORDER BY p.id
                "#,
                (),
            )
            .await
            .map_err(repo_err)?;
        let mut products = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            let count: i64 = row.get(2).map_err(repo_err)?;
            products.push(Product {
                id: row.get(0).map_err(repo_err)?,
                name: row.get::<String>(1).unwrap_or_default(),
                review_count: count.max(0) as usize,
            });
        }
        Ok(products)
    }
}

#[async_trait::async_trait]
impl ClaimSource for SqliteRepo {
    async fn fetch_marketing_claims(
        &self,
        product_id: i64,
    ) -> Result<Vec<MarketingClaim>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT id, category, text FROM marketing_claims WHERE product_id = ?1 ORDER BY id",
                params![product_id],
            )
            .await
            .map_err(repo_err)?;
        let mut claims = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            claims.push(MarketingClaim {
                id: row.get(0).map_err(repo_err)?,
                product_id,
                category: ClaimCategory::parse(&row.get::<String>(1).unwrap_or_default()),
                text: row.get(2).map_err(repo_err)?,
            });
        }
        if !claims.is_empty() {
            return Ok(claims);
        }

        match self.detail_document(product_id).await? {
            Some(doc) => match extract_claims_from_text(product_id, &doc) {
                Ok(claims) => Ok(claims),
                Err(e) => {
                    warn!(product_id, error = %e, "detail document unusable, no claims");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl AnalysisSink for SqliteRepo {
    async fn save_analysis(&self, analysis: &ProductAnalysis) -> Result<(), DomainError> {
        let payload = serde_json::to_string(analysis).map_err(repo_err)?;
        self.conn()?
            .execute(
                r#"
                INSERT INTO product_analyses
                    (run_id, product_id, analyzed_at_us, weighted_score, grade, trust_level, payload)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    analysis.run_id.to_string(),
                    analysis.product_id,
                    analysis.analyzed_at.timestamp_micros(),
                    analysis.weighted_score,
                    analysis.grade.as_str(),
                    analysis.trust_level.as_str(),
                    payload
                ],
            )
            .await
            .map_err(repo_err)?;
        info!(
            product_id = analysis.product_id,
            run_id = %analysis.run_id,
            "analysis saved"
        );
        Ok(())
    }

    async fn save_contradiction_report(
        &self,
        report: &ContradictionReport,
    ) -> Result<(), DomainError> {
        let payload = serde_json::to_string(report).map_err(repo_err)?;
        self.conn()?
            .execute(
                r#"
                INSERT INTO contradiction_reports
                    (run_id, product_id, analysis_run_id, analyzed_at_us, final_score, trust_level, payload)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    report.run_id.to_string(),
                    report.product_id,
                    report.analysis_run_id.to_string(),
                    report.analyzed_at.timestamp_micros(),
                    report.final_score,
                    report.trust_level.as_str(),
                    payload
                ],
            )
            .await
            .map_err(repo_err)?;
        info!(
            product_id = report.product_id,
            run_id = %report.run_id,
            "contradiction report saved"
        );
        Ok(())
    }

    async fn latest_analysis(
        &self,
        product_id: i64,
    ) -> Result<Option<ProductAnalysis>, DomainError> {
        let payload = self
            .latest_payload(
                "SELECT payload FROM product_analyses WHERE product_id = ?1 \
                 ORDER BY analyzed_at_us DESC LIMIT 1",
                product_id,
            )
            .await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(repo_err))
            .transpose()
    }

    async fn latest_contradiction_report(
        &self,
        product_id: i64,
    ) -> Result<Option<ContradictionReport>, DomainError> {
        let payload = self
            .latest_payload(
                "SELECT payload FROM contradiction_reports WHERE product_id = ?1 \
                 ORDER BY analyzed_at_us DESC LIMIT 1",
                product_id,
            )
            .await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(repo_err))
            .transpose()
    }
}

#[async_trait::async_trait]
impl ImportSink for SqliteRepo {
    async fn upsert_product(
        &self,
        product_id: i64,
        name: &str,
        detail_document: Option<&str>,
    ) -> Result<(), DomainError> {
        self.conn()?
            .execute(
                r#"
                INSERT INTO products (id, name, detail_document) VALUES (?1, ?2, ?3)
                ON CONFLICT (id) DO UPDATE SET
                    name = CASE WHEN excluded.name = '' THEN products.name ELSE excluded.name END,
                    detail_document = COALESCE(excluded.detail_document, products.detail_document)
                "#,
                params![product_id, name, detail_document],
            )
            .await
            .map_err(repo_err)?;
        Ok(())
    }

    async fn save_reviews(&self, reviews: &[Review]) -> Result<usize, DomainError> {
        if reviews.is_empty() {
            return Ok(0);
        }
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        let mut inserted = 0usize;
        for r in reviews {
            // Reviews without a source id get one assigned by SQLite.
            let result = if r.id > 0 {
                tx.execute(
                    "INSERT OR IGNORE INTO reviews (id, product_id, rating, text) VALUES (?1, ?2, ?3, ?4)",
                    params![r.id, r.product_id, r.rating as i64, r.text.as_str()],
                )
                .await
            } else {
                tx.execute(
                    "INSERT INTO reviews (product_id, rating, text) VALUES (?1, ?2, ?3)",
                    params![r.product_id, r.rating as i64, r.text.as_str()],
                )
                .await
            };
            inserted += result.map_err(repo_err)? as usize;
        }
        tx.commit().await.map_err(repo_err)?;
        info!(
            path = %self.db_path.display(),
            count = inserted,
            "saved reviews to disk"
        );
        Ok(inserted)
    }

    async fn replace_claims(
        &self,
        product_id: i64,
        claims: &[MarketingClaim],
    ) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(repo_err)?;
        tx.execute(
            "DELETE FROM marketing_claims WHERE product_id = ?1",
            params![product_id],
        )
        .await
        .map_err(repo_err)?;
        for claim in claims {
            tx.execute(
                "INSERT INTO marketing_claims (product_id, category, text) VALUES (?1, ?2, ?3)",
                params![product_id, claim.category.as_str(), claim.text.as_str()],
            )
            .await
            .map_err(repo_err)?;
        }
        tx.commit().await.map_err(repo_err)?;
        info!(product_id, count = claims.len(), "marketing claims replaced");
        Ok(())
    }
}
