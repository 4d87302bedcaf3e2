//! Contamination reports.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

use super::{
    ContentListQuery, ImageRef, ListColumns, Page, append_image, check_len, delete_row, push_filters,
};
use crate::auth::Owned;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 200;
pub const MAX_STATUS_LEN: usize = 50;

const COLUMNS: &str =
    "id, title, description, created_by, lat, lng, status, images, created_at, updated_at";

const LIST_COLUMNS: ListColumns = ListColumns {
    search: &["title", "description"],
    owner: "created_by",
    status: true,
};

/// A geolocated contamination report.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContaminationReport {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub status: String,
    #[sqlx(json)]
    pub images: Vec<ImageRef>,
    pub created_at: String,
    pub updated_at: String,
}

impl Owned for ContaminationReport {
    fn owner_id(&self) -> Option<&str> {
        self.created_by.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateReportRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReportRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub status: Option<String>,
}

fn validate(
    title: Option<&str>,
    description: Option<&str>,
    lat: Option<f64>,
    lng: Option<f64>,
    status: Option<&str>,
) -> Result<()> {
    check_len("title", title, MAX_TITLE_LEN)?;
    check_len("description", description, MAX_DESCRIPTION_LEN)?;
    check_len("status", status, MAX_STATUS_LEN)?;
    if lat.is_some_and(|v| !(-90.0..=90.0).contains(&v)) {
        anyhow::bail!("Invalid lat: must be between -90 and 90.");
    }
    if lng.is_some_and(|v| !(-180.0..=180.0).contains(&v)) {
        anyhow::bail!("Invalid lng: must be between -180 and 180.");
    }
    Ok(())
}

impl CreateReportRequest {
    pub fn validate(&self) -> Result<()> {
        validate(
            self.title.as_deref(),
            self.description.as_deref(),
            self.lat,
            self.lng,
            self.status.as_deref(),
        )
    }
}

impl UpdateReportRequest {
    pub fn validate(&self) -> Result<()> {
        validate(
            self.title.as_deref(),
            self.description.as_deref(),
            self.lat,
            self.lng,
            self.status.as_deref(),
        )
    }
}

/// Repository for contamination reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        format!("rpt_{}", nanoid::nanoid!(12))
    }

    /// Insert a report owned by `created_by`.
    #[instrument(skip(self, request))]
    pub async fn create(&self, created_by: &str, request: CreateReportRequest) -> Result<ContaminationReport> {
        request.validate()?;
        let id = Self::generate_id();
        debug!("Creating report {}", id);

        sqlx::query(
            r#"
            INSERT INTO reports (id, title, description, created_by, lat, lng, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(created_by)
        .bind(request.lat)
        .bind(request.lng)
        .bind(request.status.as_deref().unwrap_or("pending"))
        .execute(&self.pool)
        .await
        .context("Failed to insert report")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Report not found after creation"))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<ContaminationReport>> {
        let sql = format!("SELECT {COLUMNS} FROM reports WHERE id = ?");
        sqlx::query_as::<_, ContaminationReport>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch report")
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: &ContentListQuery) -> Result<Page<ContaminationReport>> {
        let page = query.page_request();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM reports WHERE 1=1");
        push_filters(&mut count, query, &LIST_COLUMNS);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count reports")?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM reports WHERE 1=1"));
        push_filters(&mut select, query, &LIST_COLUMNS);
        select.push(" ORDER BY created_at DESC, id LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let reports = select
            .build_query_as::<ContaminationReport>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list reports")?;

        Ok(Page::new(reports, total, page))
    }

    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateReportRequest) -> Result<ContaminationReport> {
        request.validate()?;

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE reports SET updated_at = datetime('now')");
        if let Some(title) = request.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = request.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(lat) = request.lat {
            builder.push(", lat = ").push_bind(lat);
        }
        if let Some(lng) = request.lng {
            builder.push(", lng = ").push_bind(lng);
        }
        if let Some(status) = request.status {
            builder.push(", status = ").push_bind(status);
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to update report")?;
        if result.rows_affected() == 0 {
            anyhow::bail!("Report not found: {}", id);
        }

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Report not found: {}", id))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !delete_row(&self.pool, "reports", id).await? {
            anyhow::bail!("Report not found: {}", id);
        }
        Ok(())
    }

    #[instrument(skip(self, image))]
    pub async fn add_image(&self, id: &str, image: ImageRef) -> Result<ContaminationReport> {
        if !append_image(&self.pool, "reports", id, &image).await? {
            anyhow::bail!("Report not found: {}", id);
        }
        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Report not found: {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_repo() -> ReportRepository {
        let db = Database::in_memory().await.unwrap();
        ReportRepository::new(db.pool().clone())
    }

    fn request(title: &str) -> CreateReportRequest {
        CreateReportRequest {
            title: Some(title.to_string()),
            description: Some("Oil in the river".to_string()),
            lat: Some(-0.18),
            lng: Some(-78.47),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_report() {
        let repo = setup_repo().await;
        let report = repo.create("usr_a", request("Spill")).await.unwrap();
        assert!(report.id.starts_with("rpt_"));
        assert_eq!(report.created_by.as_deref(), Some("usr_a"));
        assert_eq!(report.owner_id(), Some("usr_a"));
        assert_eq!(report.status, "pending");
        assert!(report.images.is_empty());

        let fetched = repo.get(&report.id).await.unwrap().unwrap();
        assert_eq!(fetched.title.as_deref(), Some("Spill"));
        assert_eq!(fetched.lat, Some(-0.18));
    }

    #[tokio::test]
    async fn test_create_rejects_long_fields() {
        let repo = setup_repo().await;
        let mut req = request("Spill");
        req.description = Some("x".repeat(MAX_DESCRIPTION_LEN + 1));
        let err = repo.create("usr_a", req).await.unwrap_err();
        assert!(err.to_string().contains("Invalid description"));

        let mut req = request("Spill");
        req.lat = Some(120.0);
        assert!(repo.create("usr_a", req).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete_report() {
        let repo = setup_repo().await;
        let report = repo.create("usr_a", request("Spill")).await.unwrap();

        let updated = repo
            .update(
                &report.id,
                UpdateReportRequest {
                    status: Some("resolved".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, "resolved");
        assert_eq!(updated.title.as_deref(), Some("Spill"));
        assert_eq!(updated.created_by.as_deref(), Some("usr_a"));

        repo.delete(&report.id).await.unwrap();
        assert!(repo.get(&report.id).await.unwrap().is_none());
        let err = repo.delete(&report.id).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_update_missing_report() {
        let repo = setup_repo().await;
        let err = repo
            .update("rpt_missing", UpdateReportRequest::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_add_images() {
        let repo = setup_repo().await;
        let report = repo.create("usr_a", request("Spill")).await.unwrap();

        repo.add_image(&report.id, ImageRef::new("a.png")).await.unwrap();
        let report = repo.add_image(&report.id, ImageRef::new("b.png")).await.unwrap();
        let keys: Vec<&str> = report.images.iter().map(|i| i.image_key.as_str()).collect();
        assert_eq!(keys, ["a.png", "b.png"]);

        assert!(repo.add_image("rpt_missing", ImageRef::new("c.png")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let repo = setup_repo().await;
        repo.create("usr_a", request("River spill")).await.unwrap();
        repo.create("usr_a", request("Smoke")).await.unwrap();
        let other = repo.create("usr_b", request("Trash")).await.unwrap();
        repo.update(
            &other.id,
            UpdateReportRequest {
                status: Some("verified".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let all = repo.list(&ContentListQuery::default()).await.unwrap();
        assert_eq!(all.total, 3);

        let mine = repo
            .list(&ContentListQuery {
                created_by: Some("usr_a".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mine.total, 2);

        let search = repo
            .list(&ContentListQuery {
                q: Some("spill".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(search.total, 1);

        let verified = repo
            .list(&ContentListQuery {
                status: Some("verified".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(verified.results.len(), 1);
        assert_eq!(verified.results[0].id, other.id);

        let paged = repo
            .list(&ContentListQuery {
                page: Some(2),
                page_size: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.results.len(), 1);
        assert_eq!(paged.total_pages, 2);
    }
}
