//! Publications.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

use super::{ContentListQuery, ListColumns, Page, check_len, delete_row, push_filters, required};
use crate::auth::Owned;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CONTENT_LEN: usize = 2000;

const COLUMNS: &str = "id, title, content, created_by, created_at, updated_at";

const LIST_COLUMNS: ListColumns = ListColumns {
    search: &["title", "content"],
    owner: "created_by",
    status: false,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Publication {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Owned for Publication {
    fn owner_id(&self) -> Option<&str> {
        self.created_by.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePublicationRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePublicationRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Repository for publications.
#[derive(Debug, Clone)]
pub struct PublicationRepository {
    pool: SqlitePool,
}

impl PublicationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        format!("pub_{}", nanoid::nanoid!(12))
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, created_by: &str, request: CreatePublicationRequest) -> Result<Publication> {
        let content = required("content", request.content.as_deref())?;
        check_len("content", Some(content), MAX_CONTENT_LEN)?;
        check_len("title", request.title.as_deref(), MAX_TITLE_LEN)?;

        let id = Self::generate_id();
        sqlx::query("INSERT INTO publications (id, title, content, created_by) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&request.title)
            .bind(content)
            .bind(created_by)
            .execute(&self.pool)
            .await
            .context("Failed to insert publication")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Publication not found after creation"))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Publication>> {
        let sql = format!("SELECT {COLUMNS} FROM publications WHERE id = ?");
        sqlx::query_as::<_, Publication>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch publication")
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: &ContentListQuery) -> Result<Page<Publication>> {
        let page = query.page_request();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM publications WHERE 1=1");
        push_filters(&mut count, query, &LIST_COLUMNS);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count publications")?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM publications WHERE 1=1"));
        push_filters(&mut select, query, &LIST_COLUMNS);
        select.push(" ORDER BY created_at DESC, id LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let publications = select
            .build_query_as::<Publication>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list publications")?;

        Ok(Page::new(publications, total, page))
    }

    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdatePublicationRequest) -> Result<Publication> {
        if request.content.is_some() {
            required("content", request.content.as_deref())?;
        }
        check_len("content", request.content.as_deref(), MAX_CONTENT_LEN)?;
        check_len("title", request.title.as_deref(), MAX_TITLE_LEN)?;

        let mut builder =
            QueryBuilder::<Sqlite>::new("UPDATE publications SET updated_at = datetime('now')");
        if let Some(title) = request.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(content) = request.content {
            builder.push(", content = ").push_bind(content.trim().to_string());
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to update publication")?;
        if result.rows_affected() == 0 {
            bail!("Publication not found: {}", id);
        }

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Publication not found: {}", id))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !delete_row(&self.pool, "publications", id).await? {
            bail!("Publication not found: {}", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_repo() -> PublicationRepository {
        let db = Database::in_memory().await.unwrap();
        PublicationRepository::new(db.pool().clone())
    }

    fn request(content: Option<&str>) -> CreatePublicationRequest {
        CreatePublicationRequest {
            title: Some("Air quality".to_string()),
            content: content.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_publication_lifecycle() {
        let repo = setup_repo().await;
        let publication = repo.create("usr_r", request(Some("PM2.5 readings"))).await.unwrap();
        assert!(publication.id.starts_with("pub_"));
        assert_eq!(publication.owner_id(), Some("usr_r"));

        let updated = repo
            .update(
                &publication.id,
                UpdatePublicationRequest {
                    content: Some("Updated readings".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.content, "Updated readings");
        assert_eq!(updated.title.as_deref(), Some("Air quality"));

        let page = repo.list(&ContentListQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);

        repo.delete(&publication.id).await.unwrap();
        assert!(repo.get(&publication.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publication_validation() {
        let repo = setup_repo().await;
        assert!(repo.create("usr_r", request(None)).await.is_err());
        let long = "x".repeat(MAX_CONTENT_LEN + 1);
        let err = repo.create("usr_r", request(Some(&long))).await.unwrap_err();
        assert!(err.to_string().contains("Invalid content"));
    }
}
