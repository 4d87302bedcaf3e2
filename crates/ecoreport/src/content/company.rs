//! Companies registered by their owners.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

use super::{
    ContentListQuery, ImageRef, ListColumns, Page, append_image, check_len, delete_row, push_filters,
};
use crate::auth::Owned;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 400;

const COLUMNS: &str = "id, owner_id, name, description, images, created_at, updated_at";

const LIST_COLUMNS: ListColumns = ListColumns {
    search: &["name", "description"],
    owner: "owner_id",
    status: false,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: String,
    pub owner_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[sqlx(json)]
    pub images: Vec<ImageRef>,
    pub created_at: String,
    pub updated_at: String,
}

impl Owned for Company {
    fn owner_id(&self) -> Option<&str> {
        Some(&self.owner_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn validate(name: Option<&str>, description: Option<&str>) -> Result<()> {
    check_len("name", name, MAX_NAME_LEN)?;
    check_len("description", description, MAX_DESCRIPTION_LEN)
}

/// Repository for companies.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        format!("cmp_{}", nanoid::nanoid!(12))
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, owner_id: &str, request: CreateCompanyRequest) -> Result<Company> {
        validate(request.name.as_deref(), request.description.as_deref())?;

        let id = Self::generate_id();
        sqlx::query("INSERT INTO companies (id, owner_id, name, description) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(owner_id)
            .bind(&request.name)
            .bind(&request.description)
            .execute(&self.pool)
            .await
            .context("Failed to insert company")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Company not found after creation"))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Company>> {
        let sql = format!("SELECT {COLUMNS} FROM companies WHERE id = ?");
        sqlx::query_as::<_, Company>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch company")
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: &ContentListQuery) -> Result<Page<Company>> {
        let page = query.page_request();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM companies WHERE 1=1");
        push_filters(&mut count, query, &LIST_COLUMNS);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count companies")?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM companies WHERE 1=1"));
        push_filters(&mut select, query, &LIST_COLUMNS);
        select.push(" ORDER BY name ASC, id LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let companies = select
            .build_query_as::<Company>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list companies")?;

        Ok(Page::new(companies, total, page))
    }

    /// Update name and description. Ownership is never transferred here.
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateCompanyRequest) -> Result<Company> {
        validate(request.name.as_deref(), request.description.as_deref())?;

        let mut builder =
            QueryBuilder::<Sqlite>::new("UPDATE companies SET updated_at = datetime('now')");
        if let Some(name) = request.name {
            builder.push(", name = ").push_bind(name);
        }
        if let Some(description) = request.description {
            builder.push(", description = ").push_bind(description);
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to update company")?;
        if result.rows_affected() == 0 {
            bail!("Company not found: {}", id);
        }

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Company not found: {}", id))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !delete_row(&self.pool, "companies", id).await? {
            bail!("Company not found: {}", id);
        }
        Ok(())
    }

    #[instrument(skip(self, image))]
    pub async fn add_image(&self, id: &str, image: ImageRef) -> Result<Company> {
        if !append_image(&self.pool, "companies", id, &image).await? {
            bail!("Company not found: {}", id);
        }
        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Company not found: {}", id))
    }
}
