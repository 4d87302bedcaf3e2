//! Community content: contamination reports, events, publications and companies.
//!
//! Every mutating operation is gated by [`crate::auth::authorize_mutation`]
//! in the API layer; repositories only persist.

pub mod company;
pub mod event;
pub mod pagination;
pub mod publication;
pub mod report;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub use company::{Company, CompanyRepository, CreateCompanyRequest, UpdateCompanyRequest};
pub use event::{AddParticipantRequest, CreateEventRequest, Event, EventRepository, Participant, UpdateEventRequest};
pub use pagination::{Page, PageRequest};
pub use publication::{CreatePublicationRequest, Publication, PublicationRepository, UpdatePublicationRequest};
pub use report::{ContaminationReport, CreateReportRequest, ReportRepository, UpdateReportRequest};

pub const MAX_IMAGE_KEY_LEN: usize = 200;

/// Reference to an uploaded image. Only the storage key is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub image_key: String,
    pub uploaded_at: String,
}

impl ImageRef {
    pub fn new(image_key: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_key: image_key.into(),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Body of `POST /{resource}/{id}/images`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddImageRequest {
    pub image_key: Option<String>,
}

impl AddImageRequest {
    pub fn into_image(self) -> Result<ImageRef> {
        let key = required("image_key", self.image_key.as_deref())?;
        check_len("image_key", Some(key), MAX_IMAGE_KEY_LEN)?;
        Ok(ImageRef::new(key))
    }
}

/// List filters shared by every content type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentListQuery {
    /// Case-insensitive substring of the searchable text columns.
    pub q: Option<String>,
    /// Exact status (reports and events).
    pub status: Option<String>,
    /// Owning identity (`created_by`, or `owner_id` for companies).
    #[serde(alias = "owner_id")]
    pub created_by: Option<String>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}

impl ContentListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

/// Columns a content table exposes to [`ContentListQuery`].
pub(crate) struct ListColumns {
    pub search: &'static [&'static str],
    pub owner: &'static str,
    pub status: bool,
}

/// Append `AND ...` clauses for the active filters.
pub(crate) fn push_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    query: &ContentListQuery,
    columns: &ListColumns,
) {
    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = pagination::like_pattern(search);
        builder.push(" AND (");
        for (i, column) in columns.search.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*column);
            builder.push(" LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\'");
        }
        builder.push(")");
    }

    if columns.status {
        if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
            builder.push(" AND status = ");
            builder.push_bind(status.to_string());
        }
    }

    if let Some(owner) = query.created_by.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND ");
        builder.push(columns.owner);
        builder.push(" = ");
        builder.push_bind(owner.to_string());
    }
}

/// Atomically append an image to the JSON `images` column of `table`.
/// Returns false when no row has that id.
pub(crate) async fn append_image(
    pool: &SqlitePool,
    table: &'static str,
    id: &str,
    image: &ImageRef,
) -> Result<bool> {
    let json = serde_json::to_string(image).context("Failed to encode image")?;
    let sql = format!(
        "UPDATE {table} SET images = json_insert(images, '$[#]', json(?)), updated_at = datetime('now') WHERE id = ?"
    );

    let result = sqlx::query(&sql)
        .bind(json)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to add image to {table}"))?;

    Ok(result.rows_affected() > 0)
}

/// Delete a row by id. Returns false when nothing was deleted.
pub(crate) async fn delete_row(pool: &SqlitePool, table: &'static str, id: &str) -> Result<bool> {
    let sql = format!("DELETE FROM {table} WHERE id = ?");
    let result = sqlx::query(&sql)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete from {table}"))?;
    Ok(result.rows_affected() > 0)
}

/// Reject values longer than `max` characters.
pub(crate) fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    if let Some(value) = value {
        if value.chars().count() > max {
            bail!("Invalid {field}: must be at most {max} characters.");
        }
    }
    Ok(())
}

/// Reject a missing or blank required field.
pub(crate) fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("Invalid {field}: field is required."),
    }
}

/// Accept RFC 3339 timestamps and plain `YYYY-MM-DD` dates.
pub(crate) fn check_date(field: &str, value: Option<&str>) -> Result<()> {
    if let Some(value) = value {
        let ok = chrono::DateTime::parse_from_rfc3339(value).is_ok()
            || chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
            || chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
        if !ok {
            bail!("Invalid {field}: expected an RFC 3339 timestamp or YYYY-MM-DD date.");
        }
    }
    Ok(())
}
