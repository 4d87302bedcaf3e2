//! Community events and their participants.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, instrument};

use super::{
    ContentListQuery, ImageRef, ListColumns, Page, append_image, check_date, check_len, delete_row,
    push_filters, required,
};
use crate::auth::Owned;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_LOCATION_LEN: usize = 300;
pub const MAX_STATUS_LEN: usize = 50;

const COLUMNS: &str = "id, title, description, date_start, date_end, location, status, created_by, \
                       images, participants, created_at, updated_at";

const LIST_COLUMNS: ListColumns = ListColumns {
    search: &["title", "description", "location"],
    owner: "created_by",
    status: true,
};

/// An identity signed up for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub inscription_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub title: Option<String>,
    pub description: String,
    pub date_start: String,
    pub date_end: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub created_by: Option<String>,
    #[sqlx(json)]
    pub images: Vec<ImageRef>,
    #[sqlx(json)]
    pub participants: Vec<Participant>,
    pub created_at: String,
    pub updated_at: String,
}

impl Event {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }
}

impl Owned for Event {
    fn owner_id(&self) -> Option<&str> {
        self.created_by.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<()> {
        required("description", self.description.as_deref())?;
        required("date_start", self.date_start.as_deref())?;
        check_len("title", self.title.as_deref(), MAX_TITLE_LEN)?;
        check_len("description", self.description.as_deref(), MAX_DESCRIPTION_LEN)?;
        check_len("location", self.location.as_deref(), MAX_LOCATION_LEN)?;
        check_len("status", self.status.as_deref(), MAX_STATUS_LEN)?;
        check_date("date_start", self.date_start.as_deref())?;
        check_date("date_end", self.date_end.as_deref())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
}

impl UpdateEventRequest {
    pub fn validate(&self) -> Result<()> {
        if self.description.is_some() {
            required("description", self.description.as_deref())?;
        }
        if self.date_start.is_some() {
            required("date_start", self.date_start.as_deref())?;
        }
        check_len("title", self.title.as_deref(), MAX_TITLE_LEN)?;
        check_len("description", self.description.as_deref(), MAX_DESCRIPTION_LEN)?;
        check_len("location", self.location.as_deref(), MAX_LOCATION_LEN)?;
        check_len("status", self.status.as_deref(), MAX_STATUS_LEN)?;
        check_date("date_start", self.date_start.as_deref())?;
        check_date("date_end", self.date_end.as_deref())?;
        Ok(())
    }
}

/// Body of `POST /events/{id}/participants`. Defaults to the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddParticipantRequest {
    pub user_id: Option<String>,
}

/// Repository for events.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        format!("evt_{}", nanoid::nanoid!(12))
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, created_by: &str, request: CreateEventRequest) -> Result<Event> {
        request.validate()?;
        let id = Self::generate_id();
        debug!("Creating event {}", id);

        sqlx::query(
            r#"
            INSERT INTO events (id, title, description, date_start, date_end, location, status, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.title)
        .bind(request.description.as_deref().map(str::trim))
        .bind(request.date_start.as_deref().map(str::trim))
        .bind(&request.date_end)
        .bind(&request.location)
        .bind(request.status.as_deref().unwrap_or("active"))
        .bind(created_by)
        .execute(&self.pool)
        .await
        .context("Failed to insert event")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Event not found after creation"))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Event>> {
        let sql = format!("SELECT {COLUMNS} FROM events WHERE id = ?");
        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch event")
    }

    /// Events are listed by start date, soonest first.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &ContentListQuery) -> Result<Page<Event>> {
        let page = query.page_request();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM events WHERE 1=1");
        push_filters(&mut count, query, &LIST_COLUMNS);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count events")?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM events WHERE 1=1"));
        push_filters(&mut select, query, &LIST_COLUMNS);
        select.push(" ORDER BY date_start ASC, id LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let events = select
            .build_query_as::<Event>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list events")?;

        Ok(Page::new(events, total, page))
    }

    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateEventRequest) -> Result<Event> {
        request.validate()?;

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE events SET updated_at = datetime('now')");
        if let Some(title) = request.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = request.description {
            builder.push(", description = ").push_bind(description.trim().to_string());
        }
        if let Some(date_start) = request.date_start {
            builder.push(", date_start = ").push_bind(date_start.trim().to_string());
        }
        if let Some(date_end) = request.date_end {
            builder.push(", date_end = ").push_bind(date_end);
        }
        if let Some(location) = request.location {
            builder.push(", location = ").push_bind(location);
        }
        if let Some(status) = request.status {
            builder.push(", status = ").push_bind(status);
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to update event")?;
        if result.rows_affected() == 0 {
            bail!("Event not found: {}", id);
        }

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Event not found: {}", id))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !delete_row(&self.pool, "events", id).await? {
            bail!("Event not found: {}", id);
        }
        Ok(())
    }

    #[instrument(skip(self, image))]
    pub async fn add_image(&self, id: &str, image: ImageRef) -> Result<Event> {
        if !append_image(&self.pool, "events", id, &image).await? {
            bail!("Event not found: {}", id);
        }
        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Event not found: {}", id))
    }

    /// Register `user_id` for the event. The duplicate check and the append
    /// happen in one statement.
    #[instrument(skip(self))]
    pub async fn add_participant(&self, id: &str, user_id: &str) -> Result<Event> {
        let participant = Participant {
            user_id: user_id.to_string(),
            inscription_date: chrono::Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string(&participant).context("Failed to encode participant")?;

        let result = sqlx::query(
            r#"
            UPDATE events
            SET participants = json_insert(participants, '$[#]', json(?)),
                updated_at = datetime('now')
            WHERE id = ?
              AND NOT EXISTS (
                  SELECT 1 FROM json_each(events.participants)
                  WHERE json_extract(json_each.value, '$.user_id') = ?
              )
            "#,
        )
        .bind(json)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to add participant")?;

        let Some(event) = self.get(id).await? else {
            bail!("Event not found: {}", id);
        };
        if result.rows_affected() == 0 {
            bail!("User '{}' is already registered for this event.", user_id);
        }

        info!(event_id = %id, user_id = %user_id, "Participant added");
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_repo() -> EventRepository {
        let db = Database::in_memory().await.unwrap();
        EventRepository::new(db.pool().clone())
    }

    fn request(title: &str, date_start: &str) -> CreateEventRequest {
        CreateEventRequest {
            title: Some(title.to_string()),
            description: Some("Beach cleanup".to_string()),
            date_start: Some(date_start.to_string()),
            date_end: None,
            location: Some("Montañita".to_string()),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_event() {
        let repo = setup_repo().await;
        let event = repo.create("usr_a", request("Cleanup", "2025-06-01")).await.unwrap();
        assert!(event.id.starts_with("evt_"));
        assert_eq!(event.status, "active");
        assert_eq!(event.owner_id(), Some("usr_a"));
        assert!(event.participants.is_empty());

        let fetched = repo.get(&event.id).await.unwrap().unwrap();
        assert_eq!(fetched.description, "Beach cleanup");
    }

    #[tokio::test]
    async fn test_create_requires_description_and_date() {
        let repo = setup_repo().await;

        let mut req = request("Cleanup", "2025-06-01");
        req.description = None;
        let err = repo.create("usr_a", req).await.unwrap_err();
        assert!(err.to_string().contains("Invalid description"));

        let mut req = request("Cleanup", "2025-06-01");
        req.date_start = Some("soon".to_string());
        let err = repo.create("usr_a", req).await.unwrap_err();
        assert!(err.to_string().contains("Invalid date_start"));

        let mut req = request("Cleanup", "2025-06-01");
        req.location = Some("x".repeat(MAX_LOCATION_LEN + 1));
        assert!(repo.create("usr_a", req).await.is_err());
    }

    #[tokio::test]
    async fn test_participants() {
        let repo = setup_repo().await;
        let event = repo.create("usr_a", request("Cleanup", "2025-06-01")).await.unwrap();

        let event = repo.add_participant(&event.id, "usr_b").await.unwrap();
        assert!(event.has_participant("usr_b"));

        let err = repo.add_participant(&event.id, "usr_b").await.unwrap_err();
        assert!(err.to_string().contains("already registered"));

        let event = repo.add_participant(&event.id, "usr_c").await.unwrap();
        assert_eq!(event.participants.len(), 2);

        let err = repo.add_participant("evt_missing", "usr_b").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_update_delete_and_images() {
        let repo = setup_repo().await;
        let event = repo.create("usr_a", request("Cleanup", "2025-06-01")).await.unwrap();

        let updated = repo
            .update(
                &event.id,
                UpdateEventRequest {
                    status: Some("cancelled".to_string()),
                    date_end: Some("2025-06-02".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, "cancelled");
        assert_eq!(updated.date_end.as_deref(), Some("2025-06-02"));

        let err = repo
            .update(
                &event.id,
                UpdateEventRequest {
                    description: Some("  ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid description"));

        let with_image = repo.add_image(&event.id, ImageRef::new("e.png")).await.unwrap();
        assert_eq!(with_image.images.len(), 1);

        repo.delete(&event.id).await.unwrap();
        assert!(repo.get(&event.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_start_date() {
        let repo = setup_repo().await;
        repo.create("usr_a", request("Later", "2025-08-01")).await.unwrap();
        repo.create("usr_a", request("Sooner", "2025-07-01")).await.unwrap();

        let page = repo.list(&ContentListQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.results[0].title.as_deref(), Some("Sooner"));

        let search = repo
            .list(&ContentListQuery {
                q: Some("later".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(search.total, 1);
    }
}
