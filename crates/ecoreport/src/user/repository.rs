//! User repository for database operations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{NewUser, User, UserChanges, UserListQuery};
use crate::content::pagination::{PageRequest, like_pattern};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, location, role, created_at, updated_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Generate a new user ID.
    fn generate_id() -> String {
        format!("usr_{}", nanoid::nanoid!(12))
    }

    /// Insert a new user. A duplicate email surfaces as a unique violation
    /// (see [`is_unique_violation`]).
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn create(&self, user: NewUser) -> Result<User> {
        let id = Self::generate_id();

        debug!("Creating user: {} ({})", user.email, id);

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, location, role)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.location)
        .bind(user.role)
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        Ok(user)
    }

    /// Get a user by email (exact match).
    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;

        Ok(user)
    }

    /// List users with optional filters. Returns the page and the total
    /// number of matching rows.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &UserListQuery, page: PageRequest) -> Result<(Vec<User>, i64)> {
        let mut filter = String::from(" WHERE 1=1");
        let mut bind_values: Vec<String> = Vec::new();

        if let Some(role) = &query.role {
            filter.push_str(" AND role = ?");
            bind_values.push(role.to_string());
        }

        if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            filter.push_str(" AND (name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(search);
            bind_values.push(pattern.clone());
            bind_values.push(pattern);
        }

        let count_sql = format!("SELECT COUNT(*) FROM users{filter}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        for value in &bind_values {
            count_query = count_query.bind(value);
        }
        let (total,) = count_query
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users{filter} ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        );
        let mut query_builder = sqlx::query_as::<_, User>(&sql);
        for value in &bind_values {
            query_builder = query_builder.bind(value);
        }
        query_builder = query_builder.bind(page.limit()).bind(page.offset());

        let users = query_builder
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        Ok((users, total))
    }

    /// Update a user.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: &str, changes: UserChanges) -> Result<User> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {}", id))?;

        let mut updates = Vec::new();
        let mut values: Vec<Option<String>> = Vec::new();

        if let Some(name) = changes.name {
            updates.push("name = ?");
            values.push(Some(name));
        }

        if let Some(email) = changes.email {
            updates.push("email = ?");
            values.push(Some(email));
        }

        if let Some(password_hash) = changes.password_hash {
            updates.push("password_hash = ?");
            values.push(Some(password_hash));
        }

        if let Some(location) = changes.location {
            updates.push("location = ?");
            values.push(Some(location).filter(|l| !l.is_empty()));
        }

        if let Some(role) = changes.role {
            updates.push("role = ?");
            values.push(Some(role.to_string()));
        }

        if updates.is_empty() {
            return Ok(existing);
        }

        updates.push("updated_at = datetime('now')");

        let sql = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));

        let mut query_builder = sqlx::query(&sql);
        for value in &values {
            query_builder = query_builder.bind(value);
        }
        query_builder = query_builder.bind(id);

        query_builder
            .execute(&self.pool)
            .await
            .context("Failed to update user")?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    /// Delete a user.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("User not found: {}", id));
        }

        Ok(())
    }

    /// Count total users.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        Ok(count.0)
    }
}

/// Whether an error chain bottoms out in a database unique-constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::user::models::UserRole;

    async fn setup_repo() -> UserRepository {
        let db = Database::in_memory().await.unwrap();
        UserRepository::new(db.pool().clone())
    }

    fn new_user(name: &str, email: &str, role: UserRole) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hashed_password".to_string(),
            location: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_repo().await;

        let user = repo
            .create(new_user("Ana", "ana@x.com", UserRole::User))
            .await
            .unwrap();
        assert!(user.id.starts_with("usr_"));
        assert_eq!(user.name, "Ana");
        assert_eq!(user.role, UserRole::User);

        let fetched = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);

        let by_email = repo.get_by_email("ana@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(repo.get_by_email("ANA@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let repo = setup_repo().await;
        repo.create(new_user("Ana", "ana@x.com", UserRole::User))
            .await
            .unwrap();

        let err = repo
            .create(new_user("Other", "ana@x.com", UserRole::User))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let unrelated = anyhow::anyhow!("User not found: usr_x");
        assert!(!is_unique_violation(&unrelated));
    }

    #[tokio::test]
    async fn test_update_user() {
        let repo = setup_repo().await;
        let user = repo
            .create(new_user("Ana", "ana@x.com", UserRole::User))
            .await
            .unwrap();

        let updated = repo
            .update(
                &user.id,
                UserChanges {
                    name: Some("Ana Maria".to_string()),
                    location: Some("Quito".to_string()),
                    role: Some(UserRole::Moderator),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.location.as_deref(), Some("Quito"));
        assert_eq!(updated.role, UserRole::Moderator);
        assert_eq!(updated.email, "ana@x.com");
    }

    #[tokio::test]
    async fn test_update_missing_user_fails() {
        let repo = setup_repo().await;
        let err = repo
            .update("usr_missing", UserChanges::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let repo = setup_repo().await;
        let user = repo
            .create(new_user("Ana", "ana@x.com", UserRole::User))
            .await
            .unwrap();

        repo.delete(&user.id).await.unwrap();
        assert!(repo.get(&user.id).await.unwrap().is_none());
        assert!(repo.delete(&user.id).await.is_err());
        assert!(repo.get_by_email("ana@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users() {
        let repo = setup_repo().await;

        for i in 0..5 {
            let role = if i == 0 {
                UserRole::Administrator
            } else {
                UserRole::User
            };
            repo.create(new_user(
                &format!("user{}", i),
                &format!("user{}@example.com", i),
                role,
            ))
            .await
            .unwrap();
        }
        assert_eq!(repo.count().await.unwrap(), 5);

        let (all, total) = repo
            .list(&UserListQuery::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(total, 5);

        let (admins, total) = repo
            .list(
                &UserListQuery {
                    role: Some(UserRole::Administrator),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(total, 1);

        let (search, _) = repo
            .list(
                &UserListQuery {
                    q: Some("user2".to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(search.len(), 1);

        let (second_page, total) = repo
            .list(&UserListQuery::default(), PageRequest::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(second_page.len(), 2);
        assert_eq!(total, 5);
    }
}
