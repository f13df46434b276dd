use async_trait::async_trait;
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{Repository, replaced_image};
use crate::{
    error::{AppError, AppResult},
    models::{
        Admin, Comment, CommentChange, CommentStatus, NewWork, Page, PendingComment, Work,
        WorkChanges, WorkUpdate,
    },
};

/// Column list matching `Work`'s `FromRow` layout.
macro_rules! work_columns {
    () => {
        "id, title, excerpt, full_content, image_url, likes, comments, created_at"
    };
}

/// Row returned by the update statement: the new work plus the image it held before.
#[derive(FromRow)]
struct UpdatedWorkRow {
    #[sqlx(flatten)]
    work: Work,
    previous_image_url: String,
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Comments are embedded in `works.comments` (JSONB) so every comment write is a
/// single-row `UPDATE`, which Postgres applies atomically under concurrent requests.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Tells a missing work apart from a missing comment after a no-op moderation write.
    async fn comment_miss(&self, work_id: Uuid) -> AppResult<CommentChange> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM works WHERE id = $1)")
            .bind(work_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists {
            CommentChange::CommentMissing
        } else {
            CommentChange::WorkMissing
        })
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// list_works
    ///
    /// Newest first, `LIMIT`/`OFFSET` paging.
    async fn list_works(&self, page: Page) -> AppResult<(Vec<Work>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM works")
            .fetch_one(&self.pool)
            .await?;

        let works = sqlx::query_as::<_, Work>(concat!(
            "SELECT ",
            work_columns!(),
            " FROM works ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((works, total))
    }

    /// search_works
    ///
    /// Delegates matching and ranking to Postgres full-text search over the generated
    /// `search` column (title weighted above excerpt, excerpt above full content).
    /// `websearch_to_tsquery` never fails on user input, so the raw query is bound as-is.
    async fn search_works(&self, query: &str, page: Page) -> AppResult<(Vec<Work>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM works WHERE search @@ websearch_to_tsquery('english', $1)",
        )
        .bind(query)
        .fetch_one(&self.pool)
        .await?;

        let works = sqlx::query_as::<_, Work>(concat!(
            "SELECT ",
            work_columns!(),
            r#"
            FROM works
            WHERE search @@ websearch_to_tsquery('english', $1)
            ORDER BY ts_rank(search, websearch_to_tsquery('english', $1)) DESC, created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(query)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((works, total))
    }

    async fn get_work(&self, id: Uuid) -> AppResult<Option<Work>> {
        let work = sqlx::query_as::<_, Work>(concat!(
            "SELECT ",
            work_columns!(),
            " FROM works WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(work)
    }

    async fn create_work(&self, new_work: NewWork) -> AppResult<Work> {
        let work = sqlx::query_as::<_, Work>(concat!(
            "INSERT INTO works (id, title, excerpt, full_content, image_url) ",
            "VALUES ($1, $2, $3, $4, $5) RETURNING ",
            work_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(&new_work.title)
        .bind(&new_work.excerpt)
        .bind(&new_work.full_content)
        .bind(&new_work.image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(work)
    }

    /// update_work
    ///
    /// `COALESCE` keeps every column whose new value is `NULL`. The `FOR UPDATE`
    /// sub-select reads the previous image in the same statement, so the caller can
    /// release exactly the file this update orphaned.
    async fn update_work(&self, id: Uuid, changes: WorkChanges) -> AppResult<Option<WorkUpdate>> {
        let new_image = changes.image_url.clone();

        let row = sqlx::query_as::<_, UpdatedWorkRow>(
            r#"
            UPDATE works AS w
            SET title = COALESCE($2, w.title),
                excerpt = COALESCE($3, w.excerpt),
                full_content = COALESCE($4, w.full_content),
                image_url = COALESCE($5, w.image_url)
            FROM (SELECT id, image_url FROM works WHERE id = $1 FOR UPDATE) AS prev
            WHERE w.id = prev.id
            RETURNING w.id, w.title, w.excerpt, w.full_content, w.image_url,
                      w.likes, w.comments, w.created_at,
                      prev.image_url AS previous_image_url
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.excerpt)
        .bind(changes.full_content)
        .bind(changes.image_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| WorkUpdate {
            replaced_image: replaced_image(row.previous_image_url, new_image.as_deref()),
            work: row.work,
        }))
    }

    async fn delete_work(&self, id: Uuid) -> AppResult<Option<String>> {
        let image_url = sqlx::query_scalar("DELETE FROM works WHERE id = $1 RETURNING image_url")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(image_url)
    }

    async fn reset_work_image(&self, id: Uuid) -> AppResult<Option<String>> {
        let previous = sqlx::query_scalar(
            r#"
            UPDATE works AS w
            SET image_url = 'placeholder'
            FROM (SELECT id, image_url FROM works WHERE id = $1 FOR UPDATE) AS prev
            WHERE w.id = prev.id
            RETURNING prev.image_url
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(previous)
    }

    /// increment_likes
    ///
    /// `likes = likes + 1` is evaluated by Postgres under the row lock, so concurrent
    /// likes never overwrite each other.
    async fn increment_likes(&self, id: Uuid) -> AppResult<Option<i64>> {
        let likes = sqlx::query_scalar("UPDATE works SET likes = likes + 1 WHERE id = $1 RETURNING likes")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(likes)
    }

    /// add_comment
    ///
    /// Prepends in a single statement: `[new] || comments`.
    async fn add_comment(&self, work_id: Uuid, comment: Comment) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE works SET comments = jsonb_build_array($2::jsonb) || comments WHERE id = $1",
        )
        .bind(work_id)
        .bind(Json(&comment))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn pending_comments(&self) -> AppResult<Vec<PendingComment>> {
        let pending = sqlx::query_as::<_, PendingComment>(
            r#"
            SELECT w.id AS work_id, w.title AS work_title, c.elem AS comment
            FROM works AS w
            CROSS JOIN LATERAL jsonb_array_elements(w.comments) AS c(elem)
            WHERE c.elem->>'status' = 'pending'
            ORDER BY (c.elem->>'createdAt')::timestamptz DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(pending)
    }

    /// set_comment_status
    ///
    /// Rewrites the embedded array in place, preserving element order. The `@>`
    /// guard makes the statement a no-op when the comment id is not present.
    async fn set_comment_status(
        &self,
        work_id: Uuid,
        comment_id: Uuid,
        status: CommentStatus,
    ) -> AppResult<CommentChange> {
        let result = sqlx::query(
            r#"
            UPDATE works
            SET comments = (
                SELECT jsonb_agg(
                    CASE WHEN elem->>'id' = $2
                         THEN jsonb_set(elem, '{status}', to_jsonb($3::text))
                         ELSE elem
                    END
                    ORDER BY ord
                )
                FROM jsonb_array_elements(comments) WITH ORDINALITY AS t(elem, ord)
            )
            WHERE id = $1
              AND comments @> jsonb_build_array(jsonb_build_object('id', $2::text))
            "#,
        )
        .bind(work_id)
        .bind(comment_id.to_string())
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(CommentChange::Applied)
        } else {
            self.comment_miss(work_id).await
        }
    }

    async fn delete_comment(&self, work_id: Uuid, comment_id: Uuid) -> AppResult<CommentChange> {
        let result = sqlx::query(
            r#"
            UPDATE works
            SET comments = COALESCE((
                SELECT jsonb_agg(elem ORDER BY ord)
                FROM jsonb_array_elements(comments) WITH ORDINALITY AS t(elem, ord)
                WHERE elem->>'id' <> $2
            ), '[]'::jsonb)
            WHERE id = $1
              AND comments @> jsonb_build_array(jsonb_build_object('id', $2::text))
            "#,
        )
        .bind(work_id)
        .bind(comment_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(CommentChange::Applied)
        } else {
            self.comment_miss(work_id).await
        }
    }

    // --- CREDENTIAL STORE ---

    /// create_admin
    ///
    /// The `UNIQUE` constraint on `username` is the arbiter; a violation becomes `Conflict`.
    async fn create_admin(&self, username: &str, password_hash: &str) -> AppResult<Admin> {
        let result = sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(admin) => Ok(admin),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::Conflict("Admin user already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_admin_by_username(&self, username: &str) -> AppResult<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT id, username, password_hash, created_at FROM admins WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }
}
