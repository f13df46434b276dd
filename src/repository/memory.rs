use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::{cmp::Reverse, collections::HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Repository, replaced_image};
use crate::{
    error::{AppError, AppResult},
    models::{
        Admin, Comment, CommentChange, CommentStatus, NewWork, PLACEHOLDER_IMAGE, Page,
        PendingComment, Work, WorkChanges, WorkUpdate,
    },
};

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Each operation takes the write
/// lock for its whole read-modify-write, which gives the same per-work atomicity the
/// Postgres statements have. Used by the test suites and for running the API
/// without a database.
///
/// Search is a plain case-insensitive term match: every term must appear somewhere
/// in the work, and hits in the title outrank hits in the excerpt, which outrank
/// hits in the body.
#[derive(Default)]
pub struct InMemoryRepository {
    works: RwLock<HashMap<Uuid, Work>>,
    admins: RwLock<HashMap<String, Admin>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(works: &mut [Work]) {
    works.sort_by_key(|work| Reverse(work.created_at));
}

fn paginate(works: Vec<Work>, page: Page) -> Vec<Work> {
    works
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(page.limit as usize)
        .collect()
}

fn relevance(work: &Work, terms: &[String]) -> Option<usize> {
    let title = work.title.to_lowercase();
    let excerpt = work.excerpt.to_lowercase();
    let body = work.full_content.to_lowercase();

    terms.iter().try_fold(0, |score, term| {
        let hits = title.matches(term.as_str()).count() * 3
            + excerpt.matches(term.as_str()).count() * 2
            + body.matches(term.as_str()).count();
        (hits > 0).then_some(score + hits)
    })
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_works(&self, page: Page) -> AppResult<(Vec<Work>, i64)> {
        let works = self.works.read().await;
        let mut all: Vec<Work> = works.values().cloned().collect();
        newest_first(&mut all);
        let total = all.len() as i64;
        Ok((paginate(all, page), total))
    }

    async fn search_works(&self, query: &str, page: Page) -> AppResult<(Vec<Work>, i64)> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let works = self.works.read().await;
        let mut ranked: Vec<(usize, Work)> = works
            .values()
            .filter_map(|work| relevance(work, &terms).map(|score| (score, work.clone())))
            .collect();
        ranked.sort_by_key(|(score, work)| (Reverse(*score), Reverse(work.created_at)));

        let total = ranked.len() as i64;
        let matches = ranked.into_iter().map(|(_, work)| work).collect();
        Ok((paginate(matches, page), total))
    }

    async fn get_work(&self, id: Uuid) -> AppResult<Option<Work>> {
        Ok(self.works.read().await.get(&id).cloned())
    }

    async fn create_work(&self, new_work: NewWork) -> AppResult<Work> {
        let mut works = self.works.write().await;

        // Creation timestamps stay strictly increasing so "newest first" is total.
        let now = Utc::now();
        let created_at = works
            .values()
            .map(|work| work.created_at + Duration::microseconds(1))
            .max()
            .map_or(now, |floor| floor.max(now));

        let work = Work {
            id: Uuid::new_v4(),
            title: new_work.title,
            excerpt: new_work.excerpt,
            full_content: new_work.full_content,
            image_url: new_work.image_url,
            likes: 0,
            comments: Vec::new(),
            created_at,
        };
        works.insert(work.id, work.clone());
        Ok(work)
    }

    async fn update_work(&self, id: Uuid, changes: WorkChanges) -> AppResult<Option<WorkUpdate>> {
        let mut works = self.works.write().await;
        let Some(work) = works.get_mut(&id) else {
            return Ok(None);
        };

        let previous_image = work.image_url.clone();
        if let Some(title) = changes.title {
            work.title = title;
        }
        if let Some(excerpt) = changes.excerpt {
            work.excerpt = excerpt;
        }
        if let Some(full_content) = changes.full_content {
            work.full_content = full_content;
        }
        if let Some(image_url) = &changes.image_url {
            work.image_url = image_url.clone();
        }

        Ok(Some(WorkUpdate {
            work: work.clone(),
            replaced_image: replaced_image(previous_image, changes.image_url.as_deref()),
        }))
    }

    async fn delete_work(&self, id: Uuid) -> AppResult<Option<String>> {
        Ok(self.works.write().await.remove(&id).map(|work| work.image_url))
    }

    async fn reset_work_image(&self, id: Uuid) -> AppResult<Option<String>> {
        let mut works = self.works.write().await;
        Ok(works.get_mut(&id).map(|work| {
            std::mem::replace(&mut work.image_url, PLACEHOLDER_IMAGE.to_string())
        }))
    }

    async fn increment_likes(&self, id: Uuid) -> AppResult<Option<i64>> {
        let mut works = self.works.write().await;
        Ok(works.get_mut(&id).map(|work| {
            work.likes += 1;
            work.likes
        }))
    }

    async fn add_comment(&self, work_id: Uuid, comment: Comment) -> AppResult<bool> {
        let mut works = self.works.write().await;
        match works.get_mut(&work_id) {
            Some(work) => {
                work.comments.insert(0, comment);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pending_comments(&self) -> AppResult<Vec<PendingComment>> {
        let works = self.works.read().await;
        let mut pending: Vec<PendingComment> = works
            .values()
            .flat_map(|work| {
                work.comments
                    .iter()
                    .filter(|comment| comment.status == CommentStatus::Pending)
                    .map(|comment| PendingComment {
                        work_id: work.id,
                        work_title: work.title.clone(),
                        comment: comment.clone(),
                    })
            })
            .collect();
        pending.sort_by_key(|entry| Reverse(entry.comment.created_at));
        Ok(pending)
    }

    async fn set_comment_status(
        &self,
        work_id: Uuid,
        comment_id: Uuid,
        status: CommentStatus,
    ) -> AppResult<CommentChange> {
        let mut works = self.works.write().await;
        let Some(work) = works.get_mut(&work_id) else {
            return Ok(CommentChange::WorkMissing);
        };
        match work.comments.iter_mut().find(|comment| comment.id == comment_id) {
            Some(comment) => {
                comment.status = status;
                Ok(CommentChange::Applied)
            }
            None => Ok(CommentChange::CommentMissing),
        }
    }

    async fn delete_comment(&self, work_id: Uuid, comment_id: Uuid) -> AppResult<CommentChange> {
        let mut works = self.works.write().await;
        let Some(work) = works.get_mut(&work_id) else {
            return Ok(CommentChange::WorkMissing);
        };
        let before = work.comments.len();
        work.comments.retain(|comment| comment.id != comment_id);
        Ok(if work.comments.len() < before {
            CommentChange::Applied
        } else {
            CommentChange::CommentMissing
        })
    }

    async fn create_admin(&self, username: &str, password_hash: &str) -> AppResult<Admin> {
        let mut admins = self.admins.write().await;
        if admins.contains_key(username) {
            return Err(AppError::Conflict("Admin user already exists".to_string()));
        }
        let admin = Admin {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        admins.insert(admin.username.clone(), admin.clone());
        Ok(admin)
    }

    async fn find_admin_by_username(&self, username: &str) -> AppResult<Option<Admin>> {
        Ok(self.admins.read().await.get(username).cloned())
    }
}
