use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use uuid::Uuid;

use super::models::*;
use super::schema::VERSIONED_SCHEMAS;
use super::trait_def::{AuthStore, EngagementStore};
use crate::engagement::{
    validate_annotation_text, validate_rating, validate_timestamp, EngagementError,
};
use crate::sqlite_persistence::BASE_DB_VERSION;
use crate::user::auth::{AuthToken, AuthTokenValue, PasswordCredentials, TrackboxdHasher};

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[derive(Clone)]
pub struct SqliteEngagementStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEngagementStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = if db_path.as_ref().exists() {
            Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            let conn = Connection::open(db_path)?;
            VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
            conn
        };
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!("Database version {} is not a trackboxd database", db_version);
        }
        let version = db_version as usize;

        if version >= VERSIONED_SCHEMAS.len() {
            bail!("Database version {} is too new", version);
        }
        VERSIONED_SCHEMAS
            .get(version)
            .context("Failed to get schema")?
            .validate(&conn)?;

        Self::migrate_if_needed(&conn, version)?;

        Ok(SqliteEngagementStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, version: usize) -> Result<()> {
        let mut latest = version;
        for schema in VERSIONED_SCHEMAS.iter().skip(version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!("Migrating db from version {} to {}", latest, schema.version);
                migration_fn(conn)?;
                latest = schema.version;
            }
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest),
            [],
        )?;
        Ok(())
    }
}

/// Insert the catalog item row if it is not mirrored yet, touch it otherwise.
fn upsert_catalog_item(
    tx: &Transaction,
    item_id: &str,
    item_type: ItemType,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO catalog_item (id, item_type, last_updated) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET last_updated = excluded.last_updated",
        params![item_id, item_type.as_str(), now()],
    )?;
    Ok(())
}

/// Counter columns live in a fixed set, never caller-supplied.
fn bump_item_counter(
    tx: &Transaction,
    item_id: &str,
    column: &'static str,
    delta: i64,
) -> rusqlite::Result<()> {
    tx.execute(
        &format!(
            "UPDATE catalog_item SET {0} = {0} + ?1, last_updated = ?2 WHERE id = ?3",
            column
        ),
        params![delta, now(), item_id],
    )?;
    Ok(())
}

fn bump_row_like_count(
    tx: &Transaction,
    table: &'static str,
    row_id: &str,
    delta: i64,
) -> rusqlite::Result<()> {
    tx.execute(
        &format!("UPDATE {0} SET like_count = like_count + ?1 WHERE id = ?2", table),
        params![delta, row_id],
    )?;
    Ok(())
}

fn record_activity(
    tx: &Transaction,
    user_id: i64,
    action: &str,
    target_type: TargetType,
    target_id: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO activity (user_id, action, target_type, target_id, created)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, action, target_type.as_str(), target_id, now()],
    )?;
    Ok(())
}

/// Drops every feed row pointing at a target that is being deleted.
fn clear_activity_for_target(
    tx: &Transaction,
    target_type: TargetType,
    target_id: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM activity WHERE target_type = ?1 AND target_id = ?2",
        params![target_type.as_str(), target_id],
    )?;
    Ok(())
}

fn delete_likes_for_target(
    tx: &Transaction,
    target_type: TargetType,
    target_id: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM user_like WHERE target_type = ?1 AND target_id = ?2",
        params![target_type.as_str(), target_id],
    )?;
    Ok(())
}

const REVIEW_COLUMNS: &str =
    "r.id, r.user_id, r.item_id, c.item_type, r.rating, r.text, r.is_public, r.like_count, r.created";

fn review_from_row(row: &Row) -> rusqlite::Result<Review> {
    let item_type_str: String = row.get(3)?;
    let item_type = ItemType::from_str(&item_type_str).map_err(|_| rusqlite::Error::InvalidQuery)?;
    Ok(Review {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        item_type,
        rating: row.get(4)?,
        text: row.get(5)?,
        is_public: row.get::<_, i64>(6)? != 0,
        like_count: row.get(7)?,
        created: row.get(8)?,
    })
}

const ANNOTATION_COLUMNS: &str =
    "id, user_id, track_id, timestamp, text, is_public, like_count, created";

fn annotation_from_row(row: &Row) -> rusqlite::Result<Annotation> {
    Ok(Annotation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        track_id: row.get(2)?,
        timestamp: row.get(3)?,
        text: row.get(4)?,
        is_public: row.get::<_, i64>(5)? != 0,
        like_count: row.get(6)?,
        created: row.get(7)?,
    })
}

fn activity_from_row(row: &Row) -> rusqlite::Result<Activity> {
    let target_type_str: String = row.get(3)?;
    let target_type =
        TargetType::from_str(&target_type_str).map_err(|_| rusqlite::Error::InvalidQuery)?;
    Ok(Activity {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action: row.get(2)?,
        target_type,
        target_id: row.get(4)?,
        created: row.get(5)?,
    })
}

fn playlist_from_row(row: &Row) -> rusqlite::Result<PlaylistMirror> {
    Ok(PlaylistMirror {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        is_public: row.get::<_, i64>(4)? != 0,
        is_collaborative: row.get::<_, i64>(5)? != 0,
        created: row.get(6)?,
    })
}

/// An empty or whitespace-only review text is stored as NULL.
fn normalize_review_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

impl EngagementStore for SqliteEngagementStore {
    fn create_user(&self, handle: &str) -> Result<i64, EngagementError> {
        let conn = self.conn.lock().unwrap();
        match conn.execute("INSERT INTO user (handle) VALUES (?1)", params![handle]) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => {
                Err(EngagementError::Conflict("handle already taken"))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let user = conn
            .query_row(
                "SELECT id, handle, email, display_name, image_url, country, spotify_url, created
                 FROM user WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        handle: row.get(1)?,
                        email: row.get(2)?,
                        display_name: row.get(3)?,
                        image_url: row.get(4)?,
                        country: row.get(5)?,
                        spotify_url: row.get(6)?,
                        created: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn get_user_id(&self, handle: &str) -> Option<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id FROM user WHERE handle = ?1",
            params![handle],
            |row| row.get(0),
        )
        .ok()
    }

    fn update_user_profile(
        &self,
        user_id: i64,
        update: &UserProfileUpdate,
    ) -> Result<(), EngagementError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE user SET
                email = COALESCE(?1, email),
                display_name = COALESCE(?2, display_name),
                image_url = COALESCE(?3, image_url),
                country = COALESCE(?4, country),
                spotify_url = COALESCE(?5, spotify_url)
             WHERE id = ?6",
            params![
                update.email,
                update.display_name,
                update.image_url,
                update.country,
                update.spotify_url,
                user_id
            ],
        )?;
        if updated == 0 {
            return Err(EngagementError::NotFound("user"));
        }
        Ok(())
    }

    fn get_catalog_item(&self, item_id: &str) -> Result<Option<CatalogItem>> {
        let conn = self.conn.lock().unwrap();
        let item = conn
            .query_row(
                "SELECT id, item_type, like_count, review_count, annotation_count,
                        rating_sum, rating_count, last_updated
                 FROM catalog_item WHERE id = ?1",
                params![item_id],
                |row| {
                    let item_type_str: String = row.get(1)?;
                    let item_type = ItemType::from_str(&item_type_str)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?;
                    Ok(CatalogItem {
                        id: row.get(0)?,
                        item_type,
                        like_count: row.get(2)?,
                        review_count: row.get(3)?,
                        annotation_count: row.get(4)?,
                        rating_sum: row.get(5)?,
                        rating_count: row.get(6)?,
                        last_updated: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(item)
    }

    fn like(
        &self,
        user_id: i64,
        target_type: TargetType,
        target_id: &str,
    ) -> Result<Like, EngagementError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        match target_type.catalog_item_type() {
            Some(item_type) => upsert_catalog_item(&tx, target_id, item_type)?,
            None => {
                // Likes on reviews/annotations require the row to exist.
                let table = match target_type {
                    TargetType::Review => "review",
                    _ => "annotation",
                };
                let exists: bool = tx
                    .query_row(
                        &format!("SELECT 1 FROM {} WHERE id = ?1", table),
                        params![target_id],
                        |_| Ok(true),
                    )
                    .optional()?
                    .unwrap_or(false);
                if !exists {
                    return Err(EngagementError::NotFound(match target_type {
                        TargetType::Review => "review",
                        _ => "annotation",
                    }));
                }
            }
        }

        let created = now();
        let insert_result = tx.execute(
            "INSERT INTO user_like (user_id, target_type, target_id, created)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, target_type.as_str(), target_id, created],
        );
        match insert_result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(EngagementError::Conflict("already liked"));
            }
            Err(err) => return Err(err.into()),
        }
        let like_id = tx.last_insert_rowid();

        match target_type {
            TargetType::Review => bump_row_like_count(&tx, "review", target_id, 1)?,
            TargetType::Annotation => bump_row_like_count(&tx, "annotation", target_id, 1)?,
            _ => bump_item_counter(&tx, target_id, "like_count", 1)?,
        }
        record_activity(&tx, user_id, "liked", target_type, target_id)?;

        tx.commit()?;
        Ok(Like {
            id: like_id,
            user_id,
            target_type,
            target_id: target_id.to_string(),
            created,
        })
    }

    fn unlike(
        &self,
        user_id: i64,
        target_type: TargetType,
        target_id: &str,
    ) -> Result<(), EngagementError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let deleted = tx.execute(
            "DELETE FROM user_like WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
            params![user_id, target_type.as_str(), target_id],
        )?;
        if deleted == 0 {
            return Err(EngagementError::NotFound("like"));
        }

        // Only reached after a successful delete, so the counter never dips
        // below the actual row count.
        match target_type {
            TargetType::Review => bump_row_like_count(&tx, "review", target_id, -1)?,
            TargetType::Annotation => bump_row_like_count(&tx, "annotation", target_id, -1)?,
            _ => bump_item_counter(&tx, target_id, "like_count", -1)?,
        }
        tx.execute(
            "DELETE FROM activity
             WHERE user_id = ?1 AND action = 'liked' AND target_type = ?2 AND target_id = ?3",
            params![user_id, target_type.as_str(), target_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn is_liked(&self, user_id: i64, target_type: TargetType, target_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let liked = conn
            .query_row(
                "SELECT 1 FROM user_like
                 WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
                params![user_id, target_type.as_str(), target_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(liked)
    }

    fn like_status(
        &self,
        user_id: i64,
        target_type: TargetType,
        target_ids: &[String],
    ) -> Result<HashMap<String, bool>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT 1 FROM user_like
             WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
        )?;
        let mut status = HashMap::with_capacity(target_ids.len());
        for target_id in target_ids {
            let liked = stmt
                .query_row(params![user_id, target_type.as_str(), target_id], |_| {
                    Ok(true)
                })
                .optional()?
                .unwrap_or(false);
            status.insert(target_id.clone(), liked);
        }
        Ok(status)
    }

    fn liked_ids(&self, user_id: i64, target_type: TargetType) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT target_id FROM user_like
             WHERE user_id = ?1 AND target_type = ?2 ORDER BY created DESC",
        )?;
        let ids = stmt
            .query_map(params![user_id, target_type.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn create_review(&self, new_review: NewReview) -> Result<Review, EngagementError> {
        validate_rating(new_review.rating)?;
        let text = normalize_review_text(new_review.text);

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        upsert_catalog_item(&tx, &new_review.item_id, new_review.item_type)?;

        let review_id = Uuid::new_v4().to_string();
        let created = now();
        tx.execute(
            "INSERT INTO review (id, user_id, item_id, rating, text, is_public, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                review_id,
                new_review.user_id,
                new_review.item_id,
                new_review.rating,
                text,
                new_review.is_public as i64,
                created
            ],
        )?;

        bump_item_counter(&tx, &new_review.item_id, "review_count", 1)?;
        tx.execute(
            "UPDATE catalog_item SET rating_sum = rating_sum + ?1, rating_count = rating_count + 1
             WHERE id = ?2",
            params![new_review.rating, new_review.item_id],
        )?;
        record_activity(
            &tx,
            new_review.user_id,
            "reviewed",
            TargetType::Review,
            &review_id,
        )?;

        tx.commit()?;
        Ok(Review {
            id: review_id,
            user_id: new_review.user_id,
            item_id: new_review.item_id,
            item_type: new_review.item_type,
            rating: new_review.rating,
            text,
            is_public: new_review.is_public,
            like_count: 0,
            created,
        })
    }

    fn update_review(
        &self,
        review_id: &str,
        user_id: i64,
        update: ReviewUpdate,
    ) -> Result<Review, EngagementError> {
        if let Some(rating) = update.rating {
            validate_rating(rating)?;
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let existing: Option<(i64, f64, String)> = tx
            .query_row(
                "SELECT user_id, rating, item_id FROM review WHERE id = ?1",
                params![review_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (owner_id, old_rating, item_id) = match existing {
            Some(x) => x,
            None => return Err(EngagementError::NotFound("review")),
        };
        if owner_id != user_id {
            return Err(EngagementError::NotOwner("review"));
        }

        if let Some(rating) = update.rating {
            tx.execute(
                "UPDATE review SET rating = ?1 WHERE id = ?2",
                params![rating, review_id],
            )?;
            tx.execute(
                "UPDATE catalog_item SET rating_sum = rating_sum + ?1 WHERE id = ?2",
                params![rating - old_rating, item_id],
            )?;
        }
        if let Some(text) = update.text {
            let text = normalize_review_text(Some(text));
            tx.execute(
                "UPDATE review SET text = ?1 WHERE id = ?2",
                params![text, review_id],
            )?;
        }
        if let Some(is_public) = update.is_public {
            tx.execute(
                "UPDATE review SET is_public = ?1 WHERE id = ?2",
                params![is_public as i64, review_id],
            )?;
        }

        let review = tx.query_row(
            &format!(
                "SELECT {} FROM review r JOIN catalog_item c ON c.id = r.item_id WHERE r.id = ?1",
                REVIEW_COLUMNS
            ),
            params![review_id],
            review_from_row,
        )?;

        tx.commit()?;
        Ok(review)
    }

    fn delete_review(&self, review_id: &str, user_id: i64) -> Result<(), EngagementError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let existing: Option<(i64, f64, String)> = tx
            .query_row(
                "SELECT user_id, rating, item_id FROM review WHERE id = ?1",
                params![review_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (owner_id, rating, item_id) = match existing {
            Some(x) => x,
            None => return Err(EngagementError::NotFound("review")),
        };
        if owner_id != user_id {
            return Err(EngagementError::NotOwner("review"));
        }

        delete_likes_for_target(&tx, TargetType::Review, review_id)?;
        clear_activity_for_target(&tx, TargetType::Review, review_id)?;
        tx.execute("DELETE FROM review WHERE id = ?1", params![review_id])?;

        bump_item_counter(&tx, &item_id, "review_count", -1)?;
        tx.execute(
            "UPDATE catalog_item SET rating_sum = rating_sum - ?1, rating_count = rating_count - 1
             WHERE id = ?2",
            params![rating, item_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_review(&self, review_id: &str) -> Result<Option<Review>> {
        let conn = self.conn.lock().unwrap();
        let review = conn
            .query_row(
                &format!(
                    "SELECT {} FROM review r JOIN catalog_item c ON c.id = r.item_id WHERE r.id = ?1",
                    REVIEW_COLUMNS
                ),
                params![review_id],
                review_from_row,
            )
            .optional()?;
        Ok(review)
    }

    fn reviews_for_item(&self, item_id: &str, viewer: Option<i64>) -> Result<Vec<Review>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM review r JOIN catalog_item c ON c.id = r.item_id
             WHERE r.item_id = ?1 AND (r.is_public = 1 OR r.user_id = ?2)
             ORDER BY r.created DESC",
            REVIEW_COLUMNS
        ))?;
        let reviews = stmt
            .query_map(params![item_id, viewer.unwrap_or(-1)], review_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    fn reviews_for_user(&self, user_id: i64) -> Result<Vec<Review>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM review r JOIN catalog_item c ON c.id = r.item_id
             WHERE r.user_id = ?1 ORDER BY r.created DESC",
            REVIEW_COLUMNS
        ))?;
        let reviews = stmt
            .query_map(params![user_id], review_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    fn rating_distribution(&self, item_id: &str) -> Result<BTreeMap<String, i64>> {
        let mut distribution = BTreeMap::new();
        for half_steps in 0..=10 {
            distribution.insert(format!("{:.1}", half_steps as f64 * 0.5), 0);
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT rating, COUNT(*) FROM review WHERE item_id = ?1 GROUP BY rating",
        )?;
        let rows = stmt
            .query_map(params![item_id], |row| {
                Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (rating, count) in rows {
            *distribution.entry(format!("{:.1}", rating)).or_insert(0) += count;
        }
        Ok(distribution)
    }

    fn create_annotation(
        &self,
        new_annotation: NewAnnotation,
    ) -> Result<Annotation, EngagementError> {
        validate_timestamp(new_annotation.timestamp)?;
        let text = validate_annotation_text(&new_annotation.text)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        upsert_catalog_item(&tx, &new_annotation.track_id, ItemType::Track)?;

        let annotation_id = Uuid::new_v4().to_string();
        let created = now();
        tx.execute(
            "INSERT INTO annotation (id, user_id, track_id, timestamp, text, is_public, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                annotation_id,
                new_annotation.user_id,
                new_annotation.track_id,
                new_annotation.timestamp,
                text,
                new_annotation.is_public as i64,
                created
            ],
        )?;

        bump_item_counter(&tx, &new_annotation.track_id, "annotation_count", 1)?;
        record_activity(
            &tx,
            new_annotation.user_id,
            "annotated",
            TargetType::Annotation,
            &annotation_id,
        )?;

        tx.commit()?;
        Ok(Annotation {
            id: annotation_id,
            user_id: new_annotation.user_id,
            track_id: new_annotation.track_id,
            timestamp: new_annotation.timestamp,
            text,
            is_public: new_annotation.is_public,
            like_count: 0,
            created,
        })
    }

    fn update_annotation(
        &self,
        annotation_id: &str,
        user_id: i64,
        update: AnnotationUpdate,
    ) -> Result<Annotation, EngagementError> {
        if let Some(timestamp) = update.timestamp {
            validate_timestamp(timestamp)?;
        }
        let text = match update.text {
            Some(text) => Some(validate_annotation_text(&text)?),
            None => None,
        };

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let owner_id: Option<i64> = tx
            .query_row(
                "SELECT user_id FROM annotation WHERE id = ?1",
                params![annotation_id],
                |row| row.get(0),
            )
            .optional()?;
        match owner_id {
            None => return Err(EngagementError::NotFound("annotation")),
            Some(owner_id) if owner_id != user_id => {
                return Err(EngagementError::NotOwner("annotation"));
            }
            Some(_) => {}
        }

        if let Some(timestamp) = update.timestamp {
            tx.execute(
                "UPDATE annotation SET timestamp = ?1 WHERE id = ?2",
                params![timestamp, annotation_id],
            )?;
        }
        if let Some(text) = text {
            tx.execute(
                "UPDATE annotation SET text = ?1 WHERE id = ?2",
                params![text, annotation_id],
            )?;
        }
        if let Some(is_public) = update.is_public {
            tx.execute(
                "UPDATE annotation SET is_public = ?1 WHERE id = ?2",
                params![is_public as i64, annotation_id],
            )?;
        }

        let annotation = tx.query_row(
            &format!(
                "SELECT {} FROM annotation WHERE id = ?1",
                ANNOTATION_COLUMNS
            ),
            params![annotation_id],
            annotation_from_row,
        )?;

        tx.commit()?;
        Ok(annotation)
    }

    fn delete_annotation(
        &self,
        annotation_id: &str,
        user_id: i64,
    ) -> Result<(), EngagementError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT user_id, track_id FROM annotation WHERE id = ?1",
                params![annotation_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (owner_id, track_id) = match existing {
            Some(x) => x,
            None => return Err(EngagementError::NotFound("annotation")),
        };
        if owner_id != user_id {
            return Err(EngagementError::NotOwner("annotation"));
        }

        delete_likes_for_target(&tx, TargetType::Annotation, annotation_id)?;
        clear_activity_for_target(&tx, TargetType::Annotation, annotation_id)?;
        tx.execute(
            "DELETE FROM annotation WHERE id = ?1",
            params![annotation_id],
        )?;
        bump_item_counter(&tx, &track_id, "annotation_count", -1)?;

        tx.commit()?;
        Ok(())
    }

    fn get_annotation(&self, annotation_id: &str) -> Result<Option<Annotation>> {
        let conn = self.conn.lock().unwrap();
        let annotation = conn
            .query_row(
                &format!(
                    "SELECT {} FROM annotation WHERE id = ?1",
                    ANNOTATION_COLUMNS
                ),
                params![annotation_id],
                annotation_from_row,
            )
            .optional()?;
        Ok(annotation)
    }

    fn annotations_for_track(
        &self,
        track_id: &str,
        viewer: Option<i64>,
        author: Option<i64>,
    ) -> Result<Vec<Annotation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM annotation
             WHERE track_id = ?1 AND (is_public = 1 OR user_id = ?2)
               AND (?3 IS NULL OR user_id = ?3)
             ORDER BY timestamp",
            ANNOTATION_COLUMNS
        ))?;
        let annotations = stmt
            .query_map(
                params![track_id, viewer.unwrap_or(-1), author],
                annotation_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(annotations)
    }

    fn annotations_for_user(&self, user_id: i64) -> Result<Vec<Annotation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM annotation WHERE user_id = ?1 ORDER BY created DESC",
            ANNOTATION_COLUMNS
        ))?;
        let annotations = stmt
            .query_map(params![user_id], annotation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(annotations)
    }

    fn mirror_playlist(&self, playlist: PlaylistMirror) -> Result<(), EngagementError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        upsert_catalog_item(&tx, &playlist.id, ItemType::Playlist)?;
        tx.execute(
            "INSERT INTO playlist (id, user_id, name, description, is_public, is_collaborative, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                playlist.id,
                playlist.user_id,
                playlist.name,
                playlist.description,
                playlist.is_public as i64,
                playlist.is_collaborative as i64,
                playlist.created
            ],
        )?;
        record_activity(
            &tx,
            playlist.user_id,
            "created_playlist",
            TargetType::Playlist,
            &playlist.id,
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_playlist(&self, playlist_id: &str) -> Result<Option<PlaylistMirror>> {
        let conn = self.conn.lock().unwrap();
        let playlist = conn
            .query_row(
                "SELECT id, user_id, name, description, is_public, is_collaborative, created
                 FROM playlist WHERE id = ?1",
                params![playlist_id],
                playlist_from_row,
            )
            .optional()?;
        Ok(playlist)
    }

    fn playlists_for_user(&self, user_id: i64) -> Result<Vec<PlaylistMirror>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, description, is_public, is_collaborative, created
             FROM playlist WHERE user_id = ?1 ORDER BY created DESC",
        )?;
        let playlists = stmt
            .query_map(params![user_id], playlist_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(playlists)
    }

    fn recent_activity(&self, limit: usize) -> Result<Vec<Activity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, action, target_type, target_id, created
             FROM activity ORDER BY created DESC, id DESC LIMIT ?1",
        )?;
        let activity = stmt
            .query_map(params![limit as i64], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activity)
    }

    fn activity_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<Activity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, action, target_type, target_id, created
             FROM activity WHERE user_id = ?1 ORDER BY created DESC, id DESC LIMIT ?2",
        )?;
        let activity = stmt
            .query_map(params![user_id, limit as i64], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activity)
    }
}

impl AuthStore for SqliteEngagementStore {
    fn add_auth_token(&self, token: AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (user_id, value, created) VALUES (?1, ?2, ?3)",
            params![token.user_id, token.value.0, token.created],
        )?;
        Ok(())
    }

    fn get_auth_token(&self, value: &AuthTokenValue) -> Option<AuthToken> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
            params![value.0],
            |row| {
                Ok(AuthToken {
                    user_id: row.get(0)?,
                    value: AuthTokenValue(row.get(1)?),
                    created: row.get(2)?,
                    last_used: row.get(3)?,
                })
            },
        )
        .ok()
    }

    fn delete_auth_token(&self, value: &AuthTokenValue) -> Option<AuthToken> {
        let token = self.get_auth_token(value)?;
        let conn = self.conn.lock().unwrap();
        match conn.execute(
            "DELETE FROM auth_token WHERE value = ?1",
            params![value.0],
        ) {
            Ok(deleted) if deleted > 0 => Some(token),
            _ => None,
        }
    }

    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_token SET last_used = ?1 WHERE value = ?2",
            params![now(), value.0],
        )?;
        Ok(())
    }

    fn get_password_credentials(&self, user_id: i64) -> Option<PasswordCredentials> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT user_id, salt, hash, hasher FROM user_password_credentials WHERE user_id = ?1",
            params![user_id],
            |row| {
                let hasher = match TrackboxdHasher::from_str(&row.get::<_, String>(3)?) {
                    Ok(x) => x,
                    Err(_) => return Err(rusqlite::Error::InvalidQuery),
                };
                Ok(PasswordCredentials {
                    user_id: row.get(0)?,
                    salt: row.get(1)?,
                    hash: row.get(2)?,
                    hasher,
                })
            },
        )
        .ok()
    }

    fn set_password_credentials(&self, credentials: PasswordCredentials) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE user_password_credentials SET salt = ?1, hash = ?2, hasher = ?3
             WHERE user_id = ?4",
            params![
                credentials.salt,
                credentials.hash,
                credentials.hasher.to_string(),
                credentials.user_id
            ],
        )?;
        if updated == 0 {
            conn.execute(
                "INSERT INTO user_password_credentials (user_id, salt, hash, hasher)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    credentials.user_id,
                    credentials.salt,
                    credentials.hash,
                    credentials.hasher.to_string()
                ],
            )?;
        }
        Ok(())
    }
}
