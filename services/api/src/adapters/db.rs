//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! row-storage ports (`ProfileStore`, `MatchStore`, `SwipeStore`) and of the
//! `SessionTracker` from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use kova_core::domain::{
    MatchRecord, PhotoPosition, Profile, ProfileUpdate, SessionHandle, SwipeDirection,
};
use kova_core::photo_editor::clamp_zoom;
use kova_core::ports::{
    MatchStore, PortError, PortResult, ProfileStore, SessionTracker, SwipeStore,
};
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter implementing every row-storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a `sqlx` failure onto the port error space.
pub(crate) fn db_err(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
            PortError::Conflict(what())
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const PROFILE_COLUMNS: &str = "id, name, email, date_of_birth, city, state, bio, avatar_url, \
     photo_zoom, photo_offset_x, photo_offset_y, headline, industry, looking_for, skills, \
     security_question, created_at";

/// A `profiles` row as stored. Every column but the keys may be null.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub(crate) struct ProfileRecord {
    id: Uuid,
    name: String,
    email: String,
    date_of_birth: Option<NaiveDate>,
    city: Option<String>,
    state: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    photo_zoom: Option<f64>,
    photo_offset_x: Option<f64>,
    photo_offset_y: Option<f64>,
    headline: Option<String>,
    industry: Option<String>,
    looking_for: Option<String>,
    skills: Option<Vec<String>>,
    security_question: Option<String>,
    created_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Missing text becomes empty, a missing photo position becomes the default.
    fn to_domain(self) -> Profile {
        let defaults = PhotoPosition::default();
        Profile {
            id: self.id,
            name: self.name,
            email: self.email,
            date_of_birth: self.date_of_birth,
            city: self.city.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            bio: self.bio.unwrap_or_default(),
            avatar_url: self.avatar_url.unwrap_or_default(),
            photo_position: PhotoPosition {
                zoom: clamp_zoom(self.photo_zoom.unwrap_or(defaults.zoom)),
                offset_x: self.photo_offset_x.unwrap_or(defaults.offset_x),
                offset_y: self.photo_offset_y.unwrap_or(defaults.offset_y),
            },
            headline: self.headline.unwrap_or_default(),
            industry: self.industry.unwrap_or_default(),
            looking_for: self.looking_for.unwrap_or_default(),
            skills: self.skills.unwrap_or_default(),
            security_question: self.security_question.unwrap_or_default(),
            created_at: self.created_at,
        }
    }

    /// Empty text is stored as null so the two directions agree.
    fn from_domain(profile: &Profile) -> Self {
        fn text(s: &str) -> Option<String> {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Self {
            id: profile.id,
            name: profile.name.trim().to_string(),
            email: profile.email.trim().to_lowercase(),
            date_of_birth: profile.date_of_birth,
            city: text(&profile.city),
            state: text(&profile.state),
            bio: text(&profile.bio),
            avatar_url: text(&profile.avatar_url),
            photo_zoom: Some(clamp_zoom(profile.photo_position.zoom)),
            photo_offset_x: Some(profile.photo_position.offset_x),
            photo_offset_y: Some(profile.photo_position.offset_y),
            headline: text(&profile.headline),
            industry: text(&profile.industry),
            looking_for: text(&profile.looking_for),
            skills: (!profile.skills.is_empty()).then(|| profile.skills.clone()),
            security_question: text(&profile.security_question),
            created_at: profile.created_at,
        }
    }
}

#[derive(FromRow)]
struct MatchRow {
    id: Uuid,
    user_a: Uuid,
    user_b: Uuid,
    created_at: DateTime<Utc>,
}
impl MatchRow {
    fn to_domain(self) -> MatchRecord {
        MatchRecord {
            id: self.id,
            user_a: self.user_a,
            user_b: self.user_b,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for DbAdapter {
    async fn fetch_profile(&self, id: Uuid) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err(e, || format!("Profile {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn insert_profile(&self, profile: &Profile) -> PortResult<()> {
        let r = ProfileRecord::from_domain(profile);
        sqlx::query(
            "INSERT INTO profiles (id, name, email, date_of_birth, city, state, bio, avatar_url, \
             photo_zoom, photo_offset_x, photo_offset_y, headline, industry, looking_for, skills, \
             security_question, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(r.id)
        .bind(&r.name)
        .bind(&r.email)
        .bind(r.date_of_birth)
        .bind(&r.city)
        .bind(&r.state)
        .bind(&r.bio)
        .bind(&r.avatar_url)
        .bind(r.photo_zoom)
        .bind(r.photo_offset_x)
        .bind(r.photo_offset_y)
        .bind(&r.headline)
        .bind(&r.industry)
        .bind(&r.looking_for)
        .bind(&r.skills)
        .bind(&r.security_question)
        .bind(r.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err(e, || format!("Profile {} already exists", profile.id)))?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, fields: &ProfileUpdate) -> PortResult<Profile> {
        let position = fields.photo_position;
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET \
               name = COALESCE($2, name), \
               city = COALESCE($3, city), \
               state = COALESCE($4, state), \
               bio = COALESCE($5, bio), \
               avatar_url = COALESCE($6, avatar_url), \
               photo_zoom = COALESCE($7, photo_zoom), \
               photo_offset_x = COALESCE($8, photo_offset_x), \
               photo_offset_y = COALESCE($9, photo_offset_y), \
               headline = COALESCE($10, headline), \
               industry = COALESCE($11, industry), \
               looking_for = COALESCE($12, looking_for), \
               skills = COALESCE($13, skills) \
             WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.bio)
        .bind(&fields.avatar_url)
        .bind(position.map(|p| clamp_zoom(p.zoom)))
        .bind(position.map(|p| p.offset_x))
        .bind(position.map(|p| p.offset_y))
        .bind(&fields.headline)
        .bind(&fields.industry)
        .bind(&fields.looking_for)
        .bind(&fields.skills)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err(e, || format!("Profile {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn list_candidates(&self, excluding: &HashSet<Uuid>) -> PortResult<Vec<Profile>> {
        let excluded: Vec<Uuid> = excluding.iter().copied().collect();
        let records = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE NOT (id = ANY($1)) \
             ORDER BY created_at DESC"
        ))
        .bind(&excluded)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(ProfileRecord::to_domain).collect())
    }
}

//=========================================================================================
// `MatchStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl MatchStore for DbAdapter {
    async fn list_matches_for(&self, user_id: Uuid) -> PortResult<Vec<MatchRecord>> {
        let rows = sqlx::query_as::<_, MatchRow>(
            "SELECT id, user_a, user_b, created_at FROM matches \
             WHERE user_a = $1 OR user_b = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(rows.into_iter().map(MatchRow::to_domain).collect())
    }

    async fn create_match(&self, user_a: Uuid, user_b: Uuid) -> PortResult<MatchRecord> {
        let inserted = sqlx::query_as::<_, MatchRow>(
            "INSERT INTO matches (id, user_a, user_b) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING RETURNING id, user_a, user_b, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        match inserted {
            Some(row) => Ok(row.to_domain()),
            // Lost a race with the mutual-swipe trigger; hand back the stored pair.
            None => self.find_existing_match(user_a, user_b).await?.ok_or_else(|| {
                PortError::Conflict(format!("Match between {} and {}", user_a, user_b))
            }),
        }
    }

    async fn find_existing_match(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> PortResult<Option<MatchRecord>> {
        let row = sqlx::query_as::<_, MatchRow>(
            "SELECT id, user_a, user_b, created_at FROM matches \
             WHERE (user_a = $1 AND user_b = $2) OR (user_a = $2 AND user_b = $1) LIMIT 1",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(row.map(MatchRow::to_domain))
    }
}

//=========================================================================================
// `SwipeStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SwipeStore for DbAdapter {
    async fn record_swipe(
        &self,
        swiper_id: Uuid,
        swiped_id: Uuid,
        direction: SwipeDirection,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO swipes (swiper_id, swiped_id, direction) VALUES ($1, $2, $3) \
             ON CONFLICT (swiper_id, swiped_id) \
             DO UPDATE SET direction = EXCLUDED.direction, created_at = NOW()",
        )
        .bind(swiper_id)
        .bind(swiped_id)
        .bind(direction.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn swiped_ids(&self, swiper_id: Uuid) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT swiped_id FROM swipes WHERE swiper_id = $1")
            .bind(swiper_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `SessionTracker` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionTracker for DbAdapter {
    async fn start(&self, user_a: Uuid, user_b: Uuid) -> PortResult<SessionHandle> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO call_sessions (id, user_a, user_b) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(user_a)
            .bind(user_b)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(SessionHandle(id.to_string()))
    }

    async fn end(&self, handle: &SessionHandle) -> PortResult<()> {
        let id = Uuid::parse_str(&handle.0)
            .map_err(|_| PortError::NotFound(format!("Call session {}", handle)))?;
        let result = sqlx::query(
            "UPDATE call_sessions SET ended_at = NOW() WHERE id = $1 AND ended_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Open call session {} not found",
                handle
            )));
        }
        Ok(())
    }
}
