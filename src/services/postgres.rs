use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::store::{
    DatingStore, LocationStore, ProfileStore, SessionStore, SignalStore, StoreResult, TagStore,
};
use crate::config::DatabaseSettings;
use crate::core::distance::{calculate_bounding_box, EARTH_RADIUS_KM};
use crate::core::filters::Criterion;
use crate::models::{
    Candidate, Coordinates, Gender, Location, LocationUpdate, LongitudeSpan, Orientation, Profile, ProfileId,
    ProfileUpdate, TagRemoval,
};

/// Columns selected for every candidate row (`users u LEFT JOIN user_locations ul`)
const CANDIDATE_COLUMNS: &str = r#"
    u.id, u.username, u.first_name, u.last_name, u.verified, u.gender, u.orientation,
    u.birthday, u.bio, u.avatar_url, COALESCE(u.fame_rating, 0)::float8 AS fame_rating,
    ul.lat, ul.lon, ul.accuracy_m, ul.updated_at
"#;

/// PostgreSQL-backed store for profiles, locations, tags, signals and sessions
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect, then run pending migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(settings: &DatabaseSettings) -> StoreResult<Self> {
        tracing::info!(
            "Connecting to PostgreSQL (max: {}, min: {})",
            settings.max_connections,
            settings.min_connections
        );

        Self::new(
            &settings.url,
            settings.max_connections,
            settings.min_connections,
            Duration::from_secs(settings.acquire_timeout_secs),
            Duration::from_secs(settings.idle_timeout_secs),
        )
        .await
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_tag_id(
        conn: &mut sqlx::PgConnection,
        name: &str,
    ) -> Result<i32, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
        row.try_get("id")
    }
}

fn candidate_from_row(row: &PgRow) -> Result<Candidate, sqlx::Error> {
    let gender: Option<String> = row.try_get("gender")?;
    let orientation: Option<String> = row.try_get("orientation")?;

    let profile = Profile {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        verified: row.try_get("verified")?,
        gender: gender.as_deref().and_then(Gender::parse),
        orientation: orientation.as_deref().map(Orientation::normalize),
        birthday: row.try_get("birthday")?,
        bio: row.try_get("bio")?,
        avatar_url: row.try_get("avatar_url")?,
        fame_rating: row.try_get("fame_rating")?,
    };

    let location = match (
        row.try_get::<Option<f64>, _>("lat")?,
        row.try_get::<Option<f64>, _>("lon")?,
        row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>("updated_at")?,
    ) {
        (Some(latitude), Some(longitude), Some(updated_at)) => Some(Location {
            latitude,
            longitude,
            accuracy_m: row.try_get("accuracy_m")?,
            updated_at,
        }),
        _ => None,
    };

    Ok(Candidate { profile, location })
}

fn location_from_row(row: &PgRow) -> Result<Location, sqlx::Error> {
    Ok(Location {
        latitude: row.try_get("lat")?,
        longitude: row.try_get("lon")?,
        accuracy_m: row.try_get("accuracy_m")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Push the haversine distance (km) between `ul.lat/ul.lon` and `origin`
fn push_haversine(builder: &mut QueryBuilder<'_, Postgres>, origin: Coordinates) {
    builder
        .push(format!("({:.1} * 2 * ASIN(LEAST(1.0, SQRT(POWER(SIN(RADIANS(ul.lat - ", EARTH_RADIUS_KM))
        .push_bind(origin.latitude)
        .push(") / 2), 2) + COS(RADIANS(")
        .push_bind(origin.latitude)
        .push(")) * COS(RADIANS(ul.lat)) * POWER(SIN(RADIANS(ul.lon - ")
        .push_bind(origin.longitude)
        .push(") / 2), 2)))))");
}

/// Compile one criterion into a parenthesised boolean expression
fn push_criterion(builder: &mut QueryBuilder<'_, Postgres>, criterion: &Criterion) {
    match criterion {
        Criterion::Verified => {
            builder.push("u.verified = TRUE");
        }
        Criterion::ExcludeProfile(id) => {
            builder.push("u.id <> ").push_bind(*id);
        }
        Criterion::Compatible(clauses) => {
            if clauses.is_empty() {
                builder.push("FALSE");
                return;
            }
            builder.push("(");
            for (i, clause) in clauses.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                let accepted: Vec<String> = clause
                    .accepted_orientations
                    .iter()
                    .map(|o| o.as_str().to_string())
                    .collect();
                builder
                    .push("(LOWER(TRIM(u.gender)) = ")
                    .push_bind(clause.gender.as_str().to_lowercase())
                    .push(" AND normalize_orientation(u.orientation) = ANY(")
                    .push_bind(accepted)
                    .push("))");
            }
            builder.push(")");
        }
        Criterion::BirthYearBetween { min_year, max_year } => {
            builder
                .push("EXTRACT(YEAR FROM u.birthday)::int BETWEEN ")
                .push_bind(*min_year)
                .push(" AND ")
                .push_bind(*max_year);
        }
        Criterion::MinFame(min) => {
            builder.push("COALESCE(u.fame_rating, 0) >= ").push_bind(*min);
        }
        Criterion::WithinDistance { origin, max_km } => {
            builder.push("(ul.lat IS NULL OR ");
            push_haversine(builder, *origin);
            builder.push(" <= ").push_bind(*max_km).push(")");
        }
        Criterion::LocatedWithin { origin, radius_km } => {
            let bbox = calculate_bounding_box(origin.latitude, origin.longitude, *radius_km);
            builder
                .push("(ul.lat IS NOT NULL AND ul.lat BETWEEN ")
                .push_bind(bbox.min_lat)
                .push(" AND ")
                .push_bind(bbox.max_lat);
            match bbox.longitude {
                LongitudeSpan::Any => {}
                LongitudeSpan::Range { min, max } => {
                    builder.push(" AND ul.lon BETWEEN ").push_bind(min).push(" AND ").push_bind(max);
                }
                LongitudeSpan::Wrapped { min, max } => {
                    builder.push(" AND (ul.lon >= ").push_bind(min).push(" OR ul.lon <= ").push_bind(max).push(")");
                }
            }
            builder.push(" AND ");
            push_haversine(builder, *origin);
            builder.push(" <= ").push_bind(*radius_km).push(")");
        }
    }
}

/// Build the candidate query for a list of criteria
fn candidate_query(criteria: &[Criterion]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM users u LEFT JOIN user_locations ul ON ul.user_id = u.id WHERE TRUE",
        CANDIDATE_COLUMNS
    ));
    for criterion in criteria {
        builder.push(" AND ");
        push_criterion(&mut builder, criterion);
    }
    builder.push(" ORDER BY u.id");
    builder
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn get_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        Ok(self.get_candidates(&[id]).await?.pop().map(|c| c.profile))
    }

    async fn find_candidates(&self, criteria: &[Criterion]) -> StoreResult<Vec<Candidate>> {
        let mut builder = candidate_query(criteria);
        let rows = builder.build().fetch_all(&self.pool).await?;

        let candidates = rows
            .iter()
            .map(candidate_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Candidate query with {} criteria returned {} rows", criteria.len(), candidates.len());
        Ok(candidates)
    }

    async fn get_candidates(&self, ids: &[ProfileId]) -> StoreResult<Vec<Candidate>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {} FROM users u LEFT JOIN user_locations ul ON ul.user_id = u.id WHERE u.id = ANY($1)",
            CANDIDATE_COLUMNS
        );
        let rows = sqlx::query(&query).bind(ids.to_vec()).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(candidate_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_profile(&self, id: ProfileId, update: &ProfileUpdate) -> StoreResult<bool> {
        if update.is_empty() {
            return Ok(self.get_profile(id).await?.is_some());
        }

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut fields = builder.separated(", ");
        if let Some(gender) = update.gender {
            fields.push("gender = ").push_bind_unseparated(gender.as_str());
        }
        if let Some(orientation) = update.orientation {
            fields.push("orientation = ").push_bind_unseparated(orientation.as_str());
        }
        if let Some(bio) = &update.bio {
            fields.push("bio = ").push_bind_unseparated(bio.clone());
        }
        if let Some(first_name) = &update.first_name {
            fields.push("first_name = ").push_bind_unseparated(first_name.clone());
        }
        if let Some(last_name) = &update.last_name {
            fields.push("last_name = ").push_bind_unseparated(last_name.clone());
        }
        if let Some(birthday) = update.birthday {
            fields.push("birthday = ").push_bind_unseparated(birthday);
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fame_rating(&self, id: ProfileId) -> StoreResult<Option<f64>> {
        let row = sqlx::query("SELECT COALESCE(fame_rating, 0)::float8 AS fame_rating FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.try_get("fame_rating")).transpose()?)
    }
}

#[async_trait]
impl LocationStore for PostgresStore {
    async fn get_location(&self, id: ProfileId) -> StoreResult<Option<Location>> {
        let row = sqlx::query("SELECT lat, lon, accuracy_m, updated_at FROM user_locations WHERE user_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(location_from_row).transpose()?)
    }

    async fn upsert_location(&self, id: ProfileId, update: LocationUpdate) -> StoreResult<Location> {
        let query = r#"
            INSERT INTO user_locations (user_id, lat, lon, accuracy_m, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                lat = EXCLUDED.lat,
                lon = EXCLUDED.lon,
                accuracy_m = EXCLUDED.accuracy_m,
                updated_at = EXCLUDED.updated_at
            RETURNING lat, lon, accuracy_m, updated_at
        "#;

        let row = sqlx::query(query)
            .bind(id)
            .bind(update.latitude)
            .bind(update.longitude)
            .bind(update.accuracy_m)
            .fetch_one(&self.pool)
            .await?;

        Ok(location_from_row(&row)?)
    }
}

#[async_trait]
impl TagStore for PostgresStore {
    async fn tags_for(&self, ids: &[ProfileId]) -> StoreResult<HashMap<ProfileId, Vec<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT ut.user_id, t.name
            FROM user_tags ut
            JOIN tags t ON t.id = ut.tag_id
            WHERE ut.user_id = ANY($1)
            ORDER BY ut.user_id, t.name
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<ProfileId, Vec<String>> = HashMap::new();
        for row in &rows {
            let user_id: ProfileId = row.try_get("user_id")?;
            tags.entry(user_id).or_default().push(row.try_get("name")?);
        }
        Ok(tags)
    }

    async fn add_tag(&self, id: ProfileId, name: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let tag_id = Self::upsert_tag_id(&mut tx, name).await?;

        sqlx::query("INSERT INTO user_tags (user_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_tag(&self, id: ProfileId, name: &str) -> StoreResult<TagRemoval> {
        let tag = sqlx::query("SELECT id FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        let Some(tag) = tag else {
            return Ok(TagRemoval::UnknownTag);
        };
        let tag_id: i32 = tag.try_get("id")?;

        let result = sqlx::query("DELETE FROM user_tags WHERE user_id = $1 AND tag_id = $2")
            .bind(id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            Ok(TagRemoval::Removed)
        } else {
            Ok(TagRemoval::NotAssigned)
        }
    }

    async fn replace_tags(&self, id: ProfileId, names: &[String]) -> StoreResult<Vec<String>> {
        let names = super::store::normalize_tag_names(names);

        // dropping the transaction on an early return rolls back everything
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_tags WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for name in &names {
            let tag_id = Self::upsert_tag_id(&mut tx, name).await?;
            sqlx::query("INSERT INTO user_tags (user_id, tag_id) VALUES ($1, $2)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Replaced tags for profile {} ({} tags)", id, names.len());
        Ok(names)
    }
}

#[async_trait]
impl SignalStore for PostgresStore {
    async fn record_view(&self, viewer: ProfileId, viewed: ProfileId) -> StoreResult<bool> {
        let query = r#"
            INSERT INTO profile_views (viewer_id, viewed_id, viewed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (viewer_id, viewed_id)
            DO UPDATE SET viewed_at = EXCLUDED.viewed_at
            RETURNING (xmax = 0) AS inserted
        "#;

        let row = sqlx::query(query)
            .bind(viewer)
            .bind(viewed)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("inserted")?)
    }

    async fn toggle_like(&self, liker: ProfileId, liked: ProfileId) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM profile_likes WHERE liker_id = $1 AND liked_id = $2")
            .bind(liker)
            .bind(liked)
            .execute(&mut *tx)
            .await?;

        let liked_now = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(
                r#"
                INSERT INTO profile_likes (liker_id, liked_id, liked_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (liker_id, liked_id) DO NOTHING
                "#,
            )
            .bind(liker)
            .bind(liked)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(liked_now)
    }

    async fn like_exists(&self, liker: ProfileId, liked: ProfileId) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM profile_likes WHERE liker_id = $1 AND liked_id = $2) AS liked",
        )
        .bind(liker)
        .bind(liked)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("liked")?)
    }

    async fn count_viewers(&self, id: ProfileId) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM profile_views WHERE viewed_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }

    async fn count_likers(&self, id: ProfileId) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM profile_likes WHERE liked_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }

    async fn viewers_of(&self, id: ProfileId) -> StoreResult<Vec<ProfileId>> {
        let rows = sqlx::query("SELECT viewer_id FROM profile_views WHERE viewed_id = $1 ORDER BY viewed_at DESC")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| r.try_get("viewer_id"))
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn likers_of(&self, id: ProfileId) -> StoreResult<Vec<ProfileId>> {
        let rows = sqlx::query("SELECT liker_id FROM profile_likes WHERE liked_id = $1 ORDER BY liked_at DESC")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| r.try_get("liker_id"))
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    async fn resolve_session(&self, token: &str) -> StoreResult<Option<ProfileId>> {
        let row = sqlx::query("SELECT id FROM users WHERE session_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get("id")).transpose()?)
    }
}

#[async_trait]
impl DatingStore for PostgresStore {
    async fn health_check(&self) -> StoreResult<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compatibility::resolve_clauses;

    const PARIS: Coordinates = Coordinates { latitude: 48.8566, longitude: 2.3522 };

    #[test]
    fn test_empty_criteria_query() {
        let builder = candidate_query(&[]);
        let sql = builder.sql();
        assert!(sql.contains("LEFT JOIN user_locations"));
        assert!(sql.trim_end().ends_with("ORDER BY u.id"));
    }

    #[test]
    fn test_criteria_are_bound_not_inlined() {
        let criteria = vec![
            Criterion::Verified,
            Criterion::ExcludeProfile(42),
            Criterion::MinFame(12.5),
            Criterion::BirthYearBetween { min_year: 1990, max_year: 2000 },
        ];
        let builder = candidate_query(&criteria);
        let sql = builder.sql();
        assert!(sql.contains("u.verified = TRUE"));
        assert!(sql.contains("u.id <> $1"));
        assert!(sql.contains("COALESCE(u.fame_rating, 0) >= $2"));
        assert!(sql.contains("BETWEEN $3 AND $4"));
        assert!(!sql.contains("42"));
        assert!(!sql.contains("12.5"));
    }

    #[test]
    fn test_compatibility_clauses_or_combined() {
        let clauses = resolve_clauses(Some(Gender::Woman), Orientation::LikesBoth);
        let builder = candidate_query(&[Criterion::Compatible(clauses)]);
        let sql = builder.sql();
        assert_eq!(sql.matches("normalize_orientation").count(), 2);
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_empty_compatibility_is_false() {
        let builder = candidate_query(&[Criterion::Compatible(Vec::new())]);
        assert!(builder.sql().contains("AND FALSE"));
    }

    #[test]
    fn test_distance_criteria_sql() {
        let builder = candidate_query(&[Criterion::WithinDistance { origin: PARIS, max_km: 50.0 }]);
        assert!(builder.sql().contains("ul.lat IS NULL OR"));

        let builder = candidate_query(&[Criterion::LocatedWithin { origin: PARIS, radius_km: 50.0 }]);
        let sql = builder.sql();
        assert!(sql.contains("ul.lat IS NOT NULL"));
        assert!(sql.contains("ul.lon BETWEEN"));
        assert!(sql.contains("ASIN(LEAST(1.0"));
    }

    #[test]
    fn test_located_within_longitude_span_sql() {
        let across_antimeridian = Coordinates { latitude: 0.0, longitude: 179.9 };
        let builder = candidate_query(&[Criterion::LocatedWithin { origin: across_antimeridian, radius_km: 50.0 }]);
        let sql = builder.sql();
        assert!(sql.contains("(ul.lon >= $3 OR ul.lon <= $4)"));
        assert!(!sql.contains("ul.lon BETWEEN"));

        let near_pole = Coordinates { latitude: 85.0, longitude: 0.0 };
        let builder = candidate_query(&[Criterion::LocatedWithin { origin: near_pole, radius_km: 600.0 }]);
        let sql = builder.sql();
        assert!(sql.contains("ul.lat BETWEEN"));
        assert!(!sql.contains("ul.lon >="));
        assert!(!sql.contains("ul.lon BETWEEN"));
    }

    /// Needs a disposable database in `DATABASE_URL`
    #[tokio::test]
    #[ignore]
    async fn test_replace_tags_rolls_back_on_failed_insert() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let store = PostgresStore::new(&url, 2, 1, Duration::from_secs(10), Duration::from_secs(60))
            .await
            .unwrap();

        let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let id: i32 = sqlx::query_scalar("INSERT INTO users (username, email) VALUES ($1, $2) RETURNING id")
            .bind(format!("rollback{}", suffix))
            .bind(format!("rollback{}@example.com", suffix))
            .fetch_one(&store.pool)
            .await
            .unwrap();

        store.replace_tags(id, &["music".to_string()]).await.unwrap();

        // tags.name is VARCHAR(64): the second insert fails after the DELETE ran
        let names = vec!["art".to_string(), "y".repeat(80)];
        assert!(store.replace_tags(id, &names).await.is_err());

        let tags = store.tags_for(&[id]).await.unwrap();
        assert_eq!(tags.get(&id).cloned().unwrap_or_default(), vec!["music"]);

        sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&store.pool).await.unwrap();
    }
}
