use crate::entities::{BloodType, UserRole};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

/// A donor, seeker or admin account.
///
/// Availability is advisory: it only feeds matching and is never used as a
/// lock, so one donor may be matched by many requests at once.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub blood_type: Option<BloodType>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub is_available: bool,
    pub email_notifications: bool,
    pub last_donated_at: Option<OffsetDateTime>,
    /// Opaque endpoint registered by the push layer.
    pub push_subscription: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Data for inserting a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    /// Stored as given; callers normalise to lower case.
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub blood_type: Option<BloodType>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub is_available: bool,
    pub email_notifications: bool,
}

/// Eligibility filter for donor lookups.
///
/// All conditions are conjunctive. `donated_before` is the cooldown cutoff:
/// a donor qualifies only if they never donated or donated strictly before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonorCriteria {
    pub blood_type: Option<BloodType>,
    pub exclude_user_id: Option<Uuid>,
    /// Case-insensitive substring of the donor's location.
    pub location: Option<String>,
    pub donated_before: OffsetDateTime,
}

impl DonorCriteria {
    pub fn matches(&self, user: &User) -> bool {
        if !user.is_available {
            return false;
        }
        if self.exclude_user_id == Some(user.id) {
            return false;
        }
        if let Some(wanted) = self.blood_type {
            if user.blood_type != Some(wanted) {
                return false;
            }
        }
        if let Some(needle) = &self.location {
            let needle = needle.to_lowercase();
            let hit = user
                .location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        match user.last_donated_at {
            None => true,
            Some(at) => at < self.donated_before,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, blood_type, location, phone, \
    is_available, email_notifications, last_donated_at, push_subscription, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct GetUserById {
    pub id: Uuid,
}

impl Processor<GetUserById> for DatabaseProcessor {
    type Output = Option<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserById")]
    async fn process(&self, query: GetUserById) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetUserByEmail {
    pub email: String,
}

impl Processor<GetUserByEmail> for DatabaseProcessor {
    type Output = Option<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserByEmail")]
    async fn process(&self, query: GetUserByEmail) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(query.email)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Fetch several users at once. Missing ids are skipped.
pub struct GetUsersByIds {
    pub ids: Vec<Uuid>,
}

impl Processor<GetUsersByIds> for DatabaseProcessor {
    type Output = Vec<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUsersByIds")]
    async fn process(&self, query: GetUsersByIds) -> Result<Vec<User>, sqlx::Error> {
        if query.ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY created_at");
        sqlx::query_as::<_, User>(&sql)
            .bind(query.ids)
            .fetch_all(&self.pool)
            .await
    }
}

impl Processor<NewUser> for DatabaseProcessor {
    type Output = User;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertUser")]
    async fn process(&self, insert: NewUser) -> Result<User, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO users
            (id, name, email, password_hash, role, blood_type, location, phone, is_available,
             email_notifications)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::now_v7())
            .bind(insert.name)
            .bind(insert.email)
            .bind(insert.password_hash)
            .bind(insert.role)
            .bind(insert.blood_type)
            .bind(insert.location)
            .bind(insert.phone)
            .bind(insert.is_available)
            .bind(insert.email_notifications)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Persist every mutable column of an existing user.
pub struct SaveUser {
    pub user: User,
}

impl Processor<SaveUser> for DatabaseProcessor {
    type Output = User;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SaveUser")]
    async fn process(&self, query: SaveUser) -> Result<User, sqlx::Error> {
        let user = query.user;
        let sql = format!(
            r#"
            UPDATE users SET
                name = $2,
                role = $3,
                blood_type = $4,
                location = $5,
                phone = $6,
                is_available = $7,
                email_notifications = $8,
                last_donated_at = $9,
                push_subscription = $10,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(user.name)
            .bind(user.role)
            .bind(user.blood_type)
            .bind(user.location)
            .bind(user.phone)
            .bind(user.is_available)
            .bind(user.email_notifications)
            .bind(user.last_donated_at)
            .bind(user.push_subscription)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Donors satisfying a [`DonorCriteria`], in storage (creation) order.
pub struct FindDonors {
    pub criteria: DonorCriteria,
}

impl Processor<FindDonors> for DatabaseProcessor {
    type Output = Vec<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindDonors")]
    async fn process(&self, query: FindDonors) -> Result<Vec<User>, sqlx::Error> {
        let criteria = query.criteria;
        let mut builder = sqlx::QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_available = TRUE"
        ));
        if let Some(excluded) = criteria.exclude_user_id {
            builder.push(" AND id <> ").push_bind(excluded);
        }
        if let Some(blood_type) = criteria.blood_type {
            builder.push(" AND blood_type = ").push_bind(blood_type);
        }
        if let Some(location) = criteria.location {
            builder
                .push(" AND location ILIKE ")
                .push_bind(format!("%{}%", escape_like(&location)));
        }
        builder
            .push(" AND (last_donated_at IS NULL OR last_donated_at < ")
            .push_bind(criteria.donated_before)
            .push(") ORDER BY created_at");

        builder.build_query_as::<User>().fetch_all(&self.pool).await
    }
}

/// Escape `LIKE` metacharacters so user input is matched literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn donor(blood_type: BloodType, location: &str) -> User {
        let at = datetime!(2023-01-01 00:00 UTC);
        User {
            id: Uuid::now_v7(),
            name: "Donor".into(),
            email: "donor@example.com".into(),
            password_hash: String::new(),
            role: UserRole::Donor,
            blood_type: Some(blood_type),
            location: Some(location.into()),
            phone: None,
            is_available: true,
            email_notifications: true,
            last_donated_at: None,
            push_subscription: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn criteria() -> DonorCriteria {
        DonorCriteria {
            blood_type: Some(BloodType::ONegative),
            exclude_user_id: None,
            location: None,
            donated_before: datetime!(2022-12-01 00:00 UTC),
        }
    }

    #[test]
    fn test_criteria_rejects_unavailable_and_excluded() {
        let mut user = donor(BloodType::ONegative, "Pune");
        assert!(criteria().matches(&user));

        let excluding = DonorCriteria {
            exclude_user_id: Some(user.id),
            ..criteria()
        };
        assert!(!excluding.matches(&user));

        user.is_available = false;
        assert!(!criteria().matches(&user));
    }

    #[test]
    fn test_criteria_cutoff_is_strict() {
        let mut user = donor(BloodType::ONegative, "Pune");
        user.last_donated_at = Some(datetime!(2022-12-01 00:00 UTC));
        assert!(!criteria().matches(&user));
        user.last_donated_at = Some(datetime!(2022-11-30 23:59 UTC));
        assert!(criteria().matches(&user));
    }

    #[test]
    fn test_criteria_location_is_case_insensitive_substring() {
        let user = donor(BloodType::ONegative, "Kothrud, Pune");
        let by_location = DonorCriteria {
            location: Some("pune".into()),
            ..criteria()
        };
        assert!(by_location.matches(&user));
        let elsewhere = DonorCriteria {
            location: Some("Mumbai".into()),
            ..criteria()
        };
        assert!(!elsewhere.matches(&user));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
