//! SurrealDB implementation of the credential and catalog stores
//!
//! Record ids are plain strings (`users:<id>`); queries project them back
//! with `meta::id(id)`. Conditional writes are single `UPDATE ... WHERE`
//! statements whose affected rows are counted in the same query.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use estate_core::{
    CatalogStore, DatabaseConfig, EstateError, HouseDetails, Page, ProfileUpdate, Property,
    PropertyFilter, PropertyKind, PropertyType, Recipient, RefreshTokenEntry, Region, Result,
    Role, User, UserStore,
};
use serde::{Deserialize, Serialize};
use surrealdb::engine::remote::ws::{Client, Ws, Wss};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

const USER_FIELDS: &str = "meta::id(id) AS id, first_name, last_name, email, phone, role, \
    password_hash, email_verified, verification_token, reset_password_token, \
    reset_password_expires, refresh_tokens, favorites, created_at, updated_at";

const REGION_FIELDS: &str = "meta::id(id) AS id, city, image, created_at, updated_at";

const PROPERTY_FIELDS: &str = "meta::id(id) AS id, name, description, location, price, sqft, \
    images, region, property_type, beds, baths, furnished, property_details, features, \
    created_at, updated_at";

/// SurrealDB-backed store
#[derive(Clone)]
pub struct SurrealStore {
    client: Surreal<Client>,
}

fn db_error(context: &str, e: surrealdb::Error) -> EstateError {
    let message = e.to_string();
    if message.contains("already contains") {
        EstateError::Conflict(format!("{context}: duplicate value"))
    } else {
        EstateError::DatabaseError(format!("{context}: {message}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Ws,
    Wss,
}

/// Split a database URL into its transport and the bare address the
/// websocket engines expect. Anything without `wss://` is plain `ws`.
fn endpoint(url: &str) -> (Transport, &str) {
    match url.strip_prefix("wss://") {
        Some(address) => (Transport::Wss, address),
        None => (Transport::Ws, url.strip_prefix("ws://").unwrap_or(url)),
    }
}

impl SurrealStore {
    /// Connect, authenticate and select the namespace and database
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let (transport, address) = endpoint(&config.url);
        let connected = match transport {
            Transport::Ws => Surreal::new::<Ws>(address).await,
            Transport::Wss => Surreal::new::<Wss>(address).await,
        };
        let client = connected
            .map_err(|e| EstateError::DatabaseError(format!("SurrealDB connection failed: {e}")))?;

        client
            .signin(Root {
                username: &config.user,
                password: &config.pass,
            })
            .await
            .map_err(|e| EstateError::DatabaseError(format!("SurrealDB auth failed: {e}")))?;

        client
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| EstateError::DatabaseError(format!("SurrealDB namespace error: {e}")))?;

        tracing::info!(
            namespace = %config.namespace,
            database = %config.database,
            "Connected to SurrealDB"
        );

        Ok(Self { client })
    }

    /// Define tables and unique indexes (idempotent)
    pub async fn init_schema(&self) -> Result<()> {
        self.client
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS users SCHEMALESS;
                DEFINE FIELD IF NOT EXISTS email ON users TYPE string ASSERT string::is::email($value);
                DEFINE FIELD IF NOT EXISTS role ON users TYPE string ASSERT $value IN ['user', 'admin'];
                DEFINE FIELD IF NOT EXISTS email_verified ON users TYPE bool DEFAULT false;
                DEFINE FIELD IF NOT EXISTS favorites ON users TYPE array<string> DEFAULT [];
                DEFINE FIELD IF NOT EXISTS refresh_tokens ON users TYPE array<object> DEFAULT [];
                DEFINE INDEX IF NOT EXISTS users_email ON users FIELDS email UNIQUE;
                DEFINE INDEX IF NOT EXISTS users_verification ON users FIELDS verification_token;

                DEFINE TABLE IF NOT EXISTS regions SCHEMALESS;
                DEFINE FIELD IF NOT EXISTS city ON regions TYPE string;
                DEFINE INDEX IF NOT EXISTS regions_city ON regions FIELDS city UNIQUE;

                DEFINE TABLE IF NOT EXISTS properties SCHEMALESS;
                DEFINE FIELD IF NOT EXISTS property_type ON properties TYPE string ASSERT $value IN ['House', 'Land'];
                DEFINE FIELD IF NOT EXISTS price ON properties TYPE number;
                DEFINE FIELD IF NOT EXISTS images ON properties TYPE array<string>;
                DEFINE INDEX IF NOT EXISTS properties_region ON properties FIELDS region;
            "#,
            )
            .await
            .and_then(|response| response.check())
            .map_err(|e| EstateError::DatabaseError(format!("Schema init failed: {e}")))?;

        tracing::info!("SurrealDB schema initialised");
        Ok(())
    }

    /// Execute a query with bound parameters, surfacing statement errors
    async fn run(
        &self,
        context: &str,
        query: String,
        binds: Vec<(&'static str, serde_json::Value)>,
    ) -> Result<surrealdb::Response> {
        let mut request = self.client.query(query);
        for bind in binds {
            request = request.bind(bind);
        }

        request
            .await
            .and_then(|response| response.check())
            .map_err(|e| db_error(context, e))
    }

    /// Run a query whose statement at `index` returns an affected-row count
    async fn affected(
        &self,
        context: &str,
        query: String,
        binds: Vec<(&'static str, serde_json::Value)>,
        index: usize,
    ) -> Result<usize> {
        let mut result = self.run(context, query, binds).await?;

        let count: Option<usize> = result.take(index).map_err(|e| db_error(context, e))?;
        Ok(count.unwrap_or(0))
    }

    async fn select_users(
        &self,
        context: &str,
        query: String,
        binds: Vec<(&'static str, serde_json::Value)>,
        index: usize,
    ) -> Result<Vec<User>> {
        let mut result = self.run(context, query, binds).await?;

        let docs: Vec<UserDocument> = result.take(index).map_err(|e| db_error(context, e))?;
        Ok(docs.into_iter().map(User::from).collect())
    }

    async fn select_properties(
        &self,
        context: &str,
        query: String,
        binds: Vec<(&'static str, serde_json::Value)>,
        index: usize,
    ) -> Result<Vec<Property>> {
        let mut result = self.run(context, query, binds).await?;

        let records: Vec<PropertyRecord> =
            result.take(index).map_err(|e| db_error(context, e))?;
        records.into_iter().map(Property::try_from).collect()
    }

    async fn select_regions(
        &self,
        context: &str,
        query: String,
        binds: Vec<(&'static str, serde_json::Value)>,
        index: usize,
    ) -> Result<Vec<Region>> {
        let mut result = self.run(context, query, binds).await?;

        let records: Vec<RegionRecord> = result.take(index).map_err(|e| db_error(context, e))?;
        Ok(records.into_iter().map(Region::from).collect())
    }
}

fn json<T: Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

// ============================================================================
// Records
// ============================================================================

/// Stored form of a user. The record id lives outside the content.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(default, skip_serializing)]
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    role: Role,
    password_hash: String,
    email_verified: bool,
    #[serde(default)]
    verification_token: Option<String>,
    #[serde(default)]
    reset_password_token: Option<String>,
    #[serde(default)]
    reset_password_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    refresh_tokens: Vec<RefreshTokenEntry>,
    #[serde(default)]
    favorites: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<User> for UserDocument {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            password_hash: user.password_hash,
            email_verified: user.email_verified,
            verification_token: user.verification_token,
            reset_password_token: user.reset_password_token,
            reset_password_expires: user.reset_password_expires,
            refresh_tokens: user.refresh_tokens,
            favorites: user.favorites,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        Self {
            id: doc.id,
            first_name: doc.first_name,
            last_name: doc.last_name,
            email: doc.email,
            phone: doc.phone,
            role: doc.role,
            password_hash: doc.password_hash,
            email_verified: doc.email_verified,
            verification_token: doc.verification_token,
            reset_password_token: doc.reset_password_token,
            reset_password_expires: doc.reset_password_expires,
            refresh_tokens: doc.refresh_tokens,
            favorites: doc.favorites,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegionRecord {
    #[serde(default, skip_serializing)]
    id: String,
    city: String,
    image: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Region> for RegionRecord {
    fn from(region: &Region) -> Self {
        Self {
            id: region.id.clone(),
            city: region.city.clone(),
            image: region.image.clone(),
            created_at: region.created_at,
            updated_at: region.updated_at,
        }
    }
}

impl From<RegionRecord> for Region {
    fn from(record: RegionRecord) -> Self {
        Self {
            id: record.id,
            city: record.city,
            image: record.image,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Flat stored form of a property; house-only columns are absent on land.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PropertyRecord {
    #[serde(default, skip_serializing)]
    id: String,
    name: String,
    description: String,
    location: String,
    price: f64,
    sqft: f64,
    images: Vec<String>,
    region: String,
    property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    beds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    baths: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    furnished: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    property_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    features: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Property> for PropertyRecord {
    fn from(property: &Property) -> Self {
        let mut record = Self {
            id: property.id.clone(),
            name: property.name.clone(),
            description: property.description.clone(),
            location: property.location.clone(),
            price: property.price,
            sqft: property.sqft,
            images: property.images.clone(),
            region: property.region.clone(),
            property_type: property.property_type(),
            beds: None,
            baths: None,
            furnished: None,
            property_details: None,
            features: None,
            created_at: property.created_at,
            updated_at: property.updated_at,
        };

        if let PropertyKind::House(house) = &property.kind {
            record.beds = Some(house.beds);
            record.baths = Some(house.baths);
            record.furnished = Some(house.furnished);
            record.property_details = Some(house.property_details.clone());
            record.features = Some(house.features.clone());
        }

        record
    }
}

impl TryFrom<PropertyRecord> for Property {
    type Error = EstateError;

    fn try_from(record: PropertyRecord) -> Result<Self> {
        let kind = match record.property_type {
            PropertyType::Land => PropertyKind::Land,
            PropertyType::House => {
                let incomplete = || {
                    EstateError::DatabaseError(format!(
                        "house {} is missing house attributes",
                        record.id
                    ))
                };
                PropertyKind::House(HouseDetails {
                    beds: record.beds.ok_or_else(incomplete)?,
                    baths: record.baths.ok_or_else(incomplete)?,
                    furnished: record.furnished.unwrap_or(false),
                    property_details: record.property_details.clone().unwrap_or_default(),
                    features: record.features.clone().unwrap_or_default(),
                })
            }
        };

        Ok(Property {
            id: record.id,
            name: record.name,
            description: record.description,
            location: record.location,
            price: record.price,
            sqft: record.sqft,
            images: record.images,
            region: record.region,
            kind,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Total {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct EdgeOutcome {
    exists: usize,
    changed: usize,
}

#[derive(Debug, Deserialize)]
struct RecipientRow {
    email: String,
    first_name: String,
    last_name: String,
}

fn property_conditions(filter: &PropertyFilter) -> (String, Vec<(&'static str, serde_json::Value)>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    if let Some(region) = &filter.region {
        clauses.push("region = $region");
        binds.push(("region", json(region)));
    }
    if let Some(kind) = filter.property_type {
        clauses.push("property_type = $property_type");
        binds.push(("property_type", json(kind.as_str())));
    }
    if let Some(min) = filter.min_price {
        clauses.push("price >= $min_price");
        binds.push(("min_price", json(min)));
    }
    if let Some(max) = filter.max_price {
        clauses.push("price <= $max_price");
        binds.push(("max_price", json(max)));
    }

    let conditions = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (conditions, binds)
}

// ============================================================================
// Credential store
// ============================================================================

#[async_trait]
impl UserStore for SurrealStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(EstateError::Conflict("email already registered".to_string()));
        }

        let id = user.id.clone();
        self.client
            .query("CREATE type::thing('users', $id) CONTENT $data")
            .bind(("id", id))
            .bind(("data", UserDocument::from(user.clone())))
            .await
            .and_then(|response| response.check())
            .map_err(|e| db_error("create user", e))?;

        Ok(user)
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        let users = self
            .select_users(
                "find user",
                format!("SELECT {USER_FIELDS} FROM type::thing('users', $id)"),
                vec![("id", json(id))],
                0,
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self
            .select_users(
                "find user by email",
                format!("SELECT {USER_FIELDS} FROM users WHERE email = $email LIMIT 1"),
                vec![("email", json(email.trim().to_lowercase()))],
                0,
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<User>> {
        let mut sets = vec!["updated_at = $now"];
        let mut binds = vec![("id", json(id)), ("now", json(Utc::now()))];

        if let Some(first_name) = &update.first_name {
            sets.push("first_name = $first_name");
            binds.push(("first_name", json(first_name)));
        }
        if let Some(last_name) = &update.last_name {
            sets.push("last_name = $last_name");
            binds.push(("last_name", json(last_name)));
        }
        if let Some(phone) = &update.phone {
            sets.push("phone = $phone");
            binds.push(("phone", json(phone)));
        }

        let query = format!(
            "LET $u = (UPDATE type::thing('users', $id) SET {}); SELECT {USER_FIELDS} FROM $u;",
            sets.join(", ")
        );
        let users = self.select_users("update profile", query, binds, 1).await?;
        Ok(users.into_iter().next())
    }

    async fn set_password(&self, id: &str, password_hash: &str) -> Result<()> {
        let changed = self
            .affected(
                "set password",
                "LET $u = (UPDATE type::thing('users', $id) SET password_hash = $hash, updated_at = $now); \
                 RETURN array::len($u);"
                    .to_string(),
                vec![
                    ("id", json(id)),
                    ("hash", json(password_hash)),
                    ("now", json(Utc::now())),
                ],
                1,
            )
            .await?;

        if changed == 0 {
            return Err(EstateError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<()> {
        let changed = self
            .affected(
                "set role",
                "LET $u = (UPDATE type::thing('users', $id) SET role = $role, updated_at = $now); \
                 RETURN array::len($u);"
                    .to_string(),
                vec![
                    ("id", json(id)),
                    ("role", json(role.as_str())),
                    ("now", json(Utc::now())),
                ],
                1,
            )
            .await?;

        if changed == 0 {
            return Err(EstateError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn redeem_verification_token(&self, token: &str) -> Result<Option<User>> {
        let query = format!(
            "LET $u = (UPDATE users SET email_verified = true, verification_token = NONE, \
             updated_at = $now WHERE verification_token = $token); \
             SELECT {USER_FIELDS} FROM $u;"
        );
        let users = self
            .select_users(
                "verify email",
                query,
                vec![("token", json(token)), ("now", json(Utc::now()))],
                1,
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let changed = self
            .affected(
                "set reset token",
                "LET $u = (UPDATE type::thing('users', $id) SET reset_password_token = $hash, \
                 reset_password_expires = $expires); RETURN array::len($u);"
                    .to_string(),
                vec![
                    ("id", json(id)),
                    ("hash", json(token_hash)),
                    ("expires", json(expires_at)),
                ],
                1,
            )
            .await?;

        if changed == 0 {
            return Err(EstateError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let users = self
            .select_users(
                "find user by reset token",
                format!(
                    "SELECT {USER_FIELDS} FROM users WHERE reset_password_token = $hash \
                     AND <datetime> reset_password_expires > <datetime> $now LIMIT 1"
                ),
                vec![("hash", json(token_hash)), ("now", json(now))],
                0,
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let query = format!(
            "LET $u = (UPDATE users SET password_hash = $password, reset_password_token = NONE, \
             reset_password_expires = NONE, refresh_tokens = [], updated_at = $now \
             WHERE reset_password_token = $hash \
             AND <datetime> reset_password_expires > <datetime> $now); \
             SELECT {USER_FIELDS} FROM $u;"
        );
        let users = self
            .select_users(
                "reset password",
                query,
                vec![
                    ("hash", json(token_hash)),
                    ("password", json(password_hash)),
                    ("now", json(now)),
                ],
                1,
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn push_refresh_token(
        &self,
        id: &str,
        entry: RefreshTokenEntry,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let changed = self
            .affected(
                "store refresh token",
                "LET $u = (UPDATE type::thing('users', $id) SET refresh_tokens = array::append(\
                 refresh_tokens[WHERE <datetime> expires_at > <datetime> $now], $entry)); \
                 RETURN array::len($u);"
                    .to_string(),
                vec![
                    ("id", json(id)),
                    ("entry", json(entry)),
                    ("now", json(now)),
                ],
                1,
            )
            .await?;

        if changed == 0 {
            return Err(EstateError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn take_refresh_token(&self, id: &str, token_hash: &str) -> Result<bool> {
        let changed = self
            .affected(
                "revoke refresh token",
                "LET $u = (UPDATE type::thing('users', $id) \
                 SET refresh_tokens = refresh_tokens[WHERE token_hash != $hash] \
                 WHERE refresh_tokens.token_hash CONTAINS $hash); \
                 RETURN array::len($u);"
                    .to_string(),
                vec![("id", json(id)), ("hash", json(token_hash))],
                1,
            )
            .await?;
        Ok(changed > 0)
    }

    async fn clear_refresh_tokens(&self, id: &str) -> Result<()> {
        self.client
            .query("UPDATE type::thing('users', $id) SET refresh_tokens = []")
            .bind(("id", id.to_string()))
            .await
            .and_then(|response| response.check())
            .map_err(|e| db_error("clear refresh tokens", e))?;
        Ok(())
    }

    async fn add_favorite(&self, user_id: &str, property_id: &str) -> Result<bool> {
        let mut result = self
            .client
            .query(
                "LET $exists = (SELECT VALUE meta::id(id) FROM type::thing('users', $user)); \
                 LET $u = (UPDATE type::thing('users', $user) SET favorites += $property \
                 WHERE favorites CONTAINSNOT $property); \
                 RETURN { exists: array::len($exists), changed: array::len($u) };",
            )
            .bind(("user", user_id.to_string()))
            .bind(("property", property_id.to_string()))
            .await
            .and_then(|response| response.check())
            .map_err(|e| db_error("add favorite", e))?;

        let outcome: Option<EdgeOutcome> =
            result.take(2).map_err(|e| db_error("add favorite", e))?;
        match outcome {
            Some(o) if o.exists > 0 => Ok(o.changed > 0),
            _ => Err(EstateError::NotFound(format!("user {user_id}"))),
        }
    }

    async fn remove_favorite(&self, user_id: &str, property_id: &str) -> Result<bool> {
        let mut result = self
            .client
            .query(
                "LET $exists = (SELECT VALUE meta::id(id) FROM type::thing('users', $user)); \
                 LET $u = (UPDATE type::thing('users', $user) SET favorites -= $property \
                 WHERE favorites CONTAINS $property); \
                 RETURN { exists: array::len($exists), changed: array::len($u) };",
            )
            .bind(("user", user_id.to_string()))
            .bind(("property", property_id.to_string()))
            .await
            .and_then(|response| response.check())
            .map_err(|e| db_error("remove favorite", e))?;

        let outcome: Option<EdgeOutcome> =
            result.take(2).map_err(|e| db_error("remove favorite", e))?;
        match outcome {
            Some(o) if o.exists > 0 => Ok(o.changed > 0),
            _ => Err(EstateError::NotFound(format!("user {user_id}"))),
        }
    }

    async fn list_broadcast_recipients(&self) -> Result<Vec<Recipient>> {
        let mut result = self
            .client
            .query(
                "SELECT email, first_name, last_name FROM users \
                 WHERE email_verified = true AND role != 'admin'",
            )
            .await
            .map_err(|e| db_error("list recipients", e))?;

        let rows: Vec<RecipientRow> = result
            .take(0)
            .map_err(|e| db_error("list recipients", e))?;

        Ok(rows
            .into_iter()
            .map(|row| Recipient {
                email: row.email,
                name: format!("{} {}", row.first_name, row.last_name),
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .health()
            .await
            .map_err(|e| EstateError::DatabaseError(format!("SurrealDB unhealthy: {e}")))
    }
}

// ============================================================================
// Catalog store
// ============================================================================

#[async_trait]
impl CatalogStore for SurrealStore {
    async fn insert_region(&self, region: Region) -> Result<Region> {
        let taken = self
            .select_regions(
                "find region by city",
                format!("SELECT {REGION_FIELDS} FROM regions WHERE city = $city LIMIT 1"),
                vec![("city", json(&region.city))],
                0,
            )
            .await?;
        if !taken.is_empty() {
            return Err(EstateError::Conflict(format!(
                "region {} already exists",
                region.city
            )));
        }

        self.client
            .query("CREATE type::thing('regions', $id) CONTENT $data")
            .bind(("id", region.id.clone()))
            .bind(("data", RegionRecord::from(&region)))
            .await
            .and_then(|response| response.check())
            .map_err(|e| db_error("create region", e))?;

        Ok(region)
    }

    async fn find_region(&self, id: &str) -> Result<Option<Region>> {
        let regions = self
            .select_regions(
                "find region",
                format!("SELECT {REGION_FIELDS} FROM type::thing('regions', $id)"),
                vec![("id", json(id))],
                0,
            )
            .await?;
        Ok(regions.into_iter().next())
    }

    async fn list_regions(&self) -> Result<Vec<Region>> {
        self.select_regions(
            "list regions",
            format!("SELECT {REGION_FIELDS} FROM regions ORDER BY city"),
            Vec::new(),
            0,
        )
        .await
    }

    async fn update_region(&self, region: &Region) -> Result<()> {
        let taken = self
            .select_regions(
                "find region by city",
                format!(
                    "SELECT {REGION_FIELDS} FROM regions WHERE city = $city \
                     AND meta::id(id) != $id LIMIT 1"
                ),
                vec![("city", json(&region.city)), ("id", json(&region.id))],
                0,
            )
            .await?;
        if !taken.is_empty() {
            return Err(EstateError::Conflict(format!(
                "region {} already exists",
                region.city
            )));
        }

        let changed = self
            .affected(
                "update region",
                "LET $r = (UPDATE type::thing('regions', $id) SET city = $city, image = $image, \
                 updated_at = $updated_at); RETURN array::len($r);"
                    .to_string(),
                vec![
                    ("id", json(&region.id)),
                    ("city", json(&region.city)),
                    ("image", json(&region.image)),
                    ("updated_at", json(region.updated_at)),
                ],
                1,
            )
            .await?;

        if changed == 0 {
            return Err(EstateError::NotFound(format!("region {}", region.id)));
        }
        Ok(())
    }

    async fn delete_region(&self, id: &str) -> Result<Option<Region>> {
        let regions = self
            .select_regions(
                "delete region",
                format!(
                    "LET $r = (DELETE type::thing('regions', $id) RETURN BEFORE); \
                     SELECT {REGION_FIELDS} FROM $r;"
                ),
                vec![("id", json(id))],
                1,
            )
            .await?;
        Ok(regions.into_iter().next())
    }

    async fn insert_property(&self, property: Property) -> Result<Property> {
        self.client
            .query("CREATE type::thing('properties', $id) CONTENT $data")
            .bind(("id", property.id.clone()))
            .bind(("data", PropertyRecord::from(&property)))
            .await
            .and_then(|response| response.check())
            .map_err(|e| db_error("create property", e))?;

        Ok(property)
    }

    async fn find_property(&self, id: &str) -> Result<Option<Property>> {
        let properties = self
            .select_properties(
                "find property",
                format!("SELECT {PROPERTY_FIELDS} FROM type::thing('properties', $id)"),
                vec![("id", json(id))],
                0,
            )
            .await?;
        Ok(properties.into_iter().next())
    }

    async fn find_properties(&self, ids: &[String]) -> Result<Vec<Property>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = self
            .select_properties(
                "find properties",
                format!("SELECT {PROPERTY_FIELDS} FROM properties WHERE meta::id(id) IN $ids"),
                vec![("ids", json(ids))],
                0,
            )
            .await?;

        // Keep the caller's ordering
        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|p| &p.id == id).cloned())
            .collect())
    }

    async fn search_properties(&self, filter: &PropertyFilter) -> Result<Page<Property>> {
        let (conditions, mut binds) = property_conditions(filter);
        binds.push(("limit", json(filter.limit)));
        binds.push(("start", json(filter.offset())));

        let query = format!(
            "SELECT count() AS total FROM properties{conditions} GROUP ALL; \
             SELECT {PROPERTY_FIELDS}, <datetime> created_at AS listed_at FROM properties{conditions} \
             ORDER BY listed_at DESC LIMIT $limit START $start;"
        );

        let mut result = self.run("search properties", query, binds).await?;

        let totals: Vec<Total> = result
            .take(0)
            .map_err(|e| db_error("search properties", e))?;
        let records: Vec<PropertyRecord> = result
            .take(1)
            .map_err(|e| db_error("search properties", e))?;

        let items = records
            .into_iter()
            .map(Property::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total: totals.first().map_or(0, |t| t.total),
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn update_property(&self, property: &Property) -> Result<()> {
        let changed = self
            .affected(
                "update property",
                "LET $p = (UPDATE type::thing('properties', $id) CONTENT $data); \
                 RETURN array::len($p);"
                    .to_string(),
                vec![
                    ("id", json(&property.id)),
                    ("data", json(PropertyRecord::from(property))),
                ],
                1,
            )
            .await?;

        if changed == 0 {
            return Err(EstateError::NotFound(format!("property {}", property.id)));
        }
        Ok(())
    }

    async fn delete_property(&self, id: &str) -> Result<Option<Property>> {
        let properties = self
            .select_properties(
                "delete property",
                format!(
                    "LET $p = (DELETE type::thing('properties', $id) RETURN BEFORE); \
                     SELECT {PROPERTY_FIELDS} FROM $p;"
                ),
                vec![("id", json(id))],
                1,
            )
            .await?;
        Ok(properties.into_iter().next())
    }

    async fn count_properties_in_region(&self, region_id: &str) -> Result<u64> {
        let mut result = self
            .client
            .query("SELECT count() AS total FROM properties WHERE region = $region GROUP ALL")
            .bind(("region", region_id.to_string()))
            .await
            .map_err(|e| db_error("count properties", e))?;

        let totals: Vec<Total> = result
            .take(0)
            .map_err(|e| db_error("count properties", e))?;
        Ok(totals.first().map_or(0, |t| t.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house() -> Property {
        let now = Utc::now();
        Property {
            id: "p1".to_string(),
            name: "Villa".to_string(),
            description: "Sea view".to_string(),
            location: "Ikoyi".to_string(),
            price: 250_000.0,
            sqft: 320.0,
            images: vec!["https://img/1.jpg".to_string()],
            region: "r1".to_string(),
            kind: PropertyKind::House(HouseDetails {
                beds: 4,
                baths: 3,
                furnished: true,
                property_details: "Detached".to_string(),
                features: "pool,garden".to_string(),
            }),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_endpoint_keeps_tls_scheme() {
        assert_eq!(
            endpoint("wss://db.example.com"),
            (Transport::Wss, "db.example.com")
        );
        assert_eq!(
            endpoint("ws://localhost:8000"),
            (Transport::Ws, "localhost:8000")
        );
        assert_eq!(endpoint("localhost:8000"), (Transport::Ws, "localhost:8000"));
    }

    #[test]
    fn test_house_record_conversion() {
        let property = house();
        let record = PropertyRecord::from(&property);
        assert_eq!(record.beds, Some(4));

        let back = Property::try_from(record).unwrap();
        assert_eq!(back.kind, property.kind);
    }

    #[test]
    fn test_land_record_omits_house_columns() {
        let mut property = house();
        property.kind = PropertyKind::Land;

        let value = serde_json::to_value(PropertyRecord::from(&property)).unwrap();
        assert_eq!(value["property_type"], "Land");
        assert!(value.get("beds").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_incomplete_house_record_is_rejected() {
        let mut record = PropertyRecord::from(&house());
        record.beds = None;
        assert!(matches!(
            Property::try_from(record),
            Err(EstateError::DatabaseError(_))
        ));
    }

    #[test]
    fn test_property_conditions() {
        let (conditions, binds) = property_conditions(&PropertyFilter {
            region: Some("r1".to_string()),
            max_price: Some(10.0),
            ..Default::default()
        });
        assert_eq!(conditions, " WHERE region = $region AND price <= $max_price");
        assert_eq!(binds.len(), 2);

        let (conditions, _) = property_conditions(&PropertyFilter::default());
        assert!(conditions.is_empty());
    }

    async fn connect() -> SurrealStore {
        let config = DatabaseConfig {
            namespace: "estate_test".to_string(),
            database: format!("t{}", uuid::Uuid::new_v4().simple()),
            ..Default::default()
        };
        let store = SurrealStore::new(&config).await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore = "requires SurrealDB"]
    async fn test_favorites_are_idempotent() {
        let store = connect().await;
        let user = User::new(
            "u1".to_string(),
            "Ada".to_string(),
            "Obi".to_string(),
            "ada@example.com",
            "0800".to_string(),
            "hash".to_string(),
        );
        store.insert_user(user).await.unwrap();

        assert!(store.add_favorite("u1", "p1").await.unwrap());
        assert!(!store.add_favorite("u1", "p1").await.unwrap());
        assert!(store.remove_favorite("u1", "p1").await.unwrap());
        assert!(!store.remove_favorite("u1", "p1").await.unwrap());
        assert!(store.add_favorite("ghost", "p1").await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires SurrealDB"]
    async fn test_property_round_trip_and_search() {
        let store = connect().await;
        store.insert_property(house()).await.unwrap();

        let found = store.find_property("p1").await.unwrap().unwrap();
        assert_eq!(found.kind, house().kind);

        let page = store
            .search_properties(&PropertyFilter {
                property_type: Some(PropertyType::House),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        assert!(store.delete_property("p1").await.unwrap().is_some());
        assert!(store.find_property("p1").await.unwrap().is_none());
    }
}
