use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use log::{debug, info, warn};
use mongodb::{
    bson::{doc, Document},
    error::UNKNOWN_TRANSACTION_COMMIT_RESULT,
    options::{Collation, CollationStrength, IndexOptions},
    Client, ClientSession, Collection, IndexModel,
};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{
    agency::{Branch, Role},
    geo::{City, Country, State},
    reference::{Bank, Fair, Hotel, Package, Sector, Service},
};
use crate::resource::Resource;

/// How long a transaction keeps retrying after transient errors.
const TRANSACTION_RETRY_BUDGET: Duration = Duration::from_secs(120);
const INITIAL_BACKOFF_MS: f64 = 5.0;
const MAX_BACKOFF_MS: f64 = 500.0;
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Collection names.
pub mod collections {
    pub const AGENCIES: &str = "agencies";
    pub const BRANCHES: &str = "branches";
    pub const ROLES: &str = "roles";
    pub const USERS: &str = "users";
    pub const CLIENTS: &str = "clients";
    pub const FAMILY_FRIENDS: &str = "family_friends";
    pub const COUNTRIES: &str = "countries";
    pub const STATES: &str = "states";
    pub const CITIES: &str = "cities";
    pub const BANKS: &str = "banks";
    pub const HOTELS: &str = "hotels";
    pub const SECTORS: &str = "sectors";
    pub const SERVICES: &str = "services";
    pub const FAIRS: &str = "fairs";
    pub const PACKAGES: &str = "packages";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const BOOKINGS: &str = "bookings";
    pub const TOUR_BOOKING_DETAILS: &str = "tour_booking_details";
    pub const GROUP_BOOKINGS: &str = "group_bookings";
    pub const GROUP_CLIENT_BOOKINGS: &str = "group_client_bookings";
    pub const HOTEL_BOOKINGS: &str = "hotel_bookings";
    pub const JOURNEY_BOOKINGS: &str = "journey_bookings";
    pub const VEHICLE_BOOKINGS: &str = "vehicle_bookings";
    pub const VEHICLE_ITINERARIES: &str = "vehicle_itineraries";
    pub const VEHICLE_HOTEL_BOOKINGS: &str = "vehicle_hotel_bookings";
    pub const RECEIPTS: &str = "booking_receipts";
    pub const INVOICES: &str = "invoices";
    pub const FOLLOW_UPS: &str = "follow_ups";
    pub const COUNTERS: &str = "counters";
}

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db_name: String,
}

impl MongoDB {
    /// Builds the handle. The driver connects lazily, so this does not touch the server.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, mongodb::error::Error> {
        let client_options = mongodb::options::ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        Ok(MongoDB {
            client,
            db_name: db_name.to_string(),
        })
    }

    pub fn collection<T>(&self, name: &str) -> Collection<T> {
        self.client.database(&self.db_name).collection(name)
    }

    pub fn documents(&self, name: &str) -> Collection<Document> {
        self.collection(name)
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    /// Runs `op` inside a transaction, retrying the whole unit on transient errors.
    ///
    /// Writers that touch the same document (a counter, typically) conflict
    /// instead of queueing, so the loop backs off with jitter and keeps going
    /// until [`TRANSACTION_RETRY_BUDGET`] is spent.
    ///
    /// The closure receives the session and must do every write through it.
    pub async fn with_transaction<T, F>(&self, mut op: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut ClientSession) -> BoxFuture<'s, Result<T, AppError>>,
    {
        let started = Instant::now();
        let mut attempt = 1;
        loop {
            let mut session = self.client.start_session(None).await?;
            session.start_transaction(None).await?;

            let outcome = match op(&mut session).await {
                Ok(value) => commit(&mut session).await.map(|()| value),
                Err(e) => {
                    if let Err(abort) = session.abort_transaction().await {
                        warn!("Failed to abort transaction: {abort}");
                    }
                    Err(e)
                }
            };

            match outcome {
                Err(e) if e.is_transient() && started.elapsed() < TRANSACTION_RETRY_BUDGET => {
                    let delay = backoff(attempt);
                    debug!("Transient transaction error, retrying in {delay:?} (attempt {attempt}): {e}");
                    actix_web::rt::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    warn!("Transaction gave up after {attempt} attempts: {e}");
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        self.ensure_resource_index::<Country>().await?;
        self.ensure_resource_index::<State>().await?;
        self.ensure_resource_index::<City>().await?;
        self.ensure_resource_index::<Bank>().await?;
        self.ensure_resource_index::<Hotel>().await?;
        self.ensure_resource_index::<Sector>().await?;
        self.ensure_resource_index::<Service>().await?;
        self.ensure_resource_index::<Fair>().await?;
        self.ensure_resource_index::<Package>().await?;
        self.ensure_resource_index::<Branch>().await?;
        self.ensure_resource_index::<Role>().await?;

        self.create_index(collections::USERS, doc! { "email": 1 }, true).await?;
        self.create_index(collections::AGENCIES, doc! { "email": 1 }, true).await?;
        self.create_index(collections::CLIENTS, doc! { "agency_id": 1, "name": 1 }, false)
            .await?;

        for (collection, field) in [
            (collections::BOOKINGS, "booking_number"),
            (collections::GROUP_BOOKINGS, "booking_number"),
            (collections::HOTEL_BOOKINGS, "hrv_number"),
            (collections::VEHICLE_BOOKINGS, "hrv_number"),
            (collections::RECEIPTS, "receipt_number"),
            (collections::INVOICES, "invoice_number"),
        ] {
            self.create_index(collection, doc! { "agency_id": 1, field: 1 }, true)
                .await?;
        }
        self.create_index(collections::SUBSCRIPTIONS, doc! { "invoice_number": 1 }, true)
            .await?;

        for (collection, parent) in [
            (collections::FAMILY_FRIENDS, "client_id"),
            (collections::TOUR_BOOKING_DETAILS, "booking_id"),
            (collections::GROUP_CLIENT_BOOKINGS, "group_booking_id"),
            (collections::VEHICLE_ITINERARIES, "vehicle_booking_id"),
            (collections::VEHICLE_HOTEL_BOOKINGS, "vehicle_booking_id"),
            (collections::FOLLOW_UPS, "booking_id"),
        ] {
            self.create_index(collection, doc! { parent: 1 }, false).await?;
        }

        info!("Database indexes ensured");
        Ok(())
    }

    async fn ensure_resource_index<T: Resource>(&self) -> Result<(), AppError> {
        let mut keys = Document::new();
        if T::SCOPE.is_agency() {
            keys.insert("agency_id", 1);
        }
        for field in T::UNIQUE_WITHIN {
            keys.insert(*field, 1);
        }
        keys.insert(T::UNIQUE_FIELD, 1);
        self.create_index_with(T::COLLECTION, keys, name_index_options())
            .await
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        unique: bool,
    ) -> Result<(), AppError> {
        let options = IndexOptions::builder().unique(unique).build();
        self.create_index_with(collection, keys, options).await
    }

    async fn create_index_with(
        &self,
        collection: &str,
        keys: Document,
        options: IndexOptions,
    ) -> Result<(), AppError> {
        let model = IndexModel::builder().keys(keys).options(options).build();
        self.documents(collection).create_index(model, None).await?;
        Ok(())
    }

    /// Creates the platform administrator account if configured and absent.
    pub async fn seed_platform_admin(&self, config: &Config) -> Result<(), AppError> {
        let (Some(email), Some(password)) = (
            config.platform_admin_email.as_deref(),
            config.platform_admin_password.as_deref(),
        ) else {
            info!("No platform admin configured, skipping seed");
            return Ok(());
        };

        let users = self.documents(collections::USERS);
        if users.find_one(doc! { "email": email }, None).await?.is_some() {
            return Ok(());
        }

        let hashed = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        let now = mongodb::bson::DateTime::now();
        users
            .insert_one(
                doc! {
                    "agency_id": null,
                    "branch_id": null,
                    "role_id": null,
                    "name": "Platform Admin",
                    "email": email,
                    "phone": null,
                    "password": hashed,
                    "platform_admin": true,
                    "active": true,
                    "created_at": now,
                    "updated_at": now,
                },
                None,
            )
            .await?;
        info!("Seeded platform admin {email}");
        Ok(())
    }
}

/// Unique and case-insensitive, matching the pre-check in
/// [`ensure_unique`](super::repository::ensure_unique).
fn name_index_options() -> IndexOptions {
    let collation = Collation::builder()
        .locale("en")
        .strength(CollationStrength::Secondary)
        .build();
    IndexOptions::builder().unique(true).collation(collation).build()
}

/// Exponential backoff capped at [`MAX_BACKOFF_MS`], jittered to half..full.
fn backoff(attempt: u32) -> Duration {
    let base = (INITIAL_BACKOFF_MS * 2f64.powi(attempt.min(16) as i32)).min(MAX_BACKOFF_MS);
    let jittered = base * (0.5 + rand::random::<f64>() / 2.0);
    Duration::from_millis(jittered as u64)
}

async fn commit(session: &mut ClientSession) -> Result<(), AppError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_COMMIT_ATTEMPTS =>
            {
                warn!("Unknown commit result, retrying commit: {e}");
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Collects a cursor into a vector.
pub async fn collect<T>(mut cursor: mongodb::Cursor<T>) -> Result<Vec<T>, AppError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    use futures::StreamExt;

    let mut items = Vec::new();
    while let Some(item) = cursor.next().await {
        items.push(item?);
    }
    Ok(items)
}

/// Collects a session cursor into a vector.
pub async fn collect_with_session<T>(
    mut cursor: mongodb::SessionCursor<T>,
    session: &mut ClientSession,
) -> Result<Vec<T>, AppError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(item) = cursor.next(session).await {
        items.push(item?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_indexes_ignore_case() {
        let options = name_index_options();
        assert_eq!(options.unique, Some(true));
        let collation = options.collation.unwrap();
        assert_eq!(collation.locale, "en");
        assert!(matches!(collation.strength, Some(CollationStrength::Secondary)));
    }

    #[test]
    fn backoff_grows_and_stays_capped() {
        for _ in 0..50 {
            let first = backoff(1);
            assert!(first >= Duration::from_millis(5) && first <= Duration::from_millis(10));
            let late = backoff(40);
            assert!(late >= Duration::from_millis(250) && late <= Duration::from_millis(500));
        }
    }
}
