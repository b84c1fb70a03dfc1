use std::sync::Arc;

use log::{error, info};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use rocket::fairing::AdHoc;

pub mod store;

pub use store::MongoStore;

pub const USERS: &str = "users";
pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const PAYMENTS: &str = "payments";

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                let store: DbConn = Arc::new(MongoStore::new(database));
                rocket.manage(store)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(doc! {"ping": 1}, None)
        .await?;

    let database = client.database(&crate::config::Config::mongodb_database());
    ensure_indexes(&database).await?;
    Ok(database)
}

/// One subscription per user and one payment per gateway order.
async fn ensure_indexes(database: &Database) -> Result<(), mongodb::error::Error> {
    let unique = || IndexOptions::builder().unique(true).build();

    database
        .collection::<mongodb::bson::Document>(SUBSCRIPTIONS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    database
        .collection::<mongodb::bson::Document>(PAYMENTS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "order_id": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    database
        .collection::<mongodb::bson::Document>(PAYMENTS)
        .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).build(), None)
        .await?;

    Ok(())
}

pub type DbConn = Arc<MongoStore>;
