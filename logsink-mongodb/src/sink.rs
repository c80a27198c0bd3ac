//! Delivery side of the sink. Resolves the configured target into a database, makes sure the
//! collection exists (capped, if requested) and writes batches of log documents into it. Deciding
//! *when* to flush is left to the caller, which reads the policy from [`Sink::batch_posting_limit`]
//! and [`Sink::batch_period`].

use std::time::Duration;

use mongodb::bson::{Document, doc};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

use crate::config::{CappedCollection, MongoUrl, SinkConfig, TargetLocator};
use crate::{Error, Result};

/// Server error code returned by `createCollection` when the collection already exists.
const NAMESPACE_EXISTS: i32 = 48;

pub struct Sink {
    collection: Collection<Document>,
    batch_posting_limit: usize,
    batch_period: Duration,
}

/// Connects to the configured target and provisions the collection.
pub async fn new_sink(config: SinkConfig) -> Result<Sink> {
    let database = match config.target() {
        TargetLocator::Database(database) => database.clone(),
        TargetLocator::Url(url) => connect(url).await?,
    };

    provision_collection(
        &database,
        config.collection_name(),
        config.collection_creation_options(),
    )
    .await?;

    Ok(Sink {
        collection: database.collection(config.collection_name()),
        batch_posting_limit: config.batch_posting_limit(),
        batch_period: config.batch_period(),
    })
}

async fn connect(url: &MongoUrl) -> Result<Database> {
    let Some(database_name) = url.database() else {
        return Err(Error::InvalidConfiguration(format!(
            "connection string {url} does not name a database"
        )));
    };

    let client = Client::with_uri_str(url.connection_string()).await?;
    info!(%url, database = database_name, "Created MongoDB client");
    Ok(client.database(database_name))
}

/// Creates `collection_name` if it does not exist yet, as a capped collection when `capped` is
/// given. An existing collection is left as it is, even if it is not capped.
pub async fn provision_collection(
    database: &Database,
    collection_name: &str,
    capped: Option<&CappedCollection>,
) -> Result<()> {
    let existing = database
        .list_collection_names()
        .filter(doc! { "name": collection_name })
        .await?;
    if existing.iter().any(|name| name == collection_name) {
        debug!(
            database = database.name(),
            collection = collection_name,
            "Collection already exists"
        );
        return Ok(());
    }

    let created = match capped {
        Some(capped) => {
            database
                .create_collection(collection_name)
                .with_options(capped.to_create_options())
                .await
        }
        None => database.create_collection(collection_name).await,
    };

    match created {
        Ok(()) => {
            info!(
                database = database.name(),
                collection = collection_name,
                ?capped,
                "Created collection"
            );
            Ok(())
        }
        // created concurrently by another writer
        Err(e) if matches!(*e.kind, ErrorKind::Command(ref cmd) if cmd.code == NAMESPACE_EXISTS) => {
            Ok(())
        }
        Err(e) => Err(Error::Mongo(e)),
    }
}

impl Sink {
    /// Writes one flush worth of documents, in chunks of at most the batch posting limit.
    /// Returns the number of inserted documents.
    pub async fn sink_documents(&self, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let chunk_size = match self.batch_posting_limit {
            0 => documents.len(),
            limit => limit,
        };

        let mut written = 0;
        for chunk in documents.chunks(chunk_size) {
            let result = self.collection.insert_many(chunk).await?;
            written += result.inserted_ids.len();
        }

        debug!(
            collection = self.collection.name(),
            written, "Flushed log documents"
        );
        Ok(written)
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    pub fn batch_posting_limit(&self) -> usize {
        self.batch_posting_limit
    }

    pub fn batch_period(&self) -> Duration {
        self.batch_period
    }
}
