//! Sink configuration: a mutable [`SinkConfigBuilder`] that is validated once into an immutable
//! [`SinkConfig`].

use std::fmt;
use std::time::Duration;

use mongodb::Database;
use mongodb::options::{ConnectionString, CreateCollectionOptions};
use tracing::debug;

use crate::resolver::ConnectionStringResolver;
use crate::{Error, Result};

pub const DEFAULT_COLLECTION_NAME: &str = "logs";
pub const DEFAULT_BATCH_POSTING_LIMIT: usize = 50;
pub const DEFAULT_BATCH_PERIOD: Duration = Duration::from_secs(2);
pub const DEFAULT_CAPPED_MAX_SIZE_MB: u64 = 50;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Where the log documents are delivered. Exactly one of the two is ever held.
#[derive(Debug, Clone)]
pub enum TargetLocator {
    /// An externally owned handle to an already connected database.
    Database(Database),
    /// A parsed connection URL; the client is created by the sink.
    Url(MongoUrl),
}

/// A MongoDB connection string that has been checked by the driver's parser.
#[derive(Clone, PartialEq)]
pub struct MongoUrl {
    raw: String,
    database: Option<String>,
}

impl MongoUrl {
    /// Parses `raw` with the driver's connection string parser. Parse errors are returned as-is
    /// in [`Error::Parse`].
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed = ConnectionString::parse(raw).map_err(Error::Parse)?;
        Ok(MongoUrl {
            raw: raw.to_string(),
            database: parsed.default_database,
        })
    }

    /// The full connection string, credentials included.
    pub fn connection_string(&self) -> &str {
        &self.raw
    }

    /// The database named in the path of the connection string, if any.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

// never print the password
impl fmt::Display for MongoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((scheme, rest)) = self.raw.split_once("://") else {
            return write!(f, "{}", self.raw);
        };
        let (authority, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
        match authority.rsplit_once('@') {
            Some((userinfo, hosts)) => {
                let user = userinfo.split_once(':').map_or(userinfo, |(user, _)| user);
                write!(f, "{scheme}://{user}:****@{hosts}{path}")
            }
            None => write!(f, "{}", self.raw),
        }
    }
}

impl fmt::Debug for MongoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoUrl")
            .field("url", &self.to_string())
            .field("database", &self.database)
            .finish()
    }
}

/// Options applied when the target collection has to be created as a capped collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CappedCollection {
    /// Maximum size of the collection in bytes.
    pub max_size_bytes: u64,
    /// Maximum number of documents, if bounded.
    pub max_documents: Option<u64>,
}

impl CappedCollection {
    /// Driver options for `createCollection`.
    pub fn to_create_options(&self) -> CreateCollectionOptions {
        let mut options = CreateCollectionOptions::default();
        options.capped = Some(true);
        options.size = Some(self.max_size_bytes);
        options.max = self.max_documents;
        options
    }
}

/// Mutable draft of the sink configuration. Every setter overwrites the previous value, and a
/// setter that fails leaves the draft untouched. Call [`SinkConfigBuilder::build`] to get the
/// validated [`SinkConfig`].
#[derive(Debug, Clone)]
pub struct SinkConfigBuilder {
    collection_name: String,
    batch_posting_limit: usize,
    batch_period: Duration,
    collection_creation_options: Option<CappedCollection>,
    target: Option<TargetLocator>,
}

impl Default for SinkConfigBuilder {
    fn default() -> Self {
        SinkConfigBuilder {
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            batch_posting_limit: DEFAULT_BATCH_POSTING_LIMIT,
            batch_period: DEFAULT_BATCH_PERIOD,
            collection_creation_options: None,
            target: None,
        }
    }
}

impl SinkConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the periodic batch timeout period. (Default: 2 seconds)
    pub fn set_batch_period(&mut self, period: Duration) -> &mut Self {
        self.batch_period = period;
        self
    }

    /// Create the collection as a capped collection of `max_size_mb` megabytes, optionally
    /// bounded to `max_documents` documents. Only used if the collection does not exist yet.
    pub fn set_create_capped_collection(
        &mut self,
        max_size_mb: u64,
        max_documents: Option<u64>,
    ) -> &mut Self {
        self.collection_creation_options = Some(CappedCollection {
            max_size_bytes: max_size_mb.saturating_mul(BYTES_PER_MB),
            max_documents,
        });
        self
    }

    /// Capped collection of [`DEFAULT_CAPPED_MAX_SIZE_MB`] with no document limit.
    pub fn set_default_capped_collection(&mut self) -> &mut Self {
        self.set_create_capped_collection(DEFAULT_CAPPED_MAX_SIZE_MB, None)
    }

    /// Write to an already connected database. Replaces any connection URL set earlier.
    pub fn set_database(&mut self, database: Database) -> &mut Self {
        if let Some(TargetLocator::Url(url)) = &self.target {
            debug!(%url, database = database.name(), "Replacing MongoDB URL with database handle");
        }
        self.target = Some(TargetLocator::Database(database));
        self
    }

    /// Set the mongo url (connection string), e.g. `mongodb://localhost/logs`. Replaces any
    /// database handle set earlier.
    pub fn set_mongo_url(&mut self, mongo_url: &str) -> Result<&mut Self> {
        ensure_not_blank("mongo_url", mongo_url)?;

        let url = MongoUrl::parse(mongo_url)?;
        if let Some(TargetLocator::Database(database)) = &self.target {
            debug!(%url, database = database.name(), "Replacing database handle with MongoDB URL");
        }
        self.target = Some(TargetLocator::Url(url));
        Ok(self)
    }

    /// Set the collection name. `None` resets it to [`DEFAULT_COLLECTION_NAME`], an empty name
    /// is rejected.
    pub fn set_collection_name(&mut self, collection_name: Option<&str>) -> Result<&mut Self> {
        self.collection_name = match collection_name {
            Some("") => {
                return Err(Error::InvalidArgument {
                    name: "collection_name",
                    reason: "must not be an empty string".to_string(),
                });
            }
            Some(name) => name.to_string(),
            None => DEFAULT_COLLECTION_NAME.to_string(),
        };
        Ok(self)
    }

    /// Set the batch posting limit. (Default: 50)
    pub fn set_batch_posting_limit(&mut self, batch_posting_limit: usize) -> &mut Self {
        self.batch_posting_limit = batch_posting_limit;
        self
    }

    /// Set the connection string. Same as [`SinkConfigBuilder::set_mongo_url`].
    pub fn set_connection_string(&mut self, connection_string: &str) -> Result<&mut Self> {
        ensure_not_blank("connection_string", connection_string)?;
        self.set_mongo_url(connection_string)
    }

    /// Set the connection string, first trying to resolve it as a named connection string
    /// through `resolver` and falling back to parsing it as a literal URL.
    pub fn set_connection_string_with(
        &mut self,
        connection_string: &str,
        resolver: &dyn ConnectionStringResolver,
    ) -> Result<&mut Self> {
        ensure_not_blank("connection_string", connection_string)?;

        if !self.try_set_url_from_connection_string_named(connection_string, resolver)? {
            self.set_mongo_url(connection_string)?;
        }
        Ok(self)
    }

    /// Looks up `name` through `resolver` and, when found, sets the resolved URL. Returns
    /// `Ok(false)` without touching the draft when the name is unknown.
    pub fn try_set_url_from_connection_string_named(
        &mut self,
        name: &str,
        resolver: &dyn ConnectionStringResolver,
    ) -> Result<bool> {
        ensure_not_blank("connection_string_name", name)?;

        let Some(connection_string) = resolver.resolve(name) else {
            debug!(name, "No named connection string found");
            return Ok(false);
        };
        self.set_mongo_url(&connection_string)?;
        Ok(true)
    }

    /// Fails unless a database handle or a connection URL has been set.
    pub fn validate(&self) -> Result<()> {
        self.target.as_ref().map(|_| ()).ok_or_else(missing_target)
    }

    /// Validates the draft and returns an immutable snapshot of it.
    pub fn build(&self) -> Result<SinkConfig> {
        let target = self.target.clone().ok_or_else(missing_target)?;

        Ok(SinkConfig {
            collection_name: self.collection_name.clone(),
            batch_posting_limit: self.batch_posting_limit,
            batch_period: self.batch_period,
            collection_creation_options: self.collection_creation_options,
            target,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn batch_posting_limit(&self) -> usize {
        self.batch_posting_limit
    }

    pub fn batch_period(&self) -> Duration {
        self.batch_period
    }

    pub fn collection_creation_options(&self) -> Option<&CappedCollection> {
        self.collection_creation_options.as_ref()
    }

    pub fn target(&self) -> Option<&TargetLocator> {
        self.target.as_ref()
    }

    pub fn database(&self) -> Option<&Database> {
        match &self.target {
            Some(TargetLocator::Database(database)) => Some(database),
            _ => None,
        }
    }

    pub fn mongo_url(&self) -> Option<&MongoUrl> {
        match &self.target {
            Some(TargetLocator::Url(url)) => Some(url),
            _ => None,
        }
    }
}

fn missing_target() -> Error {
    Error::InvalidConfiguration("MongoDB database or connection string must be set".to_string())
}

fn ensure_not_blank(name: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument {
            name,
            reason: "must not be empty or whitespace".to_string(),
        });
    }
    Ok(())
}

/// Validated sink configuration. Read-only; shared with the writer.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    collection_name: String,
    batch_posting_limit: usize,
    batch_period: Duration,
    collection_creation_options: Option<CappedCollection>,
    target: TargetLocator,
}

impl SinkConfig {
    pub fn builder() -> SinkConfigBuilder {
        SinkConfigBuilder::new()
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn batch_posting_limit(&self) -> usize {
        self.batch_posting_limit
    }

    pub fn batch_period(&self) -> Duration {
        self.batch_period
    }

    pub fn collection_creation_options(&self) -> Option<&CappedCollection> {
        self.collection_creation_options.as_ref()
    }

    pub fn target(&self) -> &TargetLocator {
        &self.target
    }
}
