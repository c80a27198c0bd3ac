//! Configuration and delivery plumbing for shipping batched log events to a MongoDB collection.
//!
//! The entry point is [`SinkConfigBuilder`]: it accumulates the target (either an already
//! connected [`mongodb::Database`] or a connection URL), the batching policy and the optional
//! capped-collection options, and hands out an immutable [`SinkConfig`] once the draft is valid.
//! [`sink::new_sink`] consumes that configuration to provision the collection and write batches.
//!
//! ```no_run
//! # fn main() -> logsink_mongodb::Result<()> {
//! use std::time::Duration;
//! use logsink_mongodb::SinkConfigBuilder;
//!
//! let config = SinkConfigBuilder::new()
//!     .set_mongo_url("mongodb://localhost/logdb")?
//!     .set_collection_name(Some("app-logs"))?
//!     .set_batch_posting_limit(100)
//!     .set_batch_period(Duration::from_secs(5))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod resolver;
pub mod settings;
pub mod sink;

pub use config::{
    CappedCollection, DEFAULT_BATCH_PERIOD, DEFAULT_BATCH_POSTING_LIMIT,
    DEFAULT_CAPPED_MAX_SIZE_MB, DEFAULT_COLLECTION_NAME, MongoUrl, SinkConfig, SinkConfigBuilder,
    TargetLocator,
};
pub use resolver::{ConnectionStringResolver, EnvResolver};
pub use settings::SinkSpec;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid argument `{name}` - {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("Failed to parse MongoDB connection string - {0}")]
    Parse(mongodb::error::Error),

    #[error("Invalid configuration - {0}")]
    InvalidConfiguration(String),

    #[error("Config Error - {0}")]
    Config(String),

    #[error("MongoDB - {0}")]
    Mongo(mongodb::error::Error),

    #[error("{0}")]
    Other(String),
}

impl From<mongodb::error::Error> for Error {
    fn from(value: mongodb::error::Error) -> Self {
        Error::Mongo(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}
