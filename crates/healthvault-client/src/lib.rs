//! # healthvault-client
//!
//! HTTP client for the HealthVault platform.
//!
//! Every method is an XML envelope posted to a single endpoint. A
//! [`Connection`] signs each envelope with the current session's shared
//! secret and, when the service reports the session expired, refreshes it
//! through the credential and retries. Typed wrappers sit on top:
//!
//! - [`PersonClient`] - the signed-in person and their authorized records
//! - [`ThingClient`] - reading and writing things in one record
//!
//! ## Example
//!
//! ```ignore
//! let config = ClientConfig::default();
//! let credential = WebApplicationCredential::new(app_id, signer, &config.auth)?;
//! let connection = Connection::new(config, Arc::new(credential))?;
//!
//! let person = connection.person().get_person_info().await?;
//! if let Some(record_id) = person.selected_record_id {
//!     let things = connection.things(record_id).get_things(&ThingQuery::new()).await?;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod person;
pub mod things;

pub use config::ClientConfig;
pub use connection::Connection;
pub use envelope::{MethodRequest, ServiceResponse, StatusCode};
pub use error::{ClientError, ClientResult};
pub use person::{HealthRecordInfo, PersonClient, PersonInfo};
pub use things::{Thing, ThingClient, ThingQuery, ThingState};
