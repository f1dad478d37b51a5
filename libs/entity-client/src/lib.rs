//! Async client for REST backends exposing `/entities` CRUD endpoints.
//!
//! Every call checks the response status against the single status code the
//! endpoint is expected to return and fails immediately otherwise. Write calls
//! (create/update) additionally verify that the backend echoed back every field
//! that was submitted, unchanged.
//!
//! ```no_run
//! # async fn demo() -> entity_client::Result<()> {
//! use entity_client::{EntityClient, EntityFields, EnumField, FilePart};
//!
//! let client = EntityClient::new(
//!     "http://localhost:5000",
//!     [("Authorization", "Bearer secret")],
//! )?;
//!
//! let fields = EntityFields {
//!     string_field: "hello".into(),
//!     int_field: 7,
//!     enum_field: EnumField::A,
//!     string_array_field: vec!["x".into()],
//!     bool_field: true,
//! };
//! let created = client.create_entity(&fields, &FilePart::create_placeholder()).await?;
//! # let _ = created;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod compare;
mod error;
mod model;
mod multipart;

pub use client::{EntityClient, EntityClientBuilder, Operation, DEFAULT_WRITE_TIMEOUT};
pub use error::{Error, Result};
pub use model::{Entity, EntityFields, EntityId, EnumField};
pub use multipart::FilePart;

pub use reqwest::StatusCode;
