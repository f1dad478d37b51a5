use entity_client::{Entity, EntityId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VerifyError>;

/// Reasons the end-to-end scenario stops. None of them are recovered.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Client(#[from] entity_client::Error),

    #[error("create response has no usable `id`")]
    MissingId,

    #[error("entity {id}: retrieved record differs from update response (updated {updated:?}, retrieved {retrieved:?})")]
    RecordMismatch {
        id: EntityId,
        updated: Box<Entity>,
        retrieved: Box<Entity>,
    },

    #[error("list entities returned an empty collection")]
    EmptyCollection,

    #[error("entity {id} is still listed after delete")]
    StillListed { id: EntityId },

    #[error("file {file_name}: stored content differs from upload ({expected_len} bytes sent, {actual_len} bytes returned)")]
    FileMismatch {
        file_name: String,
        expected_len: usize,
        actual_len: usize,
    },
}
