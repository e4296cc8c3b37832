//! Error taxonomy for the segment store.

use thiserror::Error;

/// Errors surfaced by catalog, segment, and lookup operations.
///
/// Substrate failures are collapsed into [`Error::Internal`] at the boundary;
/// the substrate's own error values never leak to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The internal database returned an error.
    #[error("internal database returned an error")]
    Internal,

    /// An index with this name already exists.
    #[error("index already exists")]
    IndexExists,

    /// The index is unknown.
    #[error("index is unknown")]
    IndexUnknown,

    /// A lookup was run without an index binding.
    #[error("index must be set before lookup")]
    IndexNotSet,

    /// A schema carries a data type the codec does not support.
    #[error("data type not supported")]
    UnknownDataType,

    /// A segment or predicate field is not part of the index schema.
    #[error("field not part of the index")]
    FieldUnknown,

    /// A substrate scan failed mid-lookup.
    #[error("could not complete lookup")]
    LookupFailure,

    /// The lookup intersection came up empty. Internal sentinel: surfaces to
    /// iterator callers as end-of-stream, never as an error.
    #[error("no results for lookup")]
    LookupEmpty,

    /// No segment is stored under this primary value.
    #[error("segment not found")]
    SegmentNotFound,

    /// A segment row expected by an iterator was missing or undecodable.
    #[error("segment was not available for lookup")]
    SegmentMissing,

    /// The index declares no primary field.
    #[error("index has no primary field")]
    PrimaryKeyMissing,

    /// A persisted text form could not be decoded.
    #[error("marshalling failed")]
    Marshalling,

    /// The operation is not implemented for this data type.
    #[error("not implemented")]
    NotImplemented,
}

impl From<segmentdb_storage::StorageError> for Error {
    fn from(e: segmentdb_storage::StorageError) -> Self {
        tracing::debug!(error = %e, "substrate error collapsed");
        Error::Internal
    }
}

/// Result alias for store operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
