//! JSON encoding of values crossing the queue.

use crate::error::PipeError;
use batchpipe_queue::Payload;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Payload written to the control partition. Its content is never inspected.
pub(crate) const SIGNAL_TOKEN: &[u8] = b"true";

pub(crate) fn encode_batch<T, I>(values: I) -> Result<Vec<Payload>, PipeError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    values
        .into_iter()
        .map(|value| serde_json::to_vec(&value).map_err(PipeError::Encode))
        .collect()
}

pub(crate) fn decode_batch<T: DeserializeOwned>(payloads: Vec<Payload>) -> Result<Vec<T>, PipeError> {
    payloads
        .iter()
        .map(|payload| serde_json::from_slice(payload).map_err(PipeError::Decode))
        .collect()
}
