//! Greedy packing of URLs into size-bounded payloads.
//!
//! The serialized size of a payload is its fixed part (every field with an
//! empty URL list) plus, per URL, its JSON string length and one separating
//! comma. The fixed part is measured with the widest possible numeric
//! fields, so the bound holds whatever timestamp a payload is stamped with.
//!
//! Filling each payload as far as it goes and only then starting the next
//! one yields the fewest payloads for an order-preserving split, because the
//! cost is additive per URL.

use crate::error::{PodpingError, PodpingResult};
use crate::payload::codec::json_string_len;
use crate::payload::{Medium, Payload, PayloadCodec, Reason, PAYLOAD_VERSION};

/// Splits URL lists into payload-sized chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadPacker {
    overhead: usize,
    limit: usize,
}

impl PayloadPacker {
    pub fn new(medium: Medium, reason: Reason, limit: usize) -> PodpingResult<Self> {
        let template = Payload {
            version: PAYLOAD_VERSION.to_string(),
            medium,
            reason,
            iris: Vec::new(),
            timestamp_ns: u64::MAX,
            session_id: u64::MAX,
        };
        let overhead = PayloadCodec::encode_payload(&template)
            .map_err(|e| PodpingError::Validation(e.to_string()))?
            .len();

        Ok(Self { overhead, limit })
    }

    /// Serialized size of the fixed payload fields.
    pub fn overhead(&self) -> usize {
        self.overhead
    }

    /// Upper bound on the serialized size of a payload carrying `urls`.
    pub fn payload_size(&self, urls: &[String]) -> usize {
        self.overhead
            + urls.iter().map(|url| json_string_len(url)).sum::<usize>()
            + urls.len().saturating_sub(1)
    }

    /// Split `urls` into contiguous chunks, each within the limit.
    ///
    /// Fails if a single URL cannot fit in a payload on its own.
    pub fn pack<'a>(&self, urls: &'a [String]) -> PodpingResult<Vec<&'a [String]>> {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut size = self.overhead;

        for (index, url) in urls.iter().enumerate() {
            let cost = json_string_len(url);
            if self.overhead + cost > self.limit {
                return Err(PodpingError::Validation(format!(
                    "URL at position {} needs {} bytes, payload limit is {}",
                    index,
                    self.overhead + cost,
                    self.limit
                )));
            }

            let separator = usize::from(index > start);
            if size + separator + cost > self.limit {
                chunks.push(&urls[start..index]);
                start = index;
                size = self.overhead + cost;
            } else {
                size += separator + cost;
            }
        }

        if start < urls.len() {
            chunks.push(&urls[start..]);
        }
        Ok(chunks)
    }
}
