//! Search-engine objects exchanged over a shared multicast group.
//!
//! Crawl workers publish [`CrawlRecord`]s; index shards consume them and
//! catch up with one another through [`SyncRequest`] and [`SyncData`]. The
//! transport treats all of them as opaque payloads distinguished by type tag.

use std::collections::BTreeMap;

use bincode::{Decode, Encode};

use crate::{fragment::TypeTag, message::Payload};

/// Type tag of [`SearchPayload::Crawl`].
pub const CRAWL_RECORD_TAG: &str = "crawl-record";
/// Type tag of [`SearchPayload::SyncRequest`].
pub const SYNC_REQUEST_TAG: &str = "sync-request";
/// Type tag of [`SearchPayload::SyncData`].
pub const SYNC_DATA_TAG: &str = "sync-data";

/// One crawled page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct CrawlRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    /// Normalised words extracted from the page body.
    pub tokens: Vec<String>,
    /// Outgoing links discovered on the page.
    pub links: Vec<String>,
}

impl CrawlRecord {
    /// Create an empty record for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the page title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the description and derive tokens from it.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self.tokens = tokenize(&self.description);
        self
    }

    /// Append an outgoing link.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Ask peers for rows newer than the given per-table high-water marks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct SyncRequest {
    pub last_ids: BTreeMap<String, u64>,
}

/// Rows answering a [`SyncRequest`], keyed by table name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct SyncData {
    pub tables: BTreeMap<String, Vec<BTreeMap<String, String>>>,
}

/// Every object carried on the search-engine channel.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum SearchPayload {
    Crawl(CrawlRecord),
    SyncRequest(SyncRequest),
    SyncData(SyncData),
}

impl Payload for SearchPayload {
    fn type_tag(&self) -> TypeTag {
        TypeTag::from(match self {
            Self::Crawl(_) => CRAWL_RECORD_TAG,
            Self::SyncRequest(_) => SYNC_REQUEST_TAG,
            Self::SyncData(_) => SYNC_DATA_TAG,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::codec::{self, EncodedObject};

    #[rstest]
    #[case(SearchPayload::Crawl(CrawlRecord::new("https://a.example")), CRAWL_RECORD_TAG)]
    #[case(SearchPayload::SyncRequest(SyncRequest::default()), SYNC_REQUEST_TAG)]
    #[case(SearchPayload::SyncData(SyncData::default()), SYNC_DATA_TAG)]
    fn tags_follow_the_variant(#[case] payload: SearchPayload, #[case] tag: &str) {
        assert_eq!(payload.type_tag().as_str(), tag);
    }

    #[test]
    fn text_is_tokenized() {
        let record = CrawlRecord::new("https://a.example").with_text("Rust, Multicast & UDP!");
        assert_eq!(record.tokens, ["rust", "multicast", "udp"]);
    }

    #[test]
    fn sync_data_survives_the_object_pipeline() {
        let row = BTreeMap::from([("url".to_owned(), "https://a.example".to_owned())]);
        let payload = SearchPayload::SyncData(SyncData {
            tables: BTreeMap::from([("pages".to_owned(), vec![row])]),
        });
        let object = EncodedObject::encode(&payload).expect("encode");
        let decoded: SearchPayload =
            codec::decode_object(object.compressed(), 1 << 20).expect("decode");
        assert_eq!(decoded, payload);
    }
}
