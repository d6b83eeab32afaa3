//! Index lookups served by an external full-text search service.
//!
//! The service holds one document per sequence, `{ "id": <SeqId>, "minimizers":
//! ["MKVLA", ...] }`. A posting list is the set of documents whose
//! `minimizers` field contains the kmer as an exact term.

use minblast_core::index::IndexStore;
use minblast_core::{Error, Result, SeqId};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::borrow::Cow;
use tokio::runtime::Handle;

#[derive(Deserialize)]
struct SearchBody {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<DocHit>,
}

#[derive(Deserialize)]
struct DocHit {
    #[serde(rename = "_source")]
    source: DocSource,
}

#[derive(Deserialize)]
struct DocSource {
    id: SeqId,
}

#[derive(Deserialize)]
struct CountBody {
    count: usize,
}

#[derive(Deserialize)]
struct AggBody {
    aggregations: Aggs,
}

#[derive(Deserialize)]
struct Aggs {
    minimizers: CardinalityAgg,
}

#[derive(Deserialize)]
struct CardinalityAgg {
    value: f64,
}

/// Lookups block on the runtime they were connected from, so they must run on a
/// blocking thread (e.g. inside `spawn_blocking`), never directly in async code.
pub struct RemoteIndex {
    client: reqwest::Client,
    search_url: String,
    count_url: String,
    page_size: usize,
    size: usize,
    handle: Handle,
}

impl RemoteIndex {
    /// The service's default result window; posting lists longer than this
    /// are fetched in several pages.
    pub const DEFAULT_PAGE_SIZE: usize = 10_000;

    pub async fn connect(base_url: &str, index: &str) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let mut remote = Self {
            client: reqwest::Client::new(),
            search_url: format!("{base}/{index}/_search"),
            count_url: format!("{base}/{index}/_count"),
            page_size: Self::DEFAULT_PAGE_SIZE,
            size: 0,
            handle: Handle::current(),
        };
        let agg: AggBody = remote
            .post(&remote.search_url, json!({ "size": 0, "aggs": { "minimizers": { "cardinality": { "field": "minimizers" } } } }))
            .await?;
        remote.size = agg.aggregations.minimizers.value as usize;
        tracing::info!(url = %remote.search_url, num_minimizers = remote.size, "connected to remote index");
        Ok(remote)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: Value) -> Result<T> {
        let resp = self.client.post(url).json(&body).send().await.map_err(remote_err)?;
        let resp = resp.error_for_status().map_err(remote_err)?;
        resp.json().await.map_err(remote_err)
    }

    fn term_query(kmer: &[u8]) -> Value {
        json!({ "term": { "minimizers": String::from_utf8_lossy(kmer) } })
    }

    /// Every matching id, paged in ascending id order with `search_after`.
    async fn fetch_ids(&self, kmer: &[u8]) -> Result<Vec<SeqId>> {
        let mut ids = Vec::new();
        let mut after: Option<SeqId> = None;
        loop {
            let mut body = json!({
                "query": Self::term_query(kmer),
                "_source": ["id"],
                "size": self.page_size,
                "sort": [{ "id": "asc" }],
            });
            if let Some(last) = after {
                body["search_after"] = json!([last]);
            }
            let page: SearchBody = self.post(&self.search_url, body).await?;
            let n = page.hits.hits.len();
            ids.extend(page.hits.hits.into_iter().map(|h| h.source.id));
            if n < self.page_size {
                return Ok(ids);
            }
            let last = ids.last().copied();
            if last <= after {
                return Err(Error::Remote(format!("paging stalled after id {last:?}")));
            }
            after = last;
        }
    }

    async fn count(&self, kmer: &[u8]) -> Result<usize> {
        let body: CountBody = self.post(&self.count_url, json!({ "query": Self::term_query(kmer) })).await?;
        Ok(body.count)
    }
}

fn remote_err(e: reqwest::Error) -> Error {
    Error::Remote(e.to_string())
}

impl IndexStore for RemoteIndex {
    fn lookup(&self, kmer: &[u8]) -> Result<Option<Cow<'_, [SeqId]>>> {
        let ids = self.handle.block_on(self.fetch_ids(kmer))?;
        Ok((!ids.is_empty()).then_some(Cow::Owned(ids)))
    }

    fn posting_len(&self, kmer: &[u8]) -> Result<Option<usize>> {
        let n = self.handle.block_on(self.count(kmer))?;
        Ok((n > 0).then_some(n))
    }

    fn size(&self) -> usize {
        self.size
    }
}
