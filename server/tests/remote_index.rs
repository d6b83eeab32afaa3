use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use minblast_core::builder::IndexBuilder;
use minblast_core::index::IndexStore;
use minblast_core::persist::{write_documents, write_index, MinimizerDoc};
use minblast_core::search::search;
use minblast_core::SketchParams;
use serde_json::{json, Value};
use server::remote::RemoteIndex;
use server::{build_app, Backend, ServerConfig};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

const RECORDS: [(&str, &str); 3] = [
    ("zero", "AAAAMVVVVKKLLW"),
    ("one", "MVVVVAAAAPPGGH"),
    ("two", "AAAAMVVVVPPGGH"),
];

type Docs = Arc<Vec<(u32, BTreeSet<String>)>>;

/// Documents as `indexer export` writes them.
fn docs(params: SketchParams) -> Docs {
    let (_, seqs) = IndexBuilder::build(params, RECORDS).unwrap();
    let mut jsonl = Vec::new();
    write_documents(&seqs, params, &mut jsonl).unwrap();
    Arc::new(
        jsonl
            .split(|&b| b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| {
                let doc: MinimizerDoc = serde_json::from_slice(l).unwrap();
                (doc.id, doc.minimizers.into_iter().collect())
            })
            .collect(),
    )
}

fn term(body: &Value) -> Option<String> {
    body["query"]["term"]["minimizers"].as_str().map(str::to_string)
}

async fn mock_search(State(docs): State<Docs>, Json(body): Json<Value>) -> Json<Value> {
    if body.get("aggs").is_some() {
        let distinct: BTreeSet<&String> = docs.iter().flat_map(|(_, m)| m.iter()).collect();
        return Json(json!({ "hits": { "hits": [] }, "aggregations": { "minimizers": { "value": distinct.len() } } }));
    }
    let kmer = term(&body).unwrap_or_default();
    let size = body["size"].as_u64().unwrap_or(10) as usize;
    let after = body["search_after"][0].as_u64();
    let mut ids: Vec<u32> = docs.iter().filter(|(_, m)| m.contains(&kmer)).map(|(id, _)| *id).collect();
    ids.sort_unstable();
    let hits: Vec<Value> = ids
        .into_iter()
        .filter(|id| after.map_or(true, |a| u64::from(*id) > a))
        .take(size)
        .map(|id| json!({ "_source": { "id": id }, "sort": [id] }))
        .collect();
    Json(json!({ "hits": { "total": { "value": hits.len() }, "hits": hits } }))
}

async fn mock_count(State(docs): State<Docs>, Json(body): Json<Value>) -> Json<Value> {
    let kmer = term(&body).unwrap_or_default();
    Json(json!({ "count": docs.iter().filter(|(_, m)| m.contains(&kmer)).count() }))
}

async fn spawn_mock(params: SketchParams) -> String {
    let app = Router::new()
        .route("/seqs/_search", post(mock_search))
        .route("/seqs/_count", post(mock_count))
        .with_state(docs(params));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_lookup_matches_document_terms() {
    let params = SketchParams::new(5, 10).unwrap();
    let url = spawn_mock(params).await;
    let remote = Arc::new(RemoteIndex::connect(&url, "seqs").await.unwrap());
    assert!(remote.size() > 0);

    let r = remote.clone();
    let (hit, miss, out) = tokio::task::spawn_blocking(move || {
        let hit = r.lookup(b"AAAAM").unwrap().map(|p| p.into_owned());
        let miss = r.posting_len(b"WWWWW").unwrap();
        let out = search(b"AAAAMVVVV", r.as_ref(), params, 1.0, 10).unwrap();
        (hit, miss, out)
    })
    .await
    .unwrap();

    let mut hit = hit.unwrap();
    hit.sort();
    assert_eq!(hit, vec![0, 2]);
    assert_eq!(miss, None);
    assert_eq!(out.hits.len(), 2);
    assert!(out.hits.iter().all(|h| h.seq_id == 0 || h.seq_id == 2));
}

#[tokio::test(flavor = "multi_thread")]
async fn long_posting_lists_are_fetched_in_pages() {
    let params = SketchParams::new(5, 10).unwrap();
    let url = spawn_mock(params).await;
    let remote = Arc::new(RemoteIndex::connect(&url, "seqs").await.unwrap().with_page_size(1));

    let r = remote.clone();
    let (hit, len) = tokio::task::spawn_blocking(move || {
        (r.lookup(b"AAAAM").unwrap().map(|p| p.into_owned()), r.posting_len(b"AAAAM").unwrap())
    })
    .await
    .unwrap();
    assert_eq!(hit, Some(vec![0, 2]));
    assert_eq!(len, Some(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_uses_remote_backend_when_configured() {
    let params = SketchParams::new(5, 10).unwrap();
    let url = spawn_mock(params).await;

    let dir = tempdir().unwrap();
    let root = dir.path().join("index");
    let (idx, seqs) = IndexBuilder::build(params, RECORDS).unwrap();
    write_index(&root, &idx, &seqs, params, false).unwrap();

    let config = ServerConfig {
        backend: Backend::Remote,
        remote_url: Some(url),
        remote_index: "seqs".into(),
        ..ServerConfig::new(&root)
    };
    let app = build_app(config).await.unwrap();
    let req = Request::post("/api/v1/search")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "searchString": "AAAAMVVVV" }).to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let ids: Vec<u64> = json["results"].as_array().unwrap().iter().map(|r| r["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![0, 2]);
}

#[tokio::test]
async fn remote_backend_without_url_fails_at_startup() {
    let params = SketchParams::new(5, 10).unwrap();
    let dir = tempdir().unwrap();
    let root = dir.path().join("index");
    let (idx, seqs) = IndexBuilder::build(params, RECORDS).unwrap();
    write_index(&root, &idx, &seqs, params, false).unwrap();
    let config = ServerConfig { backend: Backend::Remote, ..ServerConfig::new(&root) };
    assert!(build_app(config).await.is_err());
}
