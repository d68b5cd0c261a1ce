//! In-memory stand-in for the B2 service
//!
//! Implements `Transport` directly, so tests exercise the real client code
//! down to the request and response values without a socket. Tokens,
//! upload URLs, listings and ranged downloads behave like the service
//! closely enough for the client's bookkeeping to be observable.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use bz_b2::{Client, ClientOptions, Credentials, sha1_hex};
use bz_core::{Request, Response, ResponseBody, Result, Transport};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde_json::{Value, json};

pub const KEY_ID: &str = "fake-key-id";
pub const APP_KEY: &str = "fake-application-key";
pub const ACCOUNT_ID: &str = "fake-account";
pub const AUTH_URL: &str = "https://auth.fake";
pub const API_URL: &str = "https://api.fake";
pub const DOWNLOAD_URL: &str = "https://download.fake";
pub const UPLOAD_URL: &str = "https://upload.fake";

#[derive(Debug, Clone)]
struct StoredFile {
    id: String,
    bucket_id: String,
    name: String,
    sha1: String,
    content_type: String,
    info: BTreeMap<String, String>,
    data: Bytes,
    timestamp: i64,
    action: &'static str,
}

#[derive(Debug, Default)]
struct State {
    generation: u64,
    next_id: u64,
    clock: i64,
    buckets: BTreeMap<String, (String, String)>,
    files: Vec<StoredFile>,
    upload_failures: VecDeque<u16>,
    empty_pages: usize,
}

/// Fake B2 service
#[derive(Debug, Default)]
pub struct FakeB2 {
    state: Mutex<State>,
    authorize_calls: AtomicUsize,
    upload_url_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    requests: AtomicUsize,
}

impl FakeB2 {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.clock = 1_700_000_000_000;
        }
        Arc::new(fake)
    }

    /// Invalidate every token issued so far, as if it had expired
    pub fn expire_tokens(&self) {
        self.state.lock().unwrap().generation += 1;
    }

    /// Answer the next upload request with `status`
    pub fn fail_next_upload(&self, status: u16) {
        self.state.lock().unwrap().upload_failures.push_back(status);
    }

    /// Answer the next `n` listing calls with no files but a cursor that
    /// repeats the request's own start position
    pub fn empty_pages_next(&self, n: usize) {
        self.state.lock().unwrap().empty_pages += n;
    }

    pub fn add_bucket(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("bucket-{}", state.next_id);
        state
            .buckets
            .insert(id.clone(), (name.to_string(), "allPrivate".to_string()));
        id
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn upload_url_calls(&self) -> usize {
        self.upload_url_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Every request received, of any kind
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn stored_versions(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    fn handle(&self, request: &Request, body: Bytes) -> Response {
        let url = request.url.as_str();
        let auth = request.header_str("authorization").unwrap_or_default();

        if let Some(rest) = url.strip_prefix(AUTH_URL) {
            if rest == "/b2api/v2/b2_authorize_account" {
                return self.authorize(auth);
            }
        } else if let Some(op) = url
            .strip_prefix(API_URL)
            .and_then(|rest| rest.strip_prefix("/b2api/v2/"))
        {
            return self.api(op, auth, &body);
        } else if let Some(rest) = url.strip_prefix(UPLOAD_URL) {
            return self.upload(rest, auth, &request.headers, body);
        } else if let Some(rest) = url.strip_prefix(DOWNLOAD_URL) {
            return self.download(rest, auth, &request.headers);
        }

        error(404, "not_found", &format!("no route for {url}"))
    }

    fn authorize(&self, auth: &str) -> Response {
        let expected = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(format!("{KEY_ID}:{APP_KEY}"))
        );
        if auth != expected {
            return error(401, "bad_auth_token", "invalid application key");
        }

        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.generation += 1;

        ok(json!({
            "accountId": ACCOUNT_ID,
            "authorizationToken": format!("tok-{}", state.generation),
            "apiUrl": API_URL,
            "downloadUrl": DOWNLOAD_URL,
            "recommendedPartSize": 100_000_000,
            "absoluteMinimumPartSize": 5_000_000,
            "allowed": {
                "capabilities": ["listBuckets", "writeFiles", "readFiles", "deleteFiles"],
                "bucketId": null,
                "bucketName": null,
                "namePrefix": null
            }
        }))
    }

    fn api(&self, op: &str, auth: &str, body: &[u8]) -> Response {
        let mut state = self.state.lock().unwrap();
        if auth != format!("tok-{}", state.generation) {
            return error(401, "expired_auth_token", "authorization token has expired");
        }
        let Ok(req) = serde_json::from_slice::<Value>(body) else {
            return error(400, "bad_request", "body is not JSON");
        };
        let str_field = |name: &str| req[name].as_str().unwrap_or_default().to_string();

        match op {
            "b2_get_upload_url" => {
                self.upload_url_calls.fetch_add(1, Ordering::SeqCst);
                let bucket_id = str_field("bucketId");
                if !state.buckets.contains_key(&bucket_id) {
                    return error(400, "bad_request", "invalid bucketId");
                }
                state.next_id += 1;
                ok(json!({
                    "bucketId": bucket_id,
                    "uploadUrl": format!("{UPLOAD_URL}/{bucket_id}/{}", state.next_id),
                    "authorizationToken": format!("up-{}-{}", state.generation, state.next_id),
                }))
            }
            "b2_list_buckets" => {
                let filter = req["bucketName"].as_str();
                let buckets: Vec<Value> = state
                    .buckets
                    .iter()
                    .filter(|(_, (name, _))| filter.is_none_or(|f| f == name))
                    .map(|(id, (name, kind))| bucket_json(id, name, kind))
                    .collect();
                ok(json!({ "buckets": buckets }))
            }
            "b2_create_bucket" => {
                let name = str_field("bucketName");
                if state.buckets.values().any(|(n, _)| *n == name) {
                    return error(400, "duplicate_bucket_name", "bucket name is already in use");
                }
                state.next_id += 1;
                let id = format!("bucket-{}", state.next_id);
                let kind = str_field("bucketType");
                state.buckets.insert(id.clone(), (name.clone(), kind.clone()));
                ok(bucket_json(&id, &name, &kind))
            }
            "b2_delete_bucket" => {
                let id = str_field("bucketId");
                if state.files.iter().any(|f| f.bucket_id == id) {
                    return error(400, "cannot_delete_non_empty_bucket", "bucket is not empty");
                }
                match state.buckets.remove(&id) {
                    Some((name, kind)) => ok(bucket_json(&id, &name, &kind)),
                    None => error(400, "bad_bucket_id", "no such bucket"),
                }
            }
            "b2_list_file_names" | "b2_list_file_versions"
                if !state.buckets.contains_key(&str_field("bucketId")) =>
            {
                error(400, "bad_bucket_id", "invalid bucketId")
            }
            "b2_list_file_names" | "b2_list_file_versions" if state.empty_pages > 0 => {
                state.empty_pages -= 1;
                empty_page(&req)
            }
            "b2_list_file_names" => list_names(&state, &req),
            "b2_list_file_versions" => list_versions(&state, &req),
            "b2_get_file_info" => {
                let id = str_field("fileId");
                match state.files.iter().find(|f| f.id == id) {
                    Some(f) => ok(file_json(f)),
                    None => error(404, "not_found", "file not present"),
                }
            }
            "b2_delete_file_version" => {
                let id = str_field("fileId");
                let name = str_field("fileName");
                let Some(pos) = state.files.iter().position(|f| f.id == id && f.name == name) else {
                    return error(400, "file_not_present", "file not present");
                };
                state.files.remove(pos);
                ok(json!({ "fileId": id, "fileName": name }))
            }
            "b2_hide_file" => {
                let bucket_id = str_field("bucketId");
                let name = str_field("fileName");
                let file = new_version(&mut state, &bucket_id, &name, Bytes::new(), "hide");
                ok(file_json(&file))
            }
            _ => error(400, "bad_request", &format!("unknown operation {op}")),
        }
    }

    fn upload(&self, rest: &str, auth: &str, headers: &HeaderMap, body: Bytes) -> Response {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        if let Some(status) = state.upload_failures.pop_front() {
            return error(status, "injected", "injected upload failure");
        }

        let generation = auth
            .strip_prefix("up-")
            .and_then(|t| t.split('-').next())
            .and_then(|g| g.parse::<u64>().ok());
        if generation != Some(state.generation) {
            return error(401, "expired_auth_token", "upload authorization has expired");
        }

        let bucket_id = rest.trim_start_matches('/').split('/').next().unwrap_or_default();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        let name = urlencoding::decode(&header("x-bz-file-name"))
            .unwrap()
            .into_owned();
        if header("x-bz-content-sha1") != sha1_hex(&body) {
            return error(400, "bad_request", "sha1 did not match data received");
        }

        let mut content_type = header("content-type");
        if content_type == "b2/x-auto" {
            content_type = "application/octet-stream".into();
        }
        let mut info = BTreeMap::new();
        for (k, v) in headers {
            let Some(key) = k.as_str().strip_prefix("x-bz-info-") else {
                continue;
            };
            let Some(value) = v.to_str().ok().and_then(|v| urlencoding::decode(v).ok()) else {
                return error(400, "bad_request", &format!("invalid value for X-Bz-Info-{key}"));
            };
            info.insert(key.to_string(), value.into_owned());
        }

        let mut file = new_version(&mut state, bucket_id, &name, body, "upload");
        file.content_type = content_type;
        file.info = info;
        if let Some(stored) = state.files.iter_mut().find(|f| f.id == file.id) {
            *stored = file.clone();
        }
        ok(file_json(&file))
    }

    fn download(&self, rest: &str, auth: &str, headers: &HeaderMap) -> Response {
        let state = self.state.lock().unwrap();
        if auth != format!("tok-{}", state.generation) {
            return error(401, "expired_auth_token", "authorization token has expired");
        }

        let file = if let Some(id) = rest.strip_prefix("/b2api/v2/b2_download_file_by_id?fileId=") {
            let id = urlencoding::decode(id).unwrap().into_owned();
            state.files.iter().find(|f| f.id == id && f.action == "upload")
        } else if let Some(path) = rest.strip_prefix("/file/") {
            let (bucket, name) = path.split_once('/').unwrap_or((path, ""));
            let name = urlencoding::decode(name).unwrap().into_owned();
            let bucket_id = state
                .buckets
                .iter()
                .find(|(_, (n, _))| n == bucket)
                .map(|(id, _)| id.clone());
            latest(&state, bucket_id.as_deref().unwrap_or_default(), &name)
                .filter(|f| f.action == "upload")
        } else {
            None
        };

        let Some(file) = file else {
            return error(404, "not_found", "file not present");
        };

        let (status, data) = match headers.get("range").and_then(|v| v.to_str().ok()) {
            Some(range) => {
                let (start, end) = range
                    .strip_prefix("bytes=")
                    .and_then(|r| r.split_once('-'))
                    .map(|(s, e)| (s.parse::<usize>().unwrap(), e.parse::<usize>().unwrap()))
                    .unwrap();
                let end = end.min(file.data.len().saturating_sub(1));
                (StatusCode::PARTIAL_CONTENT, file.data.slice(start..=end))
            }
            None => (StatusCode::OK, file.data.clone()),
        };

        let mut response = Response::new(status, ResponseBody::from_bytes(data.clone()));
        let mut set = |name: &str, value: &str| {
            response.headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        };
        set("x-bz-file-id", &file.id);
        set(
            "x-bz-file-name",
            &urlencoding::encode(&file.name).replace("%2F", "/"),
        );
        set("content-type", &file.content_type);
        set("content-length", &data.len().to_string());
        set("x-bz-content-sha1", &file.sha1);
        set("x-bz-upload-timestamp", &file.timestamp.to_string());
        for (k, v) in &file.info {
            set(&format!("x-bz-info-{k}"), &urlencoding::encode(v));
        }
        response
    }
}

#[async_trait]
impl Transport for FakeB2 {
    async fn send(&self, request: Request) -> Result<Response> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let Request {
            method,
            url,
            headers,
            body,
        } = request;
        let body = body.collect().await?;
        let request = Request {
            method,
            url,
            headers,
            body: bz_core::Body::Empty,
        };
        Ok(self.handle(&request, body))
    }
}

fn new_version(
    state: &mut State,
    bucket_id: &str,
    name: &str,
    data: Bytes,
    action: &'static str,
) -> StoredFile {
    state.next_id += 1;
    state.clock += 1000;
    let file = StoredFile {
        id: format!("4_z{bucket_id}_f{:06}", state.next_id),
        bucket_id: bucket_id.to_string(),
        name: name.to_string(),
        sha1: sha1_hex(&data),
        content_type: "application/octet-stream".into(),
        info: BTreeMap::new(),
        data,
        timestamp: state.clock,
        action,
    };
    state.files.push(file.clone());
    file
}

fn latest<'a>(state: &'a State, bucket_id: &str, name: &str) -> Option<&'a StoredFile> {
    state
        .files
        .iter()
        .filter(|f| f.bucket_id == bucket_id && f.name == name)
        .max_by_key(|f| f.timestamp)
}

fn list_names(state: &State, req: &Value) -> Response {
    let bucket_id = req["bucketId"].as_str().unwrap_or_default();
    let start = req["startFileName"].as_str().unwrap_or_default();
    let prefix = req["prefix"].as_str().unwrap_or_default();
    let max = req["maxFileCount"].as_u64().unwrap_or(100) as usize;

    let mut newest: BTreeMap<&str, &StoredFile> = BTreeMap::new();
    for f in state.files.iter().filter(|f| f.bucket_id == bucket_id) {
        let slot = newest.entry(f.name.as_str()).or_insert(f);
        if f.timestamp > slot.timestamp {
            *slot = f;
        }
    }

    let visible: Vec<&StoredFile> = newest
        .into_values()
        .filter(|f| f.action == "upload" && f.name.as_str() >= start && f.name.starts_with(prefix))
        .collect();

    let entries = collapse(visible, prefix, req["delimiter"].as_str());
    let page: Vec<Value> = entries.iter().take(max).map(Entry::to_json).collect();
    let next = entries.get(max).map(|e| e.name().to_string());
    ok(json!({ "files": page, "nextFileName": next, "nextFileId": null }))
}

enum Entry<'a> {
    File(&'a StoredFile),
    Folder(String),
}

impl Entry<'_> {
    fn name(&self) -> &str {
        match self {
            Entry::File(f) => &f.name,
            Entry::Folder(name) => name,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Entry::File(f) => file_json(f),
            Entry::Folder(name) => json!({
                "accountId": ACCOUNT_ID,
                "action": "folder",
                "bucketId": null,
                "contentLength": 0,
                "contentSha1": null,
                "contentType": null,
                "fileId": null,
                "fileInfo": {},
                "fileName": name,
                "uploadTimestamp": 0,
            }),
        }
    }
}

/// Fold names that continue past `delimiter` after `prefix` into one folder
/// entry per distinct leading segment. `files` must be sorted by name.
fn collapse<'a>(files: Vec<&'a StoredFile>, prefix: &str, delimiter: Option<&str>) -> Vec<Entry<'a>> {
    let Some(delimiter) = delimiter.filter(|d| !d.is_empty()) else {
        return files.into_iter().map(Entry::File).collect();
    };
    let mut entries: Vec<Entry<'a>> = Vec::new();
    for f in files {
        let rest = &f.name[prefix.len()..];
        match rest.find(delimiter) {
            Some(pos) => {
                let folder = format!("{prefix}{}", &rest[..pos + delimiter.len()]);
                if !matches!(entries.last(), Some(Entry::Folder(last)) if *last == folder) {
                    entries.push(Entry::Folder(folder));
                }
            }
            None => entries.push(Entry::File(f)),
        }
    }
    entries
}

fn empty_page(req: &Value) -> Response {
    ok(json!({
        "files": [],
        "nextFileName": req["startFileName"].as_str().unwrap_or(""),
        "nextFileId": req["startFileId"].as_str(),
    }))
}

fn list_versions(state: &State, req: &Value) -> Response {
    let bucket_id = req["bucketId"].as_str().unwrap_or_default();
    let start = req["startFileName"].as_str().unwrap_or_default();
    let start_id = req["startFileId"].as_str();
    let prefix = req["prefix"].as_str().unwrap_or_default();
    let max = req["maxFileCount"].as_u64().unwrap_or(100) as usize;

    let mut all: Vec<&StoredFile> = state
        .files
        .iter()
        .filter(|f| f.bucket_id == bucket_id && f.name.starts_with(prefix))
        .collect();
    all.sort_by(|a, b| a.name.cmp(&b.name).then(b.timestamp.cmp(&a.timestamp)));

    let from = start_id
        .and_then(|id| all.iter().position(|f| f.name == start && f.id == id))
        .unwrap_or_else(|| all.iter().position(|f| f.name.as_str() >= start).unwrap_or(all.len()));

    let rest = collapse(all[from..].to_vec(), prefix, req["delimiter"].as_str());
    let page: Vec<Value> = rest.iter().take(max).map(Entry::to_json).collect();
    let next = rest.get(max);
    ok(json!({
        "files": page,
        "nextFileName": next.map(|e| e.name().to_string()),
        "nextFileId": match next {
            Some(Entry::File(f)) => Some(f.id.clone()),
            _ => None,
        },
    }))
}

fn bucket_json(id: &str, name: &str, kind: &str) -> Value {
    json!({ "accountId": ACCOUNT_ID, "bucketId": id, "bucketName": name, "bucketType": kind })
}

fn file_json(f: &StoredFile) -> Value {
    json!({
        "accountId": ACCOUNT_ID,
        "action": f.action,
        "bucketId": f.bucket_id,
        "contentLength": f.data.len(),
        "contentSha1": f.sha1,
        "contentType": f.content_type,
        "fileId": f.id,
        "fileInfo": f.info,
        "fileName": f.name,
        "uploadTimestamp": f.timestamp,
    })
}

fn ok(body: Value) -> Response {
    Response::new(StatusCode::OK, ResponseBody::from_bytes(body.to_string()))
}

fn error(status: u16, code: &str, message: &str) -> Response {
    let body = json!({ "status": status, "code": code, "message": message });
    Response::new(
        StatusCode::from_u16(status).unwrap(),
        ResponseBody::from_bytes(body.to_string()),
    )
}

pub fn credentials() -> Credentials {
    Credentials::new(KEY_ID, APP_KEY, AUTH_URL)
}

/// Authorized client talking to `fake`
pub async fn client(fake: &Arc<FakeB2>) -> Client {
    client_with(fake, ClientOptions::default()).await
}

pub async fn client_with(fake: &Arc<FakeB2>, options: ClientOptions) -> Client {
    Client::with_transport(credentials(), fake.clone(), options)
        .await
        .expect("authorize against fake")
}
