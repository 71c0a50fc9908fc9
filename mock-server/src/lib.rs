//! HTTP server backing the request-core integration tests.
//!
//! Routes:
//! - `/posts`, `/posts/{id}`: in-memory post store. Listing keeps creation
//!   order and takes `title` (substring) and `limit` filters; `PUT` replaces a
//!   post, `PATCH` updates the given fields, and both bump its revision
//! - `/echo` (any method) and `POST /search`: reflect method, path, query,
//!   headers and body as JSON
//! - `/status/{code}`: reply with the given status
//! - `POST /uploads`: report the size of the received body
//! - `GET /files/{name}`: fixed bytes derived from the name
//!
//! Rejected post requests carry a `{"error": ...}` body so clients can
//! exercise error-body handling.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    /// Starts at 1, incremented by every `PUT` or `PATCH`.
    pub revision: u32,
}

/// Body of `POST /posts` and `PUT /posts/{id}`.
#[derive(Deserialize)]
pub struct PostInput {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Body of `PATCH /posts/{id}`.
#[derive(Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Query of `GET /posts`.
#[derive(Debug, Default, Deserialize)]
pub struct ListFilter {
    pub title: Option<String>,
    pub limit: Option<usize>,
}

/// What `/echo` saw.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Upload {
    pub size: usize,
    pub content_type: Option<String>,
}

/// Posts in creation order.
#[derive(Clone, Default)]
pub struct Posts {
    inner: Arc<RwLock<Vec<Post>>>,
}

impl Posts {
    pub async fn list(&self, filter: &ListFilter) -> Vec<Post> {
        let posts = self.inner.read().await;
        posts
            .iter()
            .filter(|post| match &filter.title {
                Some(title) => post.title.contains(title.as_str()),
                None => true,
            })
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub async fn insert(&self, input: PostInput) -> Post {
        let post = Post {
            id: Uuid::new_v4(),
            title: input.title,
            body: input.body,
            revision: 1,
        };
        self.inner.write().await.push(post.clone());
        post
    }

    pub async fn find(&self, id: Uuid) -> Option<Post> {
        let posts = self.inner.read().await;
        posts.iter().find(|post| post.id == id).cloned()
    }

    /// Apply `change` to the post with `id` and bump its revision.
    pub async fn modify(&self, id: Uuid, change: impl FnOnce(&mut Post)) -> Option<Post> {
        let mut posts = self.inner.write().await;
        let post = posts.iter_mut().find(|post| post.id == id)?;
        change(post);
        post.revision += 1;
        Some(post.clone())
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let mut posts = self.inner.write().await;
        let before = posts.len();
        posts.retain(|post| post.id != id);
        posts.len() != before
    }
}

type Rejection = (StatusCode, Json<Value>);

fn rejection(status: StatusCode, message: impl Into<String>) -> Rejection {
    (status, Json(json!({ "error": message.into() })))
}

fn not_found(id: Uuid) -> Rejection {
    rejection(StatusCode::NOT_FOUND, format!("post {id} not found"))
}

fn validate(input: &PostInput) -> Result<(), Rejection> {
    if input.title.trim().is_empty() {
        return Err(rejection(StatusCode::UNPROCESSABLE_ENTITY, "title must not be empty"));
    }
    Ok(())
}

pub fn app() -> Router {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post)
                .put(replace_post)
                .patch(patch_post)
                .delete(delete_post),
        )
        .route("/echo", any(echo))
        .route("/search", post(echo))
        .route("/status/{code}", any(status))
        .route("/uploads", post(upload))
        .route("/files/{name}", get(file))
        .with_state(Posts::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Contents served by `GET /files/{name}`.
pub fn file_contents(name: &str) -> Vec<u8> {
    format!("contents of {name}").into_bytes()
}

async fn list_posts(
    State(posts): State<Posts>,
    Query(filter): Query<ListFilter>,
) -> Json<Vec<Post>> {
    Json(posts.list(&filter).await)
}

async fn create_post(
    State(posts): State<Posts>,
    Json(input): Json<PostInput>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<Post>), Rejection> {
    validate(&input)?;
    let post = posts.insert(input).await;
    tracing::debug!(id = %post.id, "created post");
    let location = format!("/posts/{}", post.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(post)))
}

async fn get_post(
    State(posts): State<Posts>,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, Rejection> {
    posts.find(id).await.map(Json).ok_or_else(|| not_found(id))
}

async fn replace_post(
    State(posts): State<Posts>,
    Path(id): Path<Uuid>,
    Json(input): Json<PostInput>,
) -> Result<Json<Post>, Rejection> {
    validate(&input)?;
    let post = posts
        .modify(id, |post| {
            post.title = input.title;
            post.body = input.body;
        })
        .await;
    post.map(Json).ok_or_else(|| not_found(id))
}

async fn patch_post(
    State(posts): State<Posts>,
    Path(id): Path<Uuid>,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>, Rejection> {
    if patch.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
        return Err(rejection(StatusCode::UNPROCESSABLE_ENTITY, "title must not be empty"));
    }
    let post = posts
        .modify(id, |post| {
            if let Some(title) = patch.title {
                post.title = title;
            }
            if let Some(body) = patch.body {
                post.body = body;
            }
        })
        .await;
    post.map(Json).ok_or_else(|| not_found(id))
}

async fn delete_post(
    State(posts): State<Posts>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    if posts.remove(id).await {
        tracing::debug!(%id, "deleted post");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

async fn echo(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(json!({ "status": code }))))
}

async fn upload(headers: HeaderMap, body: Bytes) -> (StatusCode, Json<Upload>) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    (
        StatusCode::CREATED,
        Json(Upload {
            size: body.len(),
            content_type,
        }),
    )
}

async fn file(Path(name): Path<String>) -> ([(header::HeaderName, &'static str); 1], Vec<u8>) {
    ([(header::CONTENT_TYPE, "application/octet-stream")], file_contents(&name))
}
