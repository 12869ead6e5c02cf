use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::error;

use crate::db::{Article, Category, Database, Trend};
use crate::generator::ArticleGenerator;
use crate::ingest::TrendIngestor;
use crate::slug::slugify;

const TRENDS_PER_PAGE: i64 = 50;

pub struct AppState {
    pub db: Arc<Database>,
    pub ingestor: Arc<TrendIngestor>,
    pub generator: Arc<dyn ArticleGenerator>,
    pub admin_token: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/trends", get(list_trends))
        .route("/trends/refresh", post(refresh_trends))
        .route("/trends/:id", get(get_trend).delete(delete_trend))
        .route("/trends/:id/article", post(generate_article))
        .route("/articles", get(list_articles))
        .route("/articles/:id", delete(delete_article))
        .route("/articles/:id/publish", post(publish_article))
        .route("/articles/:id/unpublish", post(unpublish_article))
        .route("/articles/:id/categories", put(set_article_categories))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", delete(delete_category))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/", get(index))
        .route("/articles/:slug", get(article_page))
        .route("/health", get(health))
        .nest("/api", admin)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub articles: Vec<ArticleCard>,
    pub categories: Vec<Category>,
    pub active_category: String,
}

pub struct ArticleCard {
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub published_on: String,
}

impl From<Article> for ArticleCard {
    fn from(article: Article) -> Self {
        Self {
            published_on: published_on(&article),
            title: article.title,
            slug: article.slug,
            summary: article.summary,
        }
    }
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub published_on: String,
    pub article: Article,
    pub categories: Vec<Category>,
}

fn published_on(article: &Article) -> String {
    article
        .published_at
        .map(|at| at.format("%B %-d, %Y").to_string())
        .unwrap_or_default()
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => AppError::Internal(err.into()).into_response(),
        }
    }
}

// Custom error type
pub enum AppError {
    NotFound(&'static str),
    BadRequest(String),
    Conflict(String),
    Unauthorized,
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Internal(err) => {
                error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError::Internal(err.into())
    }
}

/// Admin gate: requires `Authorization: Bearer <admin_token>`.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| !state.admin_token.is_empty() && tokens_match(token, &state.admin_token))
        .unwrap_or(false);

    if !authorized {
        return AppError::Unauthorized.into_response();
    }
    next.run(request).await
}

// Compares every byte regardless of where the first mismatch is.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

// Public pages

#[derive(Deserialize)]
pub struct IndexQuery {
    pub category: Option<String>,
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> Result<impl IntoResponse, AppError> {
    let active_category = query.category.unwrap_or_default();
    let filter = (!active_category.is_empty()).then_some(active_category.as_str());

    let articles = state.db.list_published_articles(filter).await?;
    let categories = state.db.list_categories().await?;

    Ok(HtmlTemplate(IndexTemplate {
        articles: articles.into_iter().map(ArticleCard::from).collect(),
        categories,
        active_category,
    }))
}

pub async fn article_page(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let article = state
        .db
        .get_published_article_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound("Article"))?;
    let categories = state.db.categories_for_article(article.id).await?;

    Ok(HtmlTemplate(ArticleTemplate {
        published_on: published_on(&article),
        article,
        categories,
    }))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

// Trends

pub async fn refresh_trends(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.ingestor.update_trends_from_rss().await?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
pub struct TrendsQuery {
    #[serde(default = "default_trends_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_trends_limit() -> i64 {
    TRENDS_PER_PAGE
}

pub async fn list_trends(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.clamp(1, 500);
    let offset = query.offset.max(0);
    let trends = state.db.list_trends(limit, offset).await?;
    let total = state.db.count_trends().await?;

    Ok(Json(json!({ "trends": trends, "total": total })))
}

pub async fn get_trend(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Trend>, AppError> {
    let trend = state
        .db
        .get_trend(id)
        .await?
        .ok_or(AppError::NotFound("Trend"))?;
    Ok(Json(trend))
}

pub async fn delete_trend(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_trend(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Trend"))
    }
}

pub async fn generate_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let trend = state
        .db
        .get_trend(id)
        .await?
        .ok_or(AppError::NotFound("Trend"))?;

    let generated = state.generator.generate(&trend).await?;
    let article = state.db.insert_article(Some(trend.id), &generated).await?;

    Ok((StatusCode::CREATED, Json(article)))
}

// Articles

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, AppError> {
    Ok(Json(state.db.list_articles().await?))
}

pub async fn publish_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, AppError> {
    let article = state
        .db
        .publish_article(id)
        .await?
        .ok_or(AppError::NotFound("Article"))?;
    Ok(Json(article))
}

pub async fn unpublish_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, AppError> {
    let article = state
        .db
        .unpublish_article(id)
        .await?
        .ok_or(AppError::NotFound("Article"))?;
    Ok(Json(article))
}

pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_article(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Article"))
    }
}

#[derive(Deserialize)]
pub struct ArticleCategories {
    pub category_ids: Vec<i64>,
}

pub async fn set_article_categories(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<ArticleCategories>,
) -> Result<Json<Vec<Category>>, AppError> {
    if state.db.get_article(id).await?.is_none() {
        return Err(AppError::NotFound("Article"));
    }

    let known: Vec<i64> = state
        .db
        .list_categories()
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    if let Some(unknown) = body.category_ids.iter().find(|c| !known.contains(c)) {
        return Err(AppError::BadRequest(format!("Unknown category {}", unknown)));
    }

    state.db.set_article_categories(id, &body.category_ids).await?;
    Ok(Json(state.db.categories_for_article(id).await?))
}

// Categories

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.db.list_categories().await?))
}

#[derive(Deserialize)]
pub struct NewCategory {
    pub name: String,
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewCategory>,
) -> Result<impl IntoResponse, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }
    if state.db.get_category_by_slug(&slugify(name)).await?.is_some() {
        return Err(AppError::Conflict(format!("Category '{}' already exists", name)));
    }

    let category = state.db.create_category(name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_category(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Category"))
    }
}
