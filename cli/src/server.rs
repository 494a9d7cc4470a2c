use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::limit::RequestBodyLimitLayer;

use crate::commands::{Larder, save_cache};
use crate::openmeteo::OpenMeteoClient;
use larder_core::grocery::{GroceryPrefill, StoreGroup, unit_suggestions};
use larder_core::models::{
    DayName, DayPlan, FormError, GroceryEdit, GroceryItem, NewGroceryItem, Recipe, WeekPlan,
};
use larder_core::planner::{MealKind, MealPrefill, PlanError};
use larder_core::shops::{self, StoreMeta};
use larder_core::weather::{ForecastDay, WeatherCache, WeatherError};

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

/// Forecast cache shared by every request, plus where to persist it.
pub struct WeatherService {
    pub cache: tokio::sync::Mutex<WeatherCache>,
    pub source: OpenMeteoClient,
    pub cache_path: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    larder: Arc<Mutex<Larder>>,
    weather: Arc<WeatherService>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct SetMealRequest {
    meal: String,
}

#[derive(Deserialize)]
struct BacklogRequest {
    text: String,
}

#[derive(Deserialize, Default)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize, Default)]
struct TransferRequest {
    row: Option<usize>,
}

#[derive(Deserialize, Default)]
struct WeatherQuery {
    #[serde(default)]
    refresh: bool,
}

#[derive(Serialize)]
struct GroceryListResponse {
    items: Vec<GroceryItem>,
    groups: Vec<StoreGroup>,
    checked: usize,
}

#[derive(Serialize)]
struct WeatherResponse {
    location: String,
    days: Vec<ForecastDay>,
    fetched_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Upstream(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::NoBacklogItem { .. }
            | PlanError::NoRecipe { .. }
            | PlanError::NoIngredient { .. } => Self::NotFound(err.to_string()),
            PlanError::NotLoaded => Self::Conflict(err.to_string()),
            PlanError::Form(e) => e.into(),
            PlanError::Store(e) => Self::Internal(e),
        }
    }
}

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::LocationDenied => Self::Conflict(err.to_string()),
            WeatherError::FetchFailed { ref detail } => {
                tracing::warn!(detail = %detail, "weather fetch failed");
                Self::Upstream(err.to_string())
            }
        }
    }
}

fn parse_day(day: &str) -> Result<DayName, ApiError> {
    DayName::parse(day).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn lock(state: &AppState) -> std::sync::MutexGuard<'_, Larder> {
    state
        .larder
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Week handlers ---

async fn get_week(State(state): State<AppState>) -> Json<WeekPlan> {
    Json(lock(&state).planner().week().clone())
}

async fn set_day(
    State(state): State<AppState>,
    Path(day): Path<String>,
    Json(req): Json<SetMealRequest>,
) -> Result<Json<DayPlan>, ApiError> {
    let day = parse_day(&day)?;
    let mut larder = lock(&state);
    let planner = larder.planner_mut();
    planner.set_meal(day, &req.meal);
    Ok(Json(DayPlan {
        day,
        meal: planner.week().meal(day).to_string(),
    }))
}

async fn clear_day(
    State(state): State<AppState>,
    Path(day): Path<String>,
) -> Result<StatusCode, ApiError> {
    let day = parse_day(&day)?;
    lock(&state).planner_mut().clear_meal(day);
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_week(State(state): State<AppState>) -> StatusCode {
    lock(&state).planner_mut().clear_all_meals();
    StatusCode::NO_CONTENT
}

// --- Backlog handlers ---

async fn list_backlog(
    State(state): State<AppState>,
    Path(kind): Path<MealKind>,
) -> Json<Vec<String>> {
    Json(lock(&state).planner().backlog(kind).to_vec())
}

async fn add_backlog(
    State(state): State<AppState>,
    Path(kind): Path<MealKind>,
    Json(req): Json<BacklogRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let added = lock(&state).planner_mut().add_to_backlog(kind, &req.text)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "added": added })),
    ))
}

async fn remove_backlog(
    State(state): State<AppState>,
    Path((kind, index)): Path<(MealKind, usize)>,
) -> Result<Json<Value>, ApiError> {
    let removed = lock(&state).planner_mut().remove_from_backlog(kind, index)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn place_backlog(
    State(state): State<AppState>,
    Path((kind, index, day)): Path<(MealKind, usize, String)>,
) -> Result<Json<DayPlan>, ApiError> {
    let day = parse_day(&day)?;
    let meal = lock(&state).planner_mut().place_idea(kind, index, day)?;
    Ok(Json(DayPlan { day, meal }))
}

async fn backlog_suggestions(
    State(state): State<AppState>,
    Path(kind): Path<MealKind>,
    Query(params): Query<SearchQuery>,
) -> Json<Vec<String>> {
    Json(lock(&state).planner().suggestions(kind, &params.q))
}

// --- Recipe handlers ---

async fn list_recipes(
    State(state): State<AppState>,
    Path(kind): Path<MealKind>,
) -> Json<Vec<Recipe>> {
    let larder = lock(&state);
    let mut recipes: Vec<Recipe> = larder.planner().recipes(kind).values().cloned().collect();
    recipes.sort_by_key(|r| r.name.to_lowercase());
    Json(recipes)
}

async fn get_recipe(
    State(state): State<AppState>,
    Path((kind, name)): Path<(MealKind, String)>,
) -> Result<Json<Recipe>, ApiError> {
    lock(&state)
        .planner()
        .recipe(kind, &name)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No {kind} recipe named '{name}'")))
}

async fn save_recipe(
    State(state): State<AppState>,
    Path((kind, name)): Path<(MealKind, String)>,
    Json(recipe): Json<Recipe>,
) -> Result<Json<Recipe>, ApiError> {
    let saved = lock(&state).planner_mut().save_recipe(kind, &name, recipe)?;
    Ok(Json(saved))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path((kind, name)): Path<(MealKind, String)>,
) -> Result<StatusCode, ApiError> {
    lock(&state).planner_mut().delete_recipe(kind, &name)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn recipe_prefill(
    State(state): State<AppState>,
    Path((kind, name)): Path<(MealKind, String)>,
) -> Json<MealPrefill> {
    Json(lock(&state).planner().select_suggestion(kind, &name))
}

/// Copies one ingredient row (0-based `row`) or every row when `row` is absent.
async fn recipe_to_groceries(
    State(state): State<AppState>,
    Path((kind, name)): Path<(MealKind, String)>,
    body: Option<Json<TransferRequest>>,
) -> Result<(StatusCode, Json<Vec<GroceryItem>>), ApiError> {
    let row = body.and_then(|Json(req)| req.row);
    let now = Local::now();
    let mut larder = lock(&state);
    let added = match row {
        Some(row) => vec![larder.add_ingredient_to_groceries(kind, &name, row, now)?],
        None => larder.add_recipe_to_groceries(kind, &name, now)?,
    };
    Ok((StatusCode::CREATED, Json(added)))
}

// --- Grocery handlers ---

async fn list_groceries(State(state): State<AppState>) -> Json<GroceryListResponse> {
    let mut larder = lock(&state);
    let groceries = larder.groceries();
    Json(GroceryListResponse {
        items: groceries.items().to_vec(),
        groups: groceries.groups(),
        checked: groceries.checked_count(),
    })
}

async fn add_grocery(
    State(state): State<AppState>,
    Json(form): Json<NewGroceryItem>,
) -> Result<(StatusCode, Json<GroceryItem>), ApiError> {
    let item = lock(&state).groceries().add_item(&form, Local::now())?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn edit_grocery(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(edit): Json<GroceryEdit>,
) -> Result<Json<GroceryItem>, ApiError> {
    if edit.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    lock(&state)
        .groceries()
        .edit_item(&id, &edit)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Grocery item {id} not found")))
}

async fn delete_grocery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    lock(&state)
        .groceries()
        .remove_item(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Grocery item {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_grocery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let checked = lock(&state)
        .groceries()
        .toggle_checked(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Grocery item {id} not found")))?;
    Ok(Json(serde_json::json!({ "id": id, "checked": checked })))
}

async fn clear_checked(State(state): State<AppState>) -> Json<Value> {
    let removed = lock(&state).groceries().clear_checked();
    Json(serde_json::json!({ "removed": removed }))
}

async fn grocery_suggestions(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Json<Vec<String>> {
    Json(lock(&state).groceries().item_suggestions(&params.q))
}

async fn grocery_defaults(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<GroceryPrefill> {
    Json(lock(&state).groceries().select_suggestion(&name))
}

async fn list_stores(Query(params): Query<SearchQuery>) -> Json<Vec<StoreMeta>> {
    Json(
        shops::store_suggestions(&params.q)
            .into_iter()
            .filter_map(shops::lookup)
            .copied()
            .collect(),
    )
}

async fn list_units(Query(params): Query<SearchQuery>) -> Json<Vec<&'static str>> {
    Json(unit_suggestions(&params.q))
}

// --- Weather ---

async fn get_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<WeatherResponse>, ApiError> {
    let service = &state.weather;
    let mut cache = service.cache.lock().await;
    if params.refresh {
        cache.invalidate();
    }
    let before = cache.last_fetched;
    let report = cache.load(&service.source, Utc::now()).await?;
    if cache.last_fetched != before {
        if let Some(path) = &service.cache_path {
            if let Err(e) = save_cache(path, &cache) {
                tracing::warn!(error = %e, "weather cache not saved");
            }
        }
    }
    Ok(Json(WeatherResponse {
        days: report.days(),
        location: report.location,
        fetched_at: cache.last_fetched,
    }))
}

// --- Export / import ---

async fn export_data(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Value>>, ApiError> {
    let tree = lock(&state).export_tree()?;
    Ok(Json(tree))
}

async fn import_data(
    State(state): State<AppState>,
    Json(tree): Json<BTreeMap<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let written = lock(&state).import_tree(&tree)?;
    Ok(Json(serde_json::json!({ "imported": written })))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/week", get(get_week).delete(clear_week))
        .route("/api/week/{day}", put(set_day).delete(clear_day))
        .route("/api/backlog/{kind}", get(list_backlog).post(add_backlog))
        .route(
            "/api/backlog/{kind}/suggestions",
            get(backlog_suggestions),
        )
        .route("/api/backlog/{kind}/{index}", delete(remove_backlog))
        .route(
            "/api/backlog/{kind}/{index}/place/{day}",
            post(place_backlog),
        )
        .route("/api/recipes/{kind}", get(list_recipes))
        .route(
            "/api/recipes/{kind}/{name}",
            get(get_recipe).put(save_recipe).delete(delete_recipe),
        )
        .route("/api/recipes/{kind}/{name}/prefill", get(recipe_prefill))
        .route(
            "/api/recipes/{kind}/{name}/groceries",
            post(recipe_to_groceries),
        )
        .route("/api/groceries", get(list_groceries).post(add_grocery))
        .route("/api/groceries/checked", delete(clear_checked))
        .route("/api/groceries/suggestions", get(grocery_suggestions))
        .route("/api/groceries/defaults/{name}", get(grocery_defaults))
        .route(
            "/api/groceries/{id}",
            put(edit_grocery).delete(delete_grocery),
        )
        .route("/api/groceries/{id}/toggle", post(toggle_grocery))
        .route("/api/stores", get(list_stores))
        .route("/api/units", get(list_units))
        .route("/api/weather", get(get_weather))
        .route("/api/export", get(export_data))
        .route("/api/import", post(import_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    larder: Larder,
    weather: WeatherService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        larder: Arc::new(Mutex::new(larder)),
        weather: Arc::new(weather),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    tracing::info!(bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}
