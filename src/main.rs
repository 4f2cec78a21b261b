mod auth;
mod cart;
mod catalog;
mod coupons;
mod db;
mod deliveries;
mod error;
mod events;
mod models;
mod orders;
mod query;
mod validation;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;
use validator::Validate;

use auth::{AuthenticatedUser, Role};
use cart::{CartRepository, CartService};
use catalog::CatalogRepository;
use coupons::{CouponRepository, CouponService};
use deliveries::{geo, DeliveriesRepository, DeliveryService};
use error::ApiError;
use events::EventBus;
use models::{
    AddOn, CreateMenuItem, CreateRestaurant, MenuItem, NearbyRestaurant, Restaurant,
    UpdateMenuItem, VariantGroup, VariantOption,
};
use orders::{OrderService, OrdersRepository};
use query::{MenuQueryBuilder, MenuQueryParams, MenuQueryValidator};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        create_restaurant,
        get_restaurant_by_id,
        create_menu_item,
        get_menu_item_by_id,
        update_menu_item,
        deactivate_menu_item,
    ),
    components(
        schemas(
            Restaurant,
            MenuItem,
            CreateRestaurant,
            CreateMenuItem,
            UpdateMenuItem,
            VariantGroup,
            VariantOption,
            AddOn
        )
    ),
    tags(
        (name = "catalog", description = "Restaurant and menu management endpoints")
    ),
    info(
        title = "QuickBite Marketplace API",
        version = "1.0.0",
        description = "Multi-vendor food-delivery marketplace: carts, coupons, orders, deliveries"
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub catalog: CatalogRepository,
    pub cart_service: CartService,
    pub coupon_service: CouponService,
    pub order_service: OrderService,
    pub delivery_service: DeliveryService,
    pub events: EventBus,
}

impl AppState {
    /// Wire repositories and services from a database pool
    pub fn new(db: PgPool) -> Self {
        let events = EventBus::default();
        let catalog = CatalogRepository::new(db.clone());
        let carts = CartRepository::new(db.clone());
        let coupons_repo = CouponRepository::new(db.clone());
        let orders_repo = OrdersRepository::new(db.clone());
        let deliveries_repo = DeliveriesRepository::new(db.clone());

        let coupon_service = CouponService::new(coupons_repo);
        let cart_service =
            CartService::new(carts.clone(), catalog.clone(), coupon_service.clone());
        let order_service = OrderService::new(
            orders_repo.clone(),
            carts,
            catalog.clone(),
            coupon_service.clone(),
            deliveries_repo.clone(),
            events.clone(),
        );
        let delivery_service =
            DeliveryService::new(deliveries_repo, orders_repo, events.clone());

        Self {
            db,
            catalog,
            cart_service,
            coupon_service,
            order_service,
            delivery_service,
            events,
        }
    }
}

/// Handler for POST /api/restaurants
/// Registers a restaurant on the marketplace (admin)
#[utoipa::path(
    post,
    path = "/api/restaurants",
    request_body = CreateRestaurant,
    responses(
        (status = 201, description = "Restaurant created successfully", body = Restaurant),
        (status = 400, description = "Invalid input data"),
        (status = 403, description = "Caller is not an admin"),
        (status = 500, description = "Internal server error")
    ),
    tag = "catalog"
)]
async fn create_restaurant(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateRestaurant>,
) -> Result<(StatusCode, Json<Restaurant>), ApiError> {
    user.require_role(&[Role::Admin])
        .map_err(|e| ApiError::Forbidden(e.to_string()))?;

    tracing::debug!("Creating restaurant: {}", payload.name);
    payload.validate()?;

    let restaurant = state.catalog.create_restaurant(&payload).await?;

    tracing::info!("Created restaurant {} ({})", restaurant.name, restaurant.id);
    Ok((StatusCode::CREATED, Json(restaurant)))
}

/// Handler for GET /api/restaurants/{id}
#[utoipa::path(
    get,
    path = "/api/restaurants/{id}",
    params(
        ("id" = Uuid, Path, description = "Restaurant ID")
    ),
    responses(
        (status = 200, description = "Restaurant found", body = Restaurant),
        (status = 404, description = "Restaurant not found")
    ),
    tag = "catalog"
)]
async fn get_restaurant_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Restaurant>, ApiError> {
    let restaurant = state
        .catalog
        .find_restaurant(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "Restaurant".to_string(),
            id: id.to_string(),
        })?;

    Ok(Json(restaurant))
}

/// Query parameters for the nearby-restaurants search
#[derive(Debug, serde::Deserialize)]
struct NearbyRestaurantsQuery {
    latitude: f64,
    longitude: f64,
    /// Defaults to 10 km
    radius_km: Option<f64>,
}

/// Handler for GET /api/restaurants/nearby
/// Active restaurants within the radius, nearest first, with a delivery-time
/// estimate at average courier speed
async fn nearby_restaurants(
    State(state): State<AppState>,
    Query(params): Query<NearbyRestaurantsQuery>,
) -> Result<Json<Vec<NearbyRestaurant>>, ApiError> {
    validation::validate_latitude(params.latitude)
        .and_then(|_| validation::validate_longitude(params.longitude))
        .map_err(|_| ApiError::BadRequest("Invalid coordinates".to_string()))?;

    let radius = params.radius_km.unwrap_or(10.0);
    let restaurants = state.catalog.list_active_restaurants().await?;

    let mut nearby: Vec<NearbyRestaurant> = restaurants
        .into_iter()
        .map(|restaurant| {
            let distance =
                geo::distance_km(params.latitude, params.longitude, restaurant.latitude, restaurant.longitude);
            let estimate = geo::estimated_delivery_minutes(
                distance,
                restaurant.avg_preparation_minutes as i64,
            );
            NearbyRestaurant {
                restaurant,
                distance_km: distance,
                estimated_delivery_minutes: estimate,
            }
        })
        .filter(|candidate| candidate.distance_km <= radius)
        .collect();

    nearby.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(Json(nearby))
}

/// Check that the caller may manage a restaurant's menu
async fn authorize_menu_management(
    state: &AppState,
    user: &AuthenticatedUser,
    restaurant_id: Uuid,
) -> Result<(), ApiError> {
    user.require_role(&[Role::Vendor, Role::Admin])
        .map_err(|e| ApiError::Forbidden(e.to_string()))?;

    let restaurant = state
        .catalog
        .find_restaurant(restaurant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "Restaurant".to_string(),
            id: restaurant_id.to_string(),
        })?;

    if user.role != Role::Admin && restaurant.owner_id != user.user_id {
        return Err(ApiError::Forbidden(
            "You do not own this restaurant".to_string(),
        ));
    }

    Ok(())
}

/// Handler for POST /api/menu-items
/// Adds a menu item with its variants and add-ons (owner or admin)
#[utoipa::path(
    post,
    path = "/api/menu-items",
    request_body = CreateMenuItem,
    responses(
        (status = 201, description = "Menu item created successfully", body = MenuItem),
        (status = 400, description = "Invalid input data"),
        (status = 403, description = "Caller does not own the restaurant"),
        (status = 404, description = "Restaurant not found")
    ),
    tag = "catalog"
)]
async fn create_menu_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateMenuItem>,
) -> Result<(StatusCode, Json<MenuItem>), ApiError> {
    tracing::debug!("Creating menu item: {}", payload.name);
    payload.validate()?;

    authorize_menu_management(&state, &user, payload.restaurant_id).await?;

    let item = state.catalog.create_menu_item(&payload).await?;

    tracing::info!("Created menu item {} ({})", item.name, item.id);
    Ok((StatusCode::CREATED, Json(item)))
}

/// Handler for GET /api/menu-items
/// Supports search, filtering, sorting, and pagination
async fn get_menu_items(
    Query(params): Query<MenuQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    tracing::debug!("Fetching menu items with query parameters: {:?}", params);

    let validated =
        MenuQueryValidator::validate(params).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut builder = MenuQueryBuilder::new();

    if let Some(search) = validated.search {
        builder.add_search_filter(&search);
    }
    if let Some(restaurant_id) = validated.restaurant_id {
        builder.add_restaurant_filter(restaurant_id);
    }
    if !validated.include_unavailable {
        builder.add_availability_filter();
    }
    builder.add_price_range(validated.min_price, validated.max_price);

    if let Some(sort_field) = validated.sort_field {
        builder.set_sort(sort_field, validated.sort_order);
    }

    builder.set_pagination(validated.page, validated.limit);

    let (query_str, params) = builder.build();
    let items = state.catalog.search_menu_items(&query_str, params).await?;

    tracing::debug!("Query returned {} menu items", items.len());
    Ok(Json(items))
}

/// Handler for GET /api/menu-items/{id}
#[utoipa::path(
    get,
    path = "/api/menu-items/{id}",
    params(
        ("id" = Uuid, Path, description = "Menu item ID")
    ),
    responses(
        (status = 200, description = "Menu item found", body = MenuItem),
        (status = 404, description = "Menu item not found")
    ),
    tag = "catalog"
)]
async fn get_menu_item_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MenuItem>, ApiError> {
    let item = state
        .catalog
        .find_menu_item(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "MenuItem".to_string(),
            id: id.to_string(),
        })?;

    Ok(Json(item))
}

/// Handler for PUT /api/menu-items/{id}
/// Updates a menu item, keeping current values for omitted fields
#[utoipa::path(
    put,
    path = "/api/menu-items/{id}",
    params(
        ("id" = Uuid, Path, description = "Menu item ID")
    ),
    request_body = UpdateMenuItem,
    responses(
        (status = 200, description = "Menu item updated successfully", body = MenuItem),
        (status = 400, description = "Invalid input data"),
        (status = 404, description = "Menu item not found")
    ),
    tag = "catalog"
)]
async fn update_menu_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMenuItem>,
) -> Result<Json<MenuItem>, ApiError> {
    payload.validate()?;

    let existing = state
        .catalog
        .find_menu_item(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "MenuItem".to_string(),
            id: id.to_string(),
        })?;

    authorize_menu_management(&state, &user, existing.restaurant_id).await?;

    let item = state
        .catalog
        .update_menu_item(id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "MenuItem".to_string(),
            id: id.to_string(),
        })?;

    tracing::info!("Updated menu item {}", id);
    Ok(Json(item))
}

/// Handler for DELETE /api/menu-items/{id}
/// Soft-deactivates a menu item; order snapshots keep their references
#[utoipa::path(
    delete,
    path = "/api/menu-items/{id}",
    params(
        ("id" = Uuid, Path, description = "Menu item ID")
    ),
    responses(
        (status = 204, description = "Menu item deactivated"),
        (status = 404, description = "Menu item not found")
    ),
    tag = "catalog"
)]
async fn deactivate_menu_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let existing = state
        .catalog
        .find_menu_item(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "MenuItem".to_string(),
            id: id.to_string(),
        })?;

    authorize_menu_management(&state, &user, existing.restaurant_id).await?;

    state.catalog.deactivate_menu_item(id).await?;

    tracing::info!("Deactivated menu item {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
pub fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Catalog
        .route("/api/restaurants", post(create_restaurant))
        .route("/api/restaurants/nearby", get(nearby_restaurants))
        .route("/api/restaurants/:id", get(get_restaurant_by_id))
        .route("/api/menu-items", post(create_menu_item))
        .route("/api/menu-items", get(get_menu_items))
        .route("/api/menu-items/:id", get(get_menu_item_by_id))
        .route("/api/menu-items/:id", put(update_menu_item))
        .route("/api/menu-items/:id", delete(deactivate_menu_item))
        // Cart
        .route("/api/cart", get(cart::get_cart_handler))
        .route("/api/cart", delete(cart::clear_cart_handler))
        .route("/api/cart/items", post(cart::add_to_cart_handler))
        .route("/api/cart/items/:item_id", put(cart::update_cart_item_handler))
        .route(
            "/api/cart/items/:item_id",
            delete(cart::remove_from_cart_handler),
        )
        .route("/api/cart/apply-coupon", post(cart::apply_coupon_handler))
        // Coupons
        .route("/api/coupons", get(coupons::list_coupons_handler))
        .route("/api/coupons", post(coupons::create_coupon_handler))
        .route("/api/coupons/validate", post(coupons::validate_coupon_handler))
        .route("/api/coupons/:id", put(coupons::update_coupon_handler))
        .route("/api/coupons/:id", delete(coupons::deactivate_coupon_handler))
        // Orders
        .route("/api/orders", post(orders::create_order_handler))
        .route("/api/orders", get(orders::list_orders_handler))
        .route("/api/orders/:order_id", get(orders::get_order_handler))
        .route(
            "/api/orders/:order_id/status",
            put(orders::update_order_status_handler),
        )
        .route(
            "/api/orders/:order_id/cancel",
            put(orders::cancel_order_handler),
        )
        // Deliveries
        .route("/api/deliveries", get(deliveries::list_deliveries_handler))
        .route(
            "/api/deliveries/available",
            get(deliveries::available_deliveries_handler),
        )
        .route("/api/deliveries/:id", get(deliveries::get_delivery_handler))
        .route(
            "/api/deliveries/:id/assign",
            put(deliveries::assign_delivery_handler),
        )
        .route(
            "/api/deliveries/:id/accept",
            put(deliveries::accept_delivery_handler),
        )
        .route(
            "/api/deliveries/:id/reject",
            put(deliveries::reject_delivery_handler),
        )
        .route(
            "/api/deliveries/:id/location",
            put(deliveries::update_location_handler),
        )
        .route(
            "/api/deliveries/:id/status",
            put(deliveries::update_delivery_status_handler),
        )
        .route(
            "/api/deliveries/:id/deliver",
            put(deliveries::mark_delivered_handler),
        )
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("QuickBite API - Starting...");

    // Get configuration from environment variables
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Create the application router
    let app = create_router(AppState::new(db_pool));

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("QuickBite API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}

#[cfg(test)]
mod tests;
