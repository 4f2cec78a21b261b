// Catalog lookups consumed by the cart, order, and delivery cores

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{CreateMenuItem, CreateRestaurant, MenuItem, Restaurant, UpdateMenuItem};

/// Repository for restaurant and menu item operations
#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    /// Create a new CatalogRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a restaurant by ID
    pub async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, ApiError> {
        let restaurant = sqlx::query_as::<_, Restaurant>("SELECT * FROM restaurants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(restaurant)
    }

    /// Find multiple restaurants by IDs
    pub async fn find_restaurants_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<Restaurant>, ApiError> {
        let restaurants =
            sqlx::query_as::<_, Restaurant>("SELECT * FROM restaurants WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(restaurants)
    }

    /// Find the restaurant owned by a vendor
    pub async fn find_restaurant_by_owner(
        &self,
        owner_id: i32,
    ) -> Result<Option<Restaurant>, ApiError> {
        let restaurant =
            sqlx::query_as::<_, Restaurant>("SELECT * FROM restaurants WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(restaurant)
    }

    /// List all active restaurants
    pub async fn list_active_restaurants(&self) -> Result<Vec<Restaurant>, ApiError> {
        let restaurants = sqlx::query_as::<_, Restaurant>(
            "SELECT * FROM restaurants WHERE is_active = TRUE ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(restaurants)
    }

    /// Insert a new restaurant
    pub async fn create_restaurant(
        &self,
        request: &CreateRestaurant,
    ) -> Result<Restaurant, ApiError> {
        let restaurant = sqlx::query_as::<_, Restaurant>(
            r#"
            INSERT INTO restaurants (
                owner_id, name, logo, latitude, longitude,
                is_delivery_available, delivery_radius_km, min_order_amount,
                delivery_fee, packaging_charges, avg_preparation_minutes
            )
            VALUES ($1, $2, $3, $4, $5,
                    COALESCE($6, TRUE), COALESCE($7, 10), COALESCE($8, 0),
                    COALESCE($9, 0), COALESCE($10, 0), COALESCE($11, 20))
            RETURNING *
            "#,
        )
        .bind(request.owner_id)
        .bind(&request.name)
        .bind(&request.logo)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.is_delivery_available)
        .bind(request.delivery_radius_km)
        .bind(request.min_order_amount)
        .bind(request.delivery_fee)
        .bind(request.packaging_charges)
        .bind(request.avg_preparation_minutes)
        .fetch_one(&self.pool)
        .await?;

        Ok(restaurant)
    }

    /// Find a menu item by ID
    pub async fn find_menu_item(&self, id: Uuid) -> Result<Option<MenuItem>, ApiError> {
        let item = sqlx::query_as::<_, MenuItem>("SELECT * FROM menu_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Insert a new menu item
    pub async fn create_menu_item(&self, request: &CreateMenuItem) -> Result<MenuItem, ApiError> {
        let item = sqlx::query_as::<_, MenuItem>(
            r#"
            INSERT INTO menu_items (restaurant_id, name, image, base_price, variants, add_ons)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.restaurant_id)
        .bind(&request.name)
        .bind(&request.image)
        .bind(request.base_price)
        .bind(Json(&request.variants))
        .bind(Json(&request.add_ons))
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    /// Update a menu item, keeping current values for omitted fields
    pub async fn update_menu_item(
        &self,
        id: Uuid,
        request: &UpdateMenuItem,
    ) -> Result<Option<MenuItem>, ApiError> {
        let existing = match self.find_menu_item(id).await? {
            Some(item) => item,
            None => return Ok(None),
        };

        let variants = request
            .variants
            .clone()
            .unwrap_or_else(|| existing.variants.0.clone());
        let add_ons = request
            .add_ons
            .clone()
            .unwrap_or_else(|| existing.add_ons.0.clone());

        let item = sqlx::query_as::<_, MenuItem>(
            r#"
            UPDATE menu_items
            SET name = $1,
                image = $2,
                base_price = $3,
                variants = $4,
                add_ons = $5,
                is_available = $6,
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(request.name.clone().unwrap_or(existing.name))
        .bind(request.image.clone().or(existing.image))
        .bind(request.base_price.unwrap_or(existing.base_price))
        .bind(Json(&variants))
        .bind(Json(&add_ons))
        .bind(request.is_available.unwrap_or(existing.is_available))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(item))
    }

    /// Soft-deactivate a menu item
    ///
    /// Rows are never deleted; historical order snapshots reference them.
    pub async fn deactivate_menu_item(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "UPDATE menu_items SET is_available = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Run a built menu query with its parameters
    pub async fn search_menu_items(
        &self,
        query_str: &str,
        params: Vec<String>,
    ) -> Result<Vec<MenuItem>, ApiError> {
        let mut query = sqlx::query_as::<_, MenuItem>(query_str);
        for param in params {
            query = query.bind(param);
        }

        let items = query.fetch_all(&self.pool).await?;
        Ok(items)
    }
}
