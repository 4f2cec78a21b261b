use chrono::Utc;
use uuid::Uuid;

use crate::cart::{
    AddItemRequest, AppliedCoupon, Cart, CartError, CartRepository, NewCartItem, SelectedAddOn,
    SelectedVariant,
};
use crate::catalog::CatalogRepository;
use crate::coupons::{CouponError, CouponService};

/// Service for cart business logic
#[derive(Clone)]
pub struct CartService {
    carts: CartRepository,
    catalog: CatalogRepository,
    coupons: CouponService,
}

impl CartService {
    /// Create a new CartService
    pub fn new(carts: CartRepository, catalog: CatalogRepository, coupons: CouponService) -> Self {
        Self {
            carts,
            catalog,
            coupons,
        }
    }

    /// Fetch the customer's cart, creating an empty one on first access
    pub async fn get_or_create(&self, customer_id: i32) -> Result<Cart, CartError> {
        match self.carts.find_by_customer(customer_id, Utc::now()).await? {
            Some(cart) => Ok(cart),
            None => {
                tracing::debug!("Creating cart for customer {}", customer_id);
                self.carts.create(&Cart::new(customer_id)).await
            }
        }
    }

    /// Add a menu item to the customer's cart
    ///
    /// The catalog is the price authority: the base price and every selected
    /// variant/add-on delta are resolved from the current menu item, then
    /// frozen into the line snapshot.
    pub async fn add_item(
        &self,
        customer_id: i32,
        request: AddItemRequest,
    ) -> Result<Cart, CartError> {
        let quantity = request.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        let menu_item = self
            .catalog
            .find_menu_item(request.menu_item_id)
            .await
            .map_err(|e| CartError::DatabaseError(format!("{:?}", e)))?
            .ok_or(CartError::MenuItemNotFound(request.menu_item_id))?;

        if !menu_item.is_available {
            return Err(CartError::ItemUnavailable(menu_item.name));
        }

        if menu_item.restaurant_id != request.restaurant_id {
            return Err(CartError::InvalidSelection(format!(
                "Menu item {} does not belong to restaurant {}",
                menu_item.id, request.restaurant_id
            )));
        }

        let restaurant = self
            .catalog
            .find_restaurant(request.restaurant_id)
            .await
            .map_err(|e| CartError::DatabaseError(format!("{:?}", e)))?
            .ok_or(CartError::RestaurantNotFound(request.restaurant_id))?;

        let mut selected_variants = Vec::with_capacity(request.selected_variants.len());
        for selection in &request.selected_variants {
            let price = menu_item
                .variant_price(&selection.name, &selection.option)
                .ok_or_else(|| {
                    CartError::InvalidSelection(format!(
                        "Unknown variant option '{}: {}' for '{}'",
                        selection.name, selection.option, menu_item.name
                    ))
                })?;
            selected_variants.push(SelectedVariant {
                name: selection.name.clone(),
                option: selection.option.clone(),
                price,
            });
        }

        let mut selected_add_ons = Vec::with_capacity(request.selected_add_ons.len());
        for name in &request.selected_add_ons {
            let price = menu_item.add_on_price(name).ok_or_else(|| {
                CartError::InvalidSelection(format!(
                    "Unknown or unavailable add-on '{}' for '{}'",
                    name, menu_item.name
                ))
            })?;
            selected_add_ons.push(SelectedAddOn {
                name: name.clone(),
                price,
            });
        }

        let mut cart = self.get_or_create(customer_id).await?;
        cart.add_item(
            request.restaurant_id,
            restaurant.delivery_fee,
            NewCartItem {
                menu_item_id: menu_item.id,
                name: menu_item.name,
                image: menu_item.image,
                price: menu_item.base_price,
                quantity,
                selected_variants,
                selected_add_ons,
                instructions: request.instructions,
            },
        )?;

        cart.touch(Utc::now());
        self.carts.save(&cart).await
    }

    /// Update a line's quantity; zero or less removes it
    pub async fn update_item_quantity(
        &self,
        customer_id: i32,
        restaurant_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        let mut cart = self
            .carts
            .find_by_customer(customer_id, Utc::now())
            .await?
            .ok_or(CartError::NotFound)?;

        cart.update_item_quantity(restaurant_id, item_id, quantity)?;
        cart.touch(Utc::now());
        self.carts.save(&cart).await
    }

    /// Remove a line from the cart
    pub async fn remove_item(
        &self,
        customer_id: i32,
        restaurant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Cart, CartError> {
        let mut cart = self
            .carts
            .find_by_customer(customer_id, Utc::now())
            .await?
            .ok_or(CartError::NotFound)?;

        cart.remove_item(restaurant_id, item_id)?;
        cart.touch(Utc::now());
        self.carts.save(&cart).await
    }

    /// Empty the cart and drop the applied coupon
    pub async fn clear(&self, customer_id: i32) -> Result<Cart, CartError> {
        let mut cart = self
            .carts
            .find_by_customer(customer_id, Utc::now())
            .await?
            .ok_or(CartError::NotFound)?;

        cart.clear()?;
        cart.touch(Utc::now());
        self.carts.save(&cart).await
    }

    /// Validate a coupon against the cart and store its snapshot
    ///
    /// Validation only; usage is recorded at checkout. The snapshot keeps the
    /// displayed discount stable even if the coupon changes afterwards.
    pub async fn apply_coupon(&self, customer_id: i32, code: &str) -> Result<Cart, CartError> {
        let mut cart = self
            .carts
            .find_by_customer(customer_id, Utc::now())
            .await?
            .ok_or(CartError::NotFound)?;

        let order_amount = cart.summary.items_total;
        let (coupon, discount) = self
            .coupons
            .validate_for_user(code, customer_id, order_amount, Utc::now())
            .await
            .map_err(|e| match e {
                CouponError::NotFound => CartError::CouponRejected("Invalid coupon code".to_string()),
                CouponError::Rejected(rejection) => CartError::CouponRejected(rejection.to_string()),
                other => CartError::DatabaseError(other.to_string()),
            })?;

        cart.apply_coupon(AppliedCoupon {
            code: coupon.code.clone(),
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            max_discount_amount: coupon.max_discount_amount,
            discount_amount: discount,
        })?;

        tracing::info!(
            "Applied coupon {} to cart of customer {}",
            coupon.code,
            customer_id
        );

        cart.touch(Utc::now());
        self.carts.save(&cart).await
    }
}
