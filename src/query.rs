use serde::Deserialize;
use uuid::Uuid;

/// SQL query builder for menu browsing
/// Builds a single parameterized query with filters, sorting, and pagination
pub struct MenuQueryBuilder {
    base_query: String,
    where_clauses: Vec<String>,
    params: Vec<String>,
    order_clause: Option<String>,
    limit: u32,
    offset: u32,
}

impl MenuQueryBuilder {
    /// Creates a new MenuQueryBuilder with default values
    pub fn new() -> Self {
        Self {
            base_query: "SELECT * FROM menu_items".to_string(),
            where_clauses: Vec::new(),
            params: Vec::new(),
            order_clause: None,
            limit: 10,
            offset: 0,
        }
    }

    /// Adds a search filter for partial name matching (case-insensitive)
    pub fn add_search_filter(&mut self, search: &str) {
        let param_index = self.params.len() + 1;
        self.where_clauses.push(format!("name ILIKE ${}", param_index));
        self.params.push(format!("%{}%", search));
    }

    /// Restricts results to one restaurant's menu
    pub fn add_restaurant_filter(&mut self, restaurant_id: Uuid) {
        let param_index = self.params.len() + 1;
        self.where_clauses
            .push(format!("restaurant_id = ${}::uuid", param_index));
        self.params.push(restaurant_id.to_string());
    }

    /// Hides items that are currently disabled
    pub fn add_availability_filter(&mut self) {
        self.where_clauses.push("is_available = TRUE".to_string());
    }

    /// Adds base-price range filters (min and/or max, both inclusive)
    pub fn add_price_range(&mut self, min: Option<f64>, max: Option<f64>) {
        if let Some(min_price) = min {
            let param_index = self.params.len() + 1;
            self.where_clauses
                .push(format!("base_price >= ${}::numeric", param_index));
            self.params.push(min_price.to_string());
        }

        if let Some(max_price) = max {
            let param_index = self.params.len() + 1;
            self.where_clauses
                .push(format!("base_price <= ${}::numeric", param_index));
            self.params.push(max_price.to_string());
        }
    }

    /// Sets the sort order for the query
    pub fn set_sort(&mut self, field: SortField, order: SortOrder) {
        let field_name = match field {
            SortField::Price => "base_price",
            SortField::Name => "name",
        };

        let order_str = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        self.order_clause = Some(format!("{} {}", field_name, order_str));
    }

    /// Sets pagination parameters (page is 1-indexed)
    pub fn set_pagination(&mut self, page: u32, limit: u32) {
        self.limit = limit;
        self.offset = (page - 1) * limit;
    }

    /// Builds the final SQL query string with all parameters
    /// Returns a tuple of (query_string, parameters)
    pub fn build(&self) -> (String, Vec<String>) {
        let mut query = self.base_query.clone();

        if !self.where_clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&self.where_clauses.join(" AND "));
        }

        if let Some(ref order) = self.order_clause {
            query.push_str(" ORDER BY ");
            query.push_str(order);
        }

        // LIMIT and OFFSET are validated integers, appended directly
        query.push_str(&format!(" LIMIT {}", self.limit));
        query.push_str(&format!(" OFFSET {}", self.offset));

        (query, self.params.clone())
    }
}

impl Default for MenuQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Query parameters extracted from HTTP request
#[derive(Debug, Deserialize)]
pub struct MenuQueryParams {
    /// Search term for partial name matching (case-insensitive)
    pub search: Option<String>,
    /// Restrict to one restaurant's menu
    pub restaurant_id: Option<Uuid>,
    /// Include disabled items (defaults to false)
    pub include_unavailable: Option<bool>,
    /// Minimum base price filter (inclusive)
    pub min_price: Option<f64>,
    /// Maximum base price filter (inclusive)
    pub max_price: Option<f64>,
    /// Sort field: "price" or "name"
    pub sort: Option<String>,
    /// Sort order: "asc" or "desc"
    pub order: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<u32>,
    /// Items per page (defaults to 10, capped at 100)
    pub limit: Option<u32>,
}

/// Sort field options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Name,
}

/// Sort order options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Validated and normalized query parameters
#[derive(Debug)]
pub struct ValidatedMenuQuery {
    pub search: Option<String>,
    pub restaurant_id: Option<Uuid>,
    pub include_unavailable: bool,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort_field: Option<SortField>,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

/// Query parameter validation error
#[derive(Debug)]
pub struct QueryError {
    pub message: String,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for QueryError {}

/// Query parameter validator
pub struct MenuQueryValidator;

impl MenuQueryValidator {
    /// Validates and normalizes query parameters
    pub fn validate(params: MenuQueryParams) -> Result<ValidatedMenuQuery, QueryError> {
        let search = Self::normalize_string(params.search);

        let min_price = params
            .min_price
            .map(|p| Self::validate_price(p, "min_price").map(|_| p))
            .transpose()?;
        let max_price = params
            .max_price
            .map(|p| Self::validate_price(p, "max_price").map(|_| p))
            .transpose()?;

        if let (Some(min), Some(max)) = (min_price, max_price) {
            if max < min {
                return Err(QueryError {
                    message: "max_price must be greater than or equal to min_price".to_string(),
                });
            }
        }

        let sort_field = match params.sort.as_deref() {
            None => None,
            Some("price") => Some(SortField::Price),
            Some("name") => Some(SortField::Name),
            Some(other) => {
                return Err(QueryError {
                    message: format!("Invalid sort field: {}", other),
                })
            }
        };

        let sort_order = match params.order.as_deref() {
            None | Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(QueryError {
                    message: format!("Invalid sort order: {}", other),
                })
            }
        };

        let page = params.page.unwrap_or(1);
        if page == 0 {
            return Err(QueryError {
                message: "page must be at least 1".to_string(),
            });
        }

        let limit = params.limit.unwrap_or(10);
        if limit == 0 || limit > 100 {
            return Err(QueryError {
                message: "limit must be between 1 and 100".to_string(),
            });
        }

        Ok(ValidatedMenuQuery {
            search,
            restaurant_id: params.restaurant_id,
            include_unavailable: params.include_unavailable.unwrap_or(false),
            min_price,
            max_price,
            sort_field,
            sort_order,
            page,
            limit,
        })
    }

    /// Trims a string parameter, mapping empty values to None
    fn normalize_string(value: Option<String>) -> Option<String> {
        value.and_then(|s| {
            let trimmed = s.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        })
    }

    /// Rejects negative prices
    fn validate_price(price: f64, field: &str) -> Result<(), QueryError> {
        if price < 0.0 {
            Err(QueryError {
                message: format!("{} must not be negative", field),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_params() -> MenuQueryParams {
        MenuQueryParams {
            search: None,
            restaurant_id: None,
            include_unavailable: None,
            min_price: None,
            max_price: None,
            sort: None,
            order: None,
            page: None,
            limit: None,
        }
    }

    #[test]
    fn test_defaults_applied() {
        let validated = MenuQueryValidator::validate(empty_params()).unwrap();
        assert_eq!(validated.page, 1);
        assert_eq!(validated.limit, 10);
        assert!(!validated.include_unavailable);
        assert_eq!(validated.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_rejects_inverted_price_range() {
        let params = MenuQueryParams {
            min_price: Some(100.0),
            max_price: Some(50.0),
            ..empty_params()
        };
        assert!(MenuQueryValidator::validate(params).is_err());
    }

    #[test]
    fn test_rejects_unknown_sort_field() {
        let params = MenuQueryParams {
            sort: Some("rating".to_string()),
            ..empty_params()
        };
        assert!(MenuQueryValidator::validate(params).is_err());
    }

    #[test]
    fn test_build_combines_filters_in_order() {
        let mut builder = MenuQueryBuilder::new();
        builder.add_search_filter("wrap");
        builder.add_availability_filter();
        builder.add_price_range(Some(50.0), Some(300.0));
        builder.set_sort(SortField::Price, SortOrder::Desc);
        builder.set_pagination(2, 20);

        let (query, params) = builder.build();
        assert!(query.starts_with("SELECT * FROM menu_items WHERE "));
        assert!(query.contains("name ILIKE $1"));
        assert!(query.contains("is_available = TRUE"));
        assert!(query.contains("base_price >= $2::numeric"));
        assert!(query.contains("base_price <= $3::numeric"));
        assert!(query.contains("ORDER BY base_price DESC"));
        assert!(query.ends_with("LIMIT 20 OFFSET 20"));
        assert_eq!(params, vec!["%wrap%", "50", "300"]);
    }

    #[test]
    fn test_restaurant_filter_casts_uuid() {
        let mut builder = MenuQueryBuilder::new();
        let id = Uuid::new_v4();
        builder.add_restaurant_filter(id);
        let (query, params) = builder.build();
        assert!(query.contains("restaurant_id = $1::uuid"));
        assert_eq!(params, vec![id.to_string()]);
    }
}
