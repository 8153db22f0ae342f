use crate::auth::{AuthenticatedUser, PolicyRouterExt, Resource};
use crate::entities::product;
use crate::handlers::common::{
    created_response, no_content_response, success_response, validate_input,
};
use crate::services::catalog::{CreateProductInput, ProductListQuery, UpdateProductInput};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Custom validator for Decimal minimum value
fn validate_decimal_min_zero(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("decimal_min_zero"));
    }
    Ok(())
}

fn normalize_string(value: String) -> String {
    value.trim().to_string()
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .and_then(|v| if v.is_empty() { None } else { Some(v) })
}

/// Creates the router for product endpoints. The capability table grants
/// reads to everyone and writes to admins; `/info` is its own resource kind.
pub fn products_routes() -> Router<AppState> {
    let info = Router::new()
        .route("/products/info", get(product_info))
        .with_access(Resource::ProductInfo);

    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product)
                .put(update_product)
                .patch(update_product)
                .delete(delete_product),
        )
        .with_access(Resource::Products)
        .merge(info)
}

/// Query parameters accepted by the product listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListParams {
    /// Substring match on the product name
    pub name: Option<String>,
    /// Substring match on the description
    pub description: Option<String>,
    /// Free-text search over name and description
    pub search: Option<String>,
    /// Exact-match filters
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_stock: Option<i32>,
    pub max_stock: Option<i32>,
    /// When true, products with zero stock are excluded
    pub in_stock: Option<bool>,
    /// Ordering key: name, price or stock; prefix with '-' for descending
    pub ordering: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl From<ProductListParams> for ProductListQuery {
    fn from(params: ProductListParams) -> Self {
        ProductListQuery {
            name: params.name,
            description: params.description,
            search: params.search,
            price: params.price,
            stock: params.stock,
            min_price: params.min_price,
            max_price: params.max_price,
            min_stock: params.min_stock,
            max_stock: params.max_stock,
            in_stock: params.in_stock,
            ordering: params.ordering,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            stock: model.stock,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListResponse {
    pub items: Vec<ProductResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductInfoResponse {
    pub products: Vec<ProductResponse>,
    pub count: u64,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
}

/// List products with filtering, search, ordering and pagination
#[utoipa::path(
    get,
    path = "/products",
    params(ProductListParams),
    responses(
        (status = 200, description = "Products retrieved", body = ProductListResponse),
        (status = 400, description = "Invalid query parameters", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let page = state.services.catalog.list_products(params.into()).await?;

    Ok(success_response(ProductListResponse {
        items: page.items.into_iter().map(ProductResponse::from).collect(),
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(success_response(ProductResponse::from(product)))
}

/// Create a new product
#[utoipa::path(
    post,
    path = "/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let input = CreateProductInput {
        name: normalize_string(payload.name),
        description: normalize_optional_string(payload.description),
        price: payload.price,
        stock: payload.stock,
    };

    let product = state.services.catalog.create_product(input).await?;
    Ok(created_response(ProductResponse::from(product)))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let input = UpdateProductInput {
        name: payload.name.map(normalize_string),
        description: normalize_optional_string(payload.description),
        price: payload.price,
        stock: payload.stock,
    };

    let product = state.services.catalog.update_product(id, input).await?;
    Ok(success_response(ProductResponse::from(product)))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product is referenced by order items", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.catalog.delete_product(id).await?;
    Ok(no_content_response())
}

/// Catalog summary: every product, the count and the maximum price
#[utoipa::path(
    get,
    path = "/products/info",
    responses(
        (status = 200, description = "Catalog summary", body = ProductInfoResponse)
    ),
    tag = "Products"
)]
pub async fn product_info(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let info = state.services.catalog.product_info().await?;

    Ok(success_response(ProductInfoResponse {
        products: info
            .products
            .into_iter()
            .map(ProductResponse::from)
            .collect(),
        count: info.count,
        max_price: info.max_price,
    }))
}
