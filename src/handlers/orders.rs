use crate::auth::{AuthenticatedUser, PolicyRouterExt, Resource};
use crate::handlers::common::{
    created_response, no_content_response, success_response, validate_input,
};
use crate::services::orders::{OrderDetails, OrderItemInput, OrderStatus};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for order endpoints. Every verb requires an
/// authenticated caller; visibility narrowing happens in the service.
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/order", get(list_orders).post(create_order))
        .route("/order/", get(list_orders).post(create_order))
        .route(
            "/order/:id",
            get(get_order)
                .put(update_order)
                .patch(update_order)
                .delete(delete_order),
        )
        .with_access(Resource::Orders)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be a positive integer"))]
    pub quantity: i32,
}

impl From<CreateOrderItem> for OrderItemInput {
    fn from(item: CreateOrderItem) -> Self {
        OrderItemInput {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

/// Create request. Owner comes from the caller's token; any owner-like field
/// in the payload is ignored.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate]
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    #[validate]
    pub items: Option<Vec<CreateOrderItem>>,
}

/// List orders visible to the caller
#[utoipa::path(
    get,
    path = "/order",
    responses(
        (status = 200, description = "Orders retrieved", body = [OrderDetails]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    AuthenticatedUser(caller): AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let orders = state.services.orders.list_orders(&caller).await?;
    Ok(success_response(orders))
}

/// Create a new order owned by the caller
#[utoipa::path(
    post,
    path = "/order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderDetails),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    AuthenticatedUser(caller): AuthenticatedUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let items: Vec<OrderItemInput> = payload.items.into_iter().map(Into::into).collect();
    let order = state.services.orders.create_order(&caller, items).await?;
    Ok(created_response(order))
}

/// Get one order by ID
#[utoipa::path(
    get,
    path = "/order/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = OrderDetails),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    AuthenticatedUser(caller): AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(&caller, id).await?;
    Ok(success_response(order))
}

/// Update an order's status and/or replace its items
#[utoipa::path(
    put,
    path = "/order/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderDetails),
        (status = 400, description = "Invalid payload or status transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    AuthenticatedUser(caller): AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let items = payload
        .items
        .map(|items| items.into_iter().map(OrderItemInput::from).collect());
    let order = state
        .services
        .orders
        .update_order(&caller, id, payload.status, items)
        .await?;
    Ok(success_response(order))
}

/// Delete an order
#[utoipa::path(
    delete,
    path = "/order/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    AuthenticatedUser(caller): AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.orders.delete_order(&caller, id).await?;
    Ok(no_content_response())
}
