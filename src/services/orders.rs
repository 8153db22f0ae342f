use crate::{
    auth::AuthUser,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel},
    entities::order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Lifecycle states of an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Explicit transition table. Terminal states transition nowhere.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Delivered)
        )
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw)
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {raw}")))
}

/// One line item in a create/update request.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// An order with its items and derived totals, as returned to callers.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemDetails>,
    pub total: Decimal,
}

/// A line item with its product and live-price subtotal.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderItemDetails {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub item_subtotal: Decimal,
}

/// Service for managing orders. Every multi-row mutation runs in a single
/// transaction so concurrent requests never observe a partial order.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates an order owned by `owner` with the given items. The owner is
    /// always the authenticated caller; nothing in the request body can
    /// change it. The order header and all items are inserted atomically.
    #[instrument(skip(self, items), fields(owner = %owner.user_id, item_count = items.len()))]
    pub async fn create_order(
        &self,
        owner: &AuthUser,
        items: Vec<OrderItemInput>,
    ) -> Result<OrderDetails, ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(owner.user_id),
            status: Set(OrderStatus::Pending.to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        let (item_models, products) = insert_items(&txn, order_id, &items).await?;

        // Errors above drop the transaction, rolling back the order header
        // together with any items already written.
        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, owner = %owner.user_id, "Order created");

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order_id)).await {
            warn!(order_id = %order_id, "Failed to send order created event: {}", e);
        }

        build_details(order, item_models, &products)
    }

    /// Lists orders visible to the caller: admins see all orders, everyone
    /// else only their own. Items and products load eagerly in bulk.
    #[instrument(skip(self), fields(caller = %caller.user_id, admin = caller.is_admin()))]
    pub async fn list_orders(&self, caller: &AuthUser) -> Result<Vec<OrderDetails>, ServiceError> {
        let mut query = OrderEntity::find().order_by_asc(order::Column::CreatedAt);
        if !caller.is_admin() {
            query = query.filter(order::Column::UserId.eq(caller.user_id));
        }

        let orders_with_items = query
            .find_with_related(OrderItemEntity)
            .all(&*self.db)
            .await?;

        let product_ids: Vec<Uuid> = orders_with_items
            .iter()
            .flat_map(|(_, items)| items.iter().map(|item| item.product_id))
            .collect();
        let products = load_products(&*self.db, &product_ids).await?;

        orders_with_items
            .into_iter()
            .map(|(order, items)| build_details(order, items, &products))
            .collect()
    }

    /// Fetches one order visible to the caller. An order that exists but
    /// belongs to someone else reads as not found, so callers cannot
    /// enumerate other users' orders.
    #[instrument(skip(self), fields(caller = %caller.user_id, order_id = %order_id))]
    pub async fn get_order(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self.find_visible(caller, order_id).await?;

        let items = order
            .find_related(OrderItemEntity)
            .all(&*self.db)
            .await?;
        let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
        let products = load_products(&*self.db, &product_ids).await?;

        build_details(order, items, &products)
    }

    /// Updates an order's status and/or replaces its item set atomically.
    /// Status changes are validated against the transition table.
    #[instrument(skip(self, new_status, new_items), fields(caller = %caller.user_id, order_id = %order_id))]
    pub async fn update_order(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
        new_status: Option<OrderStatus>,
        new_items: Option<Vec<OrderItemInput>>,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self.find_visible(caller, order_id).await?;
        let old_status = parse_status(&order.status)?;

        if let Some(next) = new_status {
            if next != old_status && !old_status.can_transition_to(next) {
                return Err(ServiceError::InvalidStatus(format!(
                    "Cannot transition order from {old_status} to {next}"
                )));
            }
        }

        let txn = self.db.begin().await?;

        let mut model: order::ActiveModel = order.into();
        if let Some(next) = new_status {
            model.status = Set(next.to_string());
        }
        model.updated_at = Set(Some(Utc::now()));
        let order = model.update(&txn).await?;

        let (items, products) = match new_items {
            Some(inputs) => {
                OrderItemEntity::delete_many()
                    .filter(order_item::Column::OrderId.eq(order_id))
                    .exec(&txn)
                    .await?;
                insert_items(&txn, order_id, &inputs).await?
            }
            None => {
                let items = OrderItemEntity::find()
                    .filter(order_item::Column::OrderId.eq(order_id))
                    .all(&txn)
                    .await?;
                let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
                let products = load_products(&txn, &product_ids).await?;
                (items, products)
            }
        };

        txn.commit().await?;

        if let Some(next) = new_status {
            if next != old_status {
                let event = Event::OrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: next.to_string(),
                };
                if let Err(e) = self.event_sender.send(event).await {
                    warn!(order_id = %order_id, "Failed to send status change event: {}", e);
                }
            }
        }

        build_details(order, items, &products)
    }

    /// Deletes an order and its items.
    #[instrument(skip(self), fields(caller = %caller.user_id, order_id = %order_id))]
    pub async fn delete_order(&self, caller: &AuthUser, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.find_visible(caller, order_id).await?;

        let txn = self.db.begin().await?;
        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order.delete(&txn).await?;
        txn.commit().await?;

        if let Err(e) = self.event_sender.send(Event::OrderDeleted(order_id)).await {
            warn!(order_id = %order_id, "Failed to send order deleted event: {}", e);
        }

        info!(order_id = %order_id, "Order deleted");
        Ok(())
    }

    async fn find_visible(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let not_found = || ServiceError::NotFound(format!("Order {} not found", order_id));

        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;

        if !caller.is_admin() && order.user_id != caller.user_id {
            return Err(not_found());
        }
        Ok(order)
    }
}

/// Validates and inserts line items for `order_id` on the given connection.
/// Each item must reference an existing product and carry a positive
/// quantity; the first invalid item aborts the whole batch.
async fn insert_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    items: &[OrderItemInput],
) -> Result<(Vec<OrderItemModel>, HashMap<Uuid, ProductModel>), ServiceError> {
    let mut models = Vec::with_capacity(items.len());
    let mut products: HashMap<Uuid, ProductModel> = HashMap::new();

    for (index, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "items[{index}].quantity: must be a positive integer"
            )));
        }

        if !products.contains_key(&item.product_id) {
            let product = ProductEntity::find_by_id(item.product_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "items[{index}].product_id: unknown product {}",
                        item.product_id
                    ))
                })?;
            products.insert(item.product_id, product);
        }

        let model = order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
        }
        .insert(conn)
        .await?;
        models.push(model);
    }

    Ok((models, products))
}

async fn load_products<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> Result<HashMap<Uuid, ProductModel>, ServiceError> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let products = ProductEntity::find()
        .filter(product::Column::Id.is_in(product_ids.iter().copied()))
        .all(conn)
        .await?;
    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

/// Assembles the caller-facing view of an order. Subtotals use the current
/// product price; the total is the sum of subtotals, never stored.
fn build_details(
    order: OrderModel,
    items: Vec<OrderItemModel>,
    products: &HashMap<Uuid, ProductModel>,
) -> Result<OrderDetails, ServiceError> {
    let status = parse_status(&order.status)?;

    let mut details = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;

    for item in items {
        let product = products.get(&item.product_id).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Order item {} references a product that failed to load",
                item.id
            ))
        })?;
        let item_subtotal = Decimal::from(item.quantity) * product.price;
        total += item_subtotal;

        details.push(OrderItemDetails {
            id: item.id,
            product_id: item.product_id,
            product_name: product.name.clone(),
            quantity: item.quantity,
            unit_price: product.price,
            item_subtotal,
        });
    }

    Ok(OrderDetails {
        id: order.id,
        user_id: order.user_id,
        status,
        created_at: order.created_at,
        items: details,
        total,
    })
}
