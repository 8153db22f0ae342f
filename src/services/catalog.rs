use crate::{
    entities::order_item,
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Service for the product catalog: CRUD plus filtered listing.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    default_limit: u64,
    max_limit: u64,
}

impl CatalogService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        default_limit: u64,
        max_limit: u64,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_limit,
            max_limit,
        }
    }

    /// List products with filtering, search, ordering and offset/limit
    /// pagination. Results are ordered by primary key ascending unless an
    /// explicit ordering key is given.
    #[instrument(skip(self, query))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
    ) -> Result<ProductPage, ServiceError> {
        let mut db_query = ProductEntity::find();

        if let Some(name) = &query.name {
            db_query = db_query.filter(product::Column::Name.contains(name));
        }
        if let Some(description) = &query.description {
            db_query = db_query.filter(product::Column::Description.contains(description));
        }
        if let Some(search) = &query.search {
            db_query = db_query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(search))
                    .add(product::Column::Description.contains(search)),
            );
        }
        if let Some(price) = query.price {
            db_query = db_query.filter(product::Column::Price.eq(price));
        }
        if let Some(stock) = query.stock {
            db_query = db_query.filter(product::Column::Stock.eq(stock));
        }
        if let Some(min_price) = query.min_price {
            db_query = db_query.filter(product::Column::Price.gte(min_price));
        }
        if let Some(max_price) = query.max_price {
            db_query = db_query.filter(product::Column::Price.lte(max_price));
        }
        if let Some(min_stock) = query.min_stock {
            db_query = db_query.filter(product::Column::Stock.gte(min_stock));
        }
        if let Some(max_stock) = query.max_stock {
            db_query = db_query.filter(product::Column::Stock.lte(max_stock));
        }
        if query.in_stock.unwrap_or(false) {
            db_query = db_query.filter(product::Column::Stock.gt(0));
        }

        db_query = match query.ordering.as_deref() {
            None => db_query.order_by_asc(product::Column::Id),
            Some(key) => {
                let (field, descending) = match key.strip_prefix('-') {
                    Some(rest) => (rest, true),
                    None => (key, false),
                };
                let column = match field {
                    "name" => product::Column::Name,
                    "price" => product::Column::Price,
                    "stock" => product::Column::Stock,
                    other => {
                        return Err(ServiceError::ValidationError(format!(
                            "ordering: unknown key '{other}'"
                        )))
                    }
                };
                if descending {
                    db_query.order_by_desc(column)
                } else {
                    db_query.order_by_asc(column)
                }
            }
        };

        let total = db_query.clone().count(&*self.db).await?;

        let limit = query.limit.unwrap_or(self.default_limit).min(self.max_limit);
        let offset = query.offset.unwrap_or(0);

        let items = db_query.limit(limit).offset(offset).all(&*self.db).await?;

        Ok(ProductPage {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Fetch one product by id.
    pub async fn get_product(&self, id: Uuid) -> Result<ProductModel, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// Create a product. Price and stock must be non-negative.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        validate_product_fields(&input.name, input.price, input.stock)?;

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            stock: Set(input.stock),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        if let Err(e) = self.event_sender.send(Event::ProductCreated(product.id)).await {
            warn!(product_id = %product.id, "Failed to send product created event: {}", e);
        }

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Partially update a product under the same validation as create.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let existing = self.get_product(id).await?;

        let name = input.name.as_deref().unwrap_or(&existing.name);
        let price = input.price.unwrap_or(existing.price);
        let stock = input.stock.unwrap_or(existing.stock);
        validate_product_fields(name, price, stock)?;

        let mut model: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            model.name = Set(name);
        }
        if let Some(description) = input.description {
            model.description = Set(Some(description));
        }
        if let Some(price) = input.price {
            model.price = Set(price);
        }
        if let Some(stock) = input.stock {
            model.stock = Set(stock);
        }

        let product = model.update(&*self.db).await?;

        if let Err(e) = self.event_sender.send(Event::ProductUpdated(product.id)).await {
            warn!(product_id = %product.id, "Failed to send product updated event: {}", e);
        }

        Ok(product)
    }

    /// Delete a product. Refused with a conflict while order items still
    /// reference it (explicit restrict policy).
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let product = self.get_product(id).await?;

        let referencing_items = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&*self.db)
            .await?;
        if referencing_items > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} is referenced by existing order items",
                id
            )));
        }

        product.delete(&*self.db).await?;

        if let Err(e) = self.event_sender.send(Event::ProductDeleted(id)).await {
            warn!(product_id = %id, "Failed to send product deleted event: {}", e);
        }

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Catalog-wide derived read: every product, the total count and the
    /// maximum price (absent while the catalog is empty).
    #[instrument(skip(self))]
    pub async fn product_info(&self) -> Result<ProductInfo, ServiceError> {
        let products = ProductEntity::find()
            .order_by_asc(product::Column::Id)
            .all(&*self.db)
            .await?;

        let count = products.len() as u64;
        let max_price = products.iter().map(|p| p.price).max();

        Ok(ProductInfo {
            products,
            count,
            max_price,
        })
    }
}

fn validate_product_fields(name: &str, price: Decimal, stock: i32) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "name: cannot be blank".to_string(),
        ));
    }
    if price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "price: cannot be negative".to_string(),
        ));
    }
    if stock < 0 {
        return Err(ServiceError::ValidationError(
            "stock: cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Fields for creating a product.
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
}

/// Filter/pagination parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub name: Option<String>,
    pub description: Option<String>,
    pub search: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_stock: Option<i32>,
    pub max_stock: Option<i32>,
    pub in_stock: Option<bool>,
    pub ordering: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// One page of products.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub items: Vec<ProductModel>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Derived catalog summary.
#[derive(Debug, Serialize)]
pub struct ProductInfo {
    pub products: Vec<ProductModel>,
    pub count: u64,
    pub max_price: Option<Decimal>,
}
