use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Product entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Product name
    #[validate(length(
        min = 1,
        max = 255,
        message = "Product name must be between 1 and 255 characters"
    ))]
    pub name: String,

    /// Product description
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    /// Unit price; never negative
    pub price: Decimal,

    /// Units on hand; never negative
    pub stock: i32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// A product is in stock when at least one unit is on hand.
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            active_model.created_at = Set(Utc::now());
        }
        active_model.updated_at = Set(Some(Utc::now()));

        let model: Model = active_model.clone().try_into().map_err(|_| {
            DbErr::Custom("Failed to convert ActiveModel to Model for validation".to_string())
        })?;

        if let Err(err) = model.validate() {
            return Err(DbErr::Custom(format!("Validation error: {}", err)));
        }
        if model.price < Decimal::ZERO {
            return Err(DbErr::Custom("Validation error: price cannot be negative".into()));
        }
        if model.stock < 0 {
            return Err(DbErr::Custom("Validation error: stock cannot be negative".into()));
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(stock: i32) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Widget".into(),
            description: None,
            price: dec!(9.99),
            stock,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn in_stock_requires_positive_stock() {
        assert!(sample(3).in_stock());
        assert!(!sample(0).in_stock());
    }
}
