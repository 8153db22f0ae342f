//! OpenAPI document for the storefront API surface.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::create_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::product_info,
        handlers::orders::list_orders,
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::update_order,
        handlers::orders::delete_order,
    ),
    components(schemas(
        handlers::products::ProductResponse,
        handlers::products::ProductListResponse,
        handlers::products::ProductInfoResponse,
        handlers::products::CreateProductRequest,
        handlers::products::UpdateProductRequest,
        handlers::orders::CreateOrderRequest,
        handlers::orders::CreateOrderItem,
        handlers::orders::UpdateOrderRequest,
        crate::services::orders::OrderDetails,
        crate::services::orders::OrderItemDetails,
        crate::services::orders::OrderStatus,
        crate::errors::ErrorResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Products", description = "Product catalog"),
        (name = "Orders", description = "Order placement and lifecycle"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builds_and_lists_paths() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        let paths = json["paths"].as_object().unwrap();
        assert!(paths.contains_key("/products"));
        assert!(paths.contains_key("/order"));
    }
}
