//! # Catalog and Customer Operations

use super::BackOffice;
use crate::error::{ApiError, ApiResult};
use furnish_core::{Customer, NewCustomer, NewProduct, Product, ProductPatch};

impl BackOffice {
    /// Creates a product and its inventory record together.
    pub async fn create_product(&self, input: NewProduct) -> ApiResult<Product> {
        Ok(self.db.products().insert(input).await?)
    }

    pub async fn get_product(&self, product_id: &str) -> ApiResult<Product> {
        self.db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", product_id))
    }

    pub async fn get_product_by_code(&self, code: &str) -> ApiResult<Product> {
        self.db
            .products()
            .get_by_code(code)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", code))
    }

    pub async fn list_active_products(&self, limit: Option<u32>) -> ApiResult<Vec<Product>> {
        Ok(self.db.products().list_active(limit).await?)
    }

    /// Price changes apply to future sales only.
    pub async fn update_product(&self, product_id: &str, patch: ProductPatch) -> ApiResult<Product> {
        Ok(self.db.products().update(product_id, patch).await?)
    }

    pub async fn create_customer(&self, input: NewCustomer) -> ApiResult<Customer> {
        Ok(self.db.customers().insert(input).await?)
    }

    pub async fn get_customer(&self, customer_id: &str) -> ApiResult<Customer> {
        self.db
            .customers()
            .get_by_id(customer_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Customer", customer_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorCode;
    use crate::service::test_support::*;
    use furnish_core::{NewProduct, ProductPatch};

    #[tokio::test]
    async fn test_duplicate_code_is_validation_error() {
        let office = office().await;
        product(&office, "BOOKCASE", 20_000, 1).await;

        let err = office
            .create_product(NewProduct {
                code: "BOOKCASE".into(),
                name: "Second bookcase".into(),
                unit_price_cents: 1,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("BOOKCASE"));
    }

    #[tokio::test]
    async fn test_product_and_customer_lookups() {
        let office = office().await;
        let c = customer(&office).await;
        let p = product(&office, "WARDROBE", 90_000, 2).await;

        assert_eq!(office.get_customer(&c.id).await.unwrap().name, "Grace Hopper");
        assert_eq!(office.get_product_by_code("WARDROBE").await.unwrap().id, p.id);

        let updated = office
            .update_product(
                &p.id,
                ProductPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert!(office.list_active_products(None).await.unwrap().is_empty());

        assert_eq!(
            office.get_product("missing").await.unwrap_err().code,
            ErrorCode::NotFound
        );
        assert_eq!(
            office.get_customer("missing").await.unwrap_err().code,
            ErrorCode::NotFound
        );
    }
}
