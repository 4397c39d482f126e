//! Product directory boundary.
//!
//! The ledger only asks the directory whether a product exists and what it looks
//! like. Registration, soft-delete and the low-stock listing exist so the stock
//! pools have something to hang off; the directory never writes `quantity_on_hand`
//! after registration.

use std::sync::Arc;

use async_trait::async_trait;

use stockmaster_core::ProductId;
use stockmaster_inventory::{NewProduct, ProductStock};

use crate::error::StoreError;

#[async_trait]
pub trait ProductDirectory: Send + Sync {
    /// True for registered, active products.
    async fn product_exists(&self, product_id: ProductId) -> Result<bool, StoreError>;

    /// Active product snapshot, or `NotFound`.
    async fn get_product(&self, product_id: ProductId) -> Result<ProductStock, StoreError>;

    /// Register a product. `Conflict` if the SKU is already taken (active or not).
    async fn register_product(&self, product: NewProduct) -> Result<ProductStock, StoreError>;

    /// Soft-delete. The product and its history stay; it stops accepting movements.
    async fn deactivate_product(&self, product_id: ProductId) -> Result<(), StoreError>;

    /// Active products at or below their minimum threshold, lowest quantity first.
    async fn low_stock_products(&self) -> Result<Vec<ProductStock>, StoreError>;
}

#[async_trait]
impl<D> ProductDirectory for Arc<D>
where
    D: ProductDirectory + ?Sized,
{
    async fn product_exists(&self, product_id: ProductId) -> Result<bool, StoreError> {
        (**self).product_exists(product_id).await
    }

    async fn get_product(&self, product_id: ProductId) -> Result<ProductStock, StoreError> {
        (**self).get_product(product_id).await
    }

    async fn register_product(&self, product: NewProduct) -> Result<ProductStock, StoreError> {
        (**self).register_product(product).await
    }

    async fn deactivate_product(&self, product_id: ProductId) -> Result<(), StoreError> {
        (**self).deactivate_product(product_id).await
    }

    async fn low_stock_products(&self) -> Result<Vec<ProductStock>, StoreError> {
        (**self).low_stock_products().await
    }
}
