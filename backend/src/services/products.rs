//! Product registry

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    validate_price, validate_product_code, validate_product_name, validate_thresholds, Actor,
    Capability, NewProduct, PaginatedResponse, Pagination, Product, ProductStatus,
    DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD,
};

use super::authz::CapabilityCheck;
use crate::error::{AppError, AppResult};
use crate::store::{InventoryStore, ProductFilter, StockTx};

/// Registers products, edits their descriptive fields and serves product
/// lookups. Never writes quantity.
#[derive(Clone)]
pub struct ProductRegistry<S> {
    store: S,
    authz: Arc<dyn CapabilityCheck>,
}

/// Input for registering a product
#[derive(Debug, Clone)]
pub struct RegisterProduct {
    pub code: String,
    pub name: String,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub low_threshold: Option<i64>,
    pub high_threshold: Option<i64>,
}

impl RegisterProduct {
    fn validate(self) -> AppResult<NewProduct> {
        let code = self.code.trim().to_string();
        let name = self.name.trim().to_string();
        let low_threshold = self.low_threshold.unwrap_or(DEFAULT_LOW_THRESHOLD);
        let high_threshold = self.high_threshold.unwrap_or(DEFAULT_HIGH_THRESHOLD);

        validate_product_code(&code).map_err(|m| AppError::validation("code", m))?;
        validate_product_name(&name).map_err(|m| AppError::validation("name", m))?;
        validate_price(self.purchase_price)
            .map_err(|m| AppError::validation("purchase_price", m))?;
        validate_price(self.sale_price).map_err(|m| AppError::validation("sale_price", m))?;
        validate_thresholds(low_threshold, high_threshold)
            .map_err(|m| AppError::validation("low_threshold", m))?;

        Ok(NewProduct {
            code,
            name,
            purchase_price: self.purchase_price,
            sale_price: self.sale_price,
            low_threshold,
            high_threshold,
        })
    }
}

/// Changes to a product's non-quantity fields; `None` leaves a field as is.
///
/// The code is the product's business key and cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub low_threshold: Option<i64>,
    pub high_threshold: Option<i64>,
    pub status: Option<ProductStatus>,
}

impl UpdateProduct {
    fn apply_to(self, product: &mut Product) -> AppResult<()> {
        let now = Utc::now();

        if let Some(name) = self.name {
            let name = name.trim().to_string();
            validate_product_name(&name).map_err(|m| AppError::validation("name", m))?;
            product.name = name;
        }
        if let Some(price) = self.purchase_price {
            validate_price(price).map_err(|m| AppError::validation("purchase_price", m))?;
            product.purchase_price = price;
        }
        if let Some(price) = self.sale_price {
            validate_price(price).map_err(|m| AppError::validation("sale_price", m))?;
            product.sale_price = price;
        }
        if self.low_threshold.is_some() || self.high_threshold.is_some() {
            let low = self.low_threshold.unwrap_or(product.low_threshold);
            let high = self.high_threshold.unwrap_or(product.high_threshold);
            validate_thresholds(low, high).map_err(|m| AppError::validation("low_threshold", m))?;
            product.set_thresholds(low, high, now);
        }
        if let Some(status) = self.status {
            product.set_status(status, now);
        }

        product.updated_at = now;
        Ok(())
    }
}

impl<S: InventoryStore> ProductRegistry<S> {
    pub fn new(store: S, authz: Arc<dyn CapabilityCheck>) -> Self {
        Self { store, authz }
    }

    pub async fn register(&self, actor: &Actor, input: RegisterProduct) -> AppResult<Product> {
        self.authz.check(actor, Capability::RegisterProduct)?;

        let product = self.store.insert_product(input.validate()?).await?;
        tracing::info!(
            product_id = product.id,
            code = %product.code,
            user_id = actor.user_id,
            "Product registered"
        );
        Ok(product)
    }

    /// Edit a product under its exclusive hold, so the change never races a
    /// quantity write
    pub async fn update(
        &self,
        actor: &Actor,
        product_id: i64,
        changes: UpdateProduct,
    ) -> AppResult<Product> {
        let capability = match changes.status {
            Some(ProductStatus::Disabled) => Capability::DisableProduct,
            _ => Capability::UpdateProduct,
        };
        self.authz.check(actor, capability)?;

        let mut tx = self.store.begin().await?;
        let mut product = tx.lock_product(product_id).await?;
        let previous = product.status;

        changes.apply_to(&mut product)?;
        tx.save_product(&product).await?;
        tx.commit().await?;

        tracing::info!(
            product_id,
            from = %previous,
            status = %product.status,
            user_id = actor.user_id,
            "Product updated"
        );
        Ok(product)
    }

    /// Take a product out of service. Its ledger history is kept and it
    /// stays `disabled` through later stock movements.
    pub async fn disable(&self, actor: &Actor, product_id: i64) -> AppResult<Product> {
        self.update(
            actor,
            product_id,
            UpdateProduct {
                status: Some(ProductStatus::Disabled),
                ..UpdateProduct::default()
            },
        )
        .await
    }

    pub async fn get(&self, actor: &Actor, product_id: i64) -> AppResult<Product> {
        self.authz.check(actor, Capability::ViewProducts)?;

        self.store
            .find_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: &ProductFilter,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<Product>> {
        self.authz.check(actor, Capability::ViewProducts)?;

        let (products, total) = self.store.list_products(filter, page).await?;
        Ok(PaginatedResponse::new(products, page, total))
    }
}
