//! # Product Repository
//!
//! Products and kit/dynamic component lists. Deletion is soft: the row keeps
//! its id, gets `deleted_at`, and its SKU is renamed out of the way so the
//! original SKU can be reused immediately.

use chrono::Utc;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult, owned};
use crate::models::product::{self, DELETED_SKU_MARKER, Entity as Product, ProductKind};
use crate::models::product_component::{self, Entity as ProductComponent};

static SKU_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInput {
    pub component_sku: String,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct ProductInput {
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub cost_price_cents: Option<i64>,
    pub sale_price_cents: i64,
    pub stock: i32,
    pub components: Vec<ComponentInput>,
}

#[derive(Debug, Clone)]
pub struct ProductWithComponents {
    pub product: product::Model,
    pub components: Vec<product_component::Model>,
}

pub fn validate_sku(sku: &str) -> RepositoryResult<()> {
    let valid = match &*SKU_PATTERN {
        Ok(pattern) => pattern.is_match(sku),
        Err(_) => false,
    };
    if !valid || sku.contains(DELETED_SKU_MARKER) {
        return Err(RepositoryError::Validation(format!(
            "invalid SKU '{sku}': use 1-64 letters, digits, '.', '_' or '-'"
        )));
    }
    Ok(())
}

/// SKU a product is renamed to when soft-deleted at `millis`.
pub fn tombstone_sku(sku: &str, millis: i64) -> String {
    format!("{sku}{DELETED_SKU_MARKER}{millis}")
}

pub struct ProductRepository {
    db: Arc<DatabaseConnection>,
}

impl ProductRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Non-deleted products with their components.
    pub async fn list(&self, company_id: Uuid) -> RepositoryResult<Vec<ProductWithComponents>> {
        let products = Product::find()
            .filter(product::Column::CompanyId.eq(company_id))
            .filter(product::Column::DeletedAt.is_null())
            .order_by_asc(product::Column::Sku)
            .all(&*self.db)
            .await?;
        attach_components(&*self.db, company_id, products).await
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<ProductWithComponents> {
        let product = find_live(&*self.db, company_id, id).await?;
        let components = components_of(&*self.db, product.id).await?;
        Ok(ProductWithComponents {
            product,
            components,
        })
    }

    /// Live products (with components) whose SKU is in `skus`.
    pub async fn find_by_skus(
        &self,
        company_id: Uuid,
        skus: &[String],
    ) -> RepositoryResult<Vec<ProductWithComponents>> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }
        let products = Product::find()
            .filter(product::Column::CompanyId.eq(company_id))
            .filter(product::Column::DeletedAt.is_null())
            .filter(product::Column::Sku.is_in(skus.iter().cloned()))
            .all(&*self.db)
            .await?;
        attach_components(&*self.db, company_id, products).await
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        input: ProductInput,
    ) -> RepositoryResult<ProductWithComponents> {
        validate_input(&input)?;
        let txn = self.db.begin().await?;

        ensure_sku_free(&txn, company_id, &input.sku, None).await?;
        check_components(&txn, company_id, &input).await?;

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            sku: Set(input.sku.clone()),
            name: Set(input.name.clone()),
            kind: Set(input.kind),
            cost_price_cents: Set(input.cost_price_cents),
            sale_price_cents: Set(input.sale_price_cents),
            stock: Set(input.stock),
            image_path: Set(None),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        let components = replace_components(&txn, &product, &input.components).await?;

        txn.commit().await?;
        Ok(ProductWithComponents {
            product,
            components,
        })
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        id: Uuid,
        input: ProductInput,
    ) -> RepositoryResult<ProductWithComponents> {
        validate_input(&input)?;
        let txn = self.db.begin().await?;

        let existing = find_live(&txn, company_id, id).await?;
        if existing.sku != input.sku {
            ensure_sku_free(&txn, company_id, &input.sku, Some(existing.id)).await?;
            if let Some(parent) = composite_parent_of(&txn, company_id, &existing.sku).await? {
                return Err(RepositoryError::rejected(
                    "sku_in_use",
                    format!(
                        "SKU {} is a component of {}; it cannot be renamed",
                        existing.sku, parent.sku
                    ),
                ));
            }
        }
        check_components(&txn, company_id, &input).await?;

        let mut active: product::ActiveModel = existing.into();
        active.sku = Set(input.sku.clone());
        active.name = Set(input.name.clone());
        active.kind = Set(input.kind);
        active.cost_price_cents = Set(input.cost_price_cents);
        active.sale_price_cents = Set(input.sale_price_cents);
        active.stock = Set(input.stock);
        active.updated_at = Set(Utc::now());
        let product = active.update(&txn).await?;
        let components = replace_components(&txn, &product, &input.components).await?;

        txn.commit().await?;
        Ok(ProductWithComponents {
            product,
            components,
        })
    }

    /// Soft-deletes a product without stock that no live kit uses.
    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<product::Model> {
        let txn = self.db.begin().await?;

        let existing = find_live(&txn, company_id, id).await?;
        if existing.stock > 0 {
            return Err(RepositoryError::rejected(
                "product_has_stock",
                format!(
                    "Product {} still has {} units in stock",
                    existing.sku, existing.stock
                ),
            ));
        }
        if let Some(parent) = composite_parent_of(&txn, company_id, &existing.sku).await? {
            return Err(RepositoryError::rejected(
                "product_is_component",
                format!("Product {} is a component of {}", existing.sku, parent.sku),
            ));
        }

        let now = Utc::now();
        let original_sku = existing.sku.clone();
        let mut active: product::ActiveModel = existing.into();
        active.sku = Set(tombstone_sku(&original_sku, now.timestamp_millis()));
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        let deleted = active.update(&txn).await?;

        txn.commit().await?;
        tracing::info!(
            company_id = %company_id,
            product_id = %deleted.id,
            sku = %original_sku,
            "Product soft-deleted"
        );
        Ok(deleted)
    }

    pub async fn set_image(
        &self,
        company_id: Uuid,
        id: Uuid,
        key: String,
    ) -> RepositoryResult<product::Model> {
        let existing = find_live(&*self.db, company_id, id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.image_path = Set(Some(key));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }
}

fn validate_input(input: &ProductInput) -> RepositoryResult<()> {
    validate_sku(&input.sku)?;
    if input.name.trim().is_empty() {
        return Err(RepositoryError::Validation("name is required".to_string()));
    }
    if input.stock < 0 {
        return Err(RepositoryError::Validation(
            "stock must not be negative".to_string(),
        ));
    }
    if input.cost_price_cents.is_some_and(|c| c < 0) || input.sale_price_cents < 0 {
        return Err(RepositoryError::Validation(
            "prices must not be negative".to_string(),
        ));
    }
    match input.kind {
        ProductKind::Simple if !input.components.is_empty() => {
            return Err(RepositoryError::Validation(
                "simple products cannot have components".to_string(),
            ));
        }
        ProductKind::Kit if input.components.is_empty() => {
            return Err(RepositoryError::Validation(
                "kit products need at least one component".to_string(),
            ));
        }
        _ => {}
    }
    let mut seen = HashSet::new();
    for component in &input.components {
        if component.component_sku == input.sku {
            return Err(RepositoryError::Validation(
                "a product cannot be a component of itself".to_string(),
            ));
        }
        if component.quantity < 1 {
            return Err(RepositoryError::Validation(format!(
                "component {} quantity must be at least 1",
                component.component_sku
            )));
        }
        if !seen.insert(component.component_sku.as_str()) {
            return Err(RepositoryError::Validation(format!(
                "component {} is listed twice",
                component.component_sku
            )));
        }
    }
    Ok(())
}

async fn find_live<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    id: Uuid,
) -> RepositoryResult<product::Model> {
    let found = Product::find_by_id(id)
        .filter(product::Column::DeletedAt.is_null())
        .one(conn)
        .await?;
    owned(found, company_id, |p| p.company_id, "Product")
}

async fn ensure_sku_free<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    sku: &str,
    except: Option<Uuid>,
) -> RepositoryResult<()> {
    let mut query = Product::find()
        .filter(product::Column::CompanyId.eq(company_id))
        .filter(product::Column::Sku.eq(sku))
        .filter(product::Column::DeletedAt.is_null());
    if let Some(id) = except {
        query = query.filter(product::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(RepositoryError::Conflict(format!("SKU {sku} already exists")));
    }
    Ok(())
}

/// Every component SKU must name a live, non-composite product.
async fn check_components<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    input: &ProductInput,
) -> RepositoryResult<()> {
    if input.components.is_empty() {
        return Ok(());
    }
    let skus: Vec<String> = input
        .components
        .iter()
        .map(|c| c.component_sku.clone())
        .collect();
    let found: HashMap<String, ProductKind> = Product::find()
        .filter(product::Column::CompanyId.eq(company_id))
        .filter(product::Column::DeletedAt.is_null())
        .filter(product::Column::Sku.is_in(skus.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.sku, p.kind))
        .collect();

    for sku in &skus {
        match found.get(sku) {
            None => {
                return Err(RepositoryError::Validation(format!(
                    "component product {sku} does not exist"
                )));
            }
            Some(kind) if kind.is_composite() => {
                return Err(RepositoryError::Validation(format!(
                    "component product {sku} is itself a kit"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// First live kit/dynamic product listing `sku` as a component.
async fn composite_parent_of<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    sku: &str,
) -> RepositoryResult<Option<product::Model>> {
    Ok(Product::find()
        .join(JoinType::InnerJoin, product::Relation::Components.def())
        .filter(product::Column::CompanyId.eq(company_id))
        .filter(product::Column::DeletedAt.is_null())
        .filter(product::Column::Kind.is_in([ProductKind::Kit, ProductKind::Dynamic]))
        .filter(product_component::Column::ComponentSku.eq(sku))
        .one(conn)
        .await?)
}

async fn components_of<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> RepositoryResult<Vec<product_component::Model>> {
    Ok(ProductComponent::find()
        .filter(product_component::Column::ProductId.eq(product_id))
        .order_by_asc(product_component::Column::ComponentSku)
        .all(conn)
        .await?)
}

async fn replace_components<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    components: &[ComponentInput],
) -> RepositoryResult<Vec<product_component::Model>> {
    ProductComponent::delete_many()
        .filter(product_component::Column::ProductId.eq(product.id))
        .exec(conn)
        .await?;

    let mut saved = Vec::with_capacity(components.len());
    for component in components {
        saved.push(
            product_component::ActiveModel {
                id: Set(Uuid::new_v4()),
                company_id: Set(product.company_id),
                product_id: Set(product.id),
                component_sku: Set(component.component_sku.clone()),
                quantity: Set(component.quantity),
            }
            .insert(conn)
            .await?,
        );
    }
    Ok(saved)
}

async fn attach_components<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    products: Vec<product::Model>,
) -> RepositoryResult<Vec<ProductWithComponents>> {
    let ids: Vec<Uuid> = products
        .iter()
        .filter(|p| p.kind.is_composite())
        .map(|p| p.id)
        .collect();
    let mut by_product: HashMap<Uuid, Vec<product_component::Model>> = HashMap::new();
    if !ids.is_empty() {
        for component in ProductComponent::find()
            .filter(product_component::Column::CompanyId.eq(company_id))
            .filter(product_component::Column::ProductId.is_in(ids))
            .order_by_asc(product_component::Column::ComponentSku)
            .all(conn)
            .await?
        {
            by_product
                .entry(component.product_id)
                .or_default()
                .push(component);
        }
    }
    Ok(products
        .into_iter()
        .map(|product| ProductWithComponents {
            components: by_product.remove(&product.id).unwrap_or_default(),
            product,
        })
        .collect())
}
