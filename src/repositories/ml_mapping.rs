//! Listing-to-SKU mappings.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult, owned};
use crate::models::ml_product_mapping::{self, Entity as MlProductMapping, WHOLE_LISTING};
use crate::models::{ml_integration, product};

#[derive(Debug, Clone)]
pub struct MappingInput {
    pub integration_id: Uuid,
    pub external_listing_id: String,
    pub variation_id: Option<String>,
    pub product_sku: String,
}

pub struct MlMappingRepository {
    db: Arc<DatabaseConnection>,
}

impl MlMappingRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(&self, company_id: Uuid) -> RepositoryResult<Vec<ml_product_mapping::Model>> {
        Ok(MlProductMapping::find()
            .filter(ml_product_mapping::Column::CompanyId.eq(company_id))
            .order_by_asc(ml_product_mapping::Column::ExternalListingId)
            .order_by_asc(ml_product_mapping::Column::VariationId)
            .all(&*self.db)
            .await?)
    }

    /// Maps a listing (or one of its variations) to a live product SKU.
    /// A second mapping for the same `(listing, variation)` is a conflict.
    pub async fn create(
        &self,
        company_id: Uuid,
        input: MappingInput,
    ) -> RepositoryResult<ml_product_mapping::Model> {
        let found = ml_integration::Entity::find_by_id(input.integration_id)
            .one(&*self.db)
            .await?;
        let integration = owned(found, company_id, |i| i.company_id, "Integration")?;

        let product_exists = product::Entity::find()
            .filter(product::Column::CompanyId.eq(company_id))
            .filter(product::Column::Sku.eq(input.product_sku.as_str()))
            .filter(product::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .is_some();
        if !product_exists {
            return Err(RepositoryError::Validation(format!(
                "product {} does not exist",
                input.product_sku
            )));
        }

        let variation_id = input
            .variation_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| WHOLE_LISTING.to_string());

        let duplicate = MlProductMapping::find()
            .filter(ml_product_mapping::Column::CompanyId.eq(company_id))
            .filter(ml_product_mapping::Column::ExternalListingId.eq(input.external_listing_id.as_str()))
            .filter(ml_product_mapping::Column::VariationId.eq(variation_id.as_str()))
            .one(&*self.db)
            .await?;
        if let Some(existing) = duplicate {
            return Err(RepositoryError::Conflict(format!(
                "listing {} is already mapped to {}",
                existing.external_listing_id, existing.product_sku
            )));
        }

        let now = Utc::now();
        Ok(ml_product_mapping::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            integration_id: Set(integration.id),
            external_listing_id: Set(input.external_listing_id),
            variation_id: Set(variation_id),
            product_sku: Set(input.product_sku),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?)
    }

    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let found = MlProductMapping::find_by_id(id).one(&*self.db).await?;
        let mapping = owned(found, company_id, |m| m.company_id, "Mapping")?;
        MlProductMapping::delete_by_id(mapping.id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
