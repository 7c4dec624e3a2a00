//! Category persistence. Parents must belong to the same company and share
//! the child's kind.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult, owned, referenced};
use crate::models::category::{self, CategoryKind, Entity as Category};

#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub kind: CategoryKind,
    pub parent_id: Option<Uuid>,
}

pub struct CategoryRepository {
    db: Arc<DatabaseConnection>,
}

impl CategoryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        kind: Option<CategoryKind>,
    ) -> RepositoryResult<Vec<category::Model>> {
        let mut query = Category::find().filter(category::Column::CompanyId.eq(company_id));
        if let Some(kind) = kind {
            query = query.filter(category::Column::Kind.eq(kind));
        }
        Ok(query
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<category::Model> {
        let found = Category::find_by_id(id).one(&*self.db).await?;
        owned(found, company_id, |c| c.company_id, "Category")
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        input: CategoryInput,
    ) -> RepositoryResult<category::Model> {
        self.check_parent(company_id, None, &input).await?;
        let now = Utc::now();
        Ok(category::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(input.name),
            kind: Set(input.kind),
            parent_id: Set(input.parent_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?)
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        id: Uuid,
        input: CategoryInput,
    ) -> RepositoryResult<category::Model> {
        let existing = self.get(company_id, id).await?;
        self.check_parent(company_id, Some(existing.id), &input)
            .await?;
        let mut active: category::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.kind = Set(input.kind);
        active.parent_id = Set(input.parent_id);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let existing = self.get(company_id, id).await?;
        let children = Category::find()
            .filter(category::Column::CompanyId.eq(company_id))
            .filter(category::Column::ParentId.eq(existing.id))
            .count(&*self.db)
            .await?;
        if children > 0 {
            return Err(RepositoryError::rejected(
                "category_has_children",
                format!("Category has {children} subcategories"),
            ));
        }
        Category::delete_by_id(existing.id).exec(&*self.db).await?;
        Ok(())
    }

    async fn check_parent(
        &self,
        company_id: Uuid,
        self_id: Option<Uuid>,
        input: &CategoryInput,
    ) -> RepositoryResult<()> {
        let Some(parent_id) = input.parent_id else {
            return Ok(());
        };
        if Some(parent_id) == self_id {
            return Err(RepositoryError::Validation(
                "category cannot be its own parent".to_string(),
            ));
        }
        let found = Category::find_by_id(parent_id).one(&*self.db).await?;
        let parent = referenced(found, company_id, |c| c.company_id, "Parent category")?;
        if parent.kind != input.kind {
            return Err(RepositoryError::Validation(
                "parent category must have the same kind".to_string(),
            ));
        }
        if parent.parent_id.is_some() {
            return Err(RepositoryError::Validation(
                "categories can only be nested one level deep".to_string(),
            ));
        }
        Ok(())
    }
}
