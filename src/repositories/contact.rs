//! Contact (customer/supplier) persistence.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult, owned};
use crate::models::contact::{self, ContactKind, Entity as Contact};
use crate::models::{financial_entry, recurring_rule};

#[derive(Debug, Clone)]
pub struct ContactInput {
    pub name: String,
    pub kind: ContactKind,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub struct ContactRepository {
    db: Arc<DatabaseConnection>,
}

impl ContactRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists contacts, optionally restricted to those usable as `kind`
    /// (`both` matches either side).
    pub async fn list(
        &self,
        company_id: Uuid,
        kind: Option<ContactKind>,
    ) -> RepositoryResult<Vec<contact::Model>> {
        let mut query = Contact::find().filter(contact::Column::CompanyId.eq(company_id));
        if let Some(kind) = kind {
            query = query.filter(
                Condition::any()
                    .add(contact::Column::Kind.eq(kind))
                    .add(contact::Column::Kind.eq(ContactKind::Both)),
            );
        }
        Ok(query
            .order_by_asc(contact::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<contact::Model> {
        let found = Contact::find_by_id(id).one(&*self.db).await?;
        owned(found, company_id, |c| c.company_id, "Contact")
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        input: ContactInput,
    ) -> RepositoryResult<contact::Model> {
        let now = Utc::now();
        Ok(contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(input.name),
            kind: Set(input.kind),
            document: Set(input.document),
            email: Set(input.email),
            phone: Set(input.phone),
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
        input: ContactInput,
    ) -> RepositoryResult<contact::Model> {
        let existing = self.get(company_id, id).await?;
        let mut active: contact::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.kind = Set(input.kind);
        active.document = Set(input.document);
        active.email = Set(input.email);
        active.phone = Set(input.phone);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Deletes a contact that no entry or rule references.
    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let existing = self.get(company_id, id).await?;
        let entries = financial_entry::Entity::find()
            .filter(financial_entry::Column::CompanyId.eq(company_id))
            .filter(financial_entry::Column::ContactId.eq(existing.id))
            .count(&*self.db)
            .await?;
        let rules = recurring_rule::Entity::find()
            .filter(recurring_rule::Column::CompanyId.eq(company_id))
            .filter(recurring_rule::Column::ContactId.eq(existing.id))
            .count(&*self.db)
            .await?;
        if entries + rules > 0 {
            return Err(RepositoryError::rejected(
                "contact_in_use",
                "Contact is referenced by payables, receivables or recurring rules",
            ));
        }
        Contact::delete_by_id(existing.id).exec(&*self.db).await?;
        Ok(())
    }
}
