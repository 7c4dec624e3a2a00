//! Mercado Livre response shapes. Only the fields the sync and analytics
//! read are declared; everything else in the payload is ignored.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::money;
use crate::repositories::ml_integration::TokenPair;
use crate::repositories::ml_listing::ListingRecord;

/// `/oauth/token` body for both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    pub fn into_pair(self, now: DateTime<Utc>) -> TokenPair {
        TokenPair {
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
        }
    }
}

/// `/users/me`
#[derive(Debug, Clone, Deserialize)]
pub struct SellerProfile {
    #[serde(deserialize_with = "required_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// One page of an offset/limit search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    pub paging: Paging,
}

/// Entry of the `/items?ids=` multi-get response.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemEnvelope {
    pub code: u16,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemAttribute {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub value_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub available_quantity: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub seller_custom_field: Option<String>,
    #[serde(default)]
    pub attributes: Vec<ItemAttribute>,
    #[serde(default)]
    pub variations: Vec<Value>,
}

impl Item {
    /// `seller_custom_field`, else the `SELLER_SKU` attribute.
    pub fn seller_sku(&self) -> Option<String> {
        self.seller_custom_field
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|a| a.id.as_deref() == Some("SELLER_SKU"))
                    .and_then(|a| a.value_name.clone())
            })
    }

    pub fn into_record(self) -> ListingRecord {
        let seller_sku = self.seller_sku();
        ListingRecord {
            price_cents: self.price.and_then(money::to_cents).unwrap_or(0),
            available_quantity: self.available_quantity.unwrap_or(0),
            status: self.status.unwrap_or_else(|| "unknown".to_string()),
            variation_count: i32::try_from(self.variations.len()).unwrap_or(i32::MAX),
            external_listing_id: self.id,
            title: self.title,
            permalink: self.permalink,
            thumbnail: self.thumbnail,
            category_id: self.category_id,
            category_name: None,
            seller_sku,
        }
    }
}

/// `/categories/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// The seller promotion searches, one per promotion family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    Deal,
    Campaign,
    PromotionPack,
}

impl PromotionKind {
    pub const ALL: [PromotionKind; 3] = [Self::Deal, Self::Campaign, Self::PromotionPack];

    pub fn search_path(self, store_id: &str) -> String {
        let family = match self {
            Self::Deal => "deals",
            Self::Campaign => "campaigns",
            Self::PromotionPack => "promotions_packs",
        };
        format!("/users/{store_id}/{family}/search")
    }
}

/// Entry of a promotion search. Dates are kept as the provider sent them.
#[derive(Debug, Clone, Deserialize)]
pub struct Promotion {
    #[serde(deserialize_with = "required_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub finish_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SellerPromotion {
    pub kind: PromotionKind,
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub finish_date: Option<String>,
}

impl Promotion {
    pub fn into_seller(self, kind: PromotionKind) -> SellerPromotion {
        SellerPromotion {
            kind,
            id: self.id,
            name: self.name,
            status: self.status,
            start_date: self.start_date,
            finish_date: self.finish_date,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    #[serde(deserialize_with = "required_string_or_number")]
    pub id: String,
    pub status: String,
    pub date_created: DateTime<FixedOffset>,
    #[serde(default)]
    pub date_closed: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status == "paid"
    }

    /// Closing time when present, creation time otherwise.
    pub fn effective_at(&self) -> DateTime<FixedOffset> {
        self.date_closed.unwrap_or(self.date_created)
    }

    /// Sum of provider-reported net amounts, `None` when no payment
    /// carries one.
    pub fn net_received(&self) -> Option<Decimal> {
        self.payments
            .iter()
            .filter_map(|p| p.net_received_amount)
            .reduce(|acc, amount| acc + amount)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItem {
    pub item: OrderItemRef,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn revenue(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRef {
    pub id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub variation_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub seller_sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payment {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<Decimal>,
    #[serde(default)]
    pub net_received_amount: Option<Decimal>,
}

/// Marketplace ids arrive as numbers on some endpoints and strings on others.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn required_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    string_or_number(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("expected a string or numeric id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_parses_numeric_ids_and_offsets() {
        let order: Order = serde_json::from_value(json!({
            "id": 2000001234,
            "status": "paid",
            "date_created": "2025-03-01T23:30:00.000-04:00",
            "date_closed": null,
            "total_amount": 150.5,
            "order_items": [{
                "item": { "id": "MLB1", "variation_id": 987, "title": "Mug" },
                "quantity": 2,
                "unit_price": 75.25
            }],
            "payments": [{ "id": 1, "status": "approved", "transaction_amount": 150.5 }]
        }))
        .unwrap();

        assert_eq!(order.id, "2000001234");
        assert_eq!(order.order_items[0].item.variation_id.as_deref(), Some("987"));
        assert_eq!(order.order_items[0].revenue(), Decimal::new(15050, 2));
        assert_eq!(order.net_received(), None);
        assert_eq!(order.effective_at(), order.date_created);
    }

    #[test]
    fn item_prefers_custom_field_then_attribute() {
        let item: Item = serde_json::from_value(json!({
            "id": "MLB2",
            "title": "Kit",
            "price": 19.9,
            "attributes": [{ "id": "SELLER_SKU", "value_name": "KIT-01" }],
            "variations": [{}, {}]
        }))
        .unwrap();
        let record = item.into_record();
        assert_eq!(record.seller_sku.as_deref(), Some("KIT-01"));
        assert_eq!(record.price_cents, 1990);
        assert_eq!(record.variation_count, 2);
        assert_eq!(record.status, "unknown");
    }

    #[test]
    fn promotion_families_search_under_the_seller() {
        let paths: Vec<String> = PromotionKind::ALL
            .iter()
            .map(|kind| kind.search_path("777"))
            .collect();
        assert_eq!(
            paths,
            vec![
                "/users/777/deals/search",
                "/users/777/campaigns/search",
                "/users/777/promotions_packs/search",
            ]
        );
        let promotion: Promotion =
            serde_json::from_value(json!({ "id": 42, "name": "Black Friday" })).unwrap();
        let seller = promotion.into_seller(PromotionKind::Campaign);
        assert_eq!(seller.id, "42");
        assert_eq!(serde_json::to_value(seller.kind).unwrap(), json!("campaign"));
    }

    #[test]
    fn empty_refresh_token_is_treated_as_absent() {
        let now = Utc::now();
        let pair = TokenResponse {
            access_token: "a".into(),
            token_type: None,
            expires_in: Some(21600),
            scope: None,
            user_id: None,
            refresh_token: Some(String::new()),
        }
        .into_pair(now);
        assert!(pair.refresh_token.is_none());
        assert_eq!(pair.expires_at, Some(now + Duration::seconds(21600)));
    }
}
