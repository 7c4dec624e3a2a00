//! Per-SKU units and revenue, with kit sales spread over their components.
//!
//! A composite product's sale is split by cost contribution: component
//! `i` receives `units * cost_i * qty_i / kit_cost` units and the same share
//! of revenue. Components with no recorded cost take no share. When no
//! component of a kit has a cost the kit keeps its own sales and is listed
//! in `unallocated_kits`.

use chrono::{FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use utoipa::ToSchema;

use super::{DateRange, local_day};
use crate::marketplace::types::{Order, OrderItemRef};
use crate::models::ml_product_mapping::{self, WHOLE_LISTING};
use crate::repositories::product::ProductWithComponents;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductSales {
    pub sku: String,
    pub name: Option<String>,
    /// Units sold directly plus units allocated from kits
    pub units: Decimal,
    pub revenue: Decimal,
    /// Portion of `units` that came from kit allocation
    pub allocated_units: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UnallocatedKit {
    pub sku: String,
    pub units: Decimal,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UnmappedListing {
    pub external_listing_id: String,
    pub variation_id: Option<String>,
    pub title: Option<String>,
    pub units: Decimal,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub products: Vec<ProductSales>,
    pub unallocated_kits: Vec<UnallocatedKit>,
    pub unmapped: Vec<UnmappedListing>,
}

/// Mapping and product lookups needed to resolve order items.
#[derive(Debug, Default)]
pub struct ProductCatalog {
    mappings: HashMap<(String, String), String>,
    products: HashMap<String, ProductWithComponents>,
}

impl ProductCatalog {
    pub fn new(
        mappings: Vec<ml_product_mapping::Model>,
        products: Vec<ProductWithComponents>,
    ) -> Self {
        Self {
            mappings: mappings
                .into_iter()
                .map(|m| ((m.external_listing_id, m.variation_id), m.product_sku))
                .collect(),
            products: products
                .into_iter()
                .map(|p| (p.product.sku.clone(), p))
                .collect(),
        }
    }

    /// Variation mapping, then whole-listing mapping, then the listing's
    /// own seller SKU when it names a known product.
    pub fn resolve<'a>(&'a self, item: &'a OrderItemRef) -> Option<&'a str> {
        if let Some(variation) = item.variation_id.as_deref() {
            if let Some(sku) = self.mappings.get(&(item.id.clone(), variation.to_string())) {
                return Some(sku);
            }
        }
        if let Some(sku) = self
            .mappings
            .get(&(item.id.clone(), WHOLE_LISTING.to_string()))
        {
            return Some(sku);
        }
        item.seller_sku
            .as_deref()
            .filter(|sku| self.products.contains_key(*sku))
    }

    fn product(&self, sku: &str) -> Option<&ProductWithComponents> {
        self.products.get(sku)
    }
}

/// Component share of one kit sale.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub sku: String,
    pub units: Decimal,
    pub revenue: Decimal,
}

/// Splits `units`/`revenue` of a kit over `components` given as
/// `(sku, quantity, cost_cents)`. `None` when the kit's total cost is zero.
pub fn allocate_kit(
    units: Decimal,
    revenue: Decimal,
    components: &[(String, i32, Option<i64>)],
) -> Option<Vec<Allocation>> {
    let contributions: Vec<(&str, Decimal)> = components
        .iter()
        .filter_map(|(sku, quantity, cost)| {
            let cost = (*cost).filter(|c| *c > 0)?;
            Some((sku.as_str(), Decimal::from(cost) * Decimal::from(*quantity)))
        })
        .collect();
    let kit_cost: Decimal = contributions.iter().map(|(_, c)| *c).sum();
    if kit_cost.is_zero() {
        return None;
    }
    Some(
        contributions
            .into_iter()
            .map(|(sku, contribution)| Allocation {
                sku: sku.to_string(),
                units: units * contribution / kit_cost,
                revenue: revenue * contribution / kit_cost,
            })
            .collect(),
    )
}

#[derive(Default)]
struct Tally {
    units: Decimal,
    revenue: Decimal,
    allocated_units: Decimal,
}

pub fn product_report(
    orders: &[Order],
    range: &DateRange,
    offset: FixedOffset,
    catalog: &ProductCatalog,
) -> ProductReport {
    let mut sales: BTreeMap<String, Tally> = BTreeMap::new();
    let mut unallocated: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    let mut unmapped: BTreeMap<(String, Option<String>), UnmappedListing> = BTreeMap::new();
    let mut seen = HashSet::new();

    let in_range = orders
        .iter()
        .filter(|o| o.is_paid() && range.contains(local_day(o, offset)));
    for order in in_range {
        if !seen.insert(order.id.as_str()) {
            continue;
        }
        for line in &order.order_items {
            let units = line.quantity;
            let revenue = line.revenue();

            let Some(sku) = catalog.resolve(&line.item) else {
                let key = (line.item.id.clone(), line.item.variation_id.clone());
                let entry = unmapped.entry(key).or_insert_with(|| UnmappedListing {
                    external_listing_id: line.item.id.clone(),
                    variation_id: line.item.variation_id.clone(),
                    title: line.item.title.clone(),
                    units: Decimal::ZERO,
                    revenue: Decimal::ZERO,
                });
                entry.units += units;
                entry.revenue += revenue;
                continue;
            };

            let composite = catalog
                .product(sku)
                .filter(|p| p.product.kind.is_composite());
            let Some(kit) = composite else {
                let tally = sales.entry(sku.to_string()).or_default();
                tally.units += units;
                tally.revenue += revenue;
                continue;
            };

            let components: Vec<(String, i32, Option<i64>)> = kit
                .components
                .iter()
                .map(|c| {
                    let cost = catalog
                        .product(&c.component_sku)
                        .and_then(|p| p.product.cost_price_cents);
                    (c.component_sku.clone(), c.quantity, cost)
                })
                .collect();
            match allocate_kit(units, revenue, &components) {
                Some(allocations) => {
                    for allocation in allocations {
                        let tally = sales.entry(allocation.sku).or_default();
                        tally.units += allocation.units;
                        tally.allocated_units += allocation.units;
                        tally.revenue += allocation.revenue;
                    }
                }
                None => {
                    let tally = sales.entry(sku.to_string()).or_default();
                    tally.units += units;
                    tally.revenue += revenue;
                    let entry = unallocated.entry(sku.to_string()).or_default();
                    entry.0 += units;
                    entry.1 += revenue;
                }
            }
        }
    }

    ProductReport {
        from: range.from(),
        to: range.to(),
        products: sales
            .into_iter()
            .map(|(sku, tally)| ProductSales {
                name: catalog.product(&sku).map(|p| p.product.name.clone()),
                units: tally.units.round_dp(2),
                revenue: tally.revenue.round_dp(2),
                allocated_units: tally.allocated_units.round_dp(2),
                sku,
            })
            .collect(),
        unallocated_kits: unallocated
            .into_iter()
            .map(|(sku, (units, revenue))| UnallocatedKit {
                sku,
                units,
                revenue: revenue.round_dp(2),
            })
            .collect(),
        unmapped: unmapped
            .into_values()
            .map(|mut u| {
                u.revenue = u.revenue.round_dp(2);
                u
            })
            .collect(),
    }
}
