//! Cleaning of the raw tables
//!
//! Every table is deduplicated at the frame level, read into records and
//! then passed through its table-specific fixes. Each change is appended to
//! a [`CleaningLog`] and emitted as a `tracing` event.

use std::collections::{HashMap, HashSet};

use chrono::Duration;
use polars::prelude::*;
use serde::Serialize;

use super::error::{DataError, DataResult};
use super::loader::{DataCatalog, DatasetKind};
use super::records::{
    category_translations, Customer, Geolocation, Order, OrderItem, Payment, Product, Review,
    Seller,
};
use super::stats::median;

/// Cleaning switches exposed on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Fill missing delivery timestamps of delivered orders from the estimate
    pub impute_delivery_dates: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleaningAction {
    pub action: String,
    pub dataset: String,
    pub details: String,
}

/// Ordered audit trail of cleaning actions
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningLog {
    actions: Vec<CleaningAction>,
}

impl CleaningLog {
    pub fn record(&mut self, action: &str, dataset: &str, details: impl Into<String>) {
        let details = details.into();
        tracing::info!(action, dataset, details = details.as_str(), "cleaning");
        self.actions.push(CleaningAction {
            action: action.to_string(),
            dataset: dataset.to_string(),
            details,
        });
    }

    pub fn actions(&self) -> &[CleaningAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Cleaned tables; a table that failed to load keeps its error
#[derive(Debug, Clone)]
pub struct CleanedData {
    pub orders: DataResult<Vec<Order>>,
    pub customers: DataResult<Vec<Customer>>,
    pub items: DataResult<Vec<OrderItem>>,
    pub payments: DataResult<Vec<Payment>>,
    pub reviews: DataResult<Vec<Review>>,
    pub products: DataResult<Vec<Product>>,
    pub sellers: DataResult<Vec<Seller>>,
    pub geolocation: DataResult<Vec<Geolocation>>,
    pub log: CleaningLog,
}

fn borrow<T>(table: &DataResult<Vec<T>>) -> DataResult<&[T]> {
    table.as_deref().map_err(Clone::clone)
}

impl CleanedData {
    pub fn orders(&self) -> DataResult<&[Order]> {
        borrow(&self.orders)
    }
    pub fn customers(&self) -> DataResult<&[Customer]> {
        borrow(&self.customers)
    }
    pub fn items(&self) -> DataResult<&[OrderItem]> {
        borrow(&self.items)
    }
    pub fn payments(&self) -> DataResult<&[Payment]> {
        borrow(&self.payments)
    }
    pub fn reviews(&self) -> DataResult<&[Review]> {
        borrow(&self.reviews)
    }
    pub fn products(&self) -> DataResult<&[Product]> {
        borrow(&self.products)
    }
    pub fn sellers(&self) -> DataResult<&[Seller]> {
        borrow(&self.sellers)
    }
    pub fn geolocation(&self) -> DataResult<&[Geolocation]> {
        borrow(&self.geolocation)
    }

    /// Cleaned tables as frames, keyed by dataset, for writing back to disk
    pub fn to_frames(&self) -> Vec<(DatasetKind, DataResult<DataFrame>)> {
        vec![
            (DatasetKind::Orders, self.orders().and_then(Order::to_frame)),
            (DatasetKind::Customers, self.customers().and_then(Customer::to_frame)),
            (DatasetKind::OrderItems, self.items().and_then(OrderItem::to_frame)),
            (DatasetKind::OrderPayments, self.payments().and_then(Payment::to_frame)),
            (DatasetKind::OrderReviews, self.reviews().and_then(Review::to_frame)),
            (DatasetKind::Products, self.products().and_then(Product::to_frame)),
            (DatasetKind::Sellers, self.sellers().and_then(Seller::to_frame)),
            (DatasetKind::Geolocation, self.geolocation().and_then(Geolocation::to_frame)),
        ]
    }
}

/// Remove exact duplicate rows, keeping the first occurrence in input order
pub fn drop_exact_duplicates(
    df: &DataFrame,
    kind: DatasetKind,
    log: &mut CleaningLog,
) -> DataResult<DataFrame> {
    let before = df.height();
    let deduped = df
        .clone()
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()
        .map_err(|e| DataError::parse(kind.name(), e))?;
    let removed = before - deduped.height();
    if removed > 0 {
        log.record(
            "remove_duplicates",
            kind.name(),
            format!("Removed {} exact duplicate rows", removed),
        );
    }
    Ok(deduped)
}

fn load_records<T>(
    catalog: &DataCatalog,
    kind: DatasetKind,
    log: &mut CleaningLog,
    read: fn(&DataFrame) -> DataResult<Vec<T>>,
) -> DataResult<Vec<T>> {
    let df = catalog.get(kind)?;
    let deduped = drop_exact_duplicates(df, kind, log)?;
    read(&deduped)
}

/// Clean every table in the catalog
pub fn clean_catalog(catalog: &DataCatalog, options: CleanOptions) -> CleanedData {
    let mut log = CleaningLog::default();

    let orders = load_records(catalog, DatasetKind::Orders, &mut log, Order::from_frame)
        .map(|orders| clean_orders(orders, options, &mut log));
    let customers = load_records(catalog, DatasetKind::Customers, &mut log, Customer::from_frame);
    let items = load_records(catalog, DatasetKind::OrderItems, &mut log, OrderItem::from_frame);
    let payments = load_records(catalog, DatasetKind::OrderPayments, &mut log, Payment::from_frame)
        .map(|payments| clean_payments(payments, &mut log));
    let reviews = load_records(catalog, DatasetKind::OrderReviews, &mut log, Review::from_frame)
        .map(|reviews| clean_reviews(reviews, &mut log));

    // The translation table is optional for products: without it Portuguese names are kept
    let translations = catalog
        .get(DatasetKind::ProductCategories)
        .and_then(category_translations)
        .map(|pairs| pairs.into_iter().collect::<HashMap<_, _>>());
    if let Err(err) = &translations {
        tracing::warn!(error = %err, "category translations unavailable");
    }
    let products = load_records(catalog, DatasetKind::Products, &mut log, Product::from_frame)
        .map(|products| clean_products(products, translations.as_ref().ok(), &mut log));

    let sellers = load_records(catalog, DatasetKind::Sellers, &mut log, Seller::from_frame);
    let geolocation =
        load_records(catalog, DatasetKind::Geolocation, &mut log, Geolocation::from_frame)
            .map(|rows| dedup_geolocation(rows, &mut log));

    CleanedData {
        orders,
        customers,
        items,
        payments,
        reviews,
        products,
        sellers,
        geolocation,
        log,
    }
}

/// Normalise order timestamps.
///
/// Orders without a purchase timestamp are dropped and delivery timestamps
/// earlier than the purchase are cleared. With `impute_delivery_dates` set,
/// delivered orders missing a delivery date take the estimated date and a
/// missing carrier date becomes the day before customer delivery.
pub fn clean_orders(orders: Vec<Order>, options: CleanOptions, log: &mut CleaningLog) -> Vec<Order> {
    let dataset = DatasetKind::Orders.name();
    let before = orders.len();
    let mut orders: Vec<Order> = orders
        .into_iter()
        .filter(|o| o.purchased_at.is_some())
        .collect();
    let dropped = before - orders.len();
    if dropped > 0 {
        log.record(
            "drop_missing_purchase_time",
            dataset,
            format!("Dropped {} orders without a purchase timestamp", dropped),
        );
    }

    let mut cleared = 0;
    for order in orders.iter_mut() {
        if let (Some(purchased), Some(delivered)) = (order.purchased_at, order.delivered_customer_at) {
            if delivered < purchased {
                order.delivered_customer_at = None;
                cleared += 1;
            }
        }
    }
    if cleared > 0 {
        log.record(
            "clear_invalid_delivery_time",
            dataset,
            format!("Cleared {} delivery timestamps earlier than purchase", cleared),
        );
    }

    if options.impute_delivery_dates {
        let mut delivered_filled = 0;
        let mut carrier_filled = 0;
        for order in orders.iter_mut() {
            if order.is_delivered() && order.delivered_customer_at.is_none() {
                if let Some(estimated) = order.estimated_delivery_at {
                    if order.purchased_at.is_some_and(|p| estimated >= p) {
                        order.delivered_customer_at = Some(estimated);
                        delivered_filled += 1;
                    }
                }
            }
            if order.delivered_carrier_at.is_none() {
                if let Some(delivered) = order.delivered_customer_at {
                    order.delivered_carrier_at = Some(delivered - Duration::days(1));
                    carrier_filled += 1;
                }
            }
        }
        if delivered_filled > 0 {
            log.record(
                "impute_delivery_date",
                dataset,
                format!("Filled {} delivery dates from the estimated date", delivered_filled),
            );
        }
        if carrier_filled > 0 {
            log.record(
                "impute_carrier_date",
                dataset,
                format!("Filled {} carrier dates as delivery minus one day", carrier_filled),
            );
        }
    }

    orders
}

fn impute_dimension(
    products: &mut [Product],
    name: &str,
    field: fn(&mut Product) -> &mut Option<f64>,
    log: &mut CleaningLog,
) {
    let mut by_category: HashMap<String, Vec<f64>> = HashMap::new();
    let mut all = Vec::new();
    for product in products.iter_mut() {
        let category = product.category.clone().unwrap_or_default();
        if let Some(v) = *field(product) {
            if v > 0.0 {
                by_category.entry(category).or_default().push(v);
                all.push(v);
            }
        }
    }
    let overall = median(&all);
    let medians: HashMap<String, f64> = by_category
        .into_iter()
        .filter_map(|(k, v)| median(&v).map(|m| (k, m)))
        .collect();

    let mut filled = 0;
    for product in products.iter_mut() {
        let category = product.category.clone().unwrap_or_default();
        let slot = field(product);
        if slot.map_or(true, |v| v <= 0.0) {
            let replacement = medians.get(&category).copied().or(overall);
            if replacement.is_some() {
                *slot = replacement;
                filled += 1;
            }
        }
    }
    if filled > 0 {
        log.record(
            "impute_dimension",
            DatasetKind::Products.name(),
            format!("Filled {} missing or non-positive {} values with category medians", filled, name),
        );
    }
}

/// Fill categories and physical dimensions, then attach English category names
pub fn clean_products(
    mut products: Vec<Product>,
    translations: Option<&HashMap<String, String>>,
    log: &mut CleaningLog,
) -> Vec<Product> {
    let dataset = DatasetKind::Products.name();

    let mut unknown = 0;
    for product in products.iter_mut() {
        if product.category.is_none() {
            product.category = Some("unknown".to_string());
            unknown += 1;
        }
    }
    if unknown > 0 {
        log.record(
            "fill_category",
            dataset,
            format!("Filled {} missing categories with 'unknown'", unknown),
        );
    }

    impute_dimension(&mut products, "product_weight_g", |p| &mut p.weight_g, log);
    impute_dimension(&mut products, "product_length_cm", |p| &mut p.length_cm, log);
    impute_dimension(&mut products, "product_height_cm", |p| &mut p.height_cm, log);
    impute_dimension(&mut products, "product_width_cm", |p| &mut p.width_cm, log);

    if let Some(translations) = translations {
        let mut untranslated: HashSet<String> = HashSet::new();
        for product in products.iter_mut() {
            let category = product.category.clone().unwrap_or_default();
            match translations.get(&category) {
                Some(english) => product.category_english = Some(english.clone()),
                None => {
                    product.category_english = Some(category.clone());
                    untranslated.insert(category);
                }
            }
        }
        log.record(
            "translate_categories",
            dataset,
            format!(
                "Attached English names; {} categories kept their Portuguese name",
                untranslated.len()
            ),
        );
    }

    products
}

/// Replace missing or non-positive payment values with the median of the
/// payment type, falling back to the overall median
pub fn clean_payments(mut payments: Vec<Payment>, log: &mut CleaningLog) -> Vec<Payment> {
    let mut by_type: HashMap<String, Vec<f64>> = HashMap::new();
    let mut all = Vec::new();
    for payment in &payments {
        if let Some(v) = payment.value.filter(|v| *v > 0.0) {
            by_type.entry(payment.payment_type.clone()).or_default().push(v);
            all.push(v);
        }
    }
    let overall = median(&all);

    let mut filled = 0;
    for payment in payments.iter_mut() {
        if payment.value.map_or(true, |v| v <= 0.0) {
            let replacement = by_type
                .get(&payment.payment_type)
                .and_then(|v| median(v))
                .or(overall);
            if replacement.is_some() {
                payment.value = replacement;
                filled += 1;
            }
        }
    }
    if filled > 0 {
        log.record(
            "impute_payment_value",
            DatasetKind::OrderPayments.name(),
            format!("Replaced {} non-positive payment values with type medians", filled),
        );
    }
    payments
}

/// Reviews keep missing comments; only a note about their count is logged
pub fn clean_reviews(reviews: Vec<Review>, log: &mut CleaningLog) -> Vec<Review> {
    let without_comment = reviews.iter().filter(|r| !r.has_comment()).count();
    if without_comment > 0 {
        log.record(
            "preserve_missing_comments",
            DatasetKind::OrderReviews.name(),
            format!("Kept {} reviews without a comment", without_comment),
        );
    }
    reviews
}

/// Keep the first coordinate per zip-code prefix
pub fn dedup_geolocation(rows: Vec<Geolocation>, log: &mut CleaningLog) -> Vec<Geolocation> {
    let before = rows.len();
    let mut seen = HashSet::new();
    let rows: Vec<Geolocation> = rows
        .into_iter()
        .filter(|g| seen.insert(g.zip_prefix.clone()))
        .collect();
    let removed = before - rows.len();
    if removed > 0 {
        log.record(
            "dedup_zip_prefix",
            DatasetKind::Geolocation.name(),
            format!("Kept one coordinate per zip prefix, removed {} rows", removed),
        );
    }
    rows
}
