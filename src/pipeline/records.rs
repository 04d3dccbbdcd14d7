//! Typed rows of the marketplace tables
//!
//! Tables are read from polars frames into plain structs once, after which
//! every analysis works on slices of these records. Each record type can be
//! written back to a frame with the original column names so cleaned tables
//! reload through the regular loader.

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Serialize;

use super::error::{DataError, DataResult};
use super::loader::DatasetKind;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse the timestamp formats found in the export; blanks and junk become `None`
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(ts: &Option<NaiveDateTime>) -> Option<String> {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
}

fn column_series(df: &DataFrame, kind: DatasetKind, name: &str) -> DataResult<Series> {
    df.column(name)
        .map(|c| c.as_materialized_series().clone())
        .map_err(|_| DataError::Schema {
            dataset: kind.name().to_string(),
            column: name.to_string(),
        })
}

/// Read a column as optional strings, casting numeric columns as needed
pub fn string_column(
    df: &DataFrame,
    kind: DatasetKind,
    name: &str,
) -> DataResult<Vec<Option<String>>> {
    let series = column_series(df, kind, name)?
        .cast(&DataType::String)
        .map_err(|e| DataError::parse(kind.name(), e))?;
    let ca = series.str().map_err(|e| DataError::parse(kind.name(), e))?;
    Ok(ca
        .iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}

/// Read a column as optional floats; values that cannot be cast become `None`
pub fn float_column(df: &DataFrame, kind: DatasetKind, name: &str) -> DataResult<Vec<Option<f64>>> {
    let series = column_series(df, kind, name)?;
    let series = if series.dtype() == &DataType::String {
        // Non-strict cast: unparsable strings become null
        series.cast(&DataType::Float64)
    } else {
        series.strict_cast(&DataType::Float64)
    }
    .map_err(|e| DataError::parse(kind.name(), e))?;
    let ca = series.f64().map_err(|e| DataError::parse(kind.name(), e))?;
    Ok(ca.iter().map(|v| v.filter(|x| x.is_finite())).collect())
}

pub fn timestamp_column(
    df: &DataFrame,
    kind: DatasetKind,
    name: &str,
) -> DataResult<Vec<Option<NaiveDateTime>>> {
    Ok(string_column(df, kind, name)?
        .into_iter()
        .map(|v| v.as_deref().and_then(parse_timestamp))
        .collect())
}

fn optional_string_column(df: &DataFrame, kind: DatasetKind, name: &str) -> DataResult<Vec<Option<String>>> {
    if df.column(name).is_ok() {
        string_column(df, kind, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

fn required<T>(value: Option<T>, kind: DatasetKind, column: &str, row: usize) -> DataResult<T> {
    value.ok_or_else(|| {
        DataError::parse(
            kind.name(),
            format!("row {} has no value for key column '{}'", row, column),
        )
    })
}

fn text_or_empty(value: Option<String>) -> String {
    value.unwrap_or_default()
}

fn build_frame(kind: DatasetKind, columns: Vec<Column>) -> DataResult<DataFrame> {
    DataFrame::new(columns).map_err(|e| DataError::parse(kind.name(), e))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub status: String,
    pub purchased_at: Option<NaiveDateTime>,
    pub approved_at: Option<NaiveDateTime>,
    pub delivered_carrier_at: Option<NaiveDateTime>,
    pub delivered_customer_at: Option<NaiveDateTime>,
    pub estimated_delivery_at: Option<NaiveDateTime>,
}

impl Order {
    pub fn is_delivered(&self) -> bool {
        self.status == "delivered"
    }

    pub fn from_frame(df: &DataFrame) -> DataResult<Vec<Order>> {
        let kind = DatasetKind::Orders;
        let ids = string_column(df, kind, "order_id")?;
        let customers = string_column(df, kind, "customer_id")?;
        let statuses = string_column(df, kind, "order_status")?;
        let purchased = timestamp_column(df, kind, "order_purchase_timestamp")?;
        let approved = timestamp_column(df, kind, "order_approved_at")?;
        let carrier = timestamp_column(df, kind, "order_delivered_carrier_date")?;
        let delivered = timestamp_column(df, kind, "order_delivered_customer_date")?;
        let estimated = timestamp_column(df, kind, "order_estimated_delivery_date")?;

        let mut orders = Vec::with_capacity(df.height());
        for (row, order_id) in ids.into_iter().enumerate() {
            orders.push(Order {
                order_id: required(order_id, kind, "order_id", row)?,
                customer_id: required(customers[row].clone(), kind, "customer_id", row)?,
                status: statuses[row].clone().unwrap_or_else(|| "unknown".to_string()),
                purchased_at: purchased[row],
                approved_at: approved[row],
                delivered_carrier_at: carrier[row],
                delivered_customer_at: delivered[row],
                estimated_delivery_at: estimated[row],
            });
        }
        Ok(orders)
    }

    pub fn to_frame(orders: &[Order]) -> DataResult<DataFrame> {
        let ts = |f: &dyn Fn(&Order) -> Option<NaiveDateTime>| -> Vec<Option<String>> {
            orders.iter().map(|o| format_timestamp(&f(o))).collect()
        };
        build_frame(
            DatasetKind::Orders,
            vec![
                Column::new("order_id".into(), orders.iter().map(|o| o.order_id.as_str()).collect::<Vec<_>>()),
                Column::new("customer_id".into(), orders.iter().map(|o| o.customer_id.as_str()).collect::<Vec<_>>()),
                Column::new("order_status".into(), orders.iter().map(|o| o.status.as_str()).collect::<Vec<_>>()),
                Column::new("order_purchase_timestamp".into(), ts(&|o| o.purchased_at)),
                Column::new("order_approved_at".into(), ts(&|o| o.approved_at)),
                Column::new("order_delivered_carrier_date".into(), ts(&|o| o.delivered_carrier_at)),
                Column::new("order_delivered_customer_date".into(), ts(&|o| o.delivered_customer_at)),
                Column::new("order_estimated_delivery_date".into(), ts(&|o| o.estimated_delivery_at)),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub customer_id: String,
    pub unique_id: String,
    pub zip_prefix: String,
    pub city: String,
    pub state: String,
}

impl Customer {
    pub fn from_frame(df: &DataFrame) -> DataResult<Vec<Customer>> {
        let kind = DatasetKind::Customers;
        let ids = string_column(df, kind, "customer_id")?;
        let unique = string_column(df, kind, "customer_unique_id")?;
        let zips = string_column(df, kind, "customer_zip_code_prefix")?;
        let cities = string_column(df, kind, "customer_city")?;
        let states = string_column(df, kind, "customer_state")?;

        let mut customers = Vec::with_capacity(df.height());
        for (row, customer_id) in ids.into_iter().enumerate() {
            let customer_id = required(customer_id, kind, "customer_id", row)?;
            customers.push(Customer {
                unique_id: unique[row].clone().unwrap_or_else(|| customer_id.clone()),
                customer_id,
                zip_prefix: text_or_empty(zips[row].clone()),
                city: text_or_empty(cities[row].clone()),
                state: text_or_empty(states[row].clone()).to_uppercase(),
            });
        }
        Ok(customers)
    }

    pub fn to_frame(customers: &[Customer]) -> DataResult<DataFrame> {
        build_frame(
            DatasetKind::Customers,
            vec![
                Column::new("customer_id".into(), customers.iter().map(|c| c.customer_id.as_str()).collect::<Vec<_>>()),
                Column::new("customer_unique_id".into(), customers.iter().map(|c| c.unique_id.as_str()).collect::<Vec<_>>()),
                Column::new("customer_zip_code_prefix".into(), customers.iter().map(|c| c.zip_prefix.as_str()).collect::<Vec<_>>()),
                Column::new("customer_city".into(), customers.iter().map(|c| c.city.as_str()).collect::<Vec<_>>()),
                Column::new("customer_state".into(), customers.iter().map(|c| c.state.as_str()).collect::<Vec<_>>()),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub order_id: String,
    pub item_seq: u32,
    pub product_id: String,
    pub seller_id: String,
    pub price: f64,
    pub freight_value: f64,
}

impl OrderItem {
    pub fn from_frame(df: &DataFrame) -> DataResult<Vec<OrderItem>> {
        let kind = DatasetKind::OrderItems;
        let orders = string_column(df, kind, "order_id")?;
        let seqs = float_column(df, kind, "order_item_id")?;
        let products = string_column(df, kind, "product_id")?;
        let sellers = string_column(df, kind, "seller_id")?;
        let prices = float_column(df, kind, "price")?;
        let freights = float_column(df, kind, "freight_value")?;

        let mut items = Vec::with_capacity(df.height());
        for (row, order_id) in orders.into_iter().enumerate() {
            items.push(OrderItem {
                order_id: required(order_id, kind, "order_id", row)?,
                item_seq: seqs[row].map(|v| v as u32).unwrap_or(1),
                product_id: text_or_empty(products[row].clone()),
                seller_id: text_or_empty(sellers[row].clone()),
                price: prices[row].unwrap_or(0.0),
                freight_value: freights[row].unwrap_or(0.0),
            });
        }
        Ok(items)
    }

    pub fn to_frame(items: &[OrderItem]) -> DataResult<DataFrame> {
        build_frame(
            DatasetKind::OrderItems,
            vec![
                Column::new("order_id".into(), items.iter().map(|i| i.order_id.as_str()).collect::<Vec<_>>()),
                Column::new("order_item_id".into(), items.iter().map(|i| i.item_seq).collect::<Vec<_>>()),
                Column::new("product_id".into(), items.iter().map(|i| i.product_id.as_str()).collect::<Vec<_>>()),
                Column::new("seller_id".into(), items.iter().map(|i| i.seller_id.as_str()).collect::<Vec<_>>()),
                Column::new("price".into(), items.iter().map(|i| i.price).collect::<Vec<_>>()),
                Column::new("freight_value".into(), items.iter().map(|i| i.freight_value).collect::<Vec<_>>()),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    pub order_id: String,
    pub sequential: u32,
    pub payment_type: String,
    pub installments: u32,
    /// `None` when the raw value is missing or non-positive and awaits imputation
    pub value: Option<f64>,
}

impl Payment {
    pub fn from_frame(df: &DataFrame) -> DataResult<Vec<Payment>> {
        let kind = DatasetKind::OrderPayments;
        let orders = string_column(df, kind, "order_id")?;
        let seqs = float_column(df, kind, "payment_sequential")?;
        let types = string_column(df, kind, "payment_type")?;
        let installments = float_column(df, kind, "payment_installments")?;
        let values = float_column(df, kind, "payment_value")?;

        let mut payments = Vec::with_capacity(df.height());
        for (row, order_id) in orders.into_iter().enumerate() {
            payments.push(Payment {
                order_id: required(order_id, kind, "order_id", row)?,
                sequential: seqs[row].map(|v| v as u32).unwrap_or(1),
                payment_type: types[row].clone().unwrap_or_else(|| "not_defined".to_string()),
                installments: installments[row].map(|v| v.max(0.0) as u32).unwrap_or(1),
                value: values[row],
            });
        }
        Ok(payments)
    }

    pub fn to_frame(payments: &[Payment]) -> DataResult<DataFrame> {
        build_frame(
            DatasetKind::OrderPayments,
            vec![
                Column::new("order_id".into(), payments.iter().map(|p| p.order_id.as_str()).collect::<Vec<_>>()),
                Column::new("payment_sequential".into(), payments.iter().map(|p| p.sequential).collect::<Vec<_>>()),
                Column::new("payment_type".into(), payments.iter().map(|p| p.payment_type.as_str()).collect::<Vec<_>>()),
                Column::new("payment_installments".into(), payments.iter().map(|p| p.installments).collect::<Vec<_>>()),
                Column::new("payment_value".into(), payments.iter().map(|p| p.value).collect::<Vec<_>>()),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub review_id: String,
    pub order_id: String,
    pub score: Option<u8>,
    pub comment_title: Option<String>,
    pub comment_message: Option<String>,
}

impl Review {
    pub fn has_comment(&self) -> bool {
        self.comment_message.is_some()
    }

    pub fn from_frame(df: &DataFrame) -> DataResult<Vec<Review>> {
        let kind = DatasetKind::OrderReviews;
        let ids = string_column(df, kind, "review_id")?;
        let orders = string_column(df, kind, "order_id")?;
        let scores = float_column(df, kind, "review_score")?;
        let titles = optional_string_column(df, kind, "review_comment_title")?;
        let messages = optional_string_column(df, kind, "review_comment_message")?;

        let mut reviews = Vec::with_capacity(df.height());
        for (row, review_id) in ids.into_iter().enumerate() {
            reviews.push(Review {
                review_id: text_or_empty(review_id),
                order_id: required(orders[row].clone(), kind, "order_id", row)?,
                score: scores[row]
                    .filter(|s| (1.0..=5.0).contains(s))
                    .map(|s| s.round() as u8),
                comment_title: titles[row].clone(),
                comment_message: messages[row].clone(),
            });
        }
        Ok(reviews)
    }

    pub fn to_frame(reviews: &[Review]) -> DataResult<DataFrame> {
        build_frame(
            DatasetKind::OrderReviews,
            vec![
                Column::new("review_id".into(), reviews.iter().map(|r| r.review_id.as_str()).collect::<Vec<_>>()),
                Column::new("order_id".into(), reviews.iter().map(|r| r.order_id.as_str()).collect::<Vec<_>>()),
                Column::new("review_score".into(), reviews.iter().map(|r| r.score.map(u32::from)).collect::<Vec<_>>()),
                Column::new("review_comment_title".into(), reviews.iter().map(|r| r.comment_title.clone()).collect::<Vec<_>>()),
                Column::new("review_comment_message".into(), reviews.iter().map(|r| r.comment_message.clone()).collect::<Vec<_>>()),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub product_id: String,
    /// Portuguese category name; `None` until the cleaner fills it
    pub category: Option<String>,
    pub category_english: Option<String>,
    pub weight_g: Option<f64>,
    pub length_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub width_cm: Option<f64>,
}

impl Product {
    /// English category name, falling back to Portuguese and then `unknown`
    pub fn display_category(&self) -> &str {
        self.category_english
            .as_deref()
            .or(self.category.as_deref())
            .unwrap_or("unknown")
    }

    pub fn from_frame(df: &DataFrame) -> DataResult<Vec<Product>> {
        let kind = DatasetKind::Products;
        let ids = string_column(df, kind, "product_id")?;
        let categories = string_column(df, kind, "product_category_name")?;
        let english = optional_string_column(df, kind, "product_category_name_english")?;
        let weights = float_column(df, kind, "product_weight_g")?;
        let lengths = float_column(df, kind, "product_length_cm")?;
        let heights = float_column(df, kind, "product_height_cm")?;
        let widths = float_column(df, kind, "product_width_cm")?;

        let mut products = Vec::with_capacity(df.height());
        for (row, product_id) in ids.into_iter().enumerate() {
            products.push(Product {
                product_id: required(product_id, kind, "product_id", row)?,
                category: categories[row].clone(),
                category_english: english[row].clone(),
                weight_g: weights[row],
                length_cm: lengths[row],
                height_cm: heights[row],
                width_cm: widths[row],
            });
        }
        Ok(products)
    }

    pub fn to_frame(products: &[Product]) -> DataResult<DataFrame> {
        build_frame(
            DatasetKind::Products,
            vec![
                Column::new("product_id".into(), products.iter().map(|p| p.product_id.as_str()).collect::<Vec<_>>()),
                Column::new("product_category_name".into(), products.iter().map(|p| p.category.clone()).collect::<Vec<_>>()),
                Column::new("product_category_name_english".into(), products.iter().map(|p| p.category_english.clone()).collect::<Vec<_>>()),
                Column::new("product_weight_g".into(), products.iter().map(|p| p.weight_g).collect::<Vec<_>>()),
                Column::new("product_length_cm".into(), products.iter().map(|p| p.length_cm).collect::<Vec<_>>()),
                Column::new("product_height_cm".into(), products.iter().map(|p| p.height_cm).collect::<Vec<_>>()),
                Column::new("product_width_cm".into(), products.iter().map(|p| p.width_cm).collect::<Vec<_>>()),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seller {
    pub seller_id: String,
    pub zip_prefix: String,
    pub city: String,
    pub state: String,
}

impl Seller {
    pub fn from_frame(df: &DataFrame) -> DataResult<Vec<Seller>> {
        let kind = DatasetKind::Sellers;
        let ids = string_column(df, kind, "seller_id")?;
        let zips = string_column(df, kind, "seller_zip_code_prefix")?;
        let cities = string_column(df, kind, "seller_city")?;
        let states = string_column(df, kind, "seller_state")?;

        let mut sellers = Vec::with_capacity(df.height());
        for (row, seller_id) in ids.into_iter().enumerate() {
            sellers.push(Seller {
                seller_id: required(seller_id, kind, "seller_id", row)?,
                zip_prefix: text_or_empty(zips[row].clone()),
                city: text_or_empty(cities[row].clone()),
                state: text_or_empty(states[row].clone()).to_uppercase(),
            });
        }
        Ok(sellers)
    }

    pub fn to_frame(sellers: &[Seller]) -> DataResult<DataFrame> {
        build_frame(
            DatasetKind::Sellers,
            vec![
                Column::new("seller_id".into(), sellers.iter().map(|s| s.seller_id.as_str()).collect::<Vec<_>>()),
                Column::new("seller_zip_code_prefix".into(), sellers.iter().map(|s| s.zip_prefix.as_str()).collect::<Vec<_>>()),
                Column::new("seller_city".into(), sellers.iter().map(|s| s.city.as_str()).collect::<Vec<_>>()),
                Column::new("seller_state".into(), sellers.iter().map(|s| s.state.as_str()).collect::<Vec<_>>()),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geolocation {
    pub zip_prefix: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub city: String,
    pub state: String,
}

impl Geolocation {
    pub fn from_frame(df: &DataFrame) -> DataResult<Vec<Geolocation>> {
        let kind = DatasetKind::Geolocation;
        let zips = string_column(df, kind, "geolocation_zip_code_prefix")?;
        let lats = float_column(df, kind, "geolocation_lat")?;
        let lngs = float_column(df, kind, "geolocation_lng")?;
        let cities = string_column(df, kind, "geolocation_city")?;
        let states = string_column(df, kind, "geolocation_state")?;

        let mut rows = Vec::with_capacity(df.height());
        for (row, zip) in zips.into_iter().enumerate() {
            rows.push(Geolocation {
                zip_prefix: required(zip, kind, "geolocation_zip_code_prefix", row)?,
                lat: lats[row],
                lng: lngs[row],
                city: text_or_empty(cities[row].clone()),
                state: text_or_empty(states[row].clone()).to_uppercase(),
            });
        }
        Ok(rows)
    }

    pub fn to_frame(rows: &[Geolocation]) -> DataResult<DataFrame> {
        build_frame(
            DatasetKind::Geolocation,
            vec![
                Column::new("geolocation_zip_code_prefix".into(), rows.iter().map(|g| g.zip_prefix.as_str()).collect::<Vec<_>>()),
                Column::new("geolocation_lat".into(), rows.iter().map(|g| g.lat).collect::<Vec<_>>()),
                Column::new("geolocation_lng".into(), rows.iter().map(|g| g.lng).collect::<Vec<_>>()),
                Column::new("geolocation_city".into(), rows.iter().map(|g| g.city.as_str()).collect::<Vec<_>>()),
                Column::new("geolocation_state".into(), rows.iter().map(|g| g.state.as_str()).collect::<Vec<_>>()),
            ],
        )
    }
}

/// Portuguese to English category names
pub fn category_translations(df: &DataFrame) -> DataResult<Vec<(String, String)>> {
    let kind = DatasetKind::ProductCategories;
    let pt = string_column(df, kind, "product_category_name")?;
    let en = string_column(df, kind, "product_category_name_english")?;
    Ok(pt
        .into_iter()
        .zip(en)
        .filter_map(|(p, e)| Some((p?, e?)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2017-10-02 10:56:33").is_some());
        assert!(parse_timestamp("2017-10-02 10:56:33.000").is_some());
        let day = parse_timestamp("2017-10-02").unwrap();
        assert_eq!(day.format(TIMESTAMP_FORMAT).to_string(), "2017-10-02 00:00:00");
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_orders_round_trip_through_frame() {
        let order = Order {
            order_id: "o1".to_string(),
            customer_id: "c1".to_string(),
            status: "delivered".to_string(),
            purchased_at: parse_timestamp("2017-10-02 10:56:33"),
            approved_at: None,
            delivered_carrier_at: None,
            delivered_customer_at: parse_timestamp("2017-10-10 21:25:13"),
            estimated_delivery_at: parse_timestamp("2017-10-18 00:00:00"),
        };
        let df = Order::to_frame(std::slice::from_ref(&order)).unwrap();
        let back = Order::from_frame(&df).unwrap();
        assert_eq!(back, vec![order]);
    }

    #[test]
    fn test_missing_key_is_parse_error() {
        let df = df! {
            "seller_id" => [None::<&str>],
            "seller_zip_code_prefix" => [Some("1234")],
            "seller_city" => [Some("campinas")],
            "seller_state" => [Some("sp")],
        }
        .unwrap();
        let err = Seller::from_frame(&df).unwrap_err();
        assert!(matches!(err, DataError::Parse { .. }), "got {:?}", err);
    }
}
