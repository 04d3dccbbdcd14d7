//! `generate` subcommand: a seeded synthetic dataset with the Olist layout
//!
//! Purchases span January 2017 to August 2018 with a November peak, most
//! customers live in the south-east, and late deliveries get worse reviews.
//! The same seed always produces the same files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::pipeline::states::STATE_PROFILES;
use crate::pipeline::DatasetKind;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// (Portuguese name, English name, base price)
const CATEGORIES: [(&str, &str, f64); 10] = [
    ("cama_mesa_banho", "bed_bath_table", 90.0),
    ("beleza_saude", "health_beauty", 120.0),
    ("esporte_lazer", "sports_leisure", 110.0),
    ("informatica_acessorios", "computers_accessories", 160.0),
    ("moveis_decoracao", "furniture_decor", 130.0),
    ("utilidades_domesticas", "housewares", 80.0),
    ("relogios_presentes", "watches_gifts", 200.0),
    ("telefonia", "telephony", 70.0),
    ("brinquedos", "toys", 95.0),
    ("eletronicos", "electronics", 150.0),
];

/// Relative demand per calendar month, November highest
const MONTH_WEIGHTS: [f64; 12] = [0.9, 0.85, 1.0, 0.95, 1.05, 0.95, 1.0, 1.05, 0.9, 0.95, 1.5, 1.2];

const PAYMENT_TYPES: [(&str, u32); 4] = [
    ("credit_card", 74),
    ("boleto", 19),
    ("voucher", 5),
    ("debit_card", 2),
];

/// Row counts of one generated dataset
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratedCounts {
    pub customers: usize,
    pub sellers: usize,
    pub products: usize,
    pub orders: usize,
    pub order_items: usize,
    pub payments: usize,
    pub reviews: usize,
    pub geolocation: usize,
}

fn create_csv(dir: &Path, kind: DatasetKind, header: &str) -> Result<BufWriter<File>> {
    let path = dir.join(kind.file_name());
    let file = File::create(&path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", header)?;
    Ok(writer)
}

fn ts(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

fn hex_id(rng: &mut StdRng) -> String {
    format!("{:032x}", rng.gen::<u128>())
}

/// Purchase months from 2017-01 to 2018-08 with a mild upward trend
fn purchase_months() -> Vec<(i32, u32, f64)> {
    let mut months = Vec::new();
    for (i, (year, month)) in (1..=12)
        .map(|m| (2017, m))
        .chain((1..=8).map(|m| (2018, m)))
        .enumerate()
    {
        let trend = 1.0 + i as f64 * 0.04;
        months.push((year, month, trend * MONTH_WEIGHTS[month as usize - 1]));
    }
    months
}

/// Write all nine tables into `dir`
pub fn generate_dataset(dir: &Path, customers: usize, seed: u64) -> Result<GeneratedCounts> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut counts = GeneratedCounts::default();

    // Customer states follow population, tilted toward the south-east
    let state_weights: Vec<f64> = STATE_PROFILES
        .iter()
        .map(|p| p.population as f64 * if p.tier == 1 { 3.0 } else { 1.0 })
        .collect();
    let state_dist = WeightedIndex::new(&state_weights).context("Invalid state weights")?;

    // Categories
    let mut writer = create_csv(
        dir,
        DatasetKind::ProductCategories,
        "product_category_name,product_category_name_english",
    )?;
    for (pt, en, _) in CATEGORIES {
        writeln!(writer, "{},{}", pt, en)?;
    }
    writer.flush()?;

    // Sellers
    let seller_count = (customers / 20).max(5);
    let mut sellers = Vec::with_capacity(seller_count);
    let mut writer = create_csv(
        dir,
        DatasetKind::Sellers,
        "seller_id,seller_zip_code_prefix,seller_city,seller_state",
    )?;
    for _ in 0..seller_count {
        let id = hex_id(&mut rng);
        // Sellers concentrate in the tier 1 states even more than customers
        let state = if rng.gen_bool(0.7) {
            STATE_PROFILES[rng.gen_range(0..3)].code
        } else {
            STATE_PROFILES[state_dist.sample(&mut rng)].code
        };
        let zip = rng.gen_range(1000..99999);
        writeln!(writer, "{},{:05},cidade_{},{}", id, zip, state.to_lowercase(), state)?;
        sellers.push(id);
    }
    writer.flush()?;
    counts.sellers = sellers.len();

    // Products
    let product_count = (customers / 4).max(10);
    let mut products = Vec::with_capacity(product_count);
    let mut writer = create_csv(
        dir,
        DatasetKind::Products,
        "product_id,product_category_name,product_name_lenght,product_description_lenght,product_photos_qty,product_weight_g,product_length_cm,product_height_cm,product_width_cm",
    )?;
    for i in 0..product_count {
        let id = hex_id(&mut rng);
        let category = rng.gen_range(0..CATEGORIES.len());
        // Every 50th product misses its category and dimensions
        if i % 50 == 49 {
            writeln!(writer, "{},,,,,,,,", id)?;
        } else {
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{}",
                id,
                CATEGORIES[category].0,
                rng.gen_range(20..60),
                rng.gen_range(100..2000),
                rng.gen_range(1..6),
                rng.gen_range(100..20000),
                rng.gen_range(10..100),
                rng.gen_range(2..60),
                rng.gen_range(10..80),
            )?;
        }
        products.push((id, category));
    }
    writer.flush()?;
    counts.products = products.len();

    // Customers and geolocation
    let mut customer_rows = Vec::with_capacity(customers);
    let mut writer = create_csv(
        dir,
        DatasetKind::Customers,
        "customer_id,customer_unique_id,customer_zip_code_prefix,customer_city,customer_state",
    )?;
    let mut geo = create_csv(
        dir,
        DatasetKind::Geolocation,
        "geolocation_zip_code_prefix,geolocation_lat,geolocation_lng,geolocation_city,geolocation_state",
    )?;
    for _ in 0..customers {
        let id = hex_id(&mut rng);
        let state = STATE_PROFILES[state_dist.sample(&mut rng)].code;
        let zip = rng.gen_range(1000..99999);
        let city = format!("cidade_{}", state.to_lowercase());
        writeln!(writer, "{},{},{:05},{},{}", id, hex_id(&mut rng), zip, city, state)?;
        // One or two geolocation points per zip prefix
        for _ in 0..rng.gen_range(1..3) {
            writeln!(
                geo,
                "{:05},{:.6},{:.6},{},{}",
                zip,
                rng.gen_range(-33.0..-2.0),
                rng.gen_range(-72.0..-35.0),
                city,
                state
            )?;
            counts.geolocation += 1;
        }
        customer_rows.push(id);
    }
    writer.flush()?;
    geo.flush()?;
    counts.customers = customer_rows.len();

    // Orders with their items, payments and reviews
    let months = purchase_months();
    let month_dist = WeightedIndex::new(months.iter().map(|m| m.2)).context("Invalid month weights")?;
    let payment_dist =
        WeightedIndex::new(PAYMENT_TYPES.iter().map(|p| p.1)).context("Invalid payment weights")?;

    let mut orders = create_csv(
        dir,
        DatasetKind::Orders,
        "order_id,customer_id,order_status,order_purchase_timestamp,order_approved_at,order_delivered_carrier_date,order_delivered_customer_date,order_estimated_delivery_date",
    )?;
    let mut items = create_csv(
        dir,
        DatasetKind::OrderItems,
        "order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value",
    )?;
    let mut payments = create_csv(
        dir,
        DatasetKind::OrderPayments,
        "order_id,payment_sequential,payment_type,payment_installments,payment_value",
    )?;
    let mut reviews = create_csv(
        dir,
        DatasetKind::OrderReviews,
        "review_id,order_id,review_score,review_comment_title,review_comment_message,review_creation_date,review_answer_timestamp",
    )?;

    for customer_id in &customer_rows {
        // About one customer in eight comes back
        let order_count = if rng.gen_bool(0.12) { rng.gen_range(2..4) } else { 1 };
        for _ in 0..order_count {
            let order_id = hex_id(&mut rng);
            let (year, month, _) = months[month_dist.sample(&mut rng)];
            let day = rng.gen_range(1..=28);
            let purchased = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_opt(rng.gen_range(0..24), rng.gen_range(0..60), 0))
                .context("Invalid purchase date")?;
            let approved = purchased + Duration::minutes(rng.gen_range(10..2880));
            let carrier = approved + Duration::days(rng.gen_range(1..5));
            let estimated = purchased + Duration::days(rng.gen_range(18..32));
            let delivery_days = rng.gen_range(3..40);
            let delivered = purchased + Duration::days(delivery_days);

            let roll: f64 = rng.gen();
            let status = if roll < 0.95 {
                "delivered"
            } else if roll < 0.97 {
                "shipped"
            } else {
                "canceled"
            };
            let (carrier_ts, delivered_ts) = match status {
                // A few delivered orders lack the customer delivery timestamp
                "delivered" if rng.gen_bool(0.01) => (ts(carrier), String::new()),
                "delivered" => (ts(carrier), ts(delivered)),
                "shipped" => (ts(carrier), String::new()),
                _ => (String::new(), String::new()),
            };
            writeln!(
                orders,
                "{},{},{},{},{},{},{},{}",
                order_id,
                customer_id,
                status,
                ts(purchased),
                ts(approved),
                carrier_ts,
                delivered_ts,
                ts(estimated.date().and_time(chrono::NaiveTime::MIN)),
            )?;
            counts.orders += 1;

            let mut order_total = 0.0;
            for seq in 1..=rng.gen_range(1..4) {
                let (product_id, category) = products
                    .choose(&mut rng)
                    .context("No products generated")?;
                let seller_id = sellers.choose(&mut rng).context("No sellers generated")?;
                let price = (CATEGORIES[*category].2 * rng.gen_range(0.3..2.5) * 100.0).round() / 100.0;
                let freight = (rng.gen_range(7.0..45.0_f64) * 100.0).round() / 100.0;
                writeln!(
                    items,
                    "{},{},{},{},{},{:.2},{:.2}",
                    order_id,
                    seq,
                    product_id,
                    seller_id,
                    ts(carrier),
                    price,
                    freight
                )?;
                order_total += price + freight;
                counts.order_items += 1;
            }

            let payment_type = PAYMENT_TYPES[payment_dist.sample(&mut rng)].0;
            let installments = if payment_type == "credit_card" {
                rng.gen_range(1..11)
            } else {
                1
            };
            writeln!(
                payments,
                "{},1,{},{},{:.2}",
                order_id, payment_type, installments, order_total
            )?;
            counts.payments += 1;

            if status != "canceled" {
                let late = delivered > estimated;
                let score = if late {
                    *[1, 1, 2, 3, 4].choose(&mut rng).unwrap_or(&1)
                } else {
                    *[3, 4, 5, 5, 5].choose(&mut rng).unwrap_or(&5)
                };
                let comment = if rng.gen_bool(0.4) { "produto ok" } else { "" };
                let created = delivered + Duration::days(1);
                writeln!(
                    reviews,
                    "{},{},{},,{},{},{}",
                    hex_id(&mut rng),
                    order_id,
                    score,
                    comment,
                    ts(created),
                    ts(created + Duration::days(2)),
                )?;
                counts.reviews += 1;
            }
        }
    }
    orders.flush()?;
    items.flush()?;
    payments.flush()?;
    reviews.flush()?;

    tracing::info!(?counts, dir = %dir.display(), "synthetic dataset written");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_writes_every_table() {
        let dir = TempDir::new().unwrap();
        let counts = generate_dataset(dir.path(), 40, 1).unwrap();
        for kind in DatasetKind::ALL {
            assert!(dir.path().join(kind.file_name()).is_file(), "{} missing", kind);
        }
        assert_eq!(counts.customers, 40);
        assert!(counts.orders >= 40);
        assert_eq!(counts.payments, counts.orders);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        generate_dataset(a.path(), 30, 9).unwrap();
        generate_dataset(b.path(), 30, 9).unwrap();
        let file = DatasetKind::Orders.file_name();
        assert_eq!(
            std::fs::read(a.path().join(&file)).unwrap(),
            std::fs::read(b.path().join(&file)).unwrap()
        );
    }

    #[test]
    fn test_purchase_months_cover_twenty_months() {
        let months = purchase_months();
        assert_eq!(months.len(), 20);
        assert_eq!((months[0].0, months[0].1), (2017, 1));
        assert_eq!((months[19].0, months[19].1), (2018, 8));
    }
}
