//! Shared test utilities and fixture generators

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use chrono::NaiveDateTime;
use ecomlens::pipeline::features::{build_order_features, OrderFeatures};
use ecomlens::pipeline::records::{Customer, Order, OrderItem, Payment, Review, Seller};
use ecomlens::pipeline::DatasetKind;
use tempfile::TempDir;

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Delivered order; `delivered` None leaves the delivery timestamp missing
pub fn order(id: &str, customer: &str, purchased: &str, delivered: Option<&str>, estimated: &str) -> Order {
    Order {
        order_id: id.to_string(),
        customer_id: customer.to_string(),
        status: "delivered".to_string(),
        purchased_at: Some(ts(purchased)),
        approved_at: Some(ts(purchased)),
        delivered_carrier_at: None,
        delivered_customer_at: delivered.map(ts),
        estimated_delivery_at: Some(ts(estimated)),
    }
}

pub fn item(order_id: &str, price: f64, freight: f64) -> OrderItem {
    OrderItem {
        order_id: order_id.to_string(),
        item_seq: 1,
        product_id: format!("p_{}", order_id),
        seller_id: "s1".to_string(),
        price,
        freight_value: freight,
    }
}

pub fn customer(id: &str, state: &str) -> Customer {
    Customer {
        customer_id: id.to_string(),
        unique_id: format!("u_{}", id),
        zip_prefix: "01000".to_string(),
        city: "cidade".to_string(),
        state: state.to_string(),
    }
}

pub fn seller(id: &str, state: &str) -> Seller {
    Seller {
        seller_id: id.to_string(),
        zip_prefix: "01000".to_string(),
        city: "cidade".to_string(),
        state: state.to_string(),
    }
}

pub fn payment(order_id: &str, payment_type: &str, installments: u32, value: f64) -> Payment {
    Payment {
        order_id: order_id.to_string(),
        sequential: 1,
        payment_type: payment_type.to_string(),
        installments,
        value: Some(value),
    }
}

pub fn review(order_id: &str, score: u8) -> Review {
    Review {
        review_id: format!("r_{}", order_id),
        order_id: order_id.to_string(),
        score: Some(score),
        comment_title: None,
        comment_message: None,
    }
}

/// One delivered order per month of 2017 for customer `c{month}`, revenue
/// `month * 100` plus 10 freight
pub fn monthly_orders() -> (Vec<Order>, Vec<OrderItem>) {
    let mut orders = Vec::new();
    let mut items = Vec::new();
    for month in 1..=12u32 {
        let id = format!("o{}", month);
        orders.push(order(
            &id,
            &format!("c{}", month),
            &format!("2017-{:02}-10 12:00:00", month),
            Some(&format!("2017-{:02}-18 12:00:00", month)),
            &format!("2017-{:02}-25 00:00:00", month),
        ));
        items.push(item(&id, month as f64 * 100.0, 10.0));
    }
    (orders, items)
}

pub fn features(orders: &[Order], items: &[OrderItem]) -> Vec<OrderFeatures> {
    build_order_features(orders, items, &[])
}

/// Write one dataset file with the given header and rows
pub fn write_csv(dir: &Path, kind: DatasetKind, header: &str, rows: &[&str]) {
    let mut file = std::fs::File::create(dir.join(kind.file_name())).unwrap();
    writeln!(file, "{}", header).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
}

/// Small hand-written dataset with every table present.
///
/// Contains one exact duplicate order row, one order delivered before its
/// purchase, one product without category, and one non-positive payment.
pub fn write_sample_dataset(dir: &Path) {
    write_csv(
        dir,
        DatasetKind::Customers,
        "customer_id,customer_unique_id,customer_zip_code_prefix,customer_city,customer_state",
        &[
            "c1,u1,01001,sao paulo,SP",
            "c2,u2,20001,rio de janeiro,RJ",
            "c3,u3,30001,belo horizonte,MG",
            "c4,u4,40001,salvador,BA",
        ],
    );
    write_csv(
        dir,
        DatasetKind::Geolocation,
        "geolocation_zip_code_prefix,geolocation_lat,geolocation_lng,geolocation_city,geolocation_state",
        &[
            "01001,-23.55,-46.63,sao paulo,SP",
            "01001,-23.56,-46.64,sao paulo,SP",
            "20001,-22.90,-43.17,rio de janeiro,RJ",
        ],
    );
    write_csv(
        dir,
        DatasetKind::Orders,
        "order_id,customer_id,order_status,order_purchase_timestamp,order_approved_at,order_delivered_carrier_date,order_delivered_customer_date,order_estimated_delivery_date",
        &[
            "o1,c1,delivered,2017-11-20 10:00:00,2017-11-20 11:00:00,2017-11-21 09:00:00,2017-11-28 15:00:00,2017-12-05 00:00:00",
            "o1,c1,delivered,2017-11-20 10:00:00,2017-11-20 11:00:00,2017-11-21 09:00:00,2017-11-28 15:00:00,2017-12-05 00:00:00",
            "o2,c2,delivered,2018-01-05 08:00:00,2018-01-05 09:00:00,2018-01-06 09:00:00,2018-01-30 12:00:00,2018-01-25 00:00:00",
            "o3,c3,delivered,2018-03-10 14:00:00,2018-03-10 15:00:00,,2018-03-01 10:00:00,2018-03-30 00:00:00",
            "o4,c4,shipped,2018-05-02 09:00:00,2018-05-02 10:00:00,2018-05-03 10:00:00,,2018-05-25 00:00:00",
            "o5,c1,delivered,2018-06-15 19:00:00,2018-06-15 20:00:00,2018-06-16 08:00:00,2018-06-20 11:00:00,2018-07-01 00:00:00",
        ],
    );
    write_csv(
        dir,
        DatasetKind::OrderItems,
        "order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value",
        &[
            "o1,1,p1,s1,2017-11-22 00:00:00,100.00,10.00",
            "o1,2,p2,s1,2017-11-22 00:00:00,50.00,5.00",
            "o2,1,p2,s2,2018-01-07 00:00:00,80.00,12.00",
            "o3,1,p3,s1,2018-03-12 00:00:00,200.00,20.00",
            "o4,1,p1,s2,2018-05-04 00:00:00,60.00,8.00",
            "o5,1,p4,s1,2018-06-17 00:00:00,40.00,6.00",
        ],
    );
    write_csv(
        dir,
        DatasetKind::OrderPayments,
        "order_id,payment_sequential,payment_type,payment_installments,payment_value",
        &[
            "o1,1,credit_card,3,165.00",
            "o2,1,boleto,1,92.00",
            "o3,1,credit_card,1,220.00",
            "o4,1,voucher,1,0.00",
            "o5,1,credit_card,2,46.00",
        ],
    );
    write_csv(
        dir,
        DatasetKind::OrderReviews,
        "review_id,order_id,review_score,review_comment_title,review_comment_message,review_creation_date,review_answer_timestamp",
        &[
            "r1,o1,5,,otimo,2017-11-29 00:00:00,2017-11-30 00:00:00",
            "r2,o2,2,,atrasou,2018-01-31 00:00:00,2018-02-01 00:00:00",
            "r3,o3,4,,,2018-03-31 00:00:00,2018-04-01 00:00:00",
            "r5,o5,5,,,2018-06-21 00:00:00,2018-06-22 00:00:00",
        ],
    );
    write_csv(
        dir,
        DatasetKind::Products,
        "product_id,product_category_name,product_weight_g,product_length_cm,product_height_cm,product_width_cm",
        &[
            "p1,beleza_saude,500,20,10,15",
            "p2,esporte_lazer,1200,40,20,30",
            "p3,,800,,15,20",
            "p4,brinquedos,300,15,8,12",
        ],
    );
    write_csv(
        dir,
        DatasetKind::Sellers,
        "seller_id,seller_zip_code_prefix,seller_city,seller_state",
        &["s1,01002,sao paulo,SP", "s2,30002,belo horizonte,MG"],
    );
    write_csv(
        dir,
        DatasetKind::ProductCategories,
        "product_category_name,product_category_name_english",
        &["beleza_saude,health_beauty", "esporte_lazer,sports_leisure"],
    );
}

/// Temporary directory holding the hand-written dataset
pub fn sample_dataset_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_sample_dataset(dir.path());
    dir
}

/// Temporary directory holding a seeded synthetic dataset
pub fn generated_dataset_dir(customers: usize, seed: u64) -> TempDir {
    let dir = TempDir::new().unwrap();
    ecomlens::cli::generate_dataset(dir.path(), customers, seed).unwrap();
    dir
}
