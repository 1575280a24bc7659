//! # Seed Data Generator
//!
//! Populates a database with a demo store for development.
//!
//! ## Usage
//! ```bash
//! # 200 products (default)
//! cargo run -p mercato-db --bin seed
//!
//! # Custom amount
//! cargo run -p mercato-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p mercato-db --bin seed -- --db ./data/mercato.db
//! ```
//!
//! ## Generated Data
//! - A handful of suppliers, one pending purchase order each
//! - Products across categories with barcodes, prices and stock
//! - Customers, a few of them carrying credit debt
//! - One promotion of each kind, running for the next 30 days

use chrono::{Duration, Utc};
use mercato_core::{
    Money, NewCustomer, NewProduct, NewPromotion, NewPurchaseItem, NewPurchaseOrder, NewSupplier,
    PackDiscount, PriceDiscount, Product, PromotionConfig, PromotionStatus, QuantityDiscount,
    TransactionType,
};
use mercato_db::{Database, DbConfig};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Coca-Cola",
            "Pepsi",
            "Sprite",
            "Mineral Water",
            "Orange Juice",
            "Iced Tea",
            "Green Tea",
            "Lassi",
        ],
    ),
    (
        "SNK",
        &[
            "Salted Chips",
            "Masala Chips",
            "Chocolate Bar",
            "Peanuts",
            "Biscuits",
            "Cookies",
        ],
    ),
    (
        "DRY",
        &[
            "Milk",
            "Yogurt",
            "Butter",
            "Cheddar",
            "Cream",
        ],
    ),
    (
        "GRO",
        &[
            "Basmati Rice",
            "Flour",
            "Sugar",
            "Lentils",
            "Cooking Oil",
            "Tea Leaves",
            "Salt",
        ],
    ),
    (
        "HOM",
        &[
            "Dish Soap",
            "Shampoo",
            "Conditioner",
            "Toothpaste",
            "Bath Soap",
        ],
    ),
];

/// Sizes with price add-on in cents
const SIZES: &[(&str, i64)] = &[("Small", 0), ("Regular", 60), ("Large", 150), ("Family", 320)];

const SUPPLIERS: &[&str] = &[
    "Metro Wholesale",
    "Karachi Traders",
    "Fresh Dairy Co",
    "Home Essentials Ltd",
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ayesha Khan", "0300-1112233"),
    ("Bilal Ahmed", "0301-2223344"),
    ("Sara Malik", "0302-3334455"),
    ("Usman Ali", "0303-4445566"),
    ("Hina Raza", "0304-5556677"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mercato=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./mercato_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mercato POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./mercato_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding demo store");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let mut supplier_ids = Vec::new();
    for name in SUPPLIERS {
        let supplier = db
            .suppliers()
            .create(&NewSupplier {
                name: name.to_string(),
                ..NewSupplier::default()
            })
            .await?;
        supplier_ids.push(supplier.id);
    }
    info!(count = supplier_ids.len(), "Suppliers created");

    let products = seed_products(&db, count).await;
    info!(count = products.len(), "Products created");

    seed_purchase_orders(&db, &supplier_ids, &products).await?;
    seed_customers(&db).await?;
    seed_promotions(&db, &products).await?;

    db.close().await;

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seeded {} products in {:?}", products.len(), elapsed);
    println!("✓ Seed complete!");

    Ok(())
}

async fn seed_products(db: &Database, count: usize) -> Vec<Product> {
    let mut created = Vec::with_capacity(count);

    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for (product_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if created.len() >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + product_idx * 20 + size_idx;
                let new = generate_product(category_code, name, size, *price_addon, seed);

                match db.products().insert(&new).await {
                    Ok(product) => created.push(product),
                    Err(e) => warn!(name = %new.name, error = %e, "Failed to insert product"),
                }
            }
        }
    }

    created
}

/// Generates a single product with realistic data.
fn generate_product(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> NewProduct {
    // EAN-13 shaped, checksum not valid
    let barcode = Some(format!("896{:010}", seed));

    // Base 0.99 - 8.99 + size addon
    let selling_price_cents = 99 + ((seed * 17) % 800) as i64 + price_addon;

    // Cost 60-80% of price
    let cost_pct = 60 + (seed % 20) as i64;

    NewProduct {
        barcode,
        name: format!("{} {} ({})", name, size, category),
        cost_price_cents: selling_price_cents * cost_pct / 100,
        selling_price_cents,
        stock_quantity: (seed % 61) as i64,
        reorder_level: 5 + (seed % 6) as i64,
    }
}

async fn seed_purchase_orders(
    db: &Database,
    supplier_ids: &[String],
    products: &[Product],
) -> Result<(), Box<dyn std::error::Error>> {
    for (idx, supplier_id) in supplier_ids.iter().enumerate() {
        let items: Vec<NewPurchaseItem> = products
            .iter()
            .skip(idx)
            .step_by(supplier_ids.len().max(1))
            .take(5)
            .map(|product| NewPurchaseItem {
                product_id: product.id.clone(),
                quantity: 24,
                unit_cost_cents: product.cost_price_cents,
            })
            .collect();

        if items.is_empty() {
            continue;
        }

        let po_id = db
            .purchases()
            .create(&NewPurchaseOrder {
                supplier_id: supplier_id.clone(),
                notes: Some("Weekly restock".to_string()),
                items,
                ..NewPurchaseOrder::default()
            })
            .await?;

        // Leave the last order pending so receiving can be tried by hand.
        if idx + 1 < supplier_ids.len() {
            db.purchases().receive(&po_id).await?;
        }
    }

    info!(count = supplier_ids.len(), "Purchase orders created");
    Ok(())
}

async fn seed_customers(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    for (idx, (name, phone)) in CUSTOMERS.iter().enumerate() {
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: name.to_string(),
                phone: Some(phone.to_string()),
                ..NewCustomer::default()
            })
            .await?;

        if idx % 2 == 0 {
            db.customers()
                .add_transaction(
                    &customer.id,
                    TransactionType::Debt,
                    Money::from_cents(1_500 * (idx as i64 + 1)),
                    None,
                    None,
                    Some("Opening balance"),
                )
                .await?;
        }
    }

    info!(count = CUSTOMERS.len(), "Customers created");
    Ok(())
}

async fn seed_promotions(db: &Database, products: &[Product]) -> Result<(), Box<dyn std::error::Error>> {
    let today = Utc::now().date_naive();
    let end = today + Duration::days(30);

    let promotion = |name: &str, config: PromotionConfig, product_ids: Vec<String>| NewPromotion {
        name: name.to_string(),
        status: PromotionStatus::Active,
        start_date: today,
        end_date: end,
        config,
        product_ids,
    };

    let ids = |range: std::ops::Range<usize>| -> Vec<String> {
        products
            .iter()
            .skip(range.start)
            .take(range.len())
            .map(|p| p.id.clone())
            .collect()
    };

    let mut promotions = vec![promotion(
        "Weekend 10% Off",
        PromotionConfig::PriceDiscount(PriceDiscount::Percentage {
            percent_bps: 1_000,
            max_discount_cents: Some(200),
        }),
        ids(0..8),
    )];

    if products.len() >= 10 {
        promotions.push(promotion(
            "Buy 2 Get 1 Free",
            PromotionConfig::QuantityDiscount(QuantityDiscount {
                buy_quantity: 2,
                free_quantity: 1,
            }),
            ids(8..10),
        ));
    }

    if products.len() >= 12 {
        let bundle: i64 = products[10..12]
            .iter()
            .map(|p| p.selling_price_cents)
            .sum();
        promotions.push(promotion(
            "Snack Pack",
            PromotionConfig::PackDiscount(PackDiscount {
                bundle_price_cents: bundle * 85 / 100,
            }),
            ids(10..12),
        ));
    }

    for new in &promotions {
        db.promotions().create(new).await?;
    }

    info!(count = promotions.len(), "Promotions created");
    Ok(())
}
