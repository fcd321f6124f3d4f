// src/seed.rs
//
// First-start data: an admin account, the six top-level categories and a
// small sample catalog. Runs only while no admin exists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::api::auth::normalize_email;
use crate::checkout::discount_price;
use crate::config::Config;
use crate::db;
use crate::models::{Category, MetalType, Product, Role, User};
use crate::slug::slugify;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

const CATEGORIES: [(&str, &str); 6] = [
    ("Rings", "Elegant gold and silver rings for every occasion"),
    ("Necklaces", "Beautiful necklaces and chains"),
    ("Earrings", "Stunning earrings collection"),
    ("Bracelets", "Exquisite bracelets and bangles"),
    ("Pendants", "Charming pendants and lockets"),
    ("Anklets", "Traditional and modern anklets"),
];

struct Sample {
    name: &'static str,
    short_desc: &'static str,
    description: &'static str,
    metal_type: MetalType,
    purity: &'static str,
    /// Index into `CATEGORIES`
    category: usize,
    photo: &'static str,
    base_price: i64,
    discount_percent: i64,
    tags: &'static [&'static str],
    features: &'static [&'static str],
    featured: bool,
    new_arrival: bool,
    best_seller: bool,
    stock: i32,
    rating: f64,
    review_count: i32,
}

const IMAGE_HOST: &str = "https://images.unsplash.com";

const SAMPLES: &[Sample] = &[
    Sample {
        name: "22K Gold Diamond Engagement Ring",
        short_desc: "Elegant 22K gold diamond ring for engagements",
        description: "A 22K gold engagement ring with a brilliant-cut diamond center stone surrounded by smaller accent diamonds.",
        metal_type: MetalType::Gold,
        purity: "22K",
        category: 0,
        photo: "photo-1605100804763-247f67b3557e",
        base_price: 125_000,
        discount_percent: 10,
        tags: &["engagement", "diamond", "gold", "wedding"],
        features: &["BIS Hallmarked", "IGI Certified Diamond", "Lifetime Exchange"],
        featured: true,
        new_arrival: true,
        best_seller: false,
        stock: 15,
        rating: 4.8,
        review_count: 24,
    },
    Sample {
        name: "Sterling Silver Pearl Necklace",
        short_desc: "Classic sterling silver pearl necklace",
        description: "A 925 sterling silver necklace adorned with freshwater pearls.",
        metal_type: MetalType::Silver,
        purity: "925 Sterling",
        category: 1,
        photo: "photo-1515562141207-7a88fb7ce338",
        base_price: 8_500,
        discount_percent: 15,
        tags: &["pearl", "silver", "elegant", "classic"],
        features: &["925 Sterling Silver", "Freshwater Pearls", "Rhodium Plated"],
        featured: true,
        new_arrival: false,
        best_seller: true,
        stock: 30,
        rating: 4.6,
        review_count: 42,
    },
    Sample {
        name: "18K Rose Gold Drop Earrings",
        short_desc: "Delicate rose gold drop earrings",
        description: "Lightweight 18K rose gold drop earrings with filigree work.",
        metal_type: MetalType::RoseGold,
        purity: "18K",
        category: 2,
        photo: "photo-1535632066927-ab7c9ab60908",
        base_price: 45_000,
        discount_percent: 0,
        tags: &["rose gold", "earrings", "elegant", "filigree"],
        features: &["18K Rose Gold", "Lightweight Design", "Secure Backing"],
        featured: true,
        new_arrival: true,
        best_seller: false,
        stock: 20,
        rating: 4.9,
        review_count: 18,
    },
    Sample {
        name: "24K Gold Traditional Bangle Set",
        short_desc: "Set of 4 traditional gold bangles",
        description: "Four 24K gold bangles with an intricate traditional pattern.",
        metal_type: MetalType::Gold,
        purity: "24K",
        category: 3,
        photo: "photo-1611591437281-460bfbe1220a",
        base_price: 285_000,
        discount_percent: 10,
        tags: &["bangle", "gold", "traditional", "wedding"],
        features: &["24K Pure Gold", "BIS Hallmarked", "Traditional Design", "Set of 4"],
        featured: true,
        new_arrival: false,
        best_seller: true,
        stock: 8,
        rating: 4.7,
        review_count: 31,
    },
    Sample {
        name: "Silver Peacock Pendant",
        short_desc: "Ornate silver peacock pendant with chain",
        description: "A silver peacock pendant with enamel detailing, sold with an 18-inch chain.",
        metal_type: MetalType::Silver,
        purity: "925 Sterling",
        category: 4,
        photo: "photo-1599643477877-530eb83abc8e",
        base_price: 4_500,
        discount_percent: 15,
        tags: &["pendant", "silver", "peacock", "enamel"],
        features: &["925 Sterling Silver", "Enamel Work", "18-inch Chain Included"],
        featured: false,
        new_arrival: true,
        best_seller: false,
        stock: 45,
        rating: 4.5,
        review_count: 56,
    },
    Sample {
        name: "22K Gold Traditional Anklet Pair",
        short_desc: "Traditional gold anklets with bells",
        description: "A pair of 22K gold anklets with ghungroo bells.",
        metal_type: MetalType::Gold,
        purity: "22K",
        category: 5,
        photo: "photo-1611085583191-a3b181a88401",
        base_price: 78_000,
        discount_percent: 10,
        tags: &["anklet", "gold", "traditional", "ghungroo"],
        features: &["22K Gold", "BIS Hallmarked", "Melodious Bells", "Pair of 2"],
        featured: true,
        new_arrival: false,
        best_seller: false,
        stock: 12,
        rating: 4.6,
        review_count: 19,
    },
    Sample {
        name: "Platinum Diamond Solitaire Ring",
        short_desc: "Luxury platinum diamond solitaire",
        description: "A platinum ring set with a 1-carat VVS diamond solitaire.",
        metal_type: MetalType::Platinum,
        purity: "950 Platinum",
        category: 0,
        photo: "photo-1602751584552-8ba73aad10e1",
        base_price: 450_000,
        discount_percent: 5,
        tags: &["platinum", "diamond", "solitaire", "luxury"],
        features: &["950 Platinum", "1ct VVS Diamond", "GIA Certified", "Lifetime Warranty"],
        featured: true,
        new_arrival: false,
        best_seller: true,
        stock: 5,
        rating: 5.0,
        review_count: 8,
    },
    Sample {
        name: "Silver Charm Bracelet",
        short_desc: "Customizable silver charm bracelet",
        description: "A 925 sterling silver bracelet with five interchangeable charms.",
        metal_type: MetalType::Silver,
        purity: "925 Sterling",
        category: 3,
        photo: "photo-1573408301185-9146fe634ad0",
        base_price: 6_500,
        discount_percent: 15,
        tags: &["bracelet", "silver", "charm", "customizable"],
        features: &["925 Sterling Silver", "5 Charms Included", "Adjustable Size"],
        featured: false,
        new_arrival: true,
        best_seller: false,
        stock: 35,
        rating: 4.4,
        review_count: 67,
    },
];

fn admin_user(config: &Config, now: DateTime<Utc>) -> Result<User, SeedError> {
    Ok(User {
        id: Uuid::new_v4(),
        email: normalize_email(&config.admin_email),
        password_hash: bcrypt::hash(&config.admin_password, bcrypt::DEFAULT_COST)?,
        first_name: "Admin".to_string(),
        last_name: "User".to_string(),
        phone: String::new(),
        avatar: String::new(),
        role: Role::Admin,
        addresses: Vec::new(),
        is_active: true,
        is_verified: true,
        refresh_token: None,
        created_at: now,
        updated_at: now,
    })
}

fn categories(now: DateTime<Utc>) -> Vec<Category> {
    CATEGORIES
        .iter()
        .zip(1..)
        .map(|(&(name, description), sort_order)| Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slugify(name),
            description: description.to_string(),
            image: String::new(),
            icon: String::new(),
            parent_id: None,
            is_active: true,
            sort_order,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

impl Sample {
    fn to_product(&self, category: &Category, seller_id: Uuid, now: DateTime<Utc>) -> Product {
        let base_price = Decimal::from(self.base_price);
        let discount_percent = Decimal::from(self.discount_percent);
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Product {
            id: Uuid::new_v4(),
            name: self.name.to_string(),
            slug: slugify(self.name),
            description: self.description.to_string(),
            short_desc: self.short_desc.to_string(),
            metal_type: self.metal_type,
            purity: self.purity.to_string(),
            category_id: category.id,
            category_name: category.name.clone(),
            images: vec![format!("{IMAGE_HOST}/{}?w=800", self.photo)],
            thumbnail: format!("{IMAGE_HOST}/{}?w=400", self.photo),
            base_price,
            discount_price: discount_price(base_price, discount_percent),
            discount_percent,
            variants: Vec::new(),
            tags: strings(self.tags),
            features: strings(self.features),
            is_featured: self.featured,
            is_new_arrival: self.new_arrival,
            is_best_seller: self.best_seller,
            is_active: true,
            stock: self.stock,
            rating: self.rating,
            review_count: self.review_count,
            seller_id: Some(seller_id),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returns `false` when an admin already exists and nothing was written.
pub async fn seed(pool: &PgPool, config: &Config) -> Result<bool, SeedError> {
    if db::admin_exists(pool).await? {
        log::info!("admin user already exists, skipping seed");
        return Ok(false);
    }

    let now = Utc::now();
    let admin = admin_user(config, now)?;
    db::insert_user(pool, &admin).await?;
    log::info!("seeded admin user {}", admin.email);

    let categories = categories(now);
    for category in &categories {
        db::insert_category(pool, category).await?;
    }

    for sample in SAMPLES {
        let product = sample.to_product(&categories[sample.category], admin.id, now);
        db::insert_product(pool, &product).await?;
    }
    log::info!("seeded {} categories and {} products", categories.len(), SAMPLES.len());

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_ordered_and_slugged() {
        let cats = categories(Utc::now());
        assert_eq!(cats.len(), 6);
        assert_eq!(cats[0].slug, "rings");
        assert_eq!(cats[0].sort_order, 1);
        assert_eq!(cats[5].slug, "anklets");
        assert_eq!(cats[5].sort_order, 6);
    }

    #[test]
    fn samples_point_at_known_categories() {
        assert!(SAMPLES.iter().all(|s| s.category < CATEGORIES.len()));
    }

    #[test]
    fn sample_pricing_follows_discount_rule() {
        let now = Utc::now();
        let cats = categories(now);
        let necklace = SAMPLES[1].to_product(&cats[1], Uuid::new_v4(), now);
        assert_eq!(necklace.slug, "sterling-silver-pearl-necklace");
        assert_eq!(necklace.category_name, "Necklaces");
        assert_eq!(necklace.discount_price, Decimal::from(7225));

        let earrings = SAMPLES[2].to_product(&cats[2], Uuid::new_v4(), now);
        assert_eq!(earrings.discount_price, earrings.base_price);
    }
}
