// src/db.rs
//
// One table per collection. Runtime queries only, so the build never depends
// on a live database.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{
    Cart, Category, MetalType, Order, OrderStatus, Product, Review, Role, User, Wishlist,
};
use crate::response::Page;

/// Pool whose sessions cancel any statement running past `db_timeout`.
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    pool_options(config).connect_with(connect_options(config)?).await
}

/// Same settings as [`connect`], but no connection is opened until first use.
pub fn connect_lazy(config: &Config) -> Result<PgPool, sqlx::Error> {
    Ok(pool_options(config).connect_lazy_with(connect_options(config)?))
}

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_timeout)
}

fn connect_options(config: &Config) -> Result<PgConnectOptions, sqlx::Error> {
    let timeout_ms = config.db_timeout.max(Duration::from_millis(1)).as_millis().to_string();
    Ok(PgConnectOptions::from_str(&config.database_url)?
        .options([("statement_timeout", timeout_ms.as_str())]))
}

fn decode_text<T: FromStr<Err = String>>(row: &PgRow, column: &str) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))
}

// ---------------------------------------------------------------------------
// users

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, avatar, role, \
     addresses, is_active, is_verified, refresh_token, created_at, updated_at";

fn user_from_row(r: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: r.try_get("id")?,
        email: r.try_get("email")?,
        password_hash: r.try_get("password_hash")?,
        first_name: r.try_get("first_name")?,
        last_name: r.try_get("last_name")?,
        phone: r.try_get("phone")?,
        avatar: r.try_get("avatar")?,
        role: decode_text(r, "role")?,
        addresses: r.try_get::<Json<_>, _>("addresses")?.0,
        is_active: r.try_get("is_active")?,
        is_verified: r.try_get("is_verified")?,
        refresh_token: r.try_get("refresh_token")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(user_from_row)
        .transpose()
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(user_from_row)
        .transpose()
}

pub async fn admin_exists(pool: &PgPool) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
        .fetch_one(pool)
        .await
}

pub async fn insert_user(pool: &PgPool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO users
               (id, email, password_hash, first_name, last_name, phone, avatar, role,
                addresses, is_active, is_verified, refresh_token, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(&user.avatar)
    .bind(user.role.as_str())
    .bind(Json(&user.addresses))
    .bind(user.is_active)
    .bind(user.is_verified)
    .bind(user.refresh_token.as_deref())
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_refresh_token(pool: &PgPool, user_id: Uuid, token: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
        .bind(token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_profile(pool: &PgPool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE users
           SET first_name = $1, last_name = $2, phone = $3, avatar = $4, addresses = $5, updated_at = $6
           WHERE id = $7"#,
    )
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(&user.avatar)
    .bind(Json(&user.addresses))
    .bind(user.updated_at)
    .bind(user.id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_password(pool: &PgPool, user_id: Uuid, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns false when no such user exists.
pub async fn set_user_access(pool: &PgPool, user_id: Uuid, role: Role, is_active: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET role = $1, is_active = $2, updated_at = NOW() WHERE id = $3")
        .bind(role.as_str())
        .bind(is_active)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_users(pool: &PgPool, role: Option<Role>, page: &Page) -> Result<(Vec<User>, i64), sqlx::Error> {
    let role = role.map(|r| r.as_str());
    let rows = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE ($1::text IS NULL OR role = $1)
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3"
    ))
    .bind(role)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR role = $1)")
        .bind(role)
        .fetch_one(pool)
        .await?;
    Ok((rows.iter().map(user_from_row).collect::<Result<_, _>>()?, total))
}

// ---------------------------------------------------------------------------
// categories

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, image, icon, parent_id, is_active, sort_order, created_at, updated_at";

fn category_from_row(r: &PgRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        slug: r.try_get("slug")?,
        description: r.try_get("description")?,
        image: r.try_get("image")?,
        icon: r.try_get("icon")?,
        parent_id: r.try_get("parent_id")?,
        is_active: r.try_get("is_active")?,
        sort_order: r.try_get("sort_order")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

pub async fn list_active_categories(pool: &PgPool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active = TRUE ORDER BY sort_order ASC, name ASC"
    ))
    .fetch_all(pool)
    .await?
    .iter()
    .map(category_from_row)
    .collect()
}

pub async fn find_category(pool: &PgPool, id: Uuid) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(category_from_row)
        .transpose()
}

pub async fn find_category_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1 ORDER BY created_at ASC LIMIT 1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .as_ref()
    .map(category_from_row)
    .transpose()
}

pub async fn insert_category(pool: &PgPool, c: &Category) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO categories
               (id, name, slug, description, image, icon, parent_id, is_active, sort_order, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
    )
    .bind(c.id)
    .bind(&c.name)
    .bind(&c.slug)
    .bind(&c.description)
    .bind(&c.image)
    .bind(&c.icon)
    .bind(c.parent_id)
    .bind(c.is_active)
    .bind(c.sort_order)
    .bind(c.created_at)
    .bind(c.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_category(pool: &PgPool, c: &Category) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE categories
           SET name = $1, slug = $2, description = $3, image = $4, icon = $5, parent_id = $6,
               is_active = $7, sort_order = $8, updated_at = $9
           WHERE id = $10"#,
    )
    .bind(&c.name)
    .bind(&c.slug)
    .bind(&c.description)
    .bind(&c.image)
    .bind(&c.icon)
    .bind(c.parent_id)
    .bind(c.is_active)
    .bind(c.sort_order)
    .bind(c.updated_at)
    .bind(c.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Keeps the denormalised category name on products in step with a rename.
pub async fn rename_category_on_products(pool: &PgPool, category_id: Uuid, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET category_name = $1 WHERE category_id = $2")
        .bind(name)
        .bind(category_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_products_in_category(pool: &PgPool, category_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = $1")
        .bind(category_id)
        .fetch_one(pool)
        .await
}

pub async fn delete_category(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// products

const PRODUCT_COLUMNS: &str = "id, name, slug, description, short_desc, metal_type, purity, category_id, \
     category_name, images, thumbnail, base_price, discount_price, discount_percent, variants, tags, \
     features, is_featured, is_new_arrival, is_best_seller, is_active, stock, rating, review_count, \
     seller_id, created_at, updated_at";

fn product_from_row(r: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        slug: r.try_get("slug")?,
        description: r.try_get("description")?,
        short_desc: r.try_get("short_desc")?,
        metal_type: decode_text(r, "metal_type")?,
        purity: r.try_get("purity")?,
        category_id: r.try_get("category_id")?,
        category_name: r.try_get("category_name")?,
        images: r.try_get("images")?,
        thumbnail: r.try_get("thumbnail")?,
        base_price: r.try_get("base_price")?,
        discount_price: r.try_get("discount_price")?,
        discount_percent: r.try_get("discount_percent")?,
        variants: r.try_get::<Json<_>, _>("variants")?.0,
        tags: r.try_get("tags")?,
        features: r.try_get("features")?,
        is_featured: r.try_get("is_featured")?,
        is_new_arrival: r.try_get("is_new_arrival")?,
        is_best_seller: r.try_get("is_best_seller")?,
        is_active: r.try_get("is_active")?,
        stock: r.try_get("stock")?,
        rating: r.try_get("rating")?,
        review_count: r.try_get("review_count")?,
        seller_id: r.try_get("seller_id")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn products_from_rows(rows: Vec<PgRow>) -> Result<Vec<Product>, sqlx::Error> {
    rows.iter().map(product_from_row).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    Price,
    Name,
    Rating,
    #[default]
    Newest,
}

impl ProductSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "price" => Some(Self::Price),
            "name" => Some(Self::Name),
            "rating" => Some(Self::Rating),
            "newest" => Some(Self::Newest),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Price => "base_price",
            Self::Name => "name",
            Self::Rating => "rating",
            Self::Newest => "created_at",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub include_inactive: bool,
    pub metal_type: Option<MetalType>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub purity: Option<String>,
    pub search: Option<String>,
    pub featured_only: bool,
    pub sort: ProductSort,
    pub ascending: bool,
}

/// `%term%` for ILIKE with the pattern metacharacters escaped.
pub fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_product_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, f: &'a ProductFilter) {
    qb.push(" WHERE TRUE");
    if !f.include_inactive {
        qb.push(" AND is_active = TRUE");
    }
    if let Some(metal) = f.metal_type {
        qb.push(" AND metal_type = ").push_bind(metal.as_str());
    }
    if let Some(category_id) = f.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(min) = f.min_price {
        qb.push(" AND base_price >= ").push_bind(min);
    }
    if let Some(max) = f.max_price {
        qb.push(" AND base_price <= ").push_bind(max);
    }
    if let Some(purity) = f.purity.as_deref() {
        qb.push(" AND purity = ").push_bind(purity);
    }
    if let Some(search) = f.search.as_deref() {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS t WHERE t ILIKE ")
            .push_bind(pattern)
            .push("))");
    }
    if f.featured_only {
        qb.push(" AND is_featured = TRUE");
    }
}

pub async fn list_products(pool: &PgPool, filter: &ProductFilter, page: &Page) -> Result<(Vec<Product>, i64), sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
    push_product_filter(&mut qb, filter);
    qb.push(format_args!(
        " ORDER BY {} {}, id ASC LIMIT ",
        filter.sort.column(),
        if filter.ascending { "ASC" } else { "DESC" }
    ))
    .push_bind(page.limit)
    .push(" OFFSET ")
    .push_bind(page.offset());
    let products = products_from_rows(qb.build().fetch_all(pool).await?)?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
    push_product_filter(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    Ok((products, total))
}

#[derive(Debug, Clone, Copy)]
pub enum Showcase {
    Featured,
    NewArrivals,
    BestSellers,
}

/// Up to `limit` active products carrying the showcase flag.
pub async fn list_showcase(pool: &PgPool, showcase: Showcase, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
    let (flag, order) = match showcase {
        Showcase::Featured => ("is_featured", "created_at DESC"),
        Showcase::NewArrivals => ("is_new_arrival", "created_at DESC"),
        Showcase::BestSellers => ("is_best_seller", "review_count DESC"),
    };
    let rows = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE {flag} = TRUE AND is_active = TRUE ORDER BY {order} LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    products_from_rows(rows)
}

pub async fn search_products(pool: &PgPool, term: &str, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {PRODUCT_COLUMNS} FROM products
           WHERE is_active = TRUE
             AND (name ILIKE $1 OR description ILIKE $1 OR category_name ILIKE $1
                  OR EXISTS (SELECT 1 FROM unnest(tags) AS t WHERE t ILIKE $1))
           ORDER BY created_at DESC
           LIMIT $2"#
    ))
    .bind(like_pattern(term))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    products_from_rows(rows)
}

pub async fn find_product(pool: &PgPool, id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(product_from_row)
        .transpose()
}

pub async fn find_product_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 ORDER BY created_at ASC LIMIT 1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .as_ref()
    .map(product_from_row)
    .transpose()
}

pub async fn find_products_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(pool)
        .await?;
    products_from_rows(rows)
}

pub async fn low_stock_products(pool: &PgPool, below: i32, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE stock < $1 AND is_active = TRUE ORDER BY stock ASC LIMIT $2"
    ))
    .bind(below)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    products_from_rows(rows)
}

pub async fn insert_product(pool: &PgPool, p: &Product) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO products
               (id, name, slug, description, short_desc, metal_type, purity, category_id, category_name,
                images, thumbnail, base_price, discount_price, discount_percent, variants, tags, features,
                is_featured, is_new_arrival, is_best_seller, is_active, stock, rating, review_count,
                seller_id, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                   $18, $19, $20, $21, $22, $23, $24, $25, $26, $27)"#,
    )
    .bind(p.id)
    .bind(&p.name)
    .bind(&p.slug)
    .bind(&p.description)
    .bind(&p.short_desc)
    .bind(p.metal_type.as_str())
    .bind(&p.purity)
    .bind(p.category_id)
    .bind(&p.category_name)
    .bind(&p.images)
    .bind(&p.thumbnail)
    .bind(p.base_price)
    .bind(p.discount_price)
    .bind(p.discount_percent)
    .bind(Json(&p.variants))
    .bind(&p.tags)
    .bind(&p.features)
    .bind(p.is_featured)
    .bind(p.is_new_arrival)
    .bind(p.is_best_seller)
    .bind(p.is_active)
    .bind(p.stock)
    .bind(p.rating)
    .bind(p.review_count)
    .bind(p.seller_id)
    .bind(p.created_at)
    .bind(p.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Writes every admin-editable column. Rating and review count are owned by
/// [`set_product_rating`] and left alone.
pub async fn update_product(pool: &PgPool, p: &Product) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE products
           SET name = $1, slug = $2, description = $3, short_desc = $4, metal_type = $5, purity = $6,
               category_id = $7, category_name = $8, images = $9, thumbnail = $10, base_price = $11,
               discount_price = $12, discount_percent = $13, variants = $14, tags = $15, features = $16,
               is_featured = $17, is_new_arrival = $18, is_best_seller = $19, is_active = $20,
               stock = $21, updated_at = $22
           WHERE id = $23"#,
    )
    .bind(&p.name)
    .bind(&p.slug)
    .bind(&p.description)
    .bind(&p.short_desc)
    .bind(p.metal_type.as_str())
    .bind(&p.purity)
    .bind(p.category_id)
    .bind(&p.category_name)
    .bind(&p.images)
    .bind(&p.thumbnail)
    .bind(p.base_price)
    .bind(p.discount_price)
    .bind(p.discount_percent)
    .bind(Json(&p.variants))
    .bind(&p.tags)
    .bind(&p.features)
    .bind(p.is_featured)
    .bind(p.is_new_arrival)
    .bind(p.is_best_seller)
    .bind(p.is_active)
    .bind(p.stock)
    .bind(p.updated_at)
    .bind(p.id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_product(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Adds `delta` (negative to decrement) to the product's stock.
pub async fn adjust_stock(pool: &PgPool, product_id: Uuid, delta: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
        .bind(delta)
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_product_rating(pool: &PgPool, product_id: Uuid, rating: f64, review_count: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET rating = $1, review_count = $2 WHERE id = $3")
        .bind(rating)
        .bind(review_count)
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn product_exists(pool: &PgPool, id: Uuid, active_only: bool) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND (is_active OR NOT $2))")
        .bind(id)
        .bind(active_only)
        .fetch_one(pool)
        .await
}

// ---------------------------------------------------------------------------
// carts

pub async fn find_cart(pool: &PgPool, user_id: Uuid) -> Result<Option<Cart>, sqlx::Error> {
    let row = sqlx::query("SELECT id, user_id, items, total, updated_at FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| {
        Ok(Cart {
            id: Some(r.try_get("id")?),
            user_id: r.try_get("user_id")?,
            items: r.try_get::<Json<_>, _>("items")?.0,
            total: r.try_get("total")?,
            updated_at: r.try_get("updated_at")?,
        })
    })
    .transpose()
}

/// Replaces the user's cart document, creating it on first write.
pub async fn save_cart(pool: &PgPool, cart: &Cart) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        r#"INSERT INTO carts (id, user_id, items, total, updated_at)
           VALUES ($1, $2, $3, $4, $5)
           ON CONFLICT (user_id) DO UPDATE
           SET items = EXCLUDED.items, total = EXCLUDED.total, updated_at = EXCLUDED.updated_at
           RETURNING id"#,
    )
    .bind(cart.id.unwrap_or_else(Uuid::new_v4))
    .bind(cart.user_id)
    .bind(Json(&cart.items))
    .bind(cart.total)
    .bind(cart.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn delete_cart(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// wishlists

pub async fn find_wishlist(pool: &PgPool, user_id: Uuid) -> Result<Option<Wishlist>, sqlx::Error> {
    let row = sqlx::query("SELECT id, user_id, products, updated_at FROM wishlists WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| {
        Ok(Wishlist {
            id: Some(r.try_get("id")?),
            user_id: r.try_get("user_id")?,
            products: r.try_get("products")?,
            updated_at: r.try_get("updated_at")?,
        })
    })
    .transpose()
}

/// Set semantics: adding a product already present is a no-op.
pub async fn add_to_wishlist(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO wishlists (id, user_id, products, updated_at)
           VALUES ($1, $2, ARRAY[$3]::uuid[], NOW())
           ON CONFLICT (user_id) DO UPDATE
           SET products = CASE
                   WHEN $3 = ANY(wishlists.products) THEN wishlists.products
                   ELSE array_append(wishlists.products, $3)
               END,
               updated_at = NOW()"#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_from_wishlist(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE wishlists SET products = array_remove(products, $1), updated_at = NOW() WHERE user_id = $2")
        .bind(product_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_wishlist(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM wishlists WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// orders

const ORDER_COLUMNS: &str = "id, order_number, user_id, user_email, user_name, items, subtotal, tax, \
     discount, coupon_code, shipping_info, payment_info, total, status, notes, cancel_reason, \
     created_at, updated_at";

fn order_from_row(r: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        id: r.try_get("id")?,
        order_number: r.try_get("order_number")?,
        user_id: r.try_get("user_id")?,
        user_email: r.try_get("user_email")?,
        user_name: r.try_get("user_name")?,
        items: r.try_get::<Json<_>, _>("items")?.0,
        subtotal: r.try_get("subtotal")?,
        tax: r.try_get("tax")?,
        discount: r.try_get("discount")?,
        coupon_code: r.try_get("coupon_code")?,
        shipping_info: r.try_get::<Json<_>, _>("shipping_info")?.0,
        payment_info: r.try_get::<Json<_>, _>("payment_info")?.0,
        total: r.try_get("total")?,
        status: decode_text(r, "status")?,
        notes: r.try_get("notes")?,
        cancel_reason: r.try_get("cancel_reason")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn orders_from_rows(rows: Vec<PgRow>) -> Result<Vec<Order>, sqlx::Error> {
    rows.iter().map(order_from_row).collect()
}

pub async fn insert_order(pool: &PgPool, o: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO orders
               (id, order_number, user_id, user_email, user_name, items, subtotal, tax, discount,
                coupon_code, shipping_info, payment_info, total, status, notes, cancel_reason,
                created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"#,
    )
    .bind(o.id)
    .bind(&o.order_number)
    .bind(o.user_id)
    .bind(&o.user_email)
    .bind(&o.user_name)
    .bind(Json(&o.items))
    .bind(o.subtotal)
    .bind(o.tax)
    .bind(o.discount)
    .bind(&o.coupon_code)
    .bind(Json(&o.shipping_info))
    .bind(Json(&o.payment_info))
    .bind(o.total)
    .bind(o.status.as_str())
    .bind(&o.notes)
    .bind(&o.cancel_reason)
    .bind(o.created_at)
    .bind(o.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_user_orders(pool: &PgPool, user_id: Uuid, limit: Option<i64>) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    orders_from_rows(rows)
}

pub async fn find_user_order(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(order_from_row)
        .transpose()
}

pub async fn find_order(pool: &PgPool, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(order_from_row)
        .transpose()
}

/// Persists the mutable part of an order: status, shipping, payment and cancel reason.
pub async fn update_order_progress(pool: &PgPool, o: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE orders
           SET status = $1, shipping_info = $2, payment_info = $3, cancel_reason = $4, updated_at = $5
           WHERE id = $6"#,
    )
    .bind(o.status.as_str())
    .bind(Json(&o.shipping_info))
    .bind(Json(&o.payment_info))
    .bind(&o.cancel_reason)
    .bind(o.updated_at)
    .bind(o.id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_orders(pool: &PgPool, status: Option<OrderStatus>, page: &Page) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let status = status.map(|s| s.as_str());
    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE ($1::text IS NULL OR status = $1)
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3"
    ))
    .bind(status)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
        .bind(status)
        .fetch_one(pool)
        .await?;
    Ok((orders_from_rows(rows)?, total))
}

/// True when the user has a delivered order containing the product.
pub async fn has_delivered_purchase(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT EXISTS(
               SELECT 1 FROM orders
               WHERE user_id = $1 AND status = 'delivered' AND items @> $2
           )"#,
    )
    .bind(user_id)
    .bind(Json(serde_json::json!([{ "productId": product_id }])))
    .fetch_one(pool)
    .await
}

// ---------------------------------------------------------------------------
// reviews

const REVIEW_COLUMNS: &str = "id, product_id, user_id, user_name, user_avatar, rating, title, comment, \
     images, is_verified, helpful_count, created_at, updated_at";

fn review_from_row(r: &PgRow) -> Result<Review, sqlx::Error> {
    Ok(Review {
        id: r.try_get("id")?,
        product_id: r.try_get("product_id")?,
        user_id: r.try_get("user_id")?,
        user_name: r.try_get("user_name")?,
        user_avatar: r.try_get("user_avatar")?,
        rating: r.try_get("rating")?,
        title: r.try_get("title")?,
        comment: r.try_get("comment")?,
        images: r.try_get("images")?,
        is_verified: r.try_get("is_verified")?,
        helpful_count: r.try_get("helpful_count")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

pub async fn list_product_reviews(pool: &PgPool, product_id: Uuid) -> Result<Vec<Review>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = $1 ORDER BY created_at DESC"
    ))
    .bind(product_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(review_from_row)
    .collect()
}

pub async fn review_exists(pool: &PgPool, product_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reviews WHERE product_id = $1 AND user_id = $2)")
        .bind(product_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Looks up a review, restricted to its author when `author` is given.
pub async fn find_review(pool: &PgPool, id: Uuid, author: Option<Uuid>) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)"
    ))
    .bind(id)
    .bind(author)
    .fetch_optional(pool)
    .await?
    .as_ref()
    .map(review_from_row)
    .transpose()
}

pub async fn insert_review(pool: &PgPool, r: &Review) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO reviews
               (id, product_id, user_id, user_name, user_avatar, rating, title, comment, images,
                is_verified, helpful_count, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
    )
    .bind(r.id)
    .bind(r.product_id)
    .bind(r.user_id)
    .bind(&r.user_name)
    .bind(&r.user_avatar)
    .bind(r.rating)
    .bind(&r.title)
    .bind(&r.comment)
    .bind(&r.images)
    .bind(r.is_verified)
    .bind(r.helpful_count)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_review(pool: &PgPool, r: &Review) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE reviews SET rating = $1, title = $2, comment = $3, images = $4, updated_at = $5 WHERE id = $6",
    )
    .bind(r.rating)
    .bind(&r.title)
    .bind(&r.comment)
    .bind(&r.images)
    .bind(r.updated_at)
    .bind(r.id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_review(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn product_ratings(pool: &PgPool, product_id: Uuid) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT rating FROM reviews WHERE product_id = $1")
        .bind(product_id)
        .fetch_all(pool)
        .await
}

// ---------------------------------------------------------------------------
// dashboard aggregates

pub async fn count_rows(pool: &PgPool, table: Collection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.name()))
        .fetch_one(pool)
        .await
}

#[derive(Debug, Clone, Copy)]
pub enum Collection {
    Users,
    Products,
    Orders,
}

impl Collection {
    fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Orders => "orders",
        }
    }
}

pub async fn count_active_products(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = TRUE")
        .fetch_one(pool)
        .await
}

pub async fn count_orders_with_status(pool: &PgPool, status: OrderStatus) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
        .bind(status.as_str())
        .fetch_one(pool)
        .await
}

pub async fn revenue_for_statuses(pool: &PgPool, statuses: &[OrderStatus]) -> Result<Decimal, sqlx::Error> {
    let statuses: Vec<&str> = statuses.iter().map(OrderStatus::as_str).collect();
    sqlx::query_scalar("SELECT COALESCE(SUM(total), 0) FROM orders WHERE status = ANY($1)")
        .bind(statuses)
        .fetch_one(pool)
        .await
}

/// (order count, revenue) for orders created at or after `since`.
pub async fn orders_since(pool: &PgPool, since: DateTime<Utc>) -> Result<(i64, Decimal), sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS orders, COALESCE(SUM(total), 0) AS revenue FROM orders WHERE created_at >= $1")
        .bind(since)
        .fetch_one(pool)
        .await?;
    Ok((row.try_get("orders")?, row.try_get("revenue")?))
}

pub async fn recent_orders(pool: &PgPool, limit: i64) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1"))
        .bind(limit)
        .fetch_all(pool)
        .await?;
    orders_from_rows(rows)
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
pub struct MonthlyStat {
    pub year: i32,
    pub month: i32,
    pub revenue: Decimal,
    pub orders: i64,
}

pub async fn monthly_stats(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<MonthlyStat>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::int AS year,
                  EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::int AS month,
                  COALESCE(SUM(total), 0) AS revenue,
                  COUNT(*) AS orders
           FROM orders
           WHERE created_at >= $1
           GROUP BY 1, 2
           ORDER BY 1, 2"#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|r| {
            Ok(MonthlyStat {
                year: r.try_get("year")?,
                month: r.try_get("month")?,
                revenue: r.try_get("revenue")?,
                orders: r.try_get("orders")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("gold"), "%gold%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn sort_keys_map_to_columns() {
        assert_eq!(ProductSort::parse("price").map(|s| s.column()), Some("base_price"));
        assert_eq!(ProductSort::parse("newest"), Some(ProductSort::Newest));
        assert_eq!(ProductSort::parse("popularity"), None);
        assert_eq!(ProductSort::default().column(), "created_at");
    }

    #[test]
    fn filter_sql_binds_only_present_fields() {
        let filter = ProductFilter {
            metal_type: Some(MetalType::Gold),
            min_price: Some(Decimal::from(1000)),
            search: Some("ring".into()),
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filter(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("is_active = TRUE"));
        assert!(sql.contains("metal_type = $1"));
        assert!(sql.contains("base_price >= $2"));
        assert!(sql.contains("name ILIKE $3"));
        assert!(!sql.contains("category_id"));
        assert!(!sql.contains("is_featured"));
    }

    #[test]
    fn admin_filter_includes_inactive() {
        let filter = ProductFilter {
            include_inactive: true,
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filter(&mut qb, &filter);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM products WHERE TRUE");
    }
}
