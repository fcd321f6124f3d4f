// src/models.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Declares a string-backed enum stored as TEXT and sent as a lowercase string.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($name))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Role {
    Customer => "customer",
    Admin => "admin",
    Seller => "seller",
});

text_enum!(MetalType {
    Gold => "gold",
    Silver => "silver",
    Platinum => "platinum",
    RoseGold => "rose_gold",
});

text_enum!(
    /// Lifecycle of an order. Only the cancel rule is enforced; every other
    /// transition is set by an admin.
    OrderStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
        Refunded => "refunded",
    }
);

text_enum!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});

text_enum!(PaymentMethod {
    Cod => "cod",
    Card => "card",
    Upi => "upi",
    Wallet => "wallet",
});

impl OrderStatus {
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default, rename = "type")]
    pub kind: String, // home | work | other
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub avatar: String,
    pub role: Role,
    pub addresses: Vec<Address>,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(skip)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn address(&self, id: Uuid) -> Option<&Address> {
        self.addresses.iter().find(|a| a.id == Some(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub size: String,
    /// grams
    #[serde(default)]
    pub weight: f64,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_desc: String,
    pub metal_type: MetalType,
    /// 22K, 24K, 925 Sterling, ...
    pub purity: String,
    pub category_id: Uuid,
    pub category_name: String,
    pub images: Vec<String>,
    pub thumbnail: String,
    pub base_price: Decimal,
    pub discount_price: Decimal,
    pub discount_percent: Decimal,
    pub variants: Vec<ProductVariant>,
    pub tags: Vec<String>,
    pub features: Vec<String>,
    pub is_featured: bool,
    pub is_new_arrival: bool,
    pub is_best_seller: bool,
    pub is_active: bool,
    pub stock: i32,
    pub rating: f64,
    pub review_count: i32,
    pub seller_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn variant(&self, id: Uuid) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == Some(id))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image: String,
    pub icon: String,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<Uuid>,
    #[serde(default)]
    pub size: String,
    pub price: Decimal,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub total: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub products: Vec<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// Product summary shown on the wishlist page.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WishlistProduct {
    pub id: Uuid,
    pub name: String,
    pub thumbnail: String,
    pub base_price: Decimal,
    pub discount_price: Decimal,
    pub metal_type: MetalType,
    pub is_active: bool,
    pub stock: i32,
}

impl From<Product> for WishlistProduct {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            thumbnail: p.thumbnail,
            base_price: p.base_price,
            discount_price: p.discount_price,
            metal_type: p.metal_type,
            is_active: p.is_active,
            stock: p.stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<Uuid>,
    #[serde(default)]
    pub size: String,
    pub quantity: i32,
    pub price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub address: Address,
    #[serde(default)]
    pub method: String,
    pub cost: Decimal,
    #[serde(default)]
    pub tracking_id: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub estimated_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub coupon_code: String,
    pub shipping_info: ShippingInfo,
    pub payment_info: PaymentInfo,
    pub total: Decimal,
    pub status: OrderStatus,
    pub notes: String,
    pub cancel_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_avatar: String,
    /// 1-5
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub images: Vec<String>,
    pub is_verified: bool,
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
