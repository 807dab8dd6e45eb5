//! # Document normalization
//!
//! Converts the store's raw JSON records (products, categories, blog
//! articles, coupons) into plain-text [`Document`]s suitable for embedding.
//! Each category has its own field-extraction and formatting rules: prices
//! are rendered Vietnamese-style (`50.000 đ`), HTML markup is stripped, long
//! descriptions are truncated to a fixed character budget, and Mongo-style
//! expiry dates are turned into `dd/mm/yyyy`.
//!
//! Soft-deleted, inactive, or unpublished records never produce a document.
//! That filtering is a hard correctness requirement: a deleted entity must
//! never be retrievable.

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fs, path::Path};
use tracing::{info, warn};

use crate::error::RagError;

/// Character budget for a product's long description.
pub const PRODUCT_DESCRIPTION_BUDGET: usize = 500;

/// Character budget for an article body.
pub const ARTICLE_BODY_BUDGET: usize = 800;

/// The single document indexed when every source collection is empty or
/// absent, so the index is never built over zero vectors.
pub const PLACEHOLDER_TEXT: &str = "Chưa có dữ liệu.";

static TAG_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new("<[^>]*>").expect("tag markup pattern is valid"));

/// Which source collection a document was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocCategory {
    Product,
    Category,
    Article,
    Coupon,
    /// The empty-catalog placeholder, not tied to any collection.
    Placeholder,
}

/// One retrieval unit: the normalized text of a single source record.
///
/// Position in the document sequence is the sole link to the embedding
/// vector at the same position. The category is carried as a structured
/// field so consumers never have to parse the `[SẢN PHẨM]`-style header
/// back out of the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub category: DocCategory,
    pub text: String,
}

/// A `label: value` nutrition entry on a product. Values in the source data
/// are sometimes numbers, so they are kept as raw JSON until rendering.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionFact {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub original_price: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nutrition: Vec<NutritionFact>,
    #[serde(default)]
    pub preservation: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub title: String,
    /// Topic label; the source data reuses the key `category` for it.
    #[serde(default, rename = "category")]
    pub topic: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

/// An expiry value as found in the source dumps: either a plain string or a
/// Mongo extended-JSON `{"$date": "..."}` wrapper around an ISO timestamp.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpiryDate {
    Wrapped {
        #[serde(rename = "$date")]
        date: String,
    },
    Plain(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRecord {
    pub code: String,
    #[serde(default, rename = "type")]
    pub discount_type: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expiry_date: Option<ExpiryDate>,
    #[serde(default)]
    pub usage_limit: i64,
    #[serde(default)]
    pub used_count: i64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Remove all `<...>` tag markup. Entities are left as-is.
pub fn strip_html(raw: &str) -> String {
    TAG_MARKUP.replace_all(raw, "").trim().to_string()
}

/// Render a price Vietnamese-style: rounded to whole đồng, `.` as the
/// thousands separator, ` đ` suffix (e.g. `50.000 đ`).
pub fn format_vnd(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    if rounded < 0 {
        format!("-{grouped} đ")
    } else {
        format!("{grouped} đ")
    }
}

/// Render a coupon expiry as human-readable text.
///
/// Absent means the coupon never expires. Wrapped ISO-8601 timestamps become
/// `dd/mm/yyyy`; a wrapped value that fails to parse falls back to the raw
/// string rather than erroring.
pub fn format_expiry(expiry: Option<&ExpiryDate>) -> String {
    match expiry {
        None => "Không thời hạn".to_string(),
        Some(ExpiryDate::Plain(text)) => text.clone(),
        Some(ExpiryDate::Wrapped { date }) => DateTime::parse_from_rfc3339(date)
            .map(|dt| dt.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|_| date.clone()),
    }
}

/// Character-count truncation. Not word-boundary aware; cutting mid-word is
/// an accepted lossy edge case.
fn truncate_chars(text: &str, budget: usize) -> String {
    text.chars().take(budget).collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Normalize one product record, or `None` if it is soft-deleted.
pub fn normalize_product(product: &ProductRecord) -> Option<Document> {
    if product.is_deleted {
        return None;
    }

    let nutrition = product
        .nutrition
        .iter()
        .map(|fact| format!("{}: {}", fact.label, value_text(&fact.value)))
        .collect::<Vec<_>>()
        .join(", ");
    let description = strip_html(&product.description);

    let text = format!(
        "[SẢN PHẨM] {}\n\
         - Giá: {} (Gốc: {})\n\
         - Đơn vị: {}\n\
         - Đặc điểm: {}. {}...\n\
         - Dinh dưỡng: {}\n\
         - Bảo quản: {}\n\
         - Từ khóa: {}",
        product.name,
        format_vnd(product.price),
        format_vnd(product.original_price),
        product.unit,
        product.short_description,
        truncate_chars(&description, PRODUCT_DESCRIPTION_BUDGET),
        nutrition,
        product.preservation,
        product.tags.join(", "),
    );

    Some(Document {
        category: DocCategory::Product,
        text,
    })
}

/// Normalize one category record, or `None` if inactive or soft-deleted.
pub fn normalize_category(category: &CategoryRecord) -> Option<Document> {
    if !category.is_active || category.is_deleted {
        return None;
    }

    let text = format!(
        "[DANH MỤC] {}\n- Mô tả: {}",
        category.name, category.description,
    );

    Some(Document {
        category: DocCategory::Category,
        text,
    })
}

/// Normalize one blog article, or `None` if unpublished or soft-deleted.
pub fn normalize_article(article: &ArticleRecord) -> Option<Document> {
    if !article.is_published || article.is_deleted {
        return None;
    }

    let body = strip_html(&article.content);

    let text = format!(
        "[BÀI VIẾT/MẸO VẶT] {}\n\
         - Chủ đề: {}\n\
         - Tóm tắt: {}\n\
         - Nội dung chính: {}...\n\
         - Từ khóa: {}",
        article.title,
        article.topic,
        article.short_description,
        truncate_chars(&body, ARTICLE_BODY_BUDGET),
        article.tags.join(", "),
    );

    Some(Document {
        category: DocCategory::Article,
        text,
    })
}

/// Normalize one coupon, or `None` if inactive or soft-deleted.
///
/// Percentage coupons render as `25%`, fixed-amount ones as formatted
/// currency. `usageLimit == 0` means unlimited use.
pub fn normalize_coupon(coupon: &CouponRecord) -> Option<Document> {
    if !coupon.is_active || coupon.is_deleted {
        return None;
    }

    let discount = if coupon.discount_type == "PERCENT" {
        format!("{}%", coupon.value)
    } else {
        format_vnd(coupon.value)
    };
    let usage = if coupon.usage_limit == 0 {
        "Không giới hạn".to_string()
    } else {
        format!(
            "Còn {} lượt",
            coupon.usage_limit.saturating_sub(coupon.used_count)
        )
    };

    let text = format!(
        "[MÃ GIẢM GIÁ/VOUCHER] Mã: {}\n\
         - Ưu đãi: Giảm {}\n\
         - Mô tả: {}\n\
         - Hạn sử dụng: {}\n\
         - Tình trạng lượt dùng: {}",
        coupon.code,
        discount,
        coupon.description,
        format_expiry(coupon.expiry_date.as_ref()),
        usage,
    );

    Some(Document {
        category: DocCategory::Coupon,
        text,
    })
}

fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, RagError> {
    if !path.exists() {
        return Err(RagError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }
    let raw = fs::read_to_string(path).map_err(|err| RagError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|err| RagError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Load every source collection under `data_dir` and normalize it into the
/// document sequence.
///
/// A missing or unparseable collection is logged and skipped; it is never
/// fatal to the build. If the union of all categories yields zero documents,
/// exactly one [`PLACEHOLDER_TEXT`] document is produced instead.
pub fn load_documents(data_dir: &Path) -> Vec<Document> {
    let mut documents = Vec::new();

    match read_collection::<ProductRecord>(&data_dir.join("database.products.json")) {
        Ok(products) => {
            let before = documents.len();
            documents.extend(products.iter().filter_map(normalize_product));
            info!(loaded = documents.len() - before, "loaded products");
        }
        Err(err) => warn!(%err, "skipping products collection"),
    }

    match read_collection::<CategoryRecord>(&data_dir.join("database.categories.json")) {
        Ok(categories) => {
            let before = documents.len();
            documents.extend(categories.iter().filter_map(normalize_category));
            info!(loaded = documents.len() - before, "loaded categories");
        }
        Err(err) => warn!(%err, "skipping categories collection"),
    }

    match read_collection::<ArticleRecord>(&data_dir.join("database.blogs.json")) {
        Ok(articles) => {
            let before = documents.len();
            documents.extend(articles.iter().filter_map(normalize_article));
            info!(loaded = documents.len() - before, "loaded articles");
        }
        Err(err) => warn!(%err, "skipping blogs collection"),
    }

    match read_collection::<CouponRecord>(&data_dir.join("database.coupons.json")) {
        Ok(coupons) => {
            let before = documents.len();
            documents.extend(coupons.iter().filter_map(normalize_coupon));
            info!(loaded = documents.len() - before, "loaded coupons");
        }
        Err(err) => warn!(%err, "skipping coupons collection"),
    }

    if documents.is_empty() {
        warn!("no source data found; indexing a single placeholder document");
        documents.push(Document {
            category: DocCategory::Placeholder,
            text: PLACEHOLDER_TEXT.to_string(),
        });
    }

    documents
}
