//! Catalog helpers: pricing, category tree traversal, slugs, hot deal windows and the brand
//! index.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    fmt,
    str::FromStr,
};

use anyhow::Context;
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl, TextExpressionMethods};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    infra::{aliases::DbConn, app_error::AppError},
    models::{BrandEntity, HotDealEntity, ProductEntity},
    schema::{categories, products},
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    New,
    Sale,
    Regular,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::New => "new",
            ProductStatus::Sale => "sale",
            ProductStatus::Regular => "regular",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ProductStatus::New),
            "sale" => Ok(ProductStatus::Sale),
            "regular" => Ok(ProductStatus::Regular),
            other => Err(AppError::Validation(format!(
                "Unknown product status: {other}"
            ))),
        }
    }
}

/// `price` reduced by `percent`, rounded to the paisa.
pub fn discount_price(price: &BigDecimal, percent: i32) -> BigDecimal {
    if percent <= 0 {
        return price.clone();
    }
    let reduction = price * BigDecimal::from(percent) / BigDecimal::from(100);
    (price - reduction).with_scale_round(2, RoundingMode::HalfUp)
}

impl ProductEntity {
    pub fn discount_price(&self) -> BigDecimal {
        discount_price(&self.price, self.discount_percent)
    }
}

impl HotDealEntity {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }
}

/// Ids of every category below `root` (not including `root`), breadth first.
///
/// Works on a flat `(id, parent_id)` list so arbitrarily deep trees never recurse; ids already
/// visited are skipped, which also stops on a corrupted cyclic chain.
pub fn descendant_ids(root: i32, edges: &[(i32, Option<i32>)]) -> Vec<i32> {
    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for (id, parent) in edges {
        if let Some(parent) = parent {
            children.entry(*parent).or_default().push(*id);
        }
    }

    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut found = Vec::new();

    while let Some(current) = queue.pop_front() {
        for child in children.get(&current).into_iter().flatten() {
            if visited.insert(*child) {
                found.push(*child);
                queue.push_back(*child);
            }
        }
    }

    found
}

/// Whether re-parenting `category` under `new_parent` would close a loop.
pub fn creates_cycle(category: i32, new_parent: Option<i32>, edges: &[(i32, Option<i32>)]) -> bool {
    match new_parent {
        None => false,
        Some(parent) if parent == category => true,
        Some(parent) => descendant_ids(category, edges).contains(&parent),
    }
}

pub async fn category_edges(conn: &mut DbConn) -> Result<Vec<(i32, Option<i32>)>, AppError> {
    let edges = categories::table
        .select((categories::id, categories::parent_id))
        .load(conn)
        .await
        .context("Failed to load category tree")?;
    Ok(edges)
}

/// Lowercase ASCII slug: alphanumerics kept, runs of whitespace, `-` and `_` become a single
/// `-`, everything else is dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }

    slug
}

/// `base` if free, otherwise `base-1`, `base-2`, ...
pub fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{base}-{i}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn slug_base(name: &str, fallback: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() { fallback.to_string() } else { slug }
}

/// Allocates a product slug from `name`, ignoring the product being edited.
pub async fn allocate_product_slug(
    conn: &mut DbConn,
    name: &str,
    editing: Option<i32>,
) -> Result<String, AppError> {
    let base = slug_base(name, "product");
    let mut query = products::table
        .filter(products::slug.like(format!("{base}%")))
        .select(products::slug)
        .into_boxed();
    if let Some(id) = editing {
        query = query.filter(products::id.ne(id));
    }
    let taken: Vec<String> = query
        .load(conn)
        .await
        .context("Failed to load product slugs")?;

    Ok(unique_slug(&base, &taken.into_iter().collect()))
}

/// Allocates a category slug. Slugs are kept unique across the whole tree so `/category/{slug}/`
/// always resolves to one category.
pub async fn allocate_category_slug(
    conn: &mut DbConn,
    name: &str,
    editing: Option<i32>,
) -> Result<String, AppError> {
    let base = slug_base(name, "category");
    let mut query = categories::table
        .filter(categories::slug.like(format!("{base}%")))
        .select(categories::slug)
        .into_boxed();
    if let Some(id) = editing {
        query = query.filter(categories::id.ne(id));
    }
    let taken: Vec<String> = query
        .load(conn)
        .await
        .context("Failed to load category slugs")?;

    Ok(unique_slug(&base, &taken.into_iter().collect()))
}

#[derive(Serialize, Debug, Default, ToSchema)]
pub struct BrandIndex {
    pub digits: Vec<BrandEntity>,
    pub letters: BTreeMap<char, Vec<BrandEntity>>,
}

/// Groups brands by initial: `A`..=`Z` (every letter present, possibly empty) plus a bucket for
/// names starting with a digit. Names starting with anything else are left out.
pub fn brand_index(mut brands: Vec<BrandEntity>) -> BrandIndex {
    brands.sort_by_key(|brand| brand.name.to_lowercase());

    let mut index = BrandIndex {
        digits: Vec::new(),
        letters: ('A'..='Z').map(|letter| (letter, Vec::new())).collect(),
    };

    for brand in brands {
        match brand.name.chars().next() {
            Some(c) if c.is_ascii_digit() => index.digits.push(brand),
            Some(c) if c.is_ascii_alphabetic() => index
                .letters
                .entry(c.to_ascii_uppercase())
                .or_default()
                .push(brand),
            _ => {}
        }
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(raw: &str) -> BigDecimal {
        raw.parse().unwrap()
    }

    fn brand(name: &str) -> BrandEntity {
        BrandEntity {
            id: 0,
            name: name.into(),
            logo: None,
            history: None,
            is_active: true,
        }
    }

    #[test]
    fn discount_price_applies_percentage() {
        assert_eq!(discount_price(&dec("1000.00"), 0), dec("1000.00"));
        assert_eq!(discount_price(&dec("1000.00"), 15), dec("850.00"));
        assert_eq!(discount_price(&dec("99.99"), 33), dec("66.99"));
        assert_eq!(discount_price(&dec("250.00"), 100), dec("0.00"));
    }

    #[test]
    fn descendants_cover_every_level() {
        // 1 -> 2 -> 4 -> 5, 1 -> 3, 6 is a separate root
        let edges = [
            (1, None),
            (2, Some(1)),
            (3, Some(1)),
            (4, Some(2)),
            (5, Some(4)),
            (6, None),
        ];
        let mut found = descendant_ids(1, &edges);
        found.sort();
        assert_eq!(found, vec![2, 3, 4, 5]);
        assert!(descendant_ids(5, &edges).is_empty());
    }

    #[test]
    fn descendants_terminate_on_cycles() {
        let edges = [(1, Some(3)), (2, Some(1)), (3, Some(2))];
        let mut found = descendant_ids(1, &edges);
        found.sort();
        assert_eq!(found, vec![2, 3]);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let edges: Vec<(i32, Option<i32>)> = (1..=100_000)
            .map(|id| (id, if id == 1 { None } else { Some(id - 1) }))
            .collect();
        assert_eq!(descendant_ids(1, &edges).len(), 99_999);
    }

    #[test]
    fn reparenting_under_descendant_is_a_cycle() {
        let edges = [(1, None), (2, Some(1)), (3, Some(2))];
        assert!(creates_cycle(1, Some(3), &edges));
        assert!(creates_cycle(2, Some(2), &edges));
        assert!(!creates_cycle(3, Some(1), &edges));
        assert!(!creates_cycle(3, None, &edges));
    }

    #[test]
    fn slugify_normalises_names() {
        assert_eq!(slugify("  Samsung Galaxy S24 Ultra "), "samsung-galaxy-s24-ultra");
        assert_eq!(slugify("Men's T-Shirt (XL)"), "mens-t-shirt-xl");
        assert_eq!(slugify("a  --  b"), "a-b");
        assert_eq!(slugify("৳৳৳"), "");
    }

    #[test]
    fn unique_slug_appends_counter() {
        let mut taken = HashSet::new();
        assert_eq!(unique_slug("phone", &taken), "phone");
        taken.insert("phone".to_string());
        taken.insert("phone-1".to_string());
        assert_eq!(unique_slug("phone", &taken), "phone-2");
    }

    #[test]
    fn hot_deal_window_is_inclusive() {
        let now = Utc::now();
        let deal = HotDealEntity {
            id: 1,
            product_id: 1,
            start_date: now - Duration::hours(1),
            end_date: now,
            special_price: dec("10"),
        };
        assert!(deal.is_active_at(now));
        assert!(!deal.is_active_at(now + Duration::seconds(1)));
        assert!(!deal.is_active_at(now - Duration::hours(2)));
    }

    #[test]
    fn brand_index_groups_by_initial() {
        let index = brand_index(vec![
            brand("walton"),
            brand("3M"),
            brand("Apple"),
            brand("asus"),
            brand("_hidden"),
        ]);

        assert_eq!(index.letters.len(), 26);
        let a: Vec<&str> = index.letters[&'A'].iter().map(|b| b.name.as_str()).collect();
        assert_eq!(a, vec!["Apple", "asus"]);
        assert_eq!(index.letters[&'W'].len(), 1);
        assert_eq!(index.digits.len(), 1);
        assert!(index.letters[&'Z'].is_empty());
    }

    #[test]
    fn status_parses() {
        assert_eq!("sale".parse::<ProductStatus>().unwrap(), ProductStatus::Sale);
        assert!("clearance".parse::<ProductStatus>().is_err());
    }
}
