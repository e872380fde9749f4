//! 明细名称 / 客户名称解析
//!
//! 商品名按固定优先级尝试: 明细自带名称 → 现成鸡尾酒 → 自调鸡尾酒套装 → 普通商品 → "Unknown product"。

use crate::models::{OrderItemRow, OrderRow};

pub const UNKNOWN_PRODUCT: &str = "Unknown product";
pub const UNKNOWN_CUSTOMER: &str = "Unknown customer";

/// 单个名称解析策略
pub trait NameStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, item: &OrderItemRow) -> Option<String>;
}

/// order_items.product_name
pub struct StoredName;

/// ready_cocktails.name
pub struct ReadyCocktailJoin;

/// cocktails_maison.name
pub struct CocktailKitJoin;

/// products.name
pub struct ProductJoin;

impl NameStrategy for StoredName {
    fn name(&self) -> &'static str {
        "stored_name"
    }

    fn resolve(&self, item: &OrderItemRow) -> Option<String> {
        non_blank(&item.product_name)
    }
}

impl NameStrategy for ReadyCocktailJoin {
    fn name(&self) -> &'static str {
        "ready_cocktail"
    }

    fn resolve(&self, item: &OrderItemRow) -> Option<String> {
        non_blank(&item.ready_cocktail_name)
    }
}

impl NameStrategy for CocktailKitJoin {
    fn name(&self) -> &'static str {
        "cocktail_kit"
    }

    fn resolve(&self, item: &OrderItemRow) -> Option<String> {
        non_blank(&item.cocktail_kit_name)
    }
}

impl NameStrategy for ProductJoin {
    fn name(&self) -> &'static str {
        "product"
    }

    fn resolve(&self, item: &OrderItemRow) -> Option<String> {
        non_blank(&item.product_join_name)
    }
}

/// 按顺序尝试的策略链
pub struct NameResolver {
    strategies: Vec<Box<dyn NameStrategy>>,
}

impl NameResolver {
    pub fn new(strategies: Vec<Box<dyn NameStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(&self, item: &OrderItemRow) -> String {
        for strategy in &self.strategies {
            if let Some(name) = strategy.resolve(item) {
                tracing::trace!("item {} resolved via {}", item.item_id, strategy.name());
                return name;
            }
        }
        tracing::debug!("item {} has no usable name, using fallback", item.item_id);
        UNKNOWN_PRODUCT.to_string()
    }
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(StoredName),
            Box::new(ReadyCocktailJoin),
            Box::new(CocktailKitJoin),
            Box::new(ProductJoin),
        ])
    }
}

/// 客户显示名: 名 + 姓 → full_name → "Unknown customer"
pub fn customer_display_name(order: &OrderRow) -> String {
    let parts: Vec<String> = [&order.first_name, &order.last_name]
        .into_iter()
        .filter_map(non_blank)
        .collect();
    if !parts.is_empty() {
        return parts.join(" ");
    }
    non_blank(&order.full_name).unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
