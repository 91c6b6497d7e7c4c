//! Ledger query model: filters, whitelisted sort fields and page-based pagination.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use kardexpos_core::UserId;
use kardexpos_inventory::{KardexEntry, MovementKind};
use kardexpos_products::ProductId;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Clamp user input: page >= 1, 1 <= limit <= [`MAX_PAGE_SIZE`].
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerFilter {
    pub movement_type: Option<MovementKind>,
    pub product_id: Option<ProductId>,
    pub user_id: Option<UserId>,
}

/// Sortable columns. Anything else is rejected at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    CreatedAt,
    MovementType,
    Quantity,
    UnitCost,
    Total,
    StockBefore,
    StockAfter,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::MovementType => "movement_type",
            SortField::Quantity => "quantity",
            SortField::UnitCost => "unit_cost",
            SortField::Total => "total",
            SortField::StockBefore => "stock_before",
            SortField::StockAfter => "stock_after",
        }
    }

    fn compare(self, a: &KardexEntry, b: &KardexEntry) -> Ordering {
        match self {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::MovementType => a.movement_type.as_str().cmp(b.movement_type.as_str()),
            SortField::Quantity => a.quantity.cmp(&b.quantity),
            SortField::UnitCost => a.unit_cost.cmp(&b.unit_cost),
            SortField::Total => a.total.cmp(&b.total),
            SortField::StockBefore => a.stock_before.cmp(&b.stock_before),
            SortField::StockAfter => a.stock_after.cmp(&b.stock_after),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub order_by: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerQuery {
    pub filter: LedgerFilter,
    /// Case-insensitive substring match on `reason`.
    pub search: Option<String>,
    /// Empty means newest first.
    pub sort: Vec<SortSpec>,
    pub page: PageRequest,
}

impl LedgerQuery {
    pub fn matches(&self, entry: &KardexEntry) -> bool {
        let f = &self.filter;
        if f.movement_type.is_some_and(|k| k != entry.movement_type) {
            return false;
        }
        if f.product_id.is_some_and(|p| p != entry.product_id) {
            return false;
        }
        if f.user_id.is_some_and(|u| u != entry.user_id) {
            return false;
        }
        match self.search_term() {
            Some(term) => entry
                .reason
                .as_deref()
                .is_some_and(|r| r.to_lowercase().contains(&term.to_lowercase())),
            None => true,
        }
    }

    /// Trimmed search term, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Compare two entries by the requested sort keys, falling back to ledger order
    /// (`seq`, newest first) so paging is deterministic.
    pub fn compare(&self, (a_seq, a): (u64, &KardexEntry), (b_seq, b): (u64, &KardexEntry)) -> Ordering {
        let sort: &[SortSpec] = if self.sort.is_empty() {
            &[SortSpec {
                order_by: SortField::CreatedAt,
                order: SortOrder::Desc,
            }]
        } else {
            &self.sort
        };

        for spec in sort {
            let ord = spec.order_by.compare(a, b);
            let ord = match spec.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        b_seq.cmp(&a_seq)
    }
}

/// Pagination metadata in the envelope clients expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Entries matching the query across all pages.
    pub total_records: u64,
    /// Entries on this page.
    pub total_count: u64,
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationMeta {
    pub fn new(request: PageRequest, total_records: u64, total_count: u64) -> Self {
        let page_size = request.limit.max(1);
        let total_pages = total_records.div_ceil(u64::from(page_size));
        let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
        Self {
            total_records,
            total_count,
            current_page: request.page,
            total_pages,
            page_size,
            has_next_page: request.page < total_pages,
            has_previous_page: request.page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_records: u64) -> Self {
        let pagination = PaginationMeta::new(request, total_records, items.len() as u64);
        Self { items, pagination }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_is_clamped() {
        assert_eq!(PageRequest::new(None, None), PageRequest::default());
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(5000)).limit, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn pagination_meta_counts_pages() {
        let meta = PaginationMeta::new(PageRequest { page: 2, limit: 10 }, 25, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_previous_page);

        let last = PaginationMeta::new(PageRequest { page: 3, limit: 10 }, 25, 5);
        assert!(!last.has_next_page);
        assert_eq!(last.total_count, 5);

        let empty = PaginationMeta::new(PageRequest::default(), 0, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_previous_page);
    }

    #[test]
    fn sort_spec_parses_from_client_json() {
        let specs: Vec<SortSpec> =
            serde_json::from_str(r#"[{"orderBy":"stockAfter","order":"asc"},{"orderBy":"createdAt"}]"#).unwrap();
        assert_eq!(specs[0].order_by, SortField::StockAfter);
        assert_eq!(specs[0].order, SortOrder::Asc);
        assert_eq!(specs[1].order, SortOrder::Desc);

        assert!(serde_json::from_str::<Vec<SortSpec>>(r#"[{"orderBy":"id; DROP TABLE"}]"#).is_err());
    }

    #[test]
    fn filter_parses_movement_type_names() {
        let f: LedgerFilter = serde_json::from_str(r#"{"movementType":"ADJUSTMENT_OUT"}"#).unwrap();
        assert_eq!(f.movement_type, Some(MovementKind::AdjustmentOut));
        assert_eq!(f.product_id, None);
    }
}
