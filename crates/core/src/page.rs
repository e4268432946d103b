// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Paginated bulk reads.

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Parameters of a bulk read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub collection: String,
    /// Filter source text; empty means all records.
    #[serde(default)]
    pub filter: String,
    /// Sort spec source text; empty means server order.
    #[serde(default)]
    pub sort: String,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl PageQuery {
    pub fn new(collection: impl Into<String>, per_page: u32) -> Self {
        PageQuery {
            collection: collection.into(),
            filter: String::new(),
            sort: String::new(),
            page: 1,
            per_page,
        }
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }
}

/// One page of a bulk read result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub items: Vec<Record>,
}

impl Page {
    /// Slices an already filtered and sorted result set into one page.
    ///
    /// Page 0 is treated as page 1; a per-page of 0 is treated as 1.
    pub fn paginate(records: Vec<Record>, page: u32, per_page: u32) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total_items = records.len() as u64;
        let total_pages = total_items.div_ceil(u64::from(per_page)).max(1);
        let skip = (page as usize - 1).saturating_mul(per_page as usize);

        let items = records
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .collect();

        Page {
            page,
            per_page,
            total_items,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            items,
        }
    }
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
