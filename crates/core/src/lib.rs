// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! lc-core: Shared library for livecoll collection synchronization
//!
//! This crate provides the record model, the filter and sort languages, and
//! the wire protocol shared by the livecoll client and the lc-remote server.
//! It performs no I/O.

pub mod error;
pub mod filter;
pub mod page;
pub mod protocol;
pub mod record;
pub mod sort;

pub use error::{Error, Result};
pub use filter::{parse_filter, CompareOp, Filter, FilterExpr, FilterValue};
pub use page::{Page, PageQuery};
pub use record::{ChangeEvent, ChangeKind, Record};
pub use sort::{SortKey, SortSpec};
