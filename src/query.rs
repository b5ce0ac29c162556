//! Paginated retrieval of an owner's todos.
//!
//! A page is read from the owner's creation-time index, optionally narrowed
//! by a substring filter on `name`, and capped at the requested page size.
//! The continuation cursor encodes the index position of the last item of
//! the page so the next call resumes strictly after it.
//!
//! Name sorting is applied to the page after it has been cut, so it orders
//! items within one page only. Pages are never globally ordered by name;
//! that would need an index keyed by name.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use icu_collator::options::CollatorOptions;
use icu_collator::Collator;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{self, DbPool, IndexPosition, Scan};
use crate::error::AppError;
use crate::models::{Page, RetrieveTodosRequest, TodoItem};

/// Direction of the creation-time scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `"desc"` in any case selects descending; everything else is ascending.
    pub fn parse_lax(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
}

impl SortField {
    /// Only the exact key `"name"` is recognised, anything else means no sort.
    pub fn parse_lax(value: Option<&str>) -> Option<Self> {
        match value {
            Some("name") => Some(SortField::Name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Name,
}

impl FilterField {
    /// Unknown keys are ignored rather than rejected.
    pub fn parse_lax(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("name") {
            Some(FilterField::Name)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub page_size: usize,
    pub cursor: Option<String>,
    pub direction: SortDirection,
    pub sort_field: Option<SortField>,
    pub filter_field: Option<FilterField>,
    pub filter_value: String,
}

impl QueryDescriptor {
    pub fn new(page_size: usize) -> Self {
        QueryDescriptor {
            page_size,
            cursor: None,
            direction: SortDirection::Asc,
            sort_field: None,
            filter_field: None,
            filter_value: String::new(),
        }
    }
}

impl TryFrom<RetrieveTodosRequest> for QueryDescriptor {
    type Error = AppError;

    fn try_from(req: RetrieveTodosRequest) -> Result<Self, Self::Error> {
        let page_size = usize::try_from(req.page_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                AppError::InvalidDescriptor(format!(
                    "pageSize must be greater than zero, got {}",
                    req.page_size
                ))
            })?;

        let (filter_field, filter_value) = match req.filter_by {
            Some(filter) => (FilterField::parse_lax(&filter.key), filter.value),
            None => (None, String::new()),
        };

        Ok(QueryDescriptor {
            page_size,
            cursor: req.last_item_key.filter(|key| !key.is_empty()),
            direction: SortDirection::parse_lax(req.order_by.as_deref()),
            sort_field: SortField::parse_lax(req.sort_by.as_deref()),
            filter_field,
            filter_value,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorToken {
    owner_id: String,
    created_at: String,
    todo_id: String,
}

pub fn encode_cursor(item: &TodoItem) -> Result<String, AppError> {
    let token = CursorToken {
        owner_id: item.owner_id.clone(),
        created_at: item.created_at.clone(),
        todo_id: item.todo_id.clone(),
    };
    let json = serde_json::to_vec(&token).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes a cursor issued to `owner_id`. Cursors of other owners are rejected.
pub fn decode_cursor(owner_id: &str, cursor: &str) -> Result<IndexPosition, AppError> {
    let malformed = || AppError::InvalidDescriptor("malformed lastItemKey".to_string());

    let bytes = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| malformed())?;
    let token: CursorToken = serde_json::from_slice(&bytes).map_err(|_| malformed())?;

    if token.owner_id != owner_id {
        return Err(AppError::InvalidDescriptor(
            "lastItemKey belongs to another owner".to_string(),
        ));
    }

    Ok(IndexPosition {
        created_at: token.created_at,
        todo_id: token.todo_id,
    })
}

/// Orders the page by name with the root-locale collator. Names the collator
/// considers equal fall back to code point order.
pub fn sort_page_by_name(items: &mut [TodoItem]) -> Result<(), AppError> {
    let collator = Collator::try_new(Default::default(), CollatorOptions::default())
        .map_err(|e| AppError::Internal(format!("loading collation data: {e}")))?;
    items.sort_by(|a, b| {
        collator
            .compare(&a.name, &b.name)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(())
}

pub fn retrieve_todos(
    pool: &DbPool,
    owner_id: &str,
    descriptor: &QueryDescriptor,
) -> Result<Page, AppError> {
    if descriptor.page_size == 0 {
        return Err(AppError::InvalidDescriptor(
            "pageSize must be greater than zero".to_string(),
        ));
    }

    let after = descriptor
        .cursor
        .as_deref()
        .map(|cursor| decode_cursor(owner_id, cursor))
        .transpose()?;

    let name_contains = match descriptor.filter_field {
        Some(FilterField::Name) => Some(descriptor.filter_value.as_str()),
        None => None,
    };

    let scan = Scan {
        direction: descriptor.direction,
        after: after.as_ref(),
        name_contains,
        limit: descriptor.page_size,
    };
    let mut items = db::scan_todos(pool, owner_id, &scan)?;

    // A short page means the scan ran off the end of the collection. A full
    // one ends there only if no item at all follows its last position.
    let last_item_key = match items.last() {
        Some(last) if items.len() == descriptor.page_size => {
            let position = IndexPosition {
                created_at: last.created_at.clone(),
                todo_id: last.todo_id.clone(),
            };
            let probe = Scan {
                direction: descriptor.direction,
                after: Some(&position),
                name_contains: None,
                limit: 1,
            };
            if db::scan_todos(pool, owner_id, &probe)?.is_empty() {
                None
            } else {
                Some(encode_cursor(last)?)
            }
        }
        _ => None,
    };

    if descriptor.sort_field == Some(SortField::Name) {
        sort_page_by_name(&mut items)?;
    }

    debug!(
        owner = owner_id,
        count = items.len(),
        more = last_item_key.is_some(),
        "Retrieved page of todos"
    );

    Ok(Page {
        items,
        last_item_key,
    })
}
