//! Search, filtering and pagination on top of [`BaseRepository`].

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::password;
use crate::errors::AppError;
use crate::repository::BaseRepository;
use crate::schema::EntityPolicy;
use crate::storage::Record;

/// Raw list query parameters as they arrive on the URL.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Validated list parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFilters {
    pub page: usize,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Default for ListFilters {
    fn default() -> Self {
        Self {
            page: 1,
            limit: None,
            search: None,
            status: None,
            category: None,
            start: None,
            end: None,
        }
    }
}

impl ListQuery {
    pub fn parse(self) -> Result<ListFilters, AppError> {
        let page = match non_empty(self.page) {
            Some(raw) => parse_positive("page", &raw)?,
            None => 1,
        };
        let limit = non_empty(self.limit)
            .map(|raw| parse_positive("limit", &raw))
            .transpose()?;

        let start = non_empty(self.start_date)
            .map(|raw| {
                parse_date_bound(&raw, false)
                    .ok_or_else(|| AppError::Validation(format!("Invalid startDate '{}'", raw)))
            })
            .transpose()?;
        let end = non_empty(self.end_date)
            .map(|raw| {
                parse_date_bound(&raw, true)
                    .ok_or_else(|| AppError::Validation(format!("Invalid endDate '{}'", raw)))
            })
            .transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AppError::Validation(
                    "startDate must not be after endDate".to_string(),
                ));
            }
        }

        Ok(ListFilters {
            page,
            limit,
            search: non_empty(self.search).map(|s| s.to_lowercase()),
            status: non_empty(self.status),
            category: non_empty(self.category),
            start,
            end,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_positive(name: &str, raw: &str) -> Result<usize, AppError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::Validation(format!(
            "{} must be a positive integer",
            name
        ))),
    }
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date.
///
/// Bare dates become the first instant of the day, or the last one when
/// `end_of_day` is set, so date ranges are inclusive.
pub fn parse_date_bound(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Pagination metadata returned with list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// One page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Slice `(page-1)*limit .. page*limit` out of the full result set.
pub fn paginate<T>(items: Vec<T>, page: usize, limit: Option<usize>) -> Page<T> {
    let total = items.len();
    let page = page.max(1);

    let Some(limit) = limit else {
        let items = if page == 1 { items } else { Vec::new() };
        return Page {
            items,
            pagination: Pagination {
                page,
                limit: total,
                total,
                total_pages: usize::from(total > 0),
            },
        };
    };

    let limit = limit.max(1);
    let start = (page - 1).saturating_mul(limit);
    let items = items.into_iter().skip(start).take(limit).collect();

    Page {
        items,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        },
    }
}

/// Whether `record` passes every filter in `filters`.
pub fn matches(policy: &EntityPolicy, record: &Record, filters: &ListFilters) -> bool {
    if let Some(status) = &filters.status {
        if record.get("status").and_then(Value::as_str) != Some(status.as_str()) {
            return false;
        }
    }

    if let Some(category) = &filters.category {
        if record.get("category").and_then(Value::as_str) != Some(category.as_str()) {
            return false;
        }
    }

    if filters.start.is_some() || filters.end.is_some() {
        let Some(created) = record
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc))
        else {
            return false;
        };
        if filters.start.is_some_and(|start| created < start) {
            return false;
        }
        if filters.end.is_some_and(|end| created > end) {
            return false;
        }
    }

    if let Some(needle) = &filters.search {
        let hit = record.iter().any(|(key, value)| {
            if policy.is_password_field(key) || key == password::HASH_TYPE_FIELD {
                return false;
            }
            match value {
                Value::String(s) => s.to_lowercase().contains(needle.as_str()),
                Value::Number(n) => n.to_string().contains(needle.as_str()),
                _ => false,
            }
        });
        if !hit {
            return false;
        }
    }

    true
}

/// Adds search and pagination semantics to a repository.
pub struct BaseService {
    repo: BaseRepository,
}

impl BaseService {
    pub fn new(repo: BaseRepository) -> Self {
        Self { repo }
    }

    pub fn policy(&self) -> &EntityPolicy {
        self.repo.policy()
    }

    /// Filter and paginate, returning records with secrets stripped.
    pub async fn list(&self, filters: &ListFilters) -> Result<Page<Record>, AppError> {
        let policy = self.policy();
        let filtered: Vec<Record> = self
            .repo
            .find_all()
            .await?
            .into_iter()
            .filter(|r| matches(policy, r, filters))
            .collect();

        let mut page = paginate(filtered, filters.page, filters.limit);
        page.items = page
            .items
            .into_iter()
            .map(|r| policy.strip_sensitive(r))
            .collect();
        Ok(page)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Record>, AppError> {
        Ok(self
            .repo
            .find_by_id(id)
            .await?
            .map(|r| self.policy().strip_sensitive(r)))
    }

    pub async fn create(&self, data: Record) -> Result<Record, AppError> {
        let record = self.repo.create(data).await?;
        Ok(self.policy().strip_sensitive(record))
    }

    pub async fn update(&self, id: &str, patch: Record) -> Result<Option<Record>, AppError> {
        Ok(self
            .repo
            .update(id, patch)
            .await?
            .map(|r| self.policy().strip_sensitive(r)))
    }

    pub async fn delete(&self, id: &str) -> Result<Option<Record>, AppError> {
        Ok(self
            .repo
            .delete(id)
            .await?
            .map(|r| self.policy().strip_sensitive(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let map: serde_json::Map<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        serde_json::from_value(Value::Object(map)).unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        let filters = ListQuery::default().parse().unwrap();
        assert_eq!(filters, ListFilters::default());
    }

    #[test]
    fn test_parse_rejects_bad_paging() {
        assert!(query(&[("page", "0")]).parse().is_err());
        assert!(query(&[("limit", "ten")]).parse().is_err());
        assert!(query(&[("limit", "-1")]).parse().is_err());
        assert!(query(&[("startDate", "2024-02-01"), ("endDate", "2024-01-01")])
            .parse()
            .is_err());
    }

    #[test]
    fn test_date_bounds() {
        let start = parse_date_bound("2024-03-01", false).unwrap();
        let end = parse_date_bound("2024-03-01", true).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(end > start);
        assert!(parse_date_bound("2024-03-01T10:00:00Z", false).is_some());
        assert!(parse_date_bound("March 1st", false).is_none());
    }

    #[test]
    fn test_pagination_covers_every_item_once() {
        for total in [0usize, 1, 9, 10, 11, 25] {
            for limit in [1usize, 3, 10] {
                let items: Vec<usize> = (0..total).collect();
                let first = paginate(items.clone(), 1, Some(limit));
                assert_eq!(first.pagination.total_pages, total.div_ceil(limit));

                let mut collected = Vec::new();
                for page in 1..=first.pagination.total_pages {
                    collected.extend(paginate(items.clone(), page, Some(limit)).items);
                }
                assert_eq!(collected, items);
            }
        }
    }

    #[test]
    fn test_pagination_without_limit() {
        let page = paginate(vec![1, 2, 3], 1, None);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.pagination.total_pages, 1);
        assert_eq!(page.pagination.limit, 3);
        assert!(paginate(vec![1, 2, 3], 2, None).items.is_empty());
    }

    #[test]
    fn test_filters() {
        let registry = SchemaRegistry::builtin().unwrap();
        let users = registry.get("users").unwrap();
        let user = record(json!({
            "id": "u1",
            "name": "Dana Buyer",
            "password": "$argon2id$secretvalue",
            "hashType": "argon2",
            "status": "active",
            "createdAt": "2024-03-15T08:00:00.000Z"
        }));

        let by = |pairs: &[(&str, &str)]| matches(&users, &user, &query(pairs).parse().unwrap());

        assert!(by(&[("search", "BUYER")]));
        assert!(!by(&[("search", "secretvalue")]));
        assert!(!by(&[("search", "argon")]));
        assert!(by(&[("status", "active")]));
        assert!(!by(&[("status", "inactive")]));
        assert!(!by(&[("category", "x")]));
        assert!(by(&[("startDate", "2024-03-01"), ("endDate", "2024-03-15")]));
        assert!(!by(&[("startDate", "2024-03-16")]));
    }
}
