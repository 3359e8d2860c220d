//! Pagination query parameters.

use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::error::AppError;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_SIZE: i64 = 10;
const MAX_SIZE: i64 = 100;

/// `?page=&size=` query parameters.
///
/// Uses `serde_with` to parse numbers from query strings.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<i64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub size: Option<i64>,
}

impl PaginationParams {
    /// Applies defaults and bounds, returning `(page, size)`.
    ///
    /// # Defaults
    ///
    /// - `page`: 1
    /// - `size`: 10
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `page` is below 1 or `size` is
    /// outside 1..=100.
    pub fn resolve(&self) -> Result<(i64, i64), AppError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        let size = self.size.unwrap_or(DEFAULT_SIZE);

        if page < 1 {
            return Err(AppError::bad_request(
                "Page must be greater than 0",
                serde_json::json!({ "page": page }),
            ));
        }

        if !(1..=MAX_SIZE).contains(&size) {
            return Err(AppError::bad_request(
                format!("Size must be between 1 and {MAX_SIZE}"),
                serde_json::json!({ "size": size }),
            ));
        }

        Ok((page, size))
    }
}
