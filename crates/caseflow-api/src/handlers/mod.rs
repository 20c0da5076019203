//! HTTP route handlers and background job handlers.

pub mod cases;
pub mod documents;
pub mod expenses;
pub mod insights;
pub mod jobs;
pub mod meetings;
pub mod orgs;
pub mod pipeline;
pub mod tasks;

use caseflow_core::defaults::{LIST_LIMIT, LIST_LIMIT_MAX};
use serde::Deserialize;

pub use pipeline::{
    DocumentIndexingHandler, InsightExtractionHandler, QuickbooksSyncHandler,
    TranscriptAnalysisHandler,
};

/// Common pagination query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Effective limit, clamped to `[1, LIST_LIMIT_MAX]`.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(LIST_LIMIT).clamp(1, LIST_LIMIT_MAX)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamping() {
        let p = Pagination::default();
        assert_eq!(p.limit(), LIST_LIMIT);
        assert_eq!(p.offset(), 0);

        let p = Pagination {
            limit: Some(0),
            offset: Some(-5),
        };
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);

        let p = Pagination {
            limit: Some(10_000),
            offset: Some(20),
        };
        assert_eq!(p.limit(), LIST_LIMIT_MAX);
        assert_eq!(p.offset(), 20);
    }
}
