//! Request-plan estimation for intel collection runs.
//!
//! A collection run issues one user-lookup request plus paginated timeline,
//! mention, and interaction searches. The plan is computed before any
//! network call so the scheduler can enforce its monthly budget and the
//! estimate endpoint can answer without touching the upstream API.

use serde::Serialize;

/// Posts returned per upstream page.
const PAGE_SIZE: u32 = 100;

/// Minimum posts fetched per stream, mirroring the collector's floors.
const STREAM_FLOOR: u32 = 20;

/// Expected request usage for one collection run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestPlan {
    pub estimated_requests: u32,
    pub worst_case_requests: u32,
    pub page_cap: u32,
    pub target_limit: u32,
    pub mention_limit: u32,
    pub interaction_limit: u32,
}

/// Estimate the upstream request count for `max_posts` with `page_cap`
/// pages per stream.
///
/// Posts are split 50/30/20 across the target timeline, mentions, and
/// interaction search, each floored at 20.
pub fn request_plan(max_posts: u32, page_cap: u32) -> RequestPlan {
    let posts = max_posts.max(1);
    let page_cap = page_cap.max(1);

    let target_limit = (posts / 2).max(STREAM_FLOOR);
    let mention_limit = (posts * 3 / 10).max(STREAM_FLOOR);
    let interaction_limit = posts
        .saturating_sub(target_limit)
        .saturating_sub(mention_limit)
        .max(STREAM_FLOOR);

    let pages = |limit: u32| limit.div_ceil(PAGE_SIZE).clamp(1, page_cap);

    RequestPlan {
        estimated_requests: 1
            + pages(target_limit)
            + pages(mention_limit)
            + pages(interaction_limit),
        worst_case_requests: 1 + 3 * page_cap,
        page_cap,
        target_limit,
        mention_limit,
        interaction_limit,
    }
}
