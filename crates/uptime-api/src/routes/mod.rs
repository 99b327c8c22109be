mod monitors;

pub use monitors::{parse_range, router, ChecksQuery, HistoryQuery, TimeRange};
