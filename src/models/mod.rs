pub mod outcome;
pub mod proxy;
pub mod resource;

pub use outcome::{JobOutcome, JobRecord, RunCounts, RunSummary};
pub use proxy::{ProxyCache, ProxyEntry};
pub use resource::Resource;
