mod clock;
mod disk;
mod listing;
mod snapshot;

pub use clock::{Clock, SystemClock};
pub use disk::ThumbnailCache;
pub use listing::{ListingCache, ListingOptions, RefreshOutcome};
pub use snapshot::ListingSnapshot;
