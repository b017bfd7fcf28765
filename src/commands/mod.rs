mod photos;
mod refresh;
mod thumbnail;
mod transfer;

pub use photos::Original;
pub use thumbnail::ThumbnailResponse;
pub use transfer::{MoveOutcome, MoveReport, MoveStatus};
