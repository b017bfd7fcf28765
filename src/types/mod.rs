mod file;
mod page;

pub use file::Entry;
pub use page::Page;
