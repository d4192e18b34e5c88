pub mod adapters;
pub mod filesystem;
pub mod fs;
pub mod model;
pub mod util;

pub use filesystem::Filesystem;
pub use fs::ObjectFS;
