pub mod filesystem;

pub use filesystem::{FileStore, INPUT_FILENAME};
