pub mod filesystem;

pub use filesystem::{ensure_directory, remove_file, write_atomic, write_file};
