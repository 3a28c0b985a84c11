pub mod path;

pub use path::{join_path, quote_segment, split_partial, tokenize, PartialPath, PathError};
