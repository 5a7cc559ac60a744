pub mod file;

pub use file::{is_stdio, open_basis, open_sink, open_source, regular_file_size, FileSink, FileSource};
