pub mod archive;
pub mod merge;
pub mod series_file;
pub mod sink;
