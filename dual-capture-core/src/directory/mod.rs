pub mod endpoint_directory;
