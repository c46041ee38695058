pub mod box_config;
pub mod cli_args;
pub mod data_directory;
