
mod test_query;
mod test_config_file;
