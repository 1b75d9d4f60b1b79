pub mod engine_options;
