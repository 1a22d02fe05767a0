pub mod auto_splitter;
pub mod bundle_definition;
pub mod bundle_format;
pub mod code_generator;
pub mod config;
pub mod dependency_graph;
pub mod error;
pub mod filter;
pub mod minifier;
pub mod module_info;
pub mod module_name;
pub mod pool;
pub mod resolver;
pub mod types;
pub mod writer;
