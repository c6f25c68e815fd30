pub mod gene_table_parser;
pub mod rate_parser;
