//! Parsing generated verdicts.

mod parser;
pub mod schema;

pub use parser::{
    parse_response, partial_from_map, synthetic_verdict, ParsedResponse, Recovery,
    RAW_PREFIX_LIMIT, SYNTHETIC_SOURCE,
};
pub use schema::{validate_verdict_shape, SchemaError};
