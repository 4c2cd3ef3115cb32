//! Query DSL
//!
//! - `lexer`: WHERE-clause tokens
//! - `parser`: shunting-yard parser and the `SQL (...) { SELECT ... }` wrapper
//! - `serializer`: criteria and complex queries back to text
//! - `filter`: time-event filters applied to complex query results

mod lexer;
pub mod filter;
pub mod parser;
pub mod serializer;

pub use filter::{filter_events, parse_time_millis, TimeEvent};
pub use parser::{parse_criteria, parse_query};
pub use serializer::{criteria_to_dsl, unparse};
