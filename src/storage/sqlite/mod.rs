//! Shared `SQLite` infrastructure for the knowledge store.
//!
//! ## Module Structure
//!
//! - `connection`: lock acquisition, pragma setup, error translation
//! - `schema`: table and index definitions
//! - `rows`: row conversion for every entity and link type

mod connection;
mod rows;
mod schema;

pub use connection::{acquire_lock, configure_connection, storage_error};
pub use rows::{
    encode_map, parse_component, parse_formula, parse_ingredient, parse_intermediate,
    parse_performance, parse_raw_material,
};
pub use schema::initialize_schema;
