//! Shared protocol types for the Conduit server.
//!
//! Everything the REST surface and the database queue subsystem agree on
//! lives here: the typed parameter model, the canonical engine/queue enums,
//! the JSON request/response shapes, and the application configuration.
//! All types use serde for JSON serialization with strict enum tagging.

pub mod api;
pub mod config;
pub mod params;
pub mod types;

pub use api::{
    BatchResponse, DatabaseStatus, ErrorBody, ErrorClass, QueryResultItem, StatusResponse,
};
pub use config::{AppConfig, ConfigError, DatabaseConfig, QueryDefinition, ServerConfig};
pub use params::{
    check_missing_parameters, check_unused_parameters, convert_named_to_positional,
    extract_placeholders, group_parameters, parse_typed_parameters, validate_parameter_types,
    BoundStatement, ParamError, ParameterList, ParameterType, ParameterValue, TypedParameter,
};
pub use types::{EngineType, QueueKind};
