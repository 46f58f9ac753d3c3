//! # ViUR Core
//!
//! Data-binding layer of the ViUR framework: typed fields ("bones") grouped
//! into schemas ("skeletons") that read client input, validate it, store it
//! in an entity, restore it and turn query parameters into filters.
//!
//! ## Architecture
//!
//! Every bone type implements one single-value codec. The four layouts a
//! bone can take (single, multiple, localized, multiple+localized) are
//! handled once for all types by the bone itself. Request-scoped state such
//! as the requester's language and timezone travels in a [`RequestContext`]
//! passed explicitly to every operation.
//!
//! ## Modules
//!
//! - `bones` - Bone types, the shared codec trait and the bone builder
//! - `skeleton` - Schemas grouping named bones
//! - `request` - Client request data and HTTP request wrapper
//! - `context` - Per-request context handed to bones
//! - `localize` - Timezone guessing and UTC/local conversion
//! - `tzdata` - Country to timezone table
//! - `i18n` - Translation tables and lookup
//! - `render` - Bone descriptions and value display
//! - `db` - Entity, storage values and query model
//! - `types` - Bone value model
//! - `validation` - Structured validation errors
//! - `config` - Runtime configuration
//! - `logging` - Tracing subscriber setup
//! - `json` - JSON parsing with simd-json
//! - `state` - Per-request scratch storage
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bones;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod i18n;
pub mod json;
pub mod localize;
pub mod logging;
pub mod render;
pub mod request;
pub mod skeleton;
pub mod state;
pub mod types;
pub mod tzdata;
pub mod validation;

pub use bones::{Bone, BoneBuilder, BoneKind, BooleanBone, DateBone, EmailBone, StringBone, ValueCodec};
pub use config::Conf;
pub use context::RequestContext;
pub use db::{DbValue, Entity, Filter, FilterOp, Query};
pub use error::{Error, Result};
pub use i18n::Translations;
pub use json::{parse_json, to_json};
pub use localize::guess_time_zone;
pub use logging::{init_tracing, LogFormat};
pub use render::{BoneParams, BoneStructure};
pub use request::{ClientRequest, ClientValue, RequestData};
pub use skeleton::Skeleton;
pub use state::RequestScope;
pub use types::{BoneValue, Scalar, TimeOfDay, ValueCache};
pub use validation::{ErrorSeverity, FieldError, ValidationErrors, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
