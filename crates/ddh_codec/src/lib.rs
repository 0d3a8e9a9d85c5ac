//! # DDH Codec
//!
//! Record model and field encoding for the DDH node API.
//!
//! The repository stores every field in a nested, language-wrapped shape
//! (`{"und": [{"value": ...}]}`, `{"und": [{"tid": ...}]}`, ...). This crate
//! lets callers describe catalog entries as flat [`Record`]s and turns them
//! into that wire shape.
//!
//! This crate provides:
//! - [`FieldValue`] / [`Record`]: caller-side data model
//! - [`FieldSchema`]: declarative field name → [`EncodingRule`] table
//! - [`FieldEncoder`]: pure record → wire object transformation
//! - [`TaxonomyRegistry`]: taxonomy lookups, with an in-memory [`StaticTaxonomy`]
//! - [`parse_date`]: lenient date parsing for caller-supplied strings
//! - Dataset and resource templates
//!
//! ## Invariants
//!
//! - Encoding never mutates the input record
//! - Absent values are omitted, never sent as `null`
//! - A scalar on a multi-valued field encodes like a one-element list
//!
//! ## Usage
//!
//! ```
//! use ddh_codec::{FieldEncoder, Record, StaticTaxonomy};
//! use serde_json::json;
//!
//! let taxonomy = StaticTaxonomy::new().with_term("field_topic", "Energy", 366);
//! let encoder = FieldEncoder::with_taxonomy(taxonomy);
//!
//! let record = Record::new().with("title", "Power plants").with("field_topic", 366);
//! let obj = encoder.encode(&record);
//!
//! assert_eq!(obj["field_topic"], json!({"und": [{"tid": 366}]}));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod date;
mod encoder;
mod error;
mod schema;
mod taxonomy;
pub mod templates;
mod value;

pub use date::{parse_date, parse_optional_date};
pub use encoder::{EncodedObject, FieldEncoder, LANGUAGE_NEUTRAL};
pub use error::{CodecError, CodecResult};
pub use schema::{EncodingRule, FieldPattern, FieldSchema, COLLECTION_MODE, DEFAULT_TIMEZONE};
pub use taxonomy::{NoTaxonomy, StaticTaxonomy, TaxonomyRegistry};
pub use templates::{dataset_template, resource_template, RESOURCES_FIELD};
pub use value::{FieldValue, Record, DATETIME_FORMAT};
