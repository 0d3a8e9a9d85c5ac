//! # DDH Client
//!
//! Client-side sync layer for the DDH content repository node API.
//!
//! This crate provides:
//! - Paginated, resumable search (`Client::search`)
//! - Dataset and resource creation, including ordered multi-resource
//!   creation with partial-failure reporting
//! - Partial updates and deletes
//! - File upload onto existing resources
//! - Transport abstraction with a mock for tests and, with the `http`
//!   feature, a blocking `reqwest` transport
//!
//! ## Architecture
//!
//! A [`Client`] owns its configuration, its [`Session`] and a
//! [`Transport`]. Records are encoded to the wire shape by the
//! [`ddh_codec::FieldEncoder`] the client holds; responses are decoded by
//! a parser that can optionally strip trailing diagnostic markup.
//!
//! ## Key Invariants
//!
//! - A dataset is always created before its resources
//! - Resources are created in declared order, resource k with weight k
//! - Nothing is rolled back: partial success is reported, never hidden
//! - Mutating requests carry the session cookie and CSRF token
//! - Search yields each record at most once and stops at the reported total

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
#[cfg(feature = "http")]
mod http;
mod orchestrator;
mod response;
mod search;
mod transport;

pub use config::{AttachStrategy, ClientConfig, RetryConfig, Session, DEFAULT_PAGE_SIZE};
pub use error::{ClientError, ClientResult};
#[cfg(feature = "http")]
pub use http::ReqwestTransport;
pub use orchestrator::{
    AttachReport, Client, ClientStats, CreatedDataset, DatasetRef, DeleteOutcome, ResourceRef,
    HARVEST_ID_FIELD, UPLOAD_FIELD, WORKFLOW_FIELD,
};
pub use response::{json_id, ResponseParser};
pub use search::{ObjectType, SearchCursor, SearchIter, SearchQuery, ID_FIELD, TITLE_FIELD};
pub use transport::{
    FormPart, HttpRequest, HttpResponse, Method, MockTransport, RequestBody, Transport,
};
