//! A dynamic XML-RPC client for the SoftLayer API.
//!
//! Any method of any service can be called by name: a [`Client`] hands out [`Service`] handles,
//! and every call on a service is described by its positional arguments plus a set of
//! [`CallOptions`] (object id, object mask, object filter, pagination window and per-call
//! headers). The call is turned into a [`CallDescriptor`], encoded as an XML-RPC
//! `<methodCall>` and sent by a [`Transport`].
//!
//! ```no_run
//! use softlayer_api::{CallOptions, Client, Filter, Predicate};
//!
//! // credentials fall back to `SL_USERNAME` / `SL_API_KEY`
//! let client = Client::builder().build()?;
//!
//! let filter = Filter::new().set("virtualGuests.hostname", Predicate::query("web*"))?;
//! for guest in client.service("Account").iter(
//!     "getVirtualGuests",
//!     vec![],
//!     &CallOptions::new().mask("id,hostname,datacenter.name").filter(filter),
//! ) {
//!     println!("{:?}", guest?);
//! }
//! # Ok::<(), softlayer_api::Error>(())
//! ```
//!
//! Options only ever apply to the call they are passed to.
//!
//! The XML-RPC codec follows the [XML-RPC spec][spec], with the `<i8>` and `<nil/>` extensions.
//!
//! [spec]: http://xmlrpc.scripting.com/spec.html

#![doc(html_root_url = "https://docs.rs/softlayer-api/0.1.0")]

mod client;
mod descriptor;
mod error;
mod fault;
mod filter;
mod mask;
mod options;
mod parser;
mod request;
mod service;
mod transport;
mod utils;
mod value;

pub mod config;

pub use crate::client::{Client, ClientBuilder};
pub use crate::config::{Credentials, API_PRIVATE_ENDPOINT, API_PUBLIC_ENDPOINT};
pub use crate::descriptor::{CallDescriptor, DecodedHeaders};
pub use crate::error::{ConfigError, Error, ParseError, TransportError};
pub use crate::fault::{Fault, FaultCode, FaultKind};
pub use crate::filter::{Filter, FilterNode, FilterOption, Order, Predicate};
pub use crate::mask::{Mask, MaskArg};
pub use crate::options::{CallOptions, FilterArg, PageWindow, DEFAULT_PAGE_SIZE};
pub use crate::parser::{parse_response, MethodResponse};
pub use crate::request::Request;
pub use crate::service::{Call, Pages, Service};
pub use crate::transport::{CallRecord, DebugTransport, FixtureTransport, Response, Transport};
pub use crate::value::Value;

#[cfg(feature = "async")]
pub use crate::transport::AsyncTransport;

#[cfg(any(feature = "http", feature = "async"))]
pub use crate::transport::http;
