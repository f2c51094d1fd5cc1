//! Per-call options.

use crate::filter::Filter;
use crate::mask::MaskArg;
use crate::{Error, Value};

use std::collections::BTreeMap;

/// Page size used when an offset is given without a limit, and by paginated iteration.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// A `(limit, offset)` pair selecting a contiguous range of a collection result.
///
/// The window covers the items `offset..offset + limit`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PageWindow {
    limit: u32,
    offset: u32,
}

impl PageWindow {
    /// Creates a window, failing if `limit` is zero.
    pub fn new(limit: u32, offset: u32) -> Result<Self, Error> {
        if limit == 0 {
            return Err(Error::invalid_argument("result limit must be greater than zero"));
        }
        Ok(PageWindow { limit, offset })
    }

    /// Builds the window for an optional limit and offset.
    ///
    /// Returns `None` if neither is set. An offset without a limit uses [`DEFAULT_PAGE_SIZE`].
    pub fn from_parts(limit: Option<u32>, offset: Option<u32>) -> Result<Option<Self>, Error> {
        match (limit, offset) {
            (None, None) => Ok(None),
            (limit, offset) => {
                PageWindow::new(limit.unwrap_or(DEFAULT_PAGE_SIZE), offset.unwrap_or(0)).map(Some)
            }
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The offset one past the last item of this window.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.limit)
    }

    /// The window of the same size directly following this one.
    ///
    /// Returns `None` once the offset no longer fits the wire format.
    pub fn next(&self) -> Option<Self> {
        let offset = self.offset.checked_add(self.limit)?;
        i32::try_from(offset).ok()?;
        Some(PageWindow {
            limit: self.limit,
            offset,
        })
    }

    /// Returns the `resultLimit` header value.
    pub fn to_header(&self) -> Value {
        vec![("limit", Value::from(self.limit)), ("offset", Value::from(self.offset))]
            .into_iter()
            .collect()
    }

    /// Decodes a `resultLimit` header value.
    pub fn from_header(header: &Value) -> Result<Self, Error> {
        let field = |name: &str| -> Result<u32, Error> {
            header
                .get(name)
                .and_then(Value::as_i64)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    Error::invalid_argument(format!("resultLimit header has no valid `{}`", name))
                })
        };
        PageWindow::new(field("limit")?, field("offset")?)
    }
}

/// Options of a single call.
///
/// `CallOptions` is a plain value: every builder method consumes it and returns a new one, and a
/// call only ever sees the options passed to it. Nothing here is remembered between calls.
///
/// ```
/// use softlayer_api::CallOptions;
///
/// let options = CallOptions::new()
///     .id(1234)
///     .mask("id,hostname,datacenter.name")
///     .limit(10)
///     .offset(20);
/// assert_eq!(options.get_limit(), Some(10));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallOptions {
    id: Option<Value>,
    mask: Option<MaskArg>,
    filter: Option<FilterArg>,
    limit: Option<u32>,
    offset: Option<u32>,
    headers: BTreeMap<String, Value>,
    raw_headers: BTreeMap<String, String>,
}

/// An object filter as passed to a call, before validation.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterArg {
    Structured(Filter),
    Value(Value),
}

impl FilterArg {
    pub fn normalize(&self) -> Result<Filter, Error> {
        let filter = match *self {
            FilterArg::Structured(ref filter) => filter.clone(),
            FilterArg::Value(ref value) => Filter::from_value(value)?,
        };
        filter.validate()?;
        Ok(filter)
    }
}

impl From<Filter> for FilterArg {
    fn from(filter: Filter) -> Self {
        FilterArg::Structured(filter)
    }
}

impl From<Value> for FilterArg {
    fn from(value: Value) -> Self {
        FilterArg::Value(value)
    }
}

impl CallOptions {
    pub fn new() -> Self {
        CallOptions::default()
    }

    /// Selects the remote object the method is invoked on.
    pub fn id<V: Into<Value>>(mut self, id: V) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the object mask, as shorthand string, [`Mask`](crate::Mask) or legacy struct.
    pub fn mask<M: Into<MaskArg>>(mut self, mask: M) -> Self {
        self.mask = Some(mask.into());
        self
    }

    /// Sets the object filter, as [`Filter`] or nested struct value.
    pub fn filter<F: Into<FilterArg>>(mut self, filter: F) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Adds a member to the XML-RPC header struct of this call.
    pub fn header<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replaces all XML-RPC headers of this call.
    pub fn headers(mut self, headers: BTreeMap<String, Value>) -> Self {
        self.headers = headers;
        self
    }

    /// Adds an HTTP header to this call.
    pub fn raw_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.raw_headers.insert(name.into(), value.into());
        self
    }

    /// Replaces all HTTP headers of this call.
    pub fn raw_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.raw_headers = headers;
        self
    }

    pub fn get_id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn get_mask(&self) -> Option<&MaskArg> {
        self.mask.as_ref()
    }

    pub fn get_filter(&self) -> Option<&FilterArg> {
        self.filter.as_ref()
    }

    pub fn get_limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn get_offset(&self) -> Option<u32> {
        self.offset
    }

    pub fn get_headers(&self) -> &BTreeMap<String, Value> {
        &self.headers
    }

    pub fn get_raw_headers(&self) -> &BTreeMap<String, String> {
        &self.raw_headers
    }

    /// Replaces limit and offset with the given window.
    pub(crate) fn window(mut self, window: PageWindow) -> Self {
        self.limit = Some(window.limit());
        self.offset = Some(window.offset());
        self
    }
}
