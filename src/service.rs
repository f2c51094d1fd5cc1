//! Dynamic method invocation on one remote service.

use crate::client::Client;
use crate::descriptor::CallDescriptor;
use crate::mask::MaskArg;
use crate::options::{CallOptions, FilterArg, PageWindow, DEFAULT_PAGE_SIZE};
use crate::transport::{Response, Transport};
use crate::{Error, Value};

#[cfg(feature = "async")]
use crate::transport::AsyncTransport;

use tracing::debug;

use std::collections::VecDeque;
use std::time::Instant;

/// A handle on a remote service, such as `SoftLayer_Account`.
///
/// Services are cheap to create and hold nothing but the client reference and the service name.
/// In particular, no call options are remembered between calls.
#[derive(Debug)]
pub struct Service<'a, T> {
    client: &'a Client<T>,
    name: String,
}

impl<'a, T> Clone for Service<'a, T> {
    fn clone(&self) -> Self {
        Service {
            client: self.client,
            name: self.name.clone(),
        }
    }
}

impl<'a, T> Service<'a, T> {
    pub(crate) fn new(client: &'a Client<T>, name: String) -> Self {
        Service { client, name }
    }

    /// The full service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the descriptor of a call without sending it.
    ///
    /// The client's credentials are read at this point.
    pub fn prepare(
        &self,
        method: &str,
        args: Vec<Value>,
        options: &CallOptions,
    ) -> Result<CallDescriptor, Error> {
        self.client.describe(&self.name, method, args, options)
    }

    /// Starts building a call of `method`.
    ///
    /// ```no_run
    /// # use softlayer_api::Client;
    /// # let client = Client::builder().build()?;
    /// let guests = client
    ///     .service("Account")
    ///     .method("getVirtualGuests")
    ///     .mask("id,hostname")
    ///     .limit(10)
    ///     .call()?;
    /// # Ok::<(), softlayer_api::Error>(())
    /// ```
    pub fn method(&self, method: &str) -> Call<'_, 'a, T> {
        Call {
            service: self,
            method: method.to_string(),
            args: Vec::new(),
            options: CallOptions::new(),
        }
    }
}

impl<'a, T: Transport> Service<'a, T> {
    /// Sends a prepared call.
    pub fn dispatch(&self, call: &CallDescriptor) -> Result<Response, Error> {
        debug!(service = call.service(), method = call.method(), "dispatching call");
        let start = Instant::now();
        let result = self.client.transport().send(call);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(ref response) => debug!(
                service = call.service(),
                method = call.method(),
                elapsed_ms,
                total_items = response.total_items(),
                "call completed"
            ),
            Err(ref err) => debug!(
                service = call.service(),
                method = call.method(),
                elapsed_ms,
                error = %err,
                "call failed"
            ),
        }
        result
    }

    /// Calls `method` with positional `args`.
    ///
    /// The arguments are passed in order; their number is not checked against the method.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if no credentials are available, [`Error::InvalidArgument`] if an
    /// option is malformed, [`Error::Transport`] if the exchange fails, and [`Error::Fault`] if
    /// the server answers with a fault.
    pub fn invoke(&self, method: &str, args: Vec<Value>, options: &CallOptions) -> Result<Value, Error> {
        self.invoke_response(method, args, options)
            .map(Response::into_value)
    }

    /// Like [`invoke`](Service::invoke), but also returns the reply metadata.
    pub fn invoke_response(
        &self,
        method: &str,
        args: Vec<Value>,
        options: &CallOptions,
    ) -> Result<Response, Error> {
        let call = self.prepare(method, args, options)?;
        self.dispatch(&call)
    }

    /// Calls `getObject`, returning the object selected with [`CallOptions::id`].
    pub fn get_object(&self, options: &CallOptions) -> Result<Value, Error> {
        self.invoke("getObject", Vec::new(), options)
    }

    /// Iterates over all items of a collection-returning method, fetching one page per call.
    ///
    /// Pages are [`DEFAULT_PAGE_SIZE`] items unless `options` sets a limit, and start at the
    /// offset given in `options`. Iteration stops after a short page or once the server's total
    /// item count is reached. A method returning something other than an array yields that value
    /// once.
    pub fn iter(&self, method: &str, args: Vec<Value>, options: &CallOptions) -> Pages<'a, T> {
        let window = match (options.get_limit(), options.get_offset()) {
            (None, None) => PageWindow::new(DEFAULT_PAGE_SIZE, 0).map(Some),
            (limit, offset) => PageWindow::from_parts(limit, offset),
        };
        let (window, error) = match window {
            Ok(window) => (window, None),
            Err(err) => (None, Some(err)),
        };
        Pages {
            service: self.clone(),
            method: method.to_string(),
            args,
            options: options.clone(),
            window,
            buffer: VecDeque::new(),
            error,
        }
    }
}

#[cfg(feature = "async")]
impl<'a, T: AsyncTransport> Service<'a, T> {
    /// Asynchronous [`invoke`](Service::invoke).
    pub async fn invoke_async(
        &self,
        method: &str,
        args: Vec<Value>,
        options: &CallOptions,
    ) -> Result<Value, Error> {
        let call = self.prepare(method, args, options)?;
        debug!(service = call.service(), method = call.method(), "dispatching call");
        let start = Instant::now();
        let result = self.client.transport().send_async(&call).await;
        debug!(
            service = call.service(),
            method = call.method(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "call finished"
        );
        result.map(Response::into_value)
    }
}

/// A call being built by [`Service::method`].
#[derive(Debug)]
pub struct Call<'s, 'a, T> {
    service: &'s Service<'a, T>,
    method: String,
    args: Vec<Value>,
    options: CallOptions,
}

impl<'s, 'a, T> Call<'s, 'a, T> {
    /// Appends a positional argument.
    pub fn arg<V: Into<Value>>(mut self, value: V) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn id<V: Into<Value>>(mut self, id: V) -> Self {
        self.options = self.options.id(id);
        self
    }

    pub fn mask<M: Into<MaskArg>>(mut self, mask: M) -> Self {
        self.options = self.options.mask(mask);
        self
    }

    pub fn filter<F: Into<FilterArg>>(mut self, filter: F) -> Self {
        self.options = self.options.filter(filter);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.options = self.options.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.options = self.options.offset(offset);
        self
    }

    pub fn header<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.options = self.options.header(name, value);
        self
    }

    pub fn raw_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.options = self.options.raw_header(name, value);
        self
    }

    /// Replaces all options set so far.
    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn prepare(self) -> Result<CallDescriptor, Error> {
        self.service.prepare(&self.method, self.args, &self.options)
    }
}

impl<'s, 'a, T: Transport> Call<'s, 'a, T> {
    pub fn call(self) -> Result<Value, Error> {
        self.service.invoke(&self.method, self.args, &self.options)
    }

    pub fn send(self) -> Result<Response, Error> {
        self.service.invoke_response(&self.method, self.args, &self.options)
    }

    pub fn iter(self) -> Pages<'a, T> {
        self.service.iter(&self.method, self.args, &self.options)
    }
}

/// Iterator over the items of a paginated call. Created by [`Service::iter`].
///
/// Each page is a separate call, so an error can occur mid-way; it is yielded once and ends the
/// iteration.
pub struct Pages<'a, T> {
    service: Service<'a, T>,
    method: String,
    args: Vec<Value>,
    options: CallOptions,
    window: Option<PageWindow>,
    buffer: VecDeque<Value>,
    error: Option<Error>,
}

impl<'a, T: Transport> Pages<'a, T> {
    fn fetch(&mut self, window: PageWindow) -> Result<(), Error> {
        let options = self.options.clone().window(window);
        let response = self
            .service
            .invoke_response(&self.method, self.args.clone(), &options)?;
        let total_items = response.total_items();

        match response.into_value() {
            Value::Array(items) => {
                let limit = window.limit() as usize;
                let short = items.len() < limit;
                // More items than asked for means the method ignores `resultLimit`.
                let unpaginated = items.len() > limit;
                let complete = total_items.map_or(false, |total| window.end() >= total);
                self.window = if short || unpaginated || complete {
                    None
                } else {
                    window.next()
                };
                self.buffer.extend(items);
            }
            other => {
                self.window = None;
                self.buffer.push_back(other);
            }
        }
        Ok(())
    }
}

impl<'a, T: Transport> Iterator for Pages<'a, T> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(error) = self.error.take() {
                self.window = None;
                return Some(Err(error));
            }
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            let window = self.window.take()?;
            if let Err(error) = self.fetch(window) {
                self.error = Some(error);
            }
        }
    }
}
