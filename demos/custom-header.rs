//! This example shows how to send a call with a custom HTTP header through a custom transport.

use softlayer_api::http::HttpTransport;
use softlayer_api::{CallDescriptor, CallOptions, Client, Error, Response, Transport};

/// Custom transport that logs every call before handing it to HTTP.
struct LoggingTransport(HttpTransport);

impl Transport for LoggingTransport {
    fn send(&self, call: &CallDescriptor) -> Result<Response, Error> {
        println!("-> {}::{} {:?}", call.service(), call.method(), call.raw_headers());
        let response = self.0.send(call);
        println!("<- {:?}", response.as_ref().map(Response::total_items));
        response
    }
}

fn main() -> Result<(), Error> {
    let client = Client::builder().build_with(LoggingTransport(HttpTransport::new()?));

    // Our custom header is only sent with this one call
    let result = client
        .service("Account")
        .method("getObject")
        .mask("id")
        .raw_header("Cookie", "SESSION=123abc")
        .call();

    println!("Result: {:?}", result);
    Ok(())
}
