//! Property tests for call construction.

use proptest::prelude::*;
use softlayer_api::{
    CallOptions, Client, DebugTransport, DecodedHeaders, Error, Fault, FaultCode, Filter,
    FixtureTransport, Mask, MaskArg, PageWindow, Predicate, Request, Value,
};

use std::collections::BTreeMap;

fn client() -> Client<DebugTransport<FixtureTransport>> {
    let fixtures = FixtureTransport::new()
        .respond("Account", "getObject", Value::empty_struct())
        .respond("Account", "getVirtualGuests", Value::Array(vec![]));
    Client::builder()
        .username("user")
        .api_key("key")
        .env(|_| None)
        .build_with(DebugTransport::new(fixtures))
}

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,7}"
}

fn mask_paths() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::collection::vec(ident(), 1..4).prop_map(|segments| segments.join(".")),
        1..6,
    )
}

fn object_id() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Int),
        (i64::from(i32::MAX) + 1..i64::MAX).prop_map(Value::Int64),
        "[a-z0-9-]{1,12}".prop_map(Value::from),
    ]
}

fn object_filter() -> impl Strategy<Value = Filter> {
    prop::collection::vec((ident(), ident(), "[a-z]{1,6}\\*?|[0-9]{1,5}"), 1..4).prop_map(
        |entries| {
            entries
                .into_iter()
                .fold(Filter::new(), |filter, (relation, property, query)| {
                    filter
                        .set(&format!("{}.{}", relation, property), Predicate::query(&query))
                        .unwrap()
                })
        },
    )
}

/// Builds the legacy nested struct form of a mask.
fn legacy_mask(paths: &[String]) -> Value {
    fn insert(map: &mut BTreeMap<String, Value>, segments: &[&str]) {
        let (first, rest) = match segments.split_first() {
            Some(split) => split,
            None => return,
        };
        let entry = map.entry(first.to_string()).or_insert(Value::Nil);
        if rest.is_empty() {
            return;
        }
        if entry.is_nil() {
            *entry = Value::empty_struct();
        }
        if let Value::Struct(ref mut children) = *entry {
            insert(children, rest);
        }
    }

    let mut root = BTreeMap::new();
    for path in paths {
        let segments: Vec<&str> = path.split('.').collect();
        insert(&mut root, &segments);
    }
    Value::Struct(root)
}

proptest! {
    #[test]
    fn options_survive_the_wire(
        id in object_id(),
        paths in mask_paths(),
        filter in object_filter(),
        limit in 1u32..1000,
        offset in 0u32..100_000,
    ) {
        let client = client();
        let options = CallOptions::new()
            .id(id.clone())
            .mask(paths.join(","))
            .filter(filter.clone())
            .limit(limit)
            .offset(offset);
        let call = client.service("Account").prepare("getVirtualGuests", vec![], &options).unwrap();

        let xml = Request::from_call(&call).to_xml().unwrap();
        let request = Request::parse(&xml[..]).unwrap();
        let decoded = DecodedHeaders::decode(call.service(), request.headers().unwrap()).unwrap();

        prop_assert_eq!(decoded.id, Some(id));
        prop_assert_eq!(decoded.mask.as_ref(), call.mask());
        prop_assert_eq!(decoded.filter, Some(filter));
        prop_assert_eq!(decoded.window, Some(PageWindow::new(limit, offset).unwrap()));
        prop_assert_eq!(decoded.credentials.as_ref(), Some(call.credentials()));
    }

    #[test]
    fn headers_do_not_leak_into_later_calls(
        headers in prop::collection::btree_map("X-[A-Za-z]{1,8}", "[a-z]{0,8}", 1..5),
    ) {
        let client = client();
        let account = client.service("Account");

        let mut first = CallOptions::new();
        for (name, value) in &headers {
            first = first.header(name.as_str(), value.as_str()).raw_header(name.as_str(), value.as_str());
        }
        account.get_object(&first).unwrap();
        account.get_object(&CallOptions::new()).unwrap();

        let calls = client.transport().calls();
        prop_assert_eq!(calls.len(), 2);
        prop_assert_eq!(calls[0].call.headers().len(), headers.len());
        prop_assert!(calls[1].call.headers().is_empty());
        prop_assert!(calls[1].call.raw_headers().is_empty());
        let wire = calls[1].call.wire_headers();
        for name in headers.keys() {
            prop_assert!(!wire.contains_key(name));
        }
    }

    #[test]
    fn consecutive_pages_are_contiguous(limit in 1u32..10_000, page in 0u32..1000) {
        let client = client();
        let account = client.service("Account");
        let offset = limit * page;

        let first = account
            .prepare("getVirtualGuests", vec![], &CallOptions::new().limit(limit).offset(offset))
            .unwrap()
            .window()
            .unwrap();
        let second = account
            .prepare("getVirtualGuests", vec![], &CallOptions::new().limit(limit).offset(offset + limit))
            .unwrap()
            .window()
            .unwrap();

        prop_assert_eq!(first.end(), u64::from(second.offset()));
        prop_assert_eq!(first.next(), Some(second));
    }

    #[test]
    fn mask_forms_agree(paths in mask_paths()) {
        let text = MaskArg::from(paths.join(",")).normalize().unwrap();
        let legacy = MaskArg::from(legacy_mask(&paths)).normalize().unwrap();
        let built = paths
            .iter()
            .fold(Mask::new(), |mask, path| mask.field(path).unwrap());

        prop_assert_eq!(text.to_header(), legacy.to_header());
        prop_assert_eq!(text.to_header(), built.to_header());
        prop_assert_eq!(Mask::parse(&text.to_string()).unwrap(), text);
    }

    #[test]
    fn credential_changes_apply_to_the_next_call(
        before in "[a-zA-Z0-9]{1,16}",
        after in "[a-zA-Z0-9]{1,16}",
    ) {
        let client = client();
        client.set_api_key(before.as_str());
        client.service("Account").get_object(&CallOptions::new()).unwrap();
        client.set_api_key(after.as_str());
        client.service("Account").get_object(&CallOptions::new()).unwrap();

        let calls = client.transport().calls();
        prop_assert_eq!(calls[0].call.credentials().api_key(), before.as_str());
        prop_assert_eq!(calls[1].call.credentials().api_key(), after.as_str());
    }

    #[test]
    fn fixture_faults_are_remote_faults(code in any::<i32>(), message in "[ -=?-~]{0,40}") {
        let fault = Fault::new(code, message.as_str());
        let client = Client::builder()
            .username("user")
            .api_key("key")
            .build_with(FixtureTransport::new().fault("Account", "getObject", fault.clone()));

        match client.service("Account").get_object(&CallOptions::new()) {
            Err(Error::Fault(received)) => prop_assert_eq!(received, fault),
            other => prop_assert!(false, "expected a fault, got {:?}", other),
        }
    }
}

#[cfg(any(feature = "http", feature = "async"))]
mod wire {
    use super::*;
    use softlayer_api::http::decode_response;

    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

    fn fault_code() -> impl Strategy<Value = FaultCode> {
        prop_oneof![
            any::<i32>().prop_map(FaultCode::Int),
            "SoftLayer_Exception_[A-Za-z_]{1,20}".prop_map(FaultCode::Name),
        ]
    }

    proptest! {
        #[test]
        fn fault_payloads_are_remote_faults(
            code in fault_code(),
            message in "[ -=?-~]{0,40}",
            status in prop::sample::select(vec![200u16, 400, 404, 500, 503]),
        ) {
            let fault = Fault::new(code, message.as_str());
            let mut body = br#"<?xml version="1.0"?><methodResponse><fault>"#.to_vec();
            fault.to_value().write_as_xml(&mut body).unwrap();
            body.extend_from_slice(b"</fault></methodResponse>");
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));

            match decode_response(status, &headers, &body) {
                Err(Error::Fault(received)) => prop_assert_eq!(received, fault),
                other => prop_assert!(false, "expected a fault, got {:?}", other),
            }
        }
    }
}
