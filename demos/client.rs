//! Lists the virtual guests of an account.
//!
//! Set `SL_USERNAME` and `SL_API_KEY`, then run `cargo run --example client`.

use softlayer_api::{CallOptions, Client, Filter, Predicate};

fn main() -> Result<(), softlayer_api::Error> {
    tracing_subscriber::fmt::init();

    let client = Client::builder().build()?;

    let account = client
        .service("Account")
        .get_object(&CallOptions::new().mask("id,companyName"))?;
    println!("Account: {:?}", account.get("companyName"));

    let filter = Filter::new().set("virtualGuests.hostname", Predicate::query("web*"))?;
    let guests = client.service("Account").iter(
        "getVirtualGuests",
        vec![],
        &CallOptions::new()
            .mask("id,hostname,datacenter.name")
            .filter(filter),
    );
    for guest in guests {
        let guest = guest?;
        println!(
            "{:>10} {}",
            guest.get("id").and_then(|id| id.as_i64()).unwrap_or_default(),
            guest.get("hostname").and_then(|name| name.as_str()).unwrap_or("?")
        );
    }

    Ok(())
}
