//! Demonstrates a chat turn: the lease cache fetches one short-lived credential, the executor
//! spends it on each question, and a slow reply falls back to the timeout message.

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
use url::Url;
// self
use lease_broker::{
	cache::LeaseCache,
	config::{Endpoints, ExecutorConfig, LeaseCacheConfig},
	executor::{BoundedExecutor, BoundedRequest},
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let lease_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/lease");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"demo-lease\",\"ttl\":600}");
		})
		.await;
	let _quick = server
		.mock_async(|when, then| {
			when.method(GET).path("/").query_param("text", "hello");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"response\":\"Hi! How can I help?\"}");
		})
		.await;
	let _slow = server
		.mock_async(|when, then| {
			when.method(GET).path("/").query_param("text", "write me a novel");
			then.status(200)
				.delay(StdDuration::from_secs(3))
				.header("content-type", "application/json")
				.body("{\"response\":\"Once upon a time...\"}");
		})
		.await;
	let endpoints = Endpoints::from_base(&Url::parse(&server.url("/"))?)?;
	let store = Arc::new(MemoryStore::default());
	let cache = LeaseCache::with_reqwest(&endpoints, LeaseCacheConfig::default())?
		.store(store.clone())
		.build()?;
	let executor = BoundedExecutor::with_reqwest(cache, &endpoints, ExecutorConfig::default())?;

	for request in [
		BoundedRequest::new("hello"),
		BoundedRequest::new("write me a novel").with_timeout(Duration::seconds(1)),
	] {
		let text = request.request.text.clone();
		let outcome = executor.run(request).await;

		println!("user: {text}");
		println!("bot:  {}", outcome.display_text());
	}

	lease_mock.assert_calls_async(1).await;

	println!("lease fetches: {}", executor.cache().metrics().fetches());
	println!("persisted lease present: {}", store.peek().is_some());

	Ok(())
}
