//! Single-flight bearer-token lease cache paired with a deadline-bounded request executor.
//!
//! [`cache::LeaseCache`] hands out short-lived credentials, refreshing them exactly once under
//! concurrent demand. [`executor::BoundedExecutor`] spends those credentials on downstream calls
//! that always settle by their deadline with exactly one outcome.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod lease;
pub mod obs;
pub mod store;


mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
