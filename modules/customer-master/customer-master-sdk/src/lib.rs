//! Customer Master SDK
//!
//! Public API of the customer-master adapter:
//!
//! - [`CustomerMasterClientV1`] - client trait for consumers
//! - [`CustomerMasterRequest`], [`HttpMethod`], [`HealthReport`] - models
//! - [`CustomerMasterError`] - error type
//!
//! ## Usage
//!
//! ```ignore
//! use customer_master_sdk::CustomerMasterClientV1;
//!
//! let product = client.get_json("product", Some("US"), "/products/42").await?;
//!
//! let health = client.check_all_health(Some("US")).await;
//! assert_eq!(health.get("profile"), Some(&true));
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::CustomerMasterClientV1;
pub use error::CustomerMasterError;
pub use models::{CustomerMasterRequest, HealthReport, HttpMethod};
