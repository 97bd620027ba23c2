//! In-process implementation of the customer master client API.

use std::sync::Arc;

use async_trait::async_trait;
use customer_master_sdk::{
    CustomerMasterClientV1, CustomerMasterError, CustomerMasterRequest, HealthReport,
};
use serde_json::Value;

use super::{DomainError, Service};

pub struct CustomerMasterLocalClient {
    svc: Arc<Service>,
}

impl CustomerMasterLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(operation: &str, e: DomainError) -> CustomerMasterError {
    if e.is_retryable() {
        tracing::warn!(operation, error = %e, "customer master call failed");
    } else {
        tracing::error!(operation, error = %e, "customer master call failed");
    }
    e.into()
}

#[async_trait]
impl CustomerMasterClientV1 for CustomerMasterLocalClient {
    async fn execute(&self, request: CustomerMasterRequest) -> Result<Value, CustomerMasterError> {
        self.svc
            .execute(&request)
            .await
            .map_err(|e| log_and_convert("execute", e))
    }

    async fn is_subsystem_healthy(&self, subsystem: &str, country: Option<&str>) -> bool {
        self.svc.is_subsystem_healthy(subsystem, country).await
    }

    async fn check_all_health(&self, country: Option<&str>) -> HealthReport {
        self.svc.check_all_health(country).await
    }

    fn clear_token_cache(&self) {
        self.svc.clear_token_cache();
    }

    fn clear_token_cache_for(
        &self,
        subsystem: &str,
        country: Option<&str>,
    ) -> Result<(), CustomerMasterError> {
        self.svc
            .clear_token_cache_for(subsystem, country)
            .map_err(|e| log_and_convert("clear_token_cache_for", e))
    }
}
