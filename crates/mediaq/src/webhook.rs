use crate::job::JobStatus;
use serde::Serialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("mediaq-webhook/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON envelope POSTed to the caller-supplied callback URL.
#[derive(Debug, Clone, Serialize)]
pub struct JobNotification {
    pub job_id: String,
    pub status: JobStatus,
    /// Unix seconds at the time the notification was built.
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobNotification {
    pub fn new(
        job_id: impl Into<String>,
        status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            result,
            error,
        }
    }
}

/// Best-effort delivery of job completion/failure events.
///
/// Delivery never raises: a webhook that cannot be delivered within the
/// retry budget is logged and dropped, and never rolls back the job's
/// terminal state.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    max_retries: u32,
    backoff_base: Duration,
}

impl WebhookNotifier {
    pub fn new(max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_retries,
            backoff_base: Duration::from_secs(1),
        }
    }

    /// Shrink the backoff unit. The wait before attempt `n+1` is
    /// `backoff_base * 2^n`; the default base of one second gives the
    /// 2/4/8... second schedule. Tests use a smaller base.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// POST the notification, retrying with exponential backoff.
    ///
    /// Returns `true` once any attempt gets a 2xx response, `false` after
    /// `max_retries` attempts have failed (non-2xx or transport error).
    pub async fn notify(
        &self,
        job_id: &str,
        url: &str,
        status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> bool {
        let notification = JobNotification::new(job_id, status, result, error);

        let mut attempt = 0u32;
        while attempt < self.max_retries {
            match self.client.post(url).json(&notification).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(job_id, url, "Webhook delivered");
                    return true;
                }
                Ok(response) => {
                    tracing::warn!(
                        job_id,
                        url,
                        status = %response.status(),
                        "Webhook attempt rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(job_id, url, error = %e, "Webhook attempt failed");
                }
            }

            attempt += 1;
            if attempt < self.max_retries {
                tokio::time::sleep(backoff_delay(self.backoff_base, attempt)).await;
            }
        }

        tracing::error!(
            job_id,
            url,
            attempts = self.max_retries,
            "Webhook delivery gave up"
        );
        false
    }
}

/// Wait before attempt `attempt + 1`: doubles each time, capped at 2^16
/// units to keep the arithmetic safe for absurd retry budgets.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.min(16))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn notification_omits_absent_fields() {
        let n = JobNotification::new("j1", JobStatus::Completed, Some(serde_json::json!("u")), None);
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["job_id"], "j1");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"], "u");
        assert!(json.get("error").is_none());
        assert!(json["timestamp"].as_f64().unwrap() > 0.0);
    }

    proptest! {
        /// The backoff schedule doubles every step and never decreases.
        #[test]
        fn prop_backoff_doubles(attempt in 1u32..16) {
            let base = Duration::from_secs(1);
            prop_assert_eq!(
                backoff_delay(base, attempt),
                backoff_delay(base, attempt - 1) * 2
            );
        }
    }
}
