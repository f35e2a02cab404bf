#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::settings::{DispatcherSettings, OperatorSettings};

#[derive(Debug, Serialize)]
struct OperatorRequest<'a> {
    phone_number: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct OperatorResponse {
    status: String,
    message_id: Option<String>,
    error: Option<String>,
}

/// Terminal outcome of a dispatch attempt across all configured operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        provider_message_id: Option<String>,
    },
    Failed {
        error: String,
    },
}

/// One operator's verdict after its retry budget is spent.
enum OperatorOutcome {
    Sent(Option<String>),
    Failed(String),
}

/// A single HTTP exchange with an operator. A 200 with a non-"sent" body is
/// an operator-level reject and must not be retried against that operator;
/// transport failures and non-200 responses are retryable.
enum OperatorReply {
    Sent(Option<String>),
    Rejected(String),
}

pub struct OperatorClient {
    client: reqwest::Client,
    operators: Vec<OperatorSettings>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl OperatorClient {
    pub fn new(settings: DispatcherSettings) -> Self {
        let mut operators = settings.operators;
        operators.sort_by_key(|operator| operator.priority);
        Self {
            client: reqwest::Client::new(),
            operators,
            max_attempts: settings.max_attempts,
            backoff_base: settings.backoff_base,
        }
    }

    /// Tries operators in ascending priority order, spending the per-operator
    /// retry budget on each before failing over to the next.
    pub async fn send(&self, phone_number: &str, message: &str) -> DispatchOutcome {
        for operator in &self.operators {
            tracing::info!(
                operator = %operator.name,
                priority = operator.priority,
                "trying operator"
            );
            match self.send_with_backoff(operator, phone_number, message).await {
                OperatorOutcome::Sent(provider_message_id) => {
                    tracing::info!(
                        operator = %operator.name,
                        provider_message_id = ?provider_message_id,
                        "operator accepted the message"
                    );
                    return DispatchOutcome::Sent {
                        provider_message_id,
                    };
                }
                OperatorOutcome::Failed(error) => {
                    tracing::warn!(
                        operator = %operator.name,
                        error = %error,
                        "operator failed, trying next operator"
                    );
                }
            }
        }
        DispatchOutcome::Failed {
            error: "All operators failed after retries".to_string(),
        }
    }

    async fn send_with_backoff(
        &self,
        operator: &OperatorSettings,
        phone_number: &str,
        message: &str,
    ) -> OperatorOutcome {
        for attempt in 0..self.max_attempts {
            match self.attempt(operator, phone_number, message).await {
                Ok(OperatorReply::Sent(provider_message_id)) => {
                    return OperatorOutcome::Sent(provider_message_id)
                }
                Ok(OperatorReply::Rejected(error)) => return OperatorOutcome::Failed(error),
                Err(error) => {
                    tracing::warn!(
                        operator = %operator.name,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "transport failure"
                    );
                    if attempt + 1 < self.max_attempts {
                        sleep(self.backoff_base * 2u32.pow(attempt)).await;
                    }
                }
            }
        }
        OperatorOutcome::Failed(format!(
            "transport failed after {} attempts",
            self.max_attempts
        ))
    }

    async fn attempt(
        &self,
        operator: &OperatorSettings,
        phone_number: &str,
        message: &str,
    ) -> Result<OperatorReply, String> {
        let response = self
            .client
            .post(operator.url.as_str())
            .timeout(operator.timeout)
            .json(&OperatorRequest {
                phone_number,
                message,
            })
            .send()
            .await
            .map_err(|err| err.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let body: OperatorResponse = response
            .json()
            .await
            .map_err(|err| format!("invalid operator response: {err}"))?;
        if body.status == "sent" {
            Ok(OperatorReply::Sent(body.message_id))
        } else {
            Ok(OperatorReply::Rejected(
                body.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}
