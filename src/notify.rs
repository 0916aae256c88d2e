use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("sms gateway is not configured")]
    Disabled,
    #[error("gateway rejected the message: {0}")]
    Rejected(String),
    #[error("gateway answered http {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unreadable gateway response: {0}")]
    Decode(String),
}

/// One outbound SMS attempt; implementations never retry.
pub trait SmsGateway: Send + Sync {
    fn send(&self, receiver: &str, message: &str) -> Result<(), SmsError>;
}

#[derive(Debug, Clone)]
pub struct AligoCredentials {
    pub api_key: String,
    pub user_id: String,
    pub sender: String,
}

/// Aligo HTTP SMS API.
pub struct AligoGateway {
    agent: ureq::Agent,
    endpoint: String,
    credentials: AligoCredentials,
}

#[derive(Debug, Deserialize)]
struct AligoResponse {
    result_code: serde_json::Value,
    #[serde(default)]
    message: Option<String>,
}

impl AligoResponse {
    fn succeeded(&self) -> bool {
        match &self.result_code {
            serde_json::Value::String(code) => code.trim() == "1",
            serde_json::Value::Number(code) => code.as_i64() == Some(1),
            _ => false,
        }
    }
}

impl AligoGateway {
    pub const ENDPOINT: &'static str = "https://apis.aligo.in/send/";

    pub fn new(credentials: AligoCredentials, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        AligoGateway {
            agent,
            endpoint: Self::ENDPOINT.to_string(),
            credentials,
        }
    }
}

impl SmsGateway for AligoGateway {
    fn send(&self, receiver: &str, message: &str) -> Result<(), SmsError> {
        let response = self
            .agent
            .post(&self.endpoint)
            .send_form(&[
                ("key", self.credentials.api_key.as_str()),
                ("user_id", self.credentials.user_id.as_str()),
                ("sender", self.credentials.sender.as_str()),
                ("receiver", receiver),
                ("msg", message),
                ("msg_type", "SMS"),
            ])
            .map_err(|err| match err {
                ureq::Error::Status(status, _) => SmsError::Status(status),
                ureq::Error::Transport(transport) => SmsError::Transport(transport.to_string()),
            })?;

        let body: AligoResponse = response
            .into_json()
            .map_err(|err| SmsError::Decode(err.to_string()))?;
        if body.succeeded() {
            Ok(())
        } else {
            Err(SmsError::Rejected(
                body.message.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// Stand-in used when gateway credentials are missing.
pub struct DisabledGateway;

impl SmsGateway for DisabledGateway {
    fn send(&self, _receiver: &str, _message: &str) -> Result<(), SmsError> {
        Err(SmsError::Disabled)
    }
}

/// Best-effort SMS delivery: failures are logged and reported as `false`.
pub struct Notifier {
    gateway: Box<dyn SmsGateway>,
    brand: String,
}

impl Notifier {
    pub fn new(gateway: Box<dyn SmsGateway>, brand: impl Into<String>) -> Self {
        Notifier {
            gateway,
            brand: brand.into(),
        }
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn send(&self, receiver: &str, message: &str) -> bool {
        match self.gateway.send(receiver, message) {
            Ok(()) => {
                info!(receiver, "sms delivered");
                true
            }
            Err(SmsError::Disabled) => {
                warn!(receiver, "sms gateway not configured, skipping delivery");
                false
            }
            Err(err) => {
                warn!(receiver, error = %err, "sms delivery failed");
                false
            }
        }
    }

    pub fn submission_received(&self, receiver: &str, assignment: &str) -> bool {
        self.send(receiver, &format!("{} {assignment} 제출 완료!", self.brand))
    }

    pub fn submission_rejected(&self, receiver: &str, assignment: &str, reason: &str) -> bool {
        self.send(
            receiver,
            &format!("{} {assignment}이(가) 반려됨ㅠ ({reason})", self.brand),
        )
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::{SmsError, SmsGateway};

    /// Records every message; receivers listed in `failing` error out.
    #[derive(Clone, Default)]
    pub struct RecordingGateway {
        pub sent: Arc<Mutex<Vec<(String, String)>>>,
        pub failing: Vec<String>,
    }

    impl RecordingGateway {
        pub fn messages(&self) -> Vec<(String, String)> {
            self.sent.lock().expect("sent lock").clone()
        }
    }

    impl SmsGateway for RecordingGateway {
        fn send(&self, receiver: &str, message: &str) -> Result<(), SmsError> {
            if self.failing.iter().any(|r| r == receiver) {
                return Err(SmsError::Transport("connection refused".to_string()));
            }
            self.sent
                .lock()
                .expect("sent lock")
                .push((receiver.to_string(), message.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingGateway;
    use super::*;

    #[test]
    fn failures_are_swallowed() {
        let gateway = RecordingGateway {
            failing: vec!["010-0000".to_string()],
            ..RecordingGateway::default()
        };
        let notifier = Notifier::new(Box::new(gateway.clone()), "[수학]");
        assert!(!notifier.send("010-0000", "hi"));
        assert!(notifier.submission_received("010-1234", "HW1"));
        assert_eq!(
            gateway.messages(),
            vec![("010-1234".to_string(), "[수학] HW1 제출 완료!".to_string())]
        );
    }

    #[test]
    fn disabled_gateway_never_delivers() {
        let notifier = Notifier::new(Box::new(DisabledGateway), "[수학]");
        assert!(!notifier.submission_rejected("010-1234", "HW1", "사진 흐림"));
    }

    #[test]
    fn aligo_result_codes() {
        let ok: AligoResponse = serde_json::from_str(r#"{"result_code":"1","message":"success"}"#).unwrap();
        let numeric: AligoResponse = serde_json::from_str(r#"{"result_code":1}"#).unwrap();
        let failed: AligoResponse =
            serde_json::from_str(r#"{"result_code":"-101","message":"auth"}"#).unwrap();
        assert!(ok.succeeded());
        assert!(numeric.succeeded());
        assert!(!failed.succeeded());
    }
}
