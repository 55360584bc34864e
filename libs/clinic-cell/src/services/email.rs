use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use shared_config::AppConfig;

use crate::models::EmailError;

const FROM_ADDRESS: &str = "Clinic CRM <onboarding@resend.dev>";

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_invite(&self, to: &str, clinic_name: &str, invite_url: &str) -> Result<(), EmailError>;
}

/// Transactional mail through the Resend HTTP API.
pub struct ResendEmailSender {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ResendEmailSender {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.resend_api_key.clone(),
            base_url: config.resend_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    #[instrument(skip(self, invite_url))]
    async fn send_invite(&self, to: &str, clinic_name: &str, invite_url: &str) -> Result<(), EmailError> {
        if self.api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let body = json!({
            "from": FROM_ADDRESS,
            "to": [to],
            "subject": format!("Invitation to join {}", clinic_name),
            "html": invite_html(clinic_name, invite_url),
        });

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmailError::Rejected(status.as_u16()));
        }

        debug!("Invitation e-mail accepted by Resend");
        Ok(())
    }
}

fn invite_html(clinic_name: &str, invite_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>You have been invited</h2>
    <p>You were invited to manage <strong>{clinic}</strong> as its owner.</p>
    <p><a href="{url}" style="display: inline-block; background: #667eea; color: #fff; padding: 12px 24px; text-decoration: none; border-radius: 5px;">Accept invitation</a></p>
    <p>Or paste this link into your browser:</p>
    <p style="word-break: break-all; background: #eee; padding: 10px;">{url}</p>
    <p>The invitation is valid for 7 days.</p>
  </div>
</body>
</html>"#,
        clinic = clinic_name,
        url = invite_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sender(base_url: &str, api_key: &str) -> ResendEmailSender {
        let mut config = AppConfig::from_lookup(|_| None);
        config.resend_base_url = base_url.to_string();
        config.resend_api_key = api_key.to_string();
        ResendEmailSender::new(&config)
    }

    #[tokio::test]
    async fn posts_to_resend_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email-1"})))
            .expect(1)
            .mount(&server)
            .await;

        sender(&server.uri(), "re_test")
            .send_invite("boss@clinic.test", "Smile Dental", "http://app/invite/accept?token=t")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let result = sender("http://127.0.0.1:9", "")
            .send_invite("boss@clinic.test", "Smile Dental", "http://app")
            .await;
        assert_matches!(result, Err(EmailError::NotConfigured));
    }

    #[tokio::test]
    async fn api_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let result = sender(&server.uri(), "re_test")
            .send_invite("boss@clinic.test", "Smile Dental", "http://app")
            .await;
        assert_matches!(result, Err(EmailError::Rejected(422)));
    }
}
