use reqwest::Client;
use serde::Serialize;

/// One transactional email handed to the mail relay.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_base64: String,
}

/// Fire-and-forget notification capability. A send failure never
/// reaches the caller; the booking it describes has already been
/// committed (or deferred) by the time this runs.
#[cfg_attr(test, mockall::automock)]
pub trait Notify: Send + Sync {
    fn notify(&self, email: OutboundEmail);
}

/// Production notifier: posts the email as JSON to the mail relay
/// webhook, which owns rendering/attachment delivery.
pub struct MailRelayNotifier {
    client: Client,
    relay_url: String,
    from: String,
}

impl MailRelayNotifier {
    pub fn new(client: Client, relay_url: String, from: String) -> Self {
        Self {
            client,
            relay_url,
            from,
        }
    }
}

#[derive(Serialize)]
struct RelayPayload {
    from: String,
    #[serde(flatten)]
    email: OutboundEmail,
}

impl Notify for MailRelayNotifier {
    fn notify(&self, email: OutboundEmail) {
        let client = self.client.clone();
        let url = self.relay_url.clone();
        let payload = RelayPayload {
            from: self.from.clone(),
            email,
        };
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    tracing::warn!(
                        status = %resp.status(),
                        subject = %payload.email.subject,
                        "mail relay rejected notification"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        subject = %payload.email.subject,
                        "failed to reach mail relay"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_is_callable_through_a_trait_object() {
        let mut mock = MockNotify::new();
        mock.expect_notify()
            .withf(|email| email.to == "pat@example.com" && email.bcc.len() == 1)
            .times(1)
            .return_const(());

        let notifier: Box<dyn Notify> = Box::new(mock);
        notifier.notify(OutboundEmail {
            to: "pat@example.com".into(),
            bcc: vec!["office@example.com".into()],
            subject: "subject".into(),
            html: "<p>body</p>".into(),
            attachments: vec![],
        });
    }
}
