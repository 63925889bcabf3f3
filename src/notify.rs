use anyhow::Result;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::env;
use tracing::{debug, warn};

/// SMTP notification port. State transitions are mailed at most once and
/// a delivery failure never rolls back the committed transition.
#[derive(Clone)]
pub struct Mailer {
    mailer: SmtpTransport,
    from_address: String,
    from_name: String,
    enabled: bool,
}

impl Mailer {
    /// Builds the transport from SMTP_* env vars. Without SMTP_HOST the
    /// mailer is disabled and every send becomes a logged no-op.
    pub fn from_env() -> Result<Self> {
        let smtp_host = env::var("SMTP_HOST").ok();
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .unwrap_or(587);
        let smtp_username = env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_address =
            env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| "noreply@leavedesk.local".to_string());

        let enabled = smtp_host.is_some();
        let host = smtp_host.unwrap_or_else(|| "localhost".to_string());

        let mailer = if smtp_username.is_empty() {
            SmtpTransport::builder_dangerous(&host).port(smtp_port).build()
        } else {
            let creds = Credentials::new(smtp_username, smtp_password);
            SmtpTransport::relay(&host)?
                .port(smtp_port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            mailer,
            from_address,
            from_name: "Leave Management".to_string(),
            enabled,
        })
    }

    /// New request submitted: informs the admin account.
    pub fn send_request_submitted(
        &self,
        to_email: &str,
        employee: &str,
        leave_type: &str,
    ) -> Result<()> {
        let body = format!(
            r#"A new {leave_type} request was submitted by {employee}.

Log into the system to review it.

---
Leave Management
"#
        );

        self.send(
            to_email,
            &format!("New {leave_type} request - {employee}"),
            body,
        )
    }

    /// Decision taken: informs the owner, including the admin's notes.
    pub fn send_request_decided(
        &self,
        to_email: &str,
        employee: &str,
        leave_type: &str,
        approved: bool,
        notes: Option<&str>,
    ) -> Result<()> {
        let outcome = if approved { "approved" } else { "rejected" };
        let mut body = format!(
            r#"Hello {employee},

Your {leave_type} request has been {outcome}.
"#
        );
        if let Some(notes) = notes {
            if !notes.is_empty() {
                body.push_str(&format!("\nAdministrator notes:\n{notes}\n"));
            }
        }
        body.push_str("\n---\nLeave Management\n");

        self.send(to_email, &format!("Request {leave_type} {outcome}"), body)
    }

    /// Account created: mails the initial credentials to the new employee.
    pub fn send_employee_credentials(
        &self,
        to_email: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let body = format!(
            r#"Hello {username},

An account has been created for you in the leave management system.

Your credentials:
Username: {username}
Password: {password}

---
Leave Management
"#
        );

        self.send(to_email, "Your leave management account", body)
    }

    fn send(&self, to_email: &str, subject: &str, body: String) -> Result<()> {
        if !self.enabled {
            debug!(to = to_email, subject, "SMTP not configured, skipping mail");
            return Ok(());
        }

        let email = Message::builder()
            .from(format!("{} <{}>", self.from_name, self.from_address).parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(&email)?;
        Ok(())
    }
}

/// Fire-and-forget delivery on a blocking worker; failures are logged only.
pub fn spawn_mail<F>(task: F)
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    actix_web::rt::task::spawn_blocking(move || {
        if let Err(e) = task() {
            warn!(error = %e, "notification mail failed");
        }
    });
}
