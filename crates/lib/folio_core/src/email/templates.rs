//! Account email content.

use url::Url;

use super::{EmailError, EmailMessage};

/// `<base>/<path>?token=<token>`, with the token query-encoded.
pub fn token_link(base_url: &str, path: &str, token: &str) -> Result<String, EmailError> {
    let mut url = Url::parse(base_url)?.join(path)?;
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url.into())
}

pub fn reset_password_link(base_url: &str, token: &str) -> Result<String, EmailError> {
    token_link(base_url, "reset-password", token)
}

pub fn verify_email_link(base_url: &str, token: &str) -> Result<String, EmailError> {
    token_link(base_url, "verify-email", token)
}

pub fn password_reset_email(
    to: &str,
    username: &str,
    link: &str,
    ttl_minutes: i64,
) -> EmailMessage {
    let name = escape_html(username);
    let href = escape_html(link);
    EmailMessage {
        to: to.to_string(),
        subject: "Reset your Folio password".to_string(),
        html: format!(
            "<p>Hi {name},</p>\
             <p>We received a request to reset your password. \
             <a href=\"{href}\">Choose a new password</a>.</p>\
             <p>This link expires in {ttl_minutes} minutes and can be used once. \
             If you did not ask for this, you can ignore this email.</p>"
        ),
        text: format!(
            "Hi {username},\n\n\
             We received a request to reset your password. Open this link to choose a new one:\n\
             {link}\n\n\
             This link expires in {ttl_minutes} minutes and can be used once. \
             If you did not ask for this, you can ignore this email.\n"
        ),
    }
}

pub fn verification_email(to: &str, username: &str, link: &str) -> EmailMessage {
    let name = escape_html(username);
    let href = escape_html(link);
    EmailMessage {
        to: to.to_string(),
        subject: "Confirm your Folio email address".to_string(),
        html: format!(
            "<p>Welcome {name},</p>\
             <p><a href=\"{href}\">Confirm your email address</a> to finish setting up \
             your account.</p>"
        ),
        text: format!(
            "Welcome {username},\n\n\
             Confirm your email address to finish setting up your account:\n\
             {link}\n"
        ),
    }
}

pub fn password_changed_email(to: &str, username: &str) -> EmailMessage {
    let name = escape_html(username);
    EmailMessage {
        to: to.to_string(),
        subject: "Your Folio password was changed".to_string(),
        html: format!(
            "<p>Hi {name},</p>\
             <p>The password for your account was just changed. If this was not you, \
             reset your password immediately and contact support.</p>"
        ),
        text: format!(
            "Hi {username},\n\n\
             The password for your account was just changed. If this was not you, \
             reset your password immediately and contact support.\n"
        ),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_has_expected_shape() {
        let link = reset_password_link("https://folio.example", "abc123").unwrap();
        assert_eq!(link, "https://folio.example/reset-password?token=abc123");
    }

    #[test]
    fn link_keeps_base_path() {
        let link = verify_email_link("https://folio.example/app/", "t").unwrap();
        assert_eq!(link, "https://folio.example/app/verify-email?token=t");
    }

    #[test]
    fn bad_base_url_is_an_error() {
        assert!(reset_password_link("not a url", "t").is_err());
    }

    #[test]
    fn reset_email_contains_link_in_both_bodies() {
        let link = "https://folio.example/reset-password?token=abc&x=1";
        let msg = password_reset_email("a@b.com", "alice", link, 60);
        assert_eq!(msg.to, "a@b.com");
        assert!(msg.text.contains(link));
        assert!(msg.html.contains("token=abc&amp;x=1"));
        assert!(msg.text.contains("60 minutes"));
    }

    #[test]
    fn html_bodies_escape_user_input() {
        let msg = password_changed_email("a@b.com", "<script>");
        assert!(msg.html.contains("&lt;script&gt;"));
        assert!(!msg.html.contains("<script>"));
    }

    #[test]
    fn verification_email_mentions_link() {
        let msg = verification_email("a@b.com", "alice", "https://x/verify-email?token=t");
        assert!(msg.subject.contains("Confirm"));
        assert!(msg.text.contains("https://x/verify-email?token=t"));
    }
}
