use super::{EmailMessage, EmailTemplate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

const BLOOD_REQUEST_SUBJECT: &str = "Blood Request: {{bloodType}} Needed";

const BLOOD_REQUEST_TEXT: &str = "Hello {{donorName}},

A new blood request has been posted near {{location}} for blood type {{bloodType}}.
Patient Name: {{patientName}}

You can help save a life by accepting this request.

Accept Request: {{acceptLink}}

Thank you for being a donor!

Best regards,
{{fromName}}";

const BLOOD_REQUEST_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="background-color: #dc2626; color: white; padding: 20px; text-align: center;">Blood Request Alert</h1>
    <p>Hello <strong>{{donorName}}</strong>,</p>
    <p>A new blood request has been posted that matches your blood type!</p>
    <p><strong>Blood Type Needed:</strong> {{bloodType}}</p>
    <p><strong>Patient Name:</strong> {{patientName}}</p>
    <p><strong>Location:</strong> {{location}}</p>
    <p style="text-align: center;"><a href="{{acceptLink}}">Accept Request</a></p>
    <p style="font-size: 12px; color: #6b7280;">If the link doesn't work, copy and paste this: {{acceptLink}}</p>
    <p style="font-size: 12px; color: #6b7280;">Thank you for being a registered donor with {{fromName}}.</p>
  </div>
</body>
</html>
"#;

const OTP_SUBJECT: &str = "Verify Your Email - {{fromName}}";

const OTP_TEXT: &str = "Hello {{name}},

Your verification code is: {{otp}}

This code will expire in 10 minutes.

Best regards,
{{fromName}}";

const OTP_HTML: &str = r#"<div style="font-family: Arial, sans-serif; padding: 20px;">
  <h2>Verify Your Email</h2>
  <p>Hello <strong>{{name}}</strong>,</p>
  <p>Your verification code is:</p>
  <h1 style="color: #dc2626; letter-spacing: 5px;">{{otp}}</h1>
  <p>This code will expire in 10 minutes.</p>
</div>
"#;

/// Render a message's subject, text and HTML bodies.
///
/// `{{name}}` placeholders take the message's variable of that name. Unknown
/// placeholders render empty. `fromName` is always available. Values are
/// HTML-escaped in the HTML body only.
pub fn render(message: &EmailMessage, from_name: &str) -> RenderedEmail {
    let (subject, text, html) = match message.template {
        EmailTemplate::BloodRequest => {
            (BLOOD_REQUEST_SUBJECT, BLOOD_REQUEST_TEXT, BLOOD_REQUEST_HTML)
        }
        EmailTemplate::OtpVerification => (OTP_SUBJECT, OTP_TEXT, OTP_HTML),
    };
    let lookup = |key: &str| -> String {
        if key == "fromName" {
            return from_name.to_owned();
        }
        message.template_vars.get(key).cloned().unwrap_or_default()
    };
    RenderedEmail {
        subject: substitute(subject, &lookup),
        text: substitute(text, &lookup),
        html: substitute(html, &|key: &str| escape_html(&lookup(key))),
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn substitute(template: &str, lookup: &dyn Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                out.push_str(&lookup(after[..end].trim()));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
