//! AWS SNS `Publish` over the query API, signed with Signature Version 4.

use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::info;

use super::Notifier;
use crate::constants::sns;
use crate::error::NotifyError;
use crate::events::NotificationEvent;

type HmacSha256 = Hmac<Sha256>;

const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn from_env() -> Result<Self, NotifyError> {
        let access_key_id = env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| NotifyError::NotConfigured("AWS_ACCESS_KEY_ID not set".to_string()))?;
        let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| NotifyError::NotConfigured("AWS_SECRET_ACCESS_KEY not set".to_string()))?;
        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: env::var("AWS_SESSION_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }
}

#[derive(Clone)]
pub struct SnsNotifier {
    client: Client,
    topic_arn: String,
    region: String,
    host: String,
    credentials: AwsCredentials,
}

impl SnsNotifier {
    pub fn new(topic_arn: &str, region: &str, credentials: AwsCredentials) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(sns::REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            topic_arn: topic_arn.to_string(),
            region: region.to_string(),
            host: format!("sns.{}.amazonaws.com", region),
            credentials,
        })
    }

    /// Region comes from the config, then the topic ARN, then `AWS_REGION`.
    pub fn from_env(topic_arn: &str, region: Option<&str>) -> Result<Self, NotifyError> {
        let region = region
            .map(|r| r.to_string())
            .or_else(|| region_from_arn(topic_arn).map(|r| r.to_string()))
            .or_else(|| env::var("AWS_REGION").ok())
            .or_else(|| env::var("AWS_DEFAULT_REGION").ok())
            .ok_or_else(|| NotifyError::NotConfigured("no AWS region for SNS".to_string()))?;

        Self::new(topic_arn, &region, AwsCredentials::from_env()?)
    }

    pub fn form_body(&self, event: &NotificationEvent) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "Publish")
            .append_pair("Message", &event.render_body())
            .append_pair("Subject", &sanitize_subject(&event.subject))
            .append_pair("TopicArn", &self.topic_arn)
            .append_pair("Version", sns::API_VERSION)
            .finish()
    }

    /// Headers for a signed POST of `body` at time `now`.
    pub fn signed_headers(&self, body: &str, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let mut headers: Vec<(&'static str, String)> = vec![
            ("content-type", CONTENT_TYPE.to_string()),
            ("host", self.host.clone()),
            ("x-amz-date", now.format(AMZ_DATE_FORMAT).to_string()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }

        let request = CanonicalRequest {
            method: "POST",
            path: "/",
            query: "",
            headers: &headers,
            payload: body.as_bytes(),
        };
        let auth = authorization(&self.credentials, &self.region, sns::SERVICE, &request, now);
        headers.push(("authorization", auth));
        headers
    }
}

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A request as Signature Version 4 sees it. `headers` must already be
/// lowercase and sorted by name; `query` must already be canonical.
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: &'a [(&'a str, String)],
    pub payload: &'a [u8],
}

impl CanonicalRequest<'_> {
    pub fn signed_header_names(&self) -> String {
        self.headers.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(";")
    }

    pub fn render(&self) -> String {
        let canonical_headers: String = self
            .headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.path,
            self.query,
            canonical_headers,
            self.signed_header_names(),
            sha256_hex(self.payload)
        )
    }
}

/// `kSigning` from the secret, date, region and service chain.
pub fn signing_key(secret_access_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_access_key).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// The `Authorization` header value for `request` signed at `now`.
pub fn authorization(
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    request: &CanonicalRequest<'_>,
    now: DateTime<Utc>,
) -> String {
    let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let scope = format!("{}/{}/{}/aws4_request", date_stamp, region, service);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        scope,
        sha256_hex(request.render().as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date_stamp, region, service);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        credentials.access_key_id,
        scope,
        request.signed_header_names(),
        signature
    )
}

#[async_trait]
impl Notifier for SnsNotifier {
    fn name(&self) -> &'static str {
        "sns"
    }

    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let body = self.form_body(event);
        let mut req = self.client.post(format!("https://{}/", self.host));
        for (name, value) in self.signed_headers(&body, Utc::now()) {
            // reqwest derives Host from the URL
            if name != "host" {
                req = req.header(name, value);
            }
        }

        let resp = req.body(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Http { status: status.as_u16(), body: text });
        }

        info!("📣 [NOTIFY] Published to SNS: {}", event.subject);
        Ok(())
    }
}

/// `arn:aws:sns:<region>:<account>:<topic>`
pub fn region_from_arn(arn: &str) -> Option<&str> {
    let parts: Vec<&str> = arn.split(':').collect();
    match parts.as_slice() {
        ["arn", _, "sns", region, _, _] if !region.is_empty() => Some(*region),
        _ => None,
    }
}

/// SNS subjects are a single line of at most 100 characters.
pub fn sanitize_subject(subject: &str) -> String {
    subject
        .chars()
        .filter(|c| !c.is_control())
        .take(sns::MAX_SUBJECT_LEN)
        .collect()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes any key length"));
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn notifier(token: Option<&str>) -> SnsNotifier {
        SnsNotifier::new(
            "arn:aws:sns:us-east-1:123456789012:dcabot",
            "us-east-1",
            AwsCredentials {
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
                session_token: token.map(|t| t.to_string()),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_region_from_arn() {
        assert_eq!(region_from_arn("arn:aws:sns:eu-west-2:123456789012:alerts"), Some("eu-west-2"));
        assert_eq!(region_from_arn("arn:aws:sqs:eu-west-2:123456789012:alerts"), None);
        assert_eq!(region_from_arn("not-an-arn"), None);
    }

    #[test]
    fn test_sanitize_subject() {
        let long = "x".repeat(150);
        assert_eq!(sanitize_subject(&long).len(), 100);
        assert_eq!(sanitize_subject("line one\nline two"), "line oneline two");
    }

    #[test]
    fn test_form_body_fields() {
        let event = NotificationEvent::new("BTC-USD BUY order", json!({"status": "FILLED"}));
        let body = notifier(None).form_body(&event);

        assert!(body.starts_with("Action=Publish&"));
        assert!(body.contains("Subject=BTC-USD+BUY+order"));
        assert!(body.contains("TopicArn=arn%3Aaws%3Asns%3Aus-east-1%3A123456789012%3Adcabot"));
        assert!(body.contains("Version=2010-03-31"));
    }

    // AWS's published example: IAM ListUsers, 2015-08-30 12:36:00 UTC
    fn iam_list_users<'a>(headers: &'a [(&'a str, String)]) -> CanonicalRequest<'a> {
        CanonicalRequest {
            method: "GET",
            path: "/",
            query: "Action=ListUsers&Version=2010-05-08",
            headers,
            payload: b"",
        }
    }

    fn iam_headers() -> Vec<(&'static str, String)> {
        vec![
            ("content-type", CONTENT_TYPE.to_string()),
            ("host", "iam.amazonaws.com".to_string()),
            ("x-amz-date", "20150830T123600Z".to_string()),
        ]
    }

    #[test]
    fn test_canonical_request_matches_aws_example() {
        let headers = iam_headers();
        let canonical = iam_list_users(&headers).render();

        assert_eq!(
            canonical,
            "GET\n/\nAction=ListUsers&Version=2010-05-08\n\
             content-type:application/x-www-form-urlencoded; charset=utf-8\n\
             host:iam.amazonaws.com\n\
             x-amz-date:20150830T123600Z\n\n\
             content-type;host;x-amz-date\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(canonical.as_bytes()),
            "f536975d06c0309214f805bb90ccff089219ecd68b2577efef23edd43b7e1a59"
        );
    }

    #[test]
    fn test_signing_key_matches_aws_example() {
        let key = signing_key("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", "20150830", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_authorization_matches_aws_example() {
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = iam_headers();
        let credentials = notifier(None).credentials;

        let auth = authorization(&credentials, "us-east-1", "iam", &iam_list_users(&headers), now);
        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn test_signed_headers_shape() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let headers = notifier(None).signed_headers("Action=Publish", now);

        let get = |name: &str| headers.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone());
        assert_eq!(get("x-amz-date").as_deref(), Some("20260102T030405Z"));
        assert_eq!(get("host").as_deref(), Some("sns.us-east-1.amazonaws.com"));

        let auth = get("authorization").unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20260102/us-east-1/sns/aws4_request, SignedHeaders=content-type;host;x-amz-date, Signature="
        ));
        let signature = auth.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_session_token_is_signed() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let headers = notifier(Some("token")).signed_headers("Action=Publish", now);
        let auth = &headers.last().unwrap().1;
        assert!(auth.contains("SignedHeaders=content-type;host;x-amz-date;x-amz-security-token"));
    }

    #[test]
    fn test_signature_depends_on_body() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let n = notifier(None);
        let a = n.signed_headers("a", now).last().unwrap().1.clone();
        let b = n.signed_headers("b", now).last().unwrap().1.clone();
        assert_ne!(a, b);
    }
}
