//! AWS STS federation and caller identity checks.

use async_trait::async_trait;
use awsoidc_core::ports::{CredentialExchanger, FederationRequest, IdentityChecker};
use awsoidc_core::{Error, Result, RoleArn, TemporaryCredential};
use aws_sdk_sts::config::retry::RetryConfig;
use aws_sdk_sts::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sts::error::DisplayErrorContext;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

/// Global STS endpoint used for `AssumeRoleWithWebIdentity`.
pub const DEFAULT_STS_ENDPOINT: &str = "https://sts.amazonaws.com/";
pub const DEFAULT_REGION: &str = "us-east-1";

const STS_API_VERSION: &str = "2011-06-15";
const CREDENTIAL_PROVIDER_NAME: &str = "aws-cli-oidc";

/// Where STS calls go.
#[derive(Debug, Clone)]
pub struct StsConfig {
    /// Overrides both the federation and the identity check endpoint.
    pub endpoint: Option<String>,
    pub region: String,
}

impl Default for StsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
        }
    }
}

impl StsConfig {
    /// Read `AWS_REGION`/`AWS_DEFAULT_REGION` and `AWS_ENDPOINT_URL_STS`.
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            endpoint: non_empty("AWS_ENDPOINT_URL_STS"),
            region: non_empty("AWS_REGION")
                .or_else(|| non_empty("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }

    /// Move the region into `partition` when it belongs to another one,
    /// so a China or GovCloud role works without `AWS_REGION` being set.
    pub fn for_partition(mut self, partition: &str) -> Self {
        if region_partition(&self.region) != partition
            && let Some(region) = partition_default_region(partition)
        {
            debug!(from = %self.region, to = region, partition, "Switching STS region");
            self.region = region.to_string();
        }
        self
    }

    fn federation_endpoint(&self, role_arn: &RoleArn) -> String {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.clone();
        }
        let config = self.clone().for_partition(role_arn.partition());
        regional_endpoint(&config.region)
    }
}

/// STS endpoint for `region`. `us-east-1` keeps the global endpoint.
pub fn regional_endpoint(region: &str) -> String {
    if region == DEFAULT_REGION {
        return DEFAULT_STS_ENDPOINT.to_string();
    }
    let suffix = match region_partition(region) {
        "aws-cn" => "amazonaws.com.cn",
        _ => "amazonaws.com",
    };
    format!("https://sts.{region}.{suffix}/")
}

fn region_partition(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

fn partition_default_region(partition: &str) -> Option<&'static str> {
    match partition {
        "aws" => Some(DEFAULT_REGION),
        "aws-cn" => Some("cn-north-1"),
        "aws-us-gov" => Some("us-gov-west-1"),
        _ => None,
    }
}

/// `AssumeRoleWithWebIdentity` over the STS query API.
///
/// The call is unsigned, so it goes through plain reqwest rather than the SDK.
pub struct StsExchanger {
    config: StsConfig,
    client: reqwest::Client,
}

impl StsExchanger {
    pub fn new(config: StsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Debug, Deserialize)]
struct StsResponse {
    #[serde(rename = "AssumeRoleWithWebIdentityResponse")]
    response: AssumeRoleWithWebIdentityResponse,
}

#[derive(Debug, Deserialize)]
struct AssumeRoleWithWebIdentityResponse {
    #[serde(rename = "AssumeRoleWithWebIdentityResult")]
    result: AssumeRoleWithWebIdentityResult,
}

#[derive(Debug, Deserialize)]
struct AssumeRoleWithWebIdentityResult {
    #[serde(rename = "Credentials")]
    credentials: StsCredentials,
}

#[derive(Deserialize)]
struct StsCredentials {
    #[serde(rename = "AccessKeyId")]
    access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    secret_access_key: String,
    #[serde(rename = "SessionToken")]
    session_token: String,
    #[serde(rename = "Expiration", default)]
    expiration: Option<StsTimestamp>,
}

impl std::fmt::Debug for StsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// JSON responses carry epoch seconds; XML-era tooling wrote RFC 3339.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StsTimestamp {
    Epoch(f64),
    Text(String),
}

impl StsTimestamp {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            StsTimestamp::Epoch(secs) => Utc.timestamp_opt(*secs as i64, 0).single(),
            StsTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StsErrorResponse {
    #[serde(rename = "Error")]
    error: StsErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StsErrorDetail {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[async_trait]
impl CredentialExchanger for StsExchanger {
    async fn exchange(&self, request: &FederationRequest) -> Result<TemporaryCredential> {
        debug!(
            role_arn = %request.role_arn,
            session_name = %request.session_name,
            duration_seconds = request.duration_seconds,
            "Exchanging OIDC token for AWS credentials"
        );

        let duration = request.duration_seconds.to_string();
        let params = [
            ("Action", "AssumeRoleWithWebIdentity"),
            ("Version", STS_API_VERSION),
            ("RoleArn", request.role_arn.as_str()),
            ("RoleSessionName", request.session_name.as_str()),
            ("WebIdentityToken", request.identity_token.as_str()),
            ("DurationSeconds", duration.as_str()),
        ];

        let response = self
            .client
            .post(self.config.federation_endpoint(&request.role_arn))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::http("credential exchange", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http("credential exchange", e))?;

        if !status.is_success() {
            return Err(classify_sts_error(status.as_u16(), &body));
        }

        let parsed: StsResponse = serde_json::from_str(&body).map_err(|e| {
            Error::CredentialExchange(format!("Failed to parse STS response: {e}"))
        })?;
        let creds = parsed.response.result.credentials;
        let expiration = creds.expiration.as_ref().and_then(StsTimestamp::to_datetime);

        debug!(access_key = %creds.access_key_id, ?expiration, "STS issued credentials");
        Ok(TemporaryCredential::new(
            creds.access_key_id,
            creds.secret_access_key,
            creds.session_token,
            expiration,
        ))
    }
}

/// Map an STS error body (JSON or XML) to a typed failure.
fn classify_sts_error(status: u16, body: &str) -> Error {
    let (code, message) = match serde_json::from_str::<StsErrorResponse>(body) {
        Ok(parsed) => (parsed.error.code, parsed.error.message),
        Err(_) => (
            xml_element(body, "Code").unwrap_or_default(),
            xml_element(body, "Message").unwrap_or_default(),
        ),
    };

    let detail = if code.is_empty() {
        format!("STS returned HTTP status {status}")
    } else {
        format!("{code}: {message}")
    };

    match code.as_str() {
        "InvalidIdentityToken" | "ExpiredTokenException" | "IDPRejectedClaim" => {
            Error::InvalidIdentityToken(detail)
        }
        "AccessDenied" => Error::RoleNotPermitted(detail),
        "ValidationError" if message.to_ascii_lowercase().contains("durationseconds") => {
            Error::SessionDurationOutOfRange(detail)
        }
        _ => Error::CredentialExchange(detail),
    }
}

fn xml_element(body: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = body.find(&open)? + open.len();
    let end = start + body[start..].find(&close)?;
    Some(unescape_xml(body[start..end].trim()))
}

// `&amp;` goes last so `&amp;lt;` stays `&lt;`.
fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// `GetCallerIdentity` with the credential under test.
pub struct StsIdentityChecker {
    config: StsConfig,
}

impl StsIdentityChecker {
    pub fn new(config: StsConfig) -> Self {
        Self { config }
    }

    fn client_for(&self, credential: &TemporaryCredential) -> aws_sdk_sts::Client {
        let credentials = Credentials::new(
            credential.access_key.clone(),
            credential.secret_key.clone(),
            Some(credential.session_token.clone()),
            None,
            CREDENTIAL_PROVIDER_NAME,
        );
        let mut builder = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_sts::Client::from_conf(builder.build())
    }
}

#[async_trait]
impl IdentityChecker for StsIdentityChecker {
    async fn check(&self, credential: &TemporaryCredential) -> Result<()> {
        let identity = self
            .client_for(credential)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| Error::CredentialExchange(DisplayErrorContext(&e).to_string()))?;

        debug!(
            account = identity.account().unwrap_or_default(),
            arn = identity.arn().unwrap_or_default(),
            "Cached credential accepted by STS"
        );
        Ok(())
    }
}
