// ai
//! 🔌 Storage connection — config + credentials in, `Arc<dyn ObjectStore>` out.
//!
//! 🧠 Knowledge graph:
//! - `ObjectStorageConfig` is the shared connection block of every store-touching operator:
//!   bucket, endpoint, TLS, region, credentials, IAM token endpoint.
//! - `endpoint_url` adds `https://` / `http://` from `ssl_enabled` when the endpoint has no
//!   scheme. An explicit scheme that disagrees with `ssl_enabled` is a configuration error.
//! - HMAC keys sign requests S3-style. IAM API keys are traded for a bearer token at the
//!   IAM endpoint, then sent as default headers with signing turned off.
//! - `Connector` is the seam the pipeline opens stores through. `S3Connector` talks to the
//!   network. `SharedStoreConnector` hands out one store it was given (in-process runs, tests).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use object_store::ClientOptions;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::credentials::{AccessContext, AppConfigStore, CredentialDescriptor, resolve};
use crate::error::{ConfigurationError, ConnectError, CredentialError};

/// 🌐 Where IBM Cloud hands out bearer tokens.
pub const DEFAULT_IAM_TOKEN_ENDPOINT: &str = "https://iam.cloud.ibm.com/identity/token";

const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
const SERVICE_INSTANCE_HEADER: &str = "ibm-service-instance-id";

/// 🪣 Connection parameters shared by writers, scanners and readers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ObjectStorageConfig {
    /// 🪣 Bucket name. Required.
    pub bucket: String,
    /// 📡 Host (with or without scheme)
    pub endpoint: String,
    #[serde(default = "default_ssl_enabled")]
    pub ssl_enabled: bool,
    /// 🌎 Only used for request signing with HMAC keys
    #[serde(default = "default_region")]
    pub region: String,
    /// 🔒 IAM JSON, HMAC JSON, or an app config name. Omitted → the `cos` app config.
    #[serde(default)]
    pub credentials: Option<Value>,
    #[serde(default = "default_iam_token_endpoint")]
    pub iam_token_endpoint: String,
}

fn default_ssl_enabled() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_iam_token_endpoint() -> String {
    DEFAULT_IAM_TOKEN_ENDPOINT.to_string()
}

impl ObjectStorageConfig {
    pub fn new(bucket: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: endpoint.into(),
            ssl_enabled: default_ssl_enabled(),
            region: default_region(),
            credentials: None,
            iam_token_endpoint: default_iam_token_endpoint(),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Value) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_ssl_enabled(mut self, ssl_enabled: bool) -> Self {
        self.ssl_enabled = ssl_enabled;
        self
    }

    #[must_use]
    pub fn with_iam_token_endpoint(mut self, iam_token_endpoint: impl Into<String>) -> Self {
        self.iam_token_endpoint = iam_token_endpoint.into();
        self
    }

    /// 🔗 The endpoint as a full URL, scheme decided by `ssl_enabled`.
    pub fn endpoint_url(&self) -> Result<String, ConfigurationError> {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(ConfigurationError::MissingParameter {
                parameter: "endpoint",
            });
        }
        let wanted = if self.ssl_enabled { "https" } else { "http" };
        match endpoint.split_once("://") {
            None => Ok(format!("{wanted}://{endpoint}")),
            Some((scheme, _)) if scheme.eq_ignore_ascii_case(wanted) => Ok(endpoint.to_string()),
            Some((scheme, _)) => Err(ConfigurationError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: format!(
                    "scheme '{scheme}' contradicts ssl_enabled = {}",
                    self.ssl_enabled
                ),
            }),
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigurationError::MissingParameter { parameter: "bucket" });
        }
        self.endpoint_url().map(|_| ())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// 🎟️ Trade an IAM API key for a bearer token.
///
/// 💀 Non-2xx, unreachable endpoint, or a response without `access_token` → `TokenExchange`.
pub async fn exchange_iam_token(
    client: &reqwest::Client,
    token_endpoint: &str,
    api_key: &str,
) -> Result<String, CredentialError> {
    let response = client
        .post(token_endpoint)
        .header("Accept", "application/json")
        .form(&[("grant_type", IAM_GRANT_TYPE), ("apikey", api_key)])
        .send()
        .await
        .map_err(|e| CredentialError::TokenExchange(format!("request to {token_endpoint} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError::TokenExchange(format!(
            "{token_endpoint} answered {status}: {body}"
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| CredentialError::TokenExchange(format!("unreadable token response: {e}")))?;
    token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CredentialError::TokenExchange("response carried no access_token".to_string()))
}

/// 🔌 Build an S3-compatible store for `config`, authenticated per `access`.
pub async fn build_store(
    config: &ObjectStorageConfig,
    access: &AccessContext,
    http: &reqwest::Client,
) -> Result<Arc<dyn ObjectStore>, ConnectError> {
    config.validate()?;
    let url = config.endpoint_url()?;
    let builder = AmazonS3Builder::new()
        .with_bucket_name(&config.bucket)
        .with_endpoint(&url)
        .with_region(&config.region)
        .with_allow_http(!config.ssl_enabled)
        .with_virtual_hosted_style_request(false);

    let builder = match access {
        AccessContext::Hmac(hmac) => builder
            .with_access_key_id(&hmac.access_key_id)
            .with_secret_access_key(&hmac.secret_access_key),
        AccessContext::Iam(iam) => {
            // TODO: refresh the bearer token before it expires; IAM tokens live about an hour.
            let token = exchange_iam_token(http, &config.iam_token_endpoint, &iam.api_key).await?;
            let mut headers = HeaderMap::new();
            let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| CredentialError::TokenExchange(format!("token is not a valid header: {e}")))?;
            let instance = HeaderValue::from_str(&iam.service_instance_id)
                .map_err(|e| CredentialError::Malformed(format!("resource_instance_id: {e}")))?;
            headers.insert(AUTHORIZATION, bearer);
            headers.insert(HeaderName::from_static(SERVICE_INSTANCE_HEADER), instance);
            // -- client options replace wholesale, so allow_http has to ride along here too
            let options = ClientOptions::new()
                .with_allow_http(!config.ssl_enabled)
                .with_default_headers(headers);
            builder.with_client_options(options).with_skip_signature(true)
        }
    };

    let store = builder.build()?;
    info!("🔌 connected to bucket '{}' at {}", config.bucket, url);
    Ok(Arc::new(store))
}

/// 🚪 How the pipeline opens stores.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ObjectStorageConfig) -> Result<Arc<dyn ObjectStore>, ConnectError>;
}

/// 🌐 The real thing: resolves credentials, trades IAM keys for tokens, builds an S3 client.
pub struct S3Connector {
    app_configs: Arc<dyn AppConfigStore>,
    http: reqwest::Client,
}

impl S3Connector {
    pub fn new(app_configs: Arc<dyn AppConfigStore>) -> Result<Self, ConnectError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CredentialError::TokenExchange(format!("http client: {e}")))?;
        Ok(Self { app_configs, http })
    }
}

#[async_trait]
impl Connector for S3Connector {
    async fn connect(&self, config: &ObjectStorageConfig) -> Result<Arc<dyn ObjectStore>, ConnectError> {
        config.validate()?;
        let descriptor = CredentialDescriptor::from_param(config.credentials.as_ref())?;
        let access = resolve(&descriptor, self.app_configs.as_ref())?;
        debug!("🔒 credentials for bucket '{}' resolved: {:?}", config.bucket, access);
        build_store(config, &access, &self.http).await
    }
}

/// 🧪 Hands out the same store for every connection. Credentials are not consulted.
#[derive(Debug, Clone)]
pub struct SharedStoreConnector {
    store: Arc<dyn ObjectStore>,
}

impl SharedStoreConnector {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Connector for SharedStoreConnector {
    async fn connect(&self, config: &ObjectStorageConfig) -> Result<Arc<dyn ObjectStore>, ConnectError> {
        config.validate()?;
        Ok(self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticAppConfigStore;
    use object_store::PutPayload;
    use object_store::path::Path as ObjectPath;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn empty_app_configs() -> Arc<dyn AppConfigStore> {
        Arc::new(StaticAppConfigStore::default())
    }

    #[test]
    fn the_one_where_bare_hosts_get_a_scheme_from_ssl_enabled() {
        let the_config = ObjectStorageConfig::new("b", "s3.us-south.cloud-object-storage.appdomain.cloud");
        assert_eq!(
            the_config.endpoint_url().unwrap(),
            "https://s3.us-south.cloud-object-storage.appdomain.cloud"
        );
        let the_plain = ObjectStorageConfig::new("b", "localhost:9000/").with_ssl_enabled(false);
        assert_eq!(the_plain.endpoint_url().unwrap(), "http://localhost:9000");
    }

    #[test]
    fn the_one_where_a_contradicting_scheme_is_refused() {
        let the_config = ObjectStorageConfig::new("b", "http://minio:9000");
        assert!(matches!(
            the_config.endpoint_url(),
            Err(ConfigurationError::InvalidEndpoint { .. })
        ));
        let the_agreeing = ObjectStorageConfig::new("b", "HTTPS://cos.example");
        assert!(the_agreeing.endpoint_url().is_ok());
    }

    #[test]
    fn the_one_where_defaults_fill_in_from_toml() {
        let the_config: ObjectStorageConfig =
            toml::from_str("bucket = \"b\"\nendpoint = \"e\"\ncredentials = \"my-config\"").unwrap();
        assert!(the_config.ssl_enabled);
        assert_eq!(the_config.region, "us-east-1");
        assert_eq!(the_config.iam_token_endpoint, DEFAULT_IAM_TOKEN_ENDPOINT);
        assert_eq!(the_config.credentials, Some(json!("my-config")));
    }

    #[tokio::test]
    async fn the_one_where_the_iam_endpoint_trades_a_key_for_a_token() {
        let the_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .and(body_string_contains("apikey=s3cr3t"))
            .and(body_string_contains("grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&the_server)
            .await;

        let the_token = exchange_iam_token(
            &reqwest::Client::new(),
            &format!("{}/identity/token", the_server.uri()),
            "s3cr3t",
        )
        .await
        .unwrap();
        assert_eq!(the_token, "tok-123");
    }

    #[tokio::test]
    async fn the_one_where_iam_says_no_and_we_say_token_exchange() {
        let the_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("BXNIM0415E: Provided API key could not be found"))
            .mount(&the_server)
            .await;

        let the_error = exchange_iam_token(&reqwest::Client::new(), &the_server.uri(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(the_error, CredentialError::TokenExchange(msg) if msg.contains("400")));
    }

    #[tokio::test]
    async fn the_one_where_a_token_response_without_a_token_is_useless() {
        let the_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"expires_in": 3600})))
            .mount(&the_server)
            .await;
        let the_error = exchange_iam_token(&reqwest::Client::new(), &the_server.uri(), "k")
            .await
            .unwrap_err();
        assert!(matches!(the_error, CredentialError::TokenExchange(_)));
    }

    #[tokio::test]
    async fn the_one_where_iam_uploads_carry_the_bearer_and_instance_headers() {
        let the_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-abc"})))
            .mount(&the_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/streams-bucket/sample/hw0.txt"))
            .and(header("authorization", "Bearer tok-abc"))
            .and(header("ibm-service-instance-id", "crn:v1:instance"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag-0\""))
            .expect(1)
            .mount(&the_server)
            .await;

        let the_config = ObjectStorageConfig::new("streams-bucket", the_server.uri())
            .with_ssl_enabled(false)
            .with_iam_token_endpoint(format!("{}/identity/token", the_server.uri()))
            .with_credentials(json!({
                "apikey": "k",
                "resource_instance_id": "crn:v1:instance"
            }));
        let the_store = S3Connector::new(empty_app_configs())
            .unwrap()
            .connect(&the_config)
            .await
            .unwrap();
        the_store
            .put(&ObjectPath::from("sample/hw0.txt"), PutPayload::from_static(b"Hello\n"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn the_one_where_hmac_keys_build_a_client_without_the_network() {
        let the_config = ObjectStorageConfig::new("b", "s3.example.com").with_credentials(json!({
            "cos_hmac_keys": {"access_key_id": "AK", "secret_access_key": "SK"}
        }));
        let the_store = S3Connector::new(empty_app_configs())
            .unwrap()
            .connect(&the_config)
            .await;
        assert!(the_store.is_ok());
    }

    #[tokio::test]
    async fn the_one_where_the_default_app_config_must_actually_exist() {
        let the_config = ObjectStorageConfig::new("b", "s3.example.com");
        let the_error = S3Connector::new(empty_app_configs())
            .unwrap()
            .connect(&the_config)
            .await
            .unwrap_err();
        assert!(matches!(
            the_error,
            ConnectError::Credential(CredentialError::NotFound(name)) if name == "cos"
        ));
    }

    #[tokio::test]
    async fn the_one_where_a_named_app_config_supplies_hmac_keys() {
        let mut the_props = BTreeMap::new();
        the_props.insert(
            "cos.creds".to_string(),
            r#"{"cos_hmac_keys": {"access_key_id": "AK", "secret_access_key": "SK"}}"#.to_string(),
        );
        let the_store = StaticAppConfigStore::new(HashMap::from([("prod".to_string(), the_props)]));
        let the_config = ObjectStorageConfig::new("b", "s3.example.com").with_credentials(json!("prod"));
        assert!(
            S3Connector::new(Arc::new(the_store))
                .unwrap()
                .connect(&the_config)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn the_one_where_an_empty_bucket_never_leaves_the_building() {
        let the_connector = SharedStoreConnector::new(Arc::new(object_store::memory::InMemory::new()));
        let the_error = the_connector
            .connect(&ObjectStorageConfig::new("", "e"))
            .await
            .unwrap_err();
        assert!(matches!(
            the_error,
            ConnectError::Configuration(ConfigurationError::MissingParameter { parameter: "bucket" })
        ));
    }
}
