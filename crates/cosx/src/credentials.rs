// ai
//! 🔒 Credential Resolver — three passports, one border crossing.
//!
//! The `credentials` parameter accepts three incompatible shapes:
//! - an IAM service-credentials JSON object (`apikey` + `resource_instance_id`)
//! - an HMAC JSON object (`cos_hmac_keys.access_key_id` / `secret_access_key`)
//! - a plain string naming an application configuration
//!
//! 🧠 Knowledge graph:
//! - `CredentialDescriptor::from_param` discriminates the shape once, at construction.
//! - `resolve` turns a descriptor into one `AccessContext`, consulting an `AppConfigStore`
//!   for the named form. No caching. One resolution per operator at start-up.
//! - A missing app config is `NotFound`. It is never "eh, let's go anonymous". 🦆
//! - The IAM API key is exchanged for a bearer token later, in `storage`, because that
//!   part needs the network and this part does not.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::CredentialError;

/// 📛 App config used when the `credentials` parameter is omitted entirely.
pub const DEFAULT_APP_CONFIG_NAME: &str = "cos";

/// 🗝️ Property inside an application configuration that carries the credentials JSON.
pub const CREDENTIALS_PROPERTY: &str = "cos.creds";

/// 🎫 IAM service credentials. The API key is the secret; the instance id says whose bucket.
#[derive(Clone, PartialEq)]
pub struct IamCredentials {
    pub api_key: String,
    pub service_instance_id: String,
}

/// 🔑 HMAC key pair, S3-style. The boomer of credential formats, still going strong.
#[derive(Clone, PartialEq)]
pub struct HmacCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

// 🙈 Debug impls redact secrets. Logs are forever. API keys should not be.
impl std::fmt::Debug for IamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamCredentials")
            .field("api_key", &"***")
            .field("service_instance_id", &self.service_instance_id)
            .finish()
    }
}

impl std::fmt::Debug for HmacCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

/// 🎭 The tagged variant over the three accepted credential shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialDescriptor {
    Iam(IamCredentials),
    Hmac(HmacCredentials),
    AppConfig(String),
}

impl Default for CredentialDescriptor {
    fn default() -> Self {
        CredentialDescriptor::AppConfig(DEFAULT_APP_CONFIG_NAME.to_string())
    }
}

impl CredentialDescriptor {
    /// 🚪 Discriminate the raw `credentials` parameter.
    ///
    /// `None` → the default app config. A string → an app config name.
    /// An object → IAM or HMAC JSON. Anything else → `Malformed`.
    pub fn from_param(param: Option<&Value>) -> Result<Self, CredentialError> {
        match param {
            None => Ok(Self::default()),
            Some(Value::String(name)) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(CredentialError::Malformed(
                        "application configuration name is empty".to_string(),
                    ));
                }
                Ok(CredentialDescriptor::AppConfig(name.to_string()))
            }
            Some(json @ Value::Object(_)) => Self::from_json(json),
            Some(other) => Err(CredentialError::Malformed(format!(
                "expected a JSON object or an application configuration name, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// 🧾 Validate a credentials JSON object and decide which kind it is.
    ///
    /// IBM service credentials carry both `apikey` and `cos_hmac_keys` when HMAC is
    /// enabled. When both are present the HMAC pair wins: it needs no token exchange.
    pub fn from_json(json: &Value) -> Result<Self, CredentialError> {
        let object = json.as_object().ok_or_else(|| {
            CredentialError::Malformed(format!(
                "expected a JSON object, got {}",
                json_type_name(json)
            ))
        })?;

        if let Some(hmac_keys) = object.get("cos_hmac_keys") {
            let access_key_id = required_str(hmac_keys, "access_key_id", "cos_hmac_keys")?;
            let secret_access_key =
                required_str(hmac_keys, "secret_access_key", "cos_hmac_keys")?;
            return Ok(CredentialDescriptor::Hmac(HmacCredentials {
                access_key_id,
                secret_access_key,
            }));
        }

        if object.contains_key("apikey") {
            let api_key = required_str(json, "apikey", "IAM credentials")?;
            let service_instance_id =
                required_str(json, "resource_instance_id", "IAM credentials")?;
            return Ok(CredentialDescriptor::Iam(IamCredentials {
                api_key,
                service_instance_id,
            }));
        }

        Err(CredentialError::Malformed(
            "expected either 'apikey' (IAM) or 'cos_hmac_keys' (HMAC)".to_string(),
        ))
    }

    /// 📜 Parse the credentials JSON text stored in an application configuration.
    pub fn from_json_str(text: &str) -> Result<Self, CredentialError> {
        let json: Value = serde_json::from_str(text)
            .map_err(|e| CredentialError::Malformed(format!("invalid JSON: {e}")))?;
        Self::from_json(&json)
    }
}

fn required_str(json: &Value, field: &str, what: &str) -> Result<String, CredentialError> {
    match json.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(CredentialError::Malformed(format!(
            "{what}: field '{field}' is empty"
        ))),
        Some(other) => Err(CredentialError::Malformed(format!(
            "{what}: field '{field}' must be a string, got {}",
            json_type_name(other)
        ))),
        None => Err(CredentialError::Malformed(format!(
            "{what}: missing required field '{field}'"
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// ✅ The resolved, uniform access descriptor every operator consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessContext {
    Iam(IamCredentials),
    Hmac(HmacCredentials),
}

/// 🗄️ Where named application configurations live. Out here, it's a trait. In prod, it's
/// whatever your platform calls "secrets". In tests, it's a HashMap wearing a tie.
pub trait AppConfigStore: Send + Sync {
    /// Properties of the named application configuration, if it exists.
    fn properties(&self, name: &str) -> Option<BTreeMap<String, String>>;
}

/// 📦 An `AppConfigStore` backed by a map, usually the `[app_configs]` table of the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticAppConfigStore {
    configs: HashMap<String, BTreeMap<String, String>>,
}

impl StaticAppConfigStore {
    pub fn new(configs: HashMap<String, BTreeMap<String, String>>) -> Self {
        Self { configs }
    }
}

impl AppConfigStore for StaticAppConfigStore {
    fn properties(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.configs.get(name).cloned()
    }
}

/// 🔐 Resolve a descriptor into an `AccessContext`.
///
/// 💀 Fails fast: unknown app config → `NotFound`, broken JSON or missing fields → `Malformed`.
pub fn resolve(
    descriptor: &CredentialDescriptor,
    store: &dyn AppConfigStore,
) -> Result<AccessContext, CredentialError> {
    match descriptor {
        CredentialDescriptor::Iam(iam) => Ok(AccessContext::Iam(iam.clone())),
        CredentialDescriptor::Hmac(hmac) => Ok(AccessContext::Hmac(hmac.clone())),
        CredentialDescriptor::AppConfig(name) => {
            let properties = store
                .properties(name)
                .ok_or_else(|| CredentialError::NotFound(name.clone()))?;
            let creds_json = properties.get(CREDENTIALS_PROPERTY).ok_or_else(|| {
                CredentialError::Malformed(format!(
                    "application configuration '{name}' has no '{CREDENTIALS_PROPERTY}' property"
                ))
            })?;
            match CredentialDescriptor::from_json_str(creds_json)? {
                CredentialDescriptor::Iam(iam) => Ok(AccessContext::Iam(iam)),
                CredentialDescriptor::Hmac(hmac) => Ok(AccessContext::Hmac(hmac)),
                // -- from_json never yields a name. A config pointing at a config would be a loop anyway.
                CredentialDescriptor::AppConfig(nested) => Err(CredentialError::Malformed(
                    format!("application configuration '{name}' refers to another configuration '{nested}'"),
                )),
            }
        }
    }
}
