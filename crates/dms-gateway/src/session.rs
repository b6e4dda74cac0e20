//! Profile, region, credential and endpoint resolution.
//!
//! Credentials come from the `aws-config` provider chain, so assume-role,
//! SSO, `credential_process` and container/instance credentials all work the
//! same way they do for the AWS CLI.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use aws_config::meta::region::ProvideRegion;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::profile::{ProfileFileCredentialsProvider, ProfileFileRegionProvider};
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use dms_core::ConstructionError;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_PROFILE: &str = "default";

/// Cached credentials are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Values given explicitly by the caller. Each one wins over its
/// environment and profile counterparts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

/// Key material handed to the signer.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl From<&aws_credential_types::Credentials> for Credentials {
    fn from(creds: &aws_credential_types::Credentials) -> Self {
        Self {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().map(str::to_string),
        }
    }
}

/// A provider chain plus the last credentials it returned.
#[derive(Debug, Clone)]
pub struct ProviderCache {
    provider: SharedCredentialsProvider,
    cached: Arc<Mutex<Option<aws_credential_types::Credentials>>>,
}

impl ProviderCache {
    pub fn new(provider: SharedCredentialsProvider) -> Self {
        Self {
            provider,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn current(&self) -> Result<Credentials, CredentialsError> {
        let mut cached = self.cached.lock().await;
        if let Some(creds) = cached.as_ref().filter(|creds| still_fresh(creds)) {
            return Ok(Credentials::from(creds));
        }
        let creds = self.provider.provide_credentials().await?;
        debug!(expires = ?creds.expiry(), "credentials refreshed");
        let resolved = Credentials::from(&creds);
        *cached = Some(creds);
        Ok(resolved)
    }
}

fn still_fresh(creds: &aws_credential_types::Credentials) -> bool {
    match creds.expiry() {
        None => true,
        Some(expiry) => expiry > SystemTime::now() + REFRESH_MARGIN,
    }
}

#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Only used against custom endpoints.
    Unsigned,
    Static(Credentials),
    Chain(ProviderCache),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub profile: String,
    pub region: String,
    pub endpoint: String,
    pub custom_endpoint: bool,
    pub credentials: CredentialSource,
}

/// Where environment lookups come from. The process environment in
/// production, a map in tests.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;

    fn home_dir(&self) -> Option<PathBuf>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned().filter(|value| !value.is_empty())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.get("HOME").map(PathBuf::from)
    }
}

impl Session {
    /// A session that never signs. Meant for mock servers.
    pub fn unsigned(profile: &str, region: &str, endpoint: &str) -> Self {
        Self {
            profile: profile.to_string(),
            region: region.to_string(),
            endpoint: endpoint.to_string(),
            custom_endpoint: true,
            credentials: CredentialSource::Unsigned,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = CredentialSource::Static(credentials);
        self
    }

    pub async fn load(options: &SessionOptions) -> Result<Self, ConstructionError> {
        Self::load_from(options, &ProcessEnv).await
    }

    /// Builds the session without contacting any credential source.
    pub async fn load_from(
        options: &SessionOptions,
        env: &dyn EnvSource,
    ) -> Result<Self, ConstructionError> {
        let profile = options
            .profile
            .clone()
            .or_else(|| env.var("AWS_PROFILE"))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        let config_path = env
            .var("AWS_CONFIG_FILE")
            .map(PathBuf::from)
            .or_else(|| env.home_dir().map(|home| home.join(".aws").join("config")));
        let credentials_path = env
            .var("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .or_else(|| env.home_dir().map(|home| home.join(".aws").join("credentials")));
        let files = ProfileFiles::builder()
            .with_contents(ProfileFileKind::Config, read_profile_file(config_path.as_deref())?)
            .with_contents(
                ProfileFileKind::Credentials,
                read_profile_file(credentials_path.as_deref())?,
            )
            .build();

        let explicit_region = options
            .region
            .clone()
            .or_else(|| env.var("AWS_REGION"))
            .or_else(|| env.var("AWS_DEFAULT_REGION"));
        let region = match explicit_region {
            Some(region) => region,
            None => ProfileFileRegionProvider::builder()
                .profile_name(&profile)
                .profile_files(files.clone())
                .build()
                .region()
                .await
                .map(|region| region.to_string())
                .ok_or(ConstructionError::MissingRegion)?,
        };

        let custom_endpoint = options
            .endpoint_url
            .clone()
            .or_else(|| env.var("AWS_ENDPOINT_URL"));
        let endpoint = custom_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://dms.{region}.amazonaws.com"));

        // A named profile never falls back to environment keys.
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(&profile)
            .profile_files(files.clone())
            .region(Region::new(region.clone()));
        if options.profile.is_some() {
            loader = loader.credentials_provider(
                ProfileFileCredentialsProvider::builder()
                    .profile_name(&profile)
                    .profile_files(files)
                    .build(),
            );
        }
        let provider = loader.load().await.credentials_provider().ok_or_else(|| {
            ConstructionError::Credentials {
                profile: profile.clone(),
                reason: "no credential provider configured".to_string(),
            }
        })?;

        debug!(
            profile = %profile,
            region = %region,
            endpoint = %endpoint,
            "session resolved"
        );
        Ok(Self {
            profile,
            region,
            endpoint,
            custom_endpoint: custom_endpoint.is_some(),
            credentials: CredentialSource::Chain(ProviderCache::new(provider)),
        })
    }

    /// Resolves credentials once so a broken setup fails before any command
    /// runs. Against a custom endpoint an empty chain means unsigned requests.
    pub async fn verify_credentials(&mut self) -> Result<(), ConstructionError> {
        let CredentialSource::Chain(cache) = &self.credentials else {
            return Ok(());
        };
        match cache.current().await {
            Ok(_) => Ok(()),
            Err(CredentialsError::CredentialsNotLoaded(_)) if self.custom_endpoint => {
                debug!(profile = %self.profile, "no credentials; sending unsigned requests");
                self.credentials = CredentialSource::Unsigned;
                Ok(())
            }
            Err(CredentialsError::CredentialsNotLoaded(_)) => {
                Err(ConstructionError::MissingCredentials {
                    profile: self.profile.clone(),
                })
            }
            Err(err) => Err(ConstructionError::Credentials {
                profile: self.profile.clone(),
                reason: error_chain(&err),
            }),
        }
    }

    /// Credentials for the next request, `None` when unsigned.
    pub async fn credentials(&self) -> Result<Option<Credentials>, CredentialsError> {
        match &self.credentials {
            CredentialSource::Unsigned => Ok(None),
            CredentialSource::Static(creds) => Ok(Some(creds.clone())),
            CredentialSource::Chain(cache) => cache.current().await.map(Some),
        }
    }
}

/// Flattens an error and its sources into one line.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// A missing file reads as empty.
fn read_profile_file(path: Option<&Path>) -> Result<String, ConstructionError> {
    let Some(path) = path else {
        return Ok(String::new());
    };
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(ConstructionError::Profile {
            path: path.display().to_string(),
            reason: err.to_string(),
        }),
    }
}
