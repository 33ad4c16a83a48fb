//! Service metadata read from a botocore-style model directory.
//!
//! The directory is laid out as `<root>/<service>/<api-version>/<file>.json`,
//! where the files of interest are `service-2.json` (operations, shapes and
//! the service's full name) and `paginators-1.json` (which operations can be
//! paged and where their results live). Either file may be gzipped
//! (`service-2.json.gz`), as botocore ships them. When a service ships several
//! API versions the newest one that contains the requested file is used.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::Metadata;

const SERVICE_FILE: &str = "service-2.json";
const PAGINATORS_FILE: &str = "paginators-1.json";

/// Model trees bundled with the AWS CLI v2 installers (Linux, then macOS).
const BUNDLED_ROOTS: &[&str] = &[
    "/usr/local/aws-cli/v2/current/dist/awscli/botocore/data",
    "/usr/local/aws-cli/awscli/botocore/data",
];

const BOTOCORE_DATA_SCRIPT: &str =
    "import botocore, os; print(os.path.join(os.path.dirname(botocore.__file__), 'data'))";

#[derive(Debug, Deserialize)]
struct ServiceModel {
    metadata: ServiceMetadata,
    #[serde(default)]
    operations: HashMap<String, OperationModel>,
    #[serde(default)]
    shapes: HashMap<String, ShapeModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceMetadata {
    service_full_name: String,
}

#[derive(Debug, Deserialize)]
struct OperationModel {
    input: Option<ShapeRef>,
}

#[derive(Debug, Deserialize)]
struct ShapeRef {
    shape: String,
}

#[derive(Debug, Deserialize)]
struct ShapeModel {
    #[serde(default)]
    required: Vec<String>,
}

/// `paginators-1.json`. Entries stay as raw values so one malformed
/// paginator does not hide the others.
#[derive(Debug, Deserialize)]
struct PaginatorsModel {
    pagination: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PaginatorModel {
    result_key: ResultKey,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResultKey {
    One(String),
    Many(Vec<String>),
}

/// [`Metadata`] backed by a model directory on disk.
///
/// Parsed files are cached per service for the lifetime of the value.
pub struct ModelDirectory {
    root: PathBuf,
    services: Mutex<HashMap<String, Arc<ServiceModel>>>,
    paginators: Mutex<HashMap<String, Arc<PaginatorsModel>>>,
}

impl ModelDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            services: Mutex::new(HashMap::new()),
            paginators: Mutex::new(HashMap::new()),
        }
    }

    /// Find a model directory when none is configured.
    ///
    /// Looks at `~/.aws/models`, then the AWS CLI v2 bundle, then the
    /// botocore package importable by `python3`. The first directory with at
    /// least one paginated service wins.
    pub async fn discover() -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = dirs::home_dir()
            .map(|home| home.join(".aws").join("models"))
            .into_iter()
            .collect();
        candidates.extend(BUNDLED_ROOTS.iter().map(PathBuf::from));

        if let Some(root) = Self::first_usable(candidates).await {
            return Some(root);
        }
        let root = python_botocore_root().await?;
        Self::first_usable([root]).await
    }

    /// First of `candidates` that holds at least one paginated service.
    pub async fn first_usable(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
        for root in candidates {
            match Self::new(root.clone()).services().await {
                Ok(services) => {
                    info!(root = %root.display(), count = services.len(), "Found service models");
                    return Some(root);
                }
                Err(err) => debug!(root = %root.display(), %err, "No usable models"),
            }
        }
        None
    }

    /// Newest API version directory of `service` that contains `file`,
    /// plain or gzipped.
    async fn resolve(&self, service: &str, file: &str) -> Result<PathBuf> {
        let service_dir = self.root.join(service);
        let mut versions = list_dirs(&service_dir).await?;
        versions.sort_unstable_by(|a, b| b.cmp(a));

        for version in versions {
            let version_dir = service_dir.join(&version);
            for path in [version_dir.join(file), version_dir.join(format!("{file}.gz"))] {
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Ok(path);
                }
            }
        }
        Err(eyre!("no {file} found for service '{service}'"))
    }

    async fn service_model(&self, service: &str) -> Result<Arc<ServiceModel>> {
        if let Some(model) = self.services.lock().await.get(service) {
            return Ok(Arc::clone(model));
        }
        let path = self.resolve(service, SERVICE_FILE).await?;
        let model: Arc<ServiceModel> = Arc::new(load_json(&path).await?);
        debug!(service, path = %path.display(), "Loaded service model");
        self.services
            .lock()
            .await
            .insert(service.to_string(), Arc::clone(&model));
        Ok(model)
    }

    async fn paginators_model(&self, service: &str) -> Result<Arc<PaginatorsModel>> {
        if let Some(model) = self.paginators.lock().await.get(service) {
            return Ok(Arc::clone(model));
        }
        let path = self.resolve(service, PAGINATORS_FILE).await?;
        let model: Arc<PaginatorsModel> = Arc::new(load_json(&path).await?);
        debug!(service, path = %path.display(), "Loaded paginators model");
        self.paginators
            .lock()
            .await
            .insert(service.to_string(), Arc::clone(&model));
        Ok(model)
    }

    async fn paginator(&self, service: &str, operation: &str) -> Result<PaginatorModel> {
        let model = self.paginators_model(service).await?;
        let value = model
            .pagination
            .get(operation)
            .ok_or_else(|| eyre!("'{service}' has no paginator named '{operation}'"))?;
        serde_json::from_value(value.clone())
            .wrap_err_with(|| format!("malformed paginator '{operation}' in '{service}'"))
    }
}

#[async_trait]
impl Metadata for ModelDirectory {
    async fn services(&self) -> Result<Vec<String>> {
        let mut services = Vec::new();
        let candidates = list_dirs(&self.root)
            .await
            .wrap_err_with(|| format!("model directory {} is unavailable", self.root.display()))?;

        for service in candidates {
            if self.resolve(&service, PAGINATORS_FILE).await.is_ok() {
                services.push(service);
            } else {
                debug!(%service, "Skipping service without paginators");
            }
        }

        if services.is_empty() {
            bail!(
                "no service models with paginators found in {}",
                self.root.display()
            );
        }
        services.sort_unstable();
        info!(count = services.len(), root = %self.root.display(), "Discovered services");
        Ok(services)
    }

    async fn description(&self, service: &str) -> Result<String> {
        Ok(self
            .service_model(service)
            .await?
            .metadata
            .service_full_name
            .clone())
    }

    async fn operations(&self, service: &str) -> Result<Vec<String>> {
        Ok(self
            .paginators_model(service)
            .await?
            .pagination
            .keys()
            .cloned()
            .collect())
    }

    async fn required_params(&self, service: &str, operation: &str) -> Result<Vec<String>> {
        let model = self.service_model(service).await?;

        let shape_name = match model.operations.get(operation) {
            Some(OperationModel { input: None }) => return Ok(Vec::new()),
            Some(OperationModel {
                input: Some(ShapeRef { shape }),
            }) => shape.clone(),
            None => {
                warn!(service, operation, "Operation missing from service model");
                format!("{operation}Request")
            }
        };

        model
            .shapes
            .get(&shape_name)
            .map(|shape| shape.required.clone())
            .ok_or_else(|| eyre!("input shape '{shape_name}' of '{service}.{operation}' not found"))
    }

    async fn result_keys(&self, service: &str, operation: &str) -> Result<Vec<String>> {
        let keys = match self.paginator(service, operation).await?.result_key {
            ResultKey::One(key) => vec![key],
            ResultKey::Many(keys) => keys,
        };
        if keys.is_empty() {
            bail!("paginator '{operation}' in '{service}' declares no result key");
        }
        Ok(keys)
    }
}

async fn list_dirs(path: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(path)
        .await
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;

    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            dirs.push(name.to_string());
        }
    }
    Ok(dirs)
}

async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read(path)
        .await
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;

    let gzipped = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    let parsed = if gzipped {
        serde_json::from_reader(GzDecoder::new(content.as_slice()))
    } else {
        serde_json::from_slice(&content)
    };
    parsed.wrap_err_with(|| format!("failed to parse {}", path.display()))
}

/// Data directory of the botocore package that `python3` can import.
async fn python_botocore_root() -> Option<PathBuf> {
    let output = Command::new("python3")
        .args(["-c", BOTOCORE_DATA_SCRIPT])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        debug!(status = %output.status, "botocore is not importable");
        return None;
    }
    let root = String::from_utf8(output.stdout).ok()?;
    let root = root.trim();
    (!root.is_empty()).then(|| PathBuf::from(root))
}
