//! Shared constants for the modelport application.

use std::time::Duration;

/// Tag deployments get when the caller does not name one.
pub const DEFAULT_MODEL_TAG: &str = "dev";

/// Prefix for deployment names derived from model ids.
pub const DEPLOYMENT_NAME_PREFIX: &str = "modelport";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "MODELPORT";

/// Hard upper bound on a single invocation (connection setup plus full
/// stream drain) when the caller supplies none.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(300);
