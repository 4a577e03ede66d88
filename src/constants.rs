//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

/// Default URL for new HTTP requests
pub const DEFAULT_HTTP_URL: &str = "https://httpbin.org/get";

/// Base URL used by the built-in sample collection and environment
pub const SAMPLE_BASE_URL: &str = "https://httpbin.org";

/// Application name
pub const APP_NAME: &str = "Courier";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory under the user's home holding collections, environments and reports
pub const CONFIG_DIR_NAME: &str = ".courier";

/// User settings file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Sub-directory receiving exported run reports
pub const REPORTS_DIR_NAME: &str = "reports";

/// Default transport timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "courier.log";

/// Amount the runner view adds or removes from the inter-request delay
pub const DELAY_STEP_MS: i64 = 100;
