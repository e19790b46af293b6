//! Runtime configuration.
//!
//! Every tunable has a default; `ABOOK_*` environment variables override
//! the defaults and CLI flags override both.

use std::path::PathBuf;
use std::time::Duration;

use crate::loader::LoaderSettings;
use crate::orchestrator::RetryPolicy;
use crate::renderer::RendererOptions;

/// Default cap on every metadata field, in characters.
pub const DEFAULT_FIELD_CAP: usize = 140;

const DEFAULT_DESCRIPTOR_TIMEOUT_SECS: u64 = 180;
const DEFAULT_LOCATOR_ATTEMPTS: u32 = 3;
const DEFAULT_LOCATOR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAYLOAD_ATTEMPTS: u32 = 3;
const DEFAULT_PAYLOAD_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PAYLOAD_BACKOFF_MS: u64 = 1000;
const DEFAULT_MIN_PAYLOAD_LEN: usize = 32;
const DEFAULT_NAVIGATION_ATTEMPTS: u32 = 3;
const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub chromium_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    /// Directory under which per-run workspaces are created.
    pub temp_root: PathBuf,
    /// Outer deadline for the whole descriptor fetch.
    pub descriptor_timeout: Duration,
    pub locator: RetryPolicy,
    pub payload: RetryPolicy,
    pub payload_backoff: Duration,
    pub min_payload_len: usize,
    /// Page loads attempted before giving up on navigation.
    pub navigation_attempts: u32,
    pub navigation_timeout: Duration,
    pub http_timeout: Duration,
    pub field_cap: usize,
    pub headless: bool,
    /// Forward external tool output instead of discarding it.
    pub verbose: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            chromium_path: None,
            ffmpeg_path: None,
            temp_root: std::env::temp_dir(),
            descriptor_timeout: Duration::from_secs(DEFAULT_DESCRIPTOR_TIMEOUT_SECS),
            locator: RetryPolicy::new(
                DEFAULT_LOCATOR_ATTEMPTS,
                Duration::from_secs(DEFAULT_LOCATOR_TIMEOUT_SECS),
            ),
            payload: RetryPolicy::new(
                DEFAULT_PAYLOAD_ATTEMPTS,
                Duration::from_secs(DEFAULT_PAYLOAD_TIMEOUT_SECS),
            ),
            payload_backoff: Duration::from_millis(DEFAULT_PAYLOAD_BACKOFF_MS),
            min_payload_len: DEFAULT_MIN_PAYLOAD_LEN,
            navigation_attempts: DEFAULT_NAVIGATION_ATTEMPTS,
            navigation_timeout: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            field_cap: DEFAULT_FIELD_CAP,
            headless: true,
            verbose: false,
        }
    }
}

impl FetcherConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        Self {
            chromium_path: env.path("ABOOK_CHROMIUM_PATH"),
            ffmpeg_path: env.path("ABOOK_FFMPEG_PATH"),
            temp_root: env.path("ABOOK_TMPDIR").unwrap_or(defaults.temp_root),
            descriptor_timeout: Duration::from_secs(
                env.u64("ABOOK_DESCRIPTOR_TIMEOUT_SECS", DEFAULT_DESCRIPTOR_TIMEOUT_SECS),
            ),
            locator: RetryPolicy::new(
                env.u32("ABOOK_LOCATOR_ATTEMPTS", DEFAULT_LOCATOR_ATTEMPTS),
                Duration::from_secs(
                    env.u64("ABOOK_LOCATOR_TIMEOUT_SECS", DEFAULT_LOCATOR_TIMEOUT_SECS),
                ),
            ),
            payload: RetryPolicy::new(
                env.u32("ABOOK_PAYLOAD_ATTEMPTS", DEFAULT_PAYLOAD_ATTEMPTS),
                defaults.payload.timeout,
            ),
            payload_backoff: Duration::from_millis(
                env.u64("ABOOK_PAYLOAD_BACKOFF_MS", DEFAULT_PAYLOAD_BACKOFF_MS),
            ),
            min_payload_len: env.usize("ABOOK_MIN_PAYLOAD_LEN", DEFAULT_MIN_PAYLOAD_LEN),
            navigation_attempts: env
                .u32("ABOOK_NAVIGATION_ATTEMPTS", DEFAULT_NAVIGATION_ATTEMPTS)
                .max(1),
            navigation_timeout: Duration::from_secs(
                env.u64("ABOOK_NAVIGATION_TIMEOUT_SECS", DEFAULT_NAVIGATION_TIMEOUT_SECS),
            ),
            http_timeout: defaults.http_timeout,
            field_cap: defaults.field_cap,
            headless: env.string("ABOOK_HEADFUL").as_deref() != Some("1"),
            verbose: false,
        }
    }

    pub fn renderer_options(&self) -> RendererOptions {
        RendererOptions {
            chromium_path: self.chromium_path.clone(),
            headless: self.headless,
            navigation_timeout: self.navigation_timeout,
            profile_root: self.temp_root.clone(),
        }
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            locator: self.locator,
            payload: self.payload,
            payload_backoff: self.payload_backoff,
            min_payload_len: self.min_payload_len,
            navigation_attempts: self.navigation_attempts,
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.string(name).map(PathBuf::from)
    }

    fn u64(&self, name: &str, default_value: u64) -> u64 {
        self.string(name)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default_value)
    }

    fn u32(&self, name: &str, default_value: u32) -> u32 {
        self.string(name)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default_value)
    }

    fn usize(&self, name: &str, default_value: usize) -> usize {
        self.string(name)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default_value)
    }
}
