use crate::crawler::{DEFAULT_MAX_PAGES, EXHAUSTION_THRESHOLD};
use crate::extract::ExtractionMode;
use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub extract: ExtractConfig,
    pub output: OutputConfig,
    pub sink: SinkConfig,
}

/// Where the catalog lives and how its pages are recognized
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Site root, e.g. "https://www.futwiz.com"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the paginated listing, e.g. "/en/fc24/players"
    #[serde(rename = "listing-path")]
    pub listing_path: String,

    /// Query parameter carrying the page index
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// Substring every detail-page href contains, e.g. "/en/fc24/player/"
    #[serde(rename = "detail-marker")]
    pub detail_marker: String,

    /// Substring that marks an href as a pagination link
    #[serde(rename = "pagination-marker", default = "default_pagination_marker")]
    pub pagination_marker: String,

    /// Safety bound on listing pages visited
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// A listing page with this many qualifying links or fewer ends pagination
    #[serde(rename = "exhaustion-threshold", default = "default_exhaustion_threshold")]
    pub exhaustion_threshold: usize,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// HTTP behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum time between two requests (milliseconds)
    #[serde(rename = "request-delay-ms", default)]
    pub request_delay_ms: u64,

    /// Retries for timeouts and 5xx responses
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause before each retry (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Detail pages fetched in parallel; 1 keeps the run strictly sequential
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Whether robots.txt is fetched and honored
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: 0,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            concurrency: default_concurrency(),
            respect_robots: true,
        }
    }
}

/// Detail extraction settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Which record shape to extract
    pub mode: ExtractionMode,

    /// Collapse whitespace runs inside raw text blocks
    #[serde(rename = "normalize-whitespace", default)]
    pub normalize_whitespace: bool,

    /// Consecutive extraction failures before a markup change is reported
    #[serde(rename = "escalate-after", default = "default_escalate_after")]
    pub escalate_after: u32,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// CSS selectors anchoring each extracted field
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_name_selector")]
    pub name: String,

    #[serde(default = "default_price_selector")]
    pub price: String,

    #[serde(default = "default_stats_selector")]
    pub stats: String,

    #[serde(default = "default_details_selector")]
    pub details: String,

    #[serde(rename = "style-tags", default = "default_style_tags_selector")]
    pub style_tags: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            name: default_name_selector(),
            price: default_price_selector(),
            stats: default_stats_selector(),
            details: default_details_selector(),
            style_tags: default_style_tags_selector(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the CSV artifact is written into
    pub directory: String,

    /// File name prefix of the artifact
    #[serde(rename = "artifact-prefix", default = "default_artifact_prefix")]
    pub artifact_prefix: String,
}

/// Where the finished artifact is persisted
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    S3(S3SinkConfig),
    Local(LocalSinkConfig),
}

/// S3-compatible object store
#[derive(Debug, Clone, Deserialize)]
pub struct S3SinkConfig {
    pub bucket: String,

    /// Overrides `https://s3.{region}.amazonaws.com`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// TOML file holding region and keys
    #[serde(rename = "credentials-path")]
    pub credentials_path: String,
}

/// Directory acting as the object store
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSinkConfig {
    pub directory: String,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_pagination_marker() -> String {
    "page=".to_string()
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_exhaustion_threshold() -> usize {
    EXHAUSTION_THRESHOLD
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_concurrency() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_escalate_after() -> u32 {
    5
}

fn default_name_selector() -> String {
    ".playername".to_string()
}

fn default_price_selector() -> String {
    ".price-num".to_string()
}

fn default_stats_selector() -> String {
    ".player-stats-grid".to_string()
}

fn default_details_selector() -> String {
    ".player-details-inner".to_string()
}

fn default_style_tags_selector() -> String {
    ".player-playstyle-info".to_string()
}

fn default_artifact_prefix() -> String {
    "catalog".to_string()
}
