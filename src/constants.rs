use std::time::Duration;

pub const DEFAULT_QUALITY: u8 = 85;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// zlib level handed to `pngsave`; PNG output is always written at maximum effort.
pub const PNG_COMPRESSION_LEVEL: u8 = 9;

pub const DEFAULT_ENGINE_PROGRAM: &str = "vips";
pub const ENGINE_PROGRAM_ENV: &str = "THUMBNAIL_VIPS";
pub const ENGINE_PROBE_ARG: &str = "-l";
pub const ENGINE_INSTALL_HINT: &str =
    "install libvips first (macOS: `brew install vips`, Debian/Ubuntu: `apt install libvips-tools`)";

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const ENGINE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Suffix of the libvips native format, used for resize intermediates.
pub const INTERMEDIATE_SUFFIX: &str = ".v";
pub const STAGING_PREFIX: &str = ".thumbnail-";

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}";

pub const INTERRUPTED_EXIT_CODE: u8 = 130;

// Common output message prefixes
pub const SUCCESS_PREFIX: &str = "✅";
pub const WARNING_PREFIX: &str = "⚠️ ";
pub const ERROR_PREFIX: &str = "❌";
pub const VERBOSE_PREFIX: &str = "🔍";
pub const SIZE_PREFIX: &str = "📊";
