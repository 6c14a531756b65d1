use crate::constants::{DEFAULT_ENGINE_PROGRAM, DEFAULT_TIMEOUT_SECS, ENGINE_PROGRAM_ENV};
use crate::logger::Verbosity;
use crate::processing::ThumbnailOptions;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "thumbnail",
    about = "Batch image compressor and thumbnailer built on libvips",
    long_about = "thumbnail compresses and optionally resizes JPEG and PNG images by driving the \
                  libvips `vips` command. The source may be a single file or a directory; \
                  directories are mirrored into the output directory.",
    version,
    after_help = "EXAMPLES:\n  \
    thumbnail ./images ./out --quality 80\n  \
    thumbnail ./images ./out --size 400 --quality 80 --recursive\n  \
    thumbnail photo.jpg ./thumbs --size 256 --ext .png"
)]
pub struct Args {
    #[arg(help = "Source image file or directory")]
    pub source: PathBuf,

    #[arg(help = "Output file or directory")]
    pub output: PathBuf,

    #[arg(
        long,
        value_name = "1-100",
        help = "JPEG quality (1-100, default: 85)",
        long_help = "JPEG quality from 1 (smallest) to 100 (best). Out-of-range values are \
                     clamped; values that are not numbers fall back to 85."
    )]
    pub quality: Option<String>,

    #[arg(
        long,
        value_name = "PIXELS",
        help = "Maximum length of the longest side",
        long_help = "Resize so that the longest side fits within this many pixels, preserving \
                     aspect ratio. Images are never enlarged. Without it, dimensions are kept."
    )]
    pub size: Option<String>,

    #[arg(
        long,
        value_name = ".EXT",
        help = "Output extension (.jpg, .jpeg or .png)",
        long_help = "Write every output with this extension instead of the input's own. \
                     Decides the output format."
    )]
    pub ext: Option<String>,

    #[arg(short = 'r', long, help = "Process subdirectories recursively")]
    pub recursive: bool,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        help = "Number of parallel jobs (default: number of CPUs)"
    )]
    pub jobs: Option<String>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Timeout for each vips call, 0 to disable (default: 300)"
    )]
    pub timeout: Option<String>,

    #[arg(
        long,
        value_name = "PATH",
        env = ENGINE_PROGRAM_ENV,
        default_value = DEFAULT_ENGINE_PROGRAM,
        help = "vips executable to run"
    )]
    pub vips: PathBuf,

    #[arg(long, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short = 'v', long, help = "Print every vips command")]
    pub verbose: bool,
}

/// What the raw command line asks for.
#[derive(Debug)]
pub enum Invocation {
    Help,
    Version,
    Run(Box<Args>),
}

const VALUE_FLAGS: &[(&str, &str)] = &[
    ("--quality", "--quality"),
    ("--size", "--size"),
    ("--ext", "--ext"),
    ("--jobs", "--jobs"),
    ("-j", "--jobs"),
    ("--timeout", "--timeout"),
    ("--vips", "--vips"),
];

const SWITCH_FLAGS: &[(&str, &str)] = &[
    ("--recursive", "--recursive"),
    ("-r", "--recursive"),
    ("--quiet", "--quiet"),
    ("--verbose", "--verbose"),
    ("-v", "--verbose"),
];

/// Parses the command line permissively: unknown flags are dropped, a value
/// flag always takes the next token, only the first two positionals count,
/// and fewer than two positionals means "show help". The survivors are
/// rebuilt into a canonical argument list for clap.
pub fn parse_invocation<I, T>(raw: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut raw = raw.into_iter().map(Into::into);
    let program = raw.next().unwrap_or_else(|| OsString::from("thumbnail"));
    let tokens: Vec<OsString> = raw.collect();

    // Canonical flag name and rebuilt token; a repeated flag replaces the earlier one.
    let mut flags: Vec<(&'static str, OsString)> = Vec::new();
    let mut set_flag = |name: &'static str, token: OsString| {
        flags.retain(|(existing, _)| *existing != name);
        flags.push((name, token));
    };
    let mut positionals: Vec<OsString> = Vec::new();
    let mut only_positionals = false;
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        let text = token.to_string_lossy().into_owned();
        if only_positionals || !text.starts_with('-') || text == "-" {
            positionals.push(token);
            continue;
        }

        match text.as_str() {
            "--" => {
                only_positionals = true;
                continue;
            }
            "-h" | "--help" => return Ok(Invocation::Help),
            "-V" | "--version" => return Ok(Invocation::Version),
            _ => {}
        }

        let (name, inline_value) = match text.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (text.as_str(), None),
        };

        if let Some((_, canonical)) = VALUE_FLAGS.iter().find(|(alias, _)| *alias == name) {
            let value = match inline_value {
                Some(value) => Some(OsString::from(value)),
                None => iter.next(),
            };
            // An empty value reads as if the flag were absent.
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                let mut flag = OsString::from(format!("{}=", canonical));
                flag.push(value);
                set_flag(*canonical, flag);
            }
        } else if let Some((_, canonical)) = SWITCH_FLAGS.iter().find(|(alias, _)| *alias == name) {
            set_flag(*canonical, OsString::from(*canonical));
        }
        // Anything else is an unknown flag and is ignored.
    }

    if positionals.len() < 2 {
        return Ok(Invocation::Help);
    }

    let mut argv = vec![program];
    argv.extend(flags.into_iter().map(|(_, token)| token));
    argv.push(OsString::from("--"));
    argv.extend(positionals.into_iter().take(2));

    Args::try_parse_from(argv).map(|args| Invocation::Run(Box::new(args)))
}

/// Best-effort numeric parsing: anything unparsable reads as absent.
pub fn parse_lenient<T: FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Args {
    pub fn options(&self) -> ThumbnailOptions {
        ThumbnailOptions::new(
            parse_lenient(self.quality.as_deref()),
            parse_lenient(self.size.as_deref()),
            self.ext.as_deref(),
            self.recursive,
        )
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    /// Worker count; missing, invalid or zero means one per CPU.
    pub fn jobs(&self) -> usize {
        parse_lenient::<usize>(self.jobs.as_deref())
            .filter(|&jobs| jobs > 0)
            .unwrap_or_else(num_cpus::get)
    }

    /// Per-call engine timeout; `None` when disabled with 0.
    pub fn timeout(&self) -> Option<Duration> {
        let secs = parse_lenient::<u64>(self.timeout.as_deref()).unwrap_or(DEFAULT_TIMEOUT_SECS);
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}
