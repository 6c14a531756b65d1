use crate::constants::{
    DEFAULT_QUALITY, INTERMEDIATE_SUFFIX, MAX_QUALITY, MIN_QUALITY, PNG_COMPRESSION_LEVEL,
    STAGING_PREFIX,
};
use crate::engine::{Engine, EngineCommand};
use crate::error::{Result, ThumbnailError};
use crate::formats::{lowercase_extension, normalize_extension, OutputFormat};
use std::fmt;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Immutable per-run settings shared by every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailOptions {
    pub quality: u8,
    pub size: Option<NonZeroU32>,
    pub ext: Option<String>,
    pub recursive: bool,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            size: None,
            ext: None,
            recursive: false,
        }
    }
}

impl ThumbnailOptions {
    /// Builds options from loosely-validated input: quality is clamped into
    /// range, a non-positive size means "keep dimensions", an empty extension
    /// means "keep the input's extension".
    pub fn new(quality: Option<i64>, size: Option<i64>, ext: Option<&str>, recursive: bool) -> Self {
        Self {
            quality: clamp_quality(quality),
            size: size
                .and_then(|s| u32::try_from(s).ok())
                .and_then(NonZeroU32::new),
            ext: ext.and_then(normalize_extension),
            recursive,
        }
    }
}

pub fn clamp_quality(quality: Option<i64>) -> u8 {
    match quality {
        Some(q) => q.clamp(MIN_QUALITY as i64, MAX_QUALITY as i64) as u8,
        None => DEFAULT_QUALITY,
    }
}

/// A single input file and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Input of an earlier task that writes the same output.
    pub conflicts_with: Option<PathBuf>,
}

impl FileTask {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            conflicts_with: None,
        }
    }
}

/// How one file gets from its input to its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationPlan {
    /// PNG to PNG without resizing: re-encoding only tends to grow the file.
    CopyVerbatim,
    /// A single save straight from the input.
    Save(SaveStep),
    /// `thumbnail` into an intermediate, then save from it.
    ResizeThenSave { size: NonZeroU32, save: SaveStep },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Jpeg { quality: u8 },
    Png { compression: u8 },
}

impl SaveStep {
    pub fn format(&self) -> OutputFormat {
        match self {
            SaveStep::Jpeg { .. } => OutputFormat::Jpeg,
            SaveStep::Png { .. } => OutputFormat::Png,
        }
    }

    pub fn command(&self, input: &Path, output: &Path) -> EngineCommand {
        match *self {
            SaveStep::Jpeg { quality } => EngineCommand::jpegsave(input, output, quality),
            SaveStep::Png { compression } => EngineCommand::pngsave(input, output, compression),
        }
    }
}

impl fmt::Display for SaveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStep::Jpeg { quality } => write!(f, "{} save, quality {}", self.format(), quality),
            SaveStep::Png { compression } => {
                write!(f, "{} save, compression {}", self.format(), compression)
            }
        }
    }
}

impl fmt::Display for InvocationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationPlan::CopyVerbatim => write!(f, "verbatim copy"),
            InvocationPlan::Save(save) => write!(f, "{}", save),
            InvocationPlan::ResizeThenSave { size, save } => {
                write!(f, "fit within {}px, then {}", size, save)
            }
        }
    }
}

/// Chooses the plan from the output extension, the input extension and the options.
pub fn plan_invocation(task: &FileTask, options: &ThumbnailOptions) -> Result<InvocationPlan> {
    let save = match OutputFormat::from_path(&task.output)? {
        OutputFormat::Jpeg => SaveStep::Jpeg {
            quality: options.quality,
        },
        OutputFormat::Png => SaveStep::Png {
            compression: PNG_COMPRESSION_LEVEL,
        },
    };

    let plan = match (options.size, save) {
        (Some(size), save) => InvocationPlan::ResizeThenSave { size, save },
        (None, SaveStep::Png { .. })
            if lowercase_extension(&task.input).as_deref() == Some("png") =>
        {
            InvocationPlan::CopyVerbatim
        }
        (None, save) => InvocationPlan::Save(save),
    };
    Ok(plan)
}

/// The engine commands a plan expands to, given the paths it reads and writes.
/// `intermediate` is only consulted for [`InvocationPlan::ResizeThenSave`].
pub fn plan_commands(
    plan: &InvocationPlan,
    input: &Path,
    intermediate: &Path,
    output: &Path,
) -> Vec<EngineCommand> {
    match plan {
        InvocationPlan::CopyVerbatim => Vec::new(),
        InvocationPlan::Save(save) => vec![save.command(input, output)],
        InvocationPlan::ResizeThenSave { size, save } => vec![
            EngineCommand::thumbnail(input, intermediate, size.get()),
            save.command(intermediate, output),
        ],
    }
}

/// Runs one task to completion and returns `(input_bytes, output_bytes)`.
///
/// The final file is written to a hidden sibling and renamed over the output,
/// so a failed or interrupted task never leaves a partial output behind. The
/// resize intermediate is removed when this returns, on success or failure.
pub fn process_task(
    engine: &Engine,
    task: &FileTask,
    options: &ThumbnailOptions,
) -> Result<(u64, u64)> {
    if engine.is_cancelled() {
        return Err(ThumbnailError::Cancelled);
    }
    if let Some(first) = &task.conflicts_with {
        return Err(ThumbnailError::OutputConflict {
            output: task.output.clone(),
            first: first.clone(),
        });
    }

    let plan = plan_invocation(task, options)?;
    let input_size = fs::metadata(&task.input)?.len();

    let output_dir = task
        .output
        .parent()
        .ok_or_else(|| ThumbnailError::InvalidFileName(task.output.clone()))?;
    fs::create_dir_all(output_dir).map_err(|source| ThumbnailError::DirectoryCreationFailed {
        path: output_dir.to_path_buf(),
        source,
    })?;

    if plan == InvocationPlan::CopyVerbatim && is_same_file(&task.input, &task.output) {
        return Ok((input_size, input_size));
    }

    let staged = temp_path_in(output_dir, ".tmp")?;
    match &plan {
        InvocationPlan::CopyVerbatim => {
            fs::copy(&task.input, &staged)?;
        }
        InvocationPlan::Save(_) => {
            for command in plan_commands(&plan, &task.input, &staged, &staged) {
                engine.run(&command)?;
            }
        }
        InvocationPlan::ResizeThenSave { .. } => {
            let intermediate = temp_path_in(output_dir, INTERMEDIATE_SUFFIX)?;
            for command in plan_commands(&plan, &task.input, &intermediate, &staged) {
                engine.run(&command)?;
            }
        }
    }

    publish_permissions(&staged)?;
    staged.persist(&task.output).map_err(|e| e.error)?;
    let output_size = fs::metadata(&task.output)?.len();
    Ok((input_size, output_size))
}

/// Reserves a temporary path in `dir`; the file is deleted when the handle drops.
fn temp_path_in(dir: &Path, suffix: &str) -> Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(suffix)
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

/// Temp files are created owner-only; outputs get ordinary file permissions.
#[cfg(unix)]
fn publish_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn publish_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(size: Option<i64>) -> ThumbnailOptions {
        ThumbnailOptions::new(Some(80), size, None, false)
    }

    #[test]
    fn test_thumbnail_options_default() {
        let options = ThumbnailOptions::new(None, None, None, false);
        assert_eq!(options, ThumbnailOptions::default());
        assert_eq!(options.quality, 85);
        assert_eq!(options.size, None);
        assert_eq!(options.ext, None);
    }

    #[test]
    fn test_thumbnail_options_clamps_quality() {
        assert_eq!(ThumbnailOptions::new(Some(0), None, None, false).quality, 1);
        assert_eq!(ThumbnailOptions::new(Some(-20), None, None, false).quality, 1);
        assert_eq!(ThumbnailOptions::new(Some(150), None, None, false).quality, 100);
        assert_eq!(ThumbnailOptions::new(Some(70), None, None, false).quality, 70);
    }

    #[test]
    fn test_thumbnail_options_size() {
        assert_eq!(
            ThumbnailOptions::new(None, Some(300), None, false).size,
            NonZeroU32::new(300)
        );
        assert_eq!(ThumbnailOptions::new(None, Some(0), None, false).size, None);
        assert_eq!(ThumbnailOptions::new(None, Some(-5), None, false).size, None);
        assert_eq!(
            ThumbnailOptions::new(None, Some(i64::MAX), None, false).size,
            None
        );
    }

    #[test]
    fn test_thumbnail_options_ext() {
        let options = ThumbnailOptions::new(None, None, Some("PNG"), true);
        assert_eq!(options.ext.as_deref(), Some(".png"));
        assert!(options.recursive);

        assert_eq!(ThumbnailOptions::new(None, None, Some(""), false).ext, None);
    }

    #[test]
    fn test_plan_jpeg_with_resize() {
        let task = FileTask::new("/in/a.png", "/out/a.jpg");
        let plan = plan_invocation(&task, &options(Some(400))).unwrap();
        assert_eq!(
            plan,
            InvocationPlan::ResizeThenSave {
                size: NonZeroU32::new(400).unwrap(),
                save: SaveStep::Jpeg { quality: 80 },
            }
        );
    }

    #[test]
    fn test_plan_jpeg_without_resize() {
        let task = FileTask::new("/in/a.JPG", "/out/a.jpeg");
        let plan = plan_invocation(&task, &options(None)).unwrap();
        assert_eq!(plan, InvocationPlan::Save(SaveStep::Jpeg { quality: 80 }));
    }

    #[test]
    fn test_plan_png_with_resize() {
        let task = FileTask::new("/in/a.png", "/out/a.png");
        let plan = plan_invocation(&task, &options(Some(64))).unwrap();
        assert_eq!(
            plan,
            InvocationPlan::ResizeThenSave {
                size: NonZeroU32::new(64).unwrap(),
                save: SaveStep::Png { compression: 9 },
            }
        );
    }

    #[test]
    fn test_plan_png_copy_only_for_png_input() {
        let task = FileTask::new("/in/a.PNG", "/out/a.png");
        assert_eq!(
            plan_invocation(&task, &options(None)).unwrap(),
            InvocationPlan::CopyVerbatim
        );

        let task = FileTask::new("/in/photo.jpg", "/out/photo.png");
        assert_eq!(
            plan_invocation(&task, &options(None)).unwrap(),
            InvocationPlan::Save(SaveStep::Png { compression: 9 })
        );
    }

    #[test]
    fn test_plan_unsupported_output() {
        let task = FileTask::new("/in/a.jpg", "/out/a.webp");
        let result = plan_invocation(&task, &options(None));
        assert!(matches!(result, Err(ThumbnailError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_plan_commands_resize_then_save() {
        let plan = InvocationPlan::ResizeThenSave {
            size: NonZeroU32::new(300).unwrap(),
            save: SaveStep::Jpeg { quality: 90 },
        };
        let commands = plan_commands(
            &plan,
            Path::new("in.jpg"),
            Path::new("mid.v"),
            Path::new("out.jpg"),
        );
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].operation, "thumbnail");
        assert_eq!(commands[0].args[1], Path::new("mid.v").as_os_str());
        assert_eq!(commands[1].operation, "jpegsave");
        assert_eq!(commands[1].args[0], Path::new("mid.v").as_os_str());
        assert!(commands[1].has_arg("--Q=90"));
    }

    #[test]
    fn test_plan_display() {
        let plan = InvocationPlan::ResizeThenSave {
            size: NonZeroU32::new(300).unwrap(),
            save: SaveStep::Jpeg { quality: 85 },
        };
        assert_eq!(plan.to_string(), "fit within 300px, then JPEG save, quality 85");
        assert_eq!(InvocationPlan::CopyVerbatim.to_string(), "verbatim copy");
    }

    #[test]
    fn test_plan_commands_copy_has_none() {
        let commands = plan_commands(
            &InvocationPlan::CopyVerbatim,
            Path::new("a.png"),
            Path::new("mid.v"),
            Path::new("b.png"),
        );
        assert!(commands.is_empty());
    }

    #[test]
    fn test_process_task_copies_png_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("icon.png");
        let bytes = b"\x89PNG\r\n\x1a\nnot really a png";
        fs::write(&input, bytes).unwrap();
        let output = temp_dir.path().join("out").join("nested").join("icon.png");

        // The copy plan never touches the engine.
        let engine = Engine::new("/nonexistent/vips");
        let task = FileTask::new(&input, &output);
        let (before, after) = process_task(&engine, &task, &options(None)).unwrap();

        assert_eq!(fs::read(&output).unwrap(), bytes);
        assert_eq!(before, bytes.len() as u64);
        assert_eq!(after, bytes.len() as u64);
    }

    #[test]
    fn test_process_task_refuses_conflicting_output() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("a.png");
        fs::write(&input, b"png bytes").unwrap();
        let output = temp_dir.path().join("out").join("a.png");

        let mut task = FileTask::new(&input, &output);
        task.conflicts_with = Some(temp_dir.path().join("a.jpg"));
        let result = process_task(&Engine::new("/nonexistent/vips"), &task, &options(None));

        match result {
            Err(ThumbnailError::OutputConflict { output: out, first }) => {
                assert_eq!(out, output);
                assert!(first.ends_with("a.jpg"));
            }
            other => panic!("expected OutputConflict, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_process_task_copy_onto_itself_keeps_file() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("icon.png");
        fs::write(&input, b"png bytes").unwrap();

        let engine = Engine::new("/nonexistent/vips");
        let task = FileTask::new(&input, &input);
        process_task(&engine, &task, &options(None)).unwrap();

        assert_eq!(fs::read(&input).unwrap(), b"png bytes");
    }

    #[test]
    fn test_process_task_unsupported_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("a.jpg");
        fs::write(&input, b"jpeg bytes").unwrap();
        let out_dir = temp_dir.path().join("out");
        let output = out_dir.join("a.gif");

        let engine = Engine::new("/nonexistent/vips");
        let result = process_task(&engine, &FileTask::new(&input, &output), &options(None));

        assert!(matches!(result, Err(ThumbnailError::UnsupportedFormat(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_process_task_engine_failure_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("a.jpg");
        fs::write(&input, b"jpeg bytes").unwrap();
        let out_dir = temp_dir.path().join("out");
        let output = out_dir.join("a.jpg");

        let engine = Engine::new("/nonexistent/vips");
        let result = process_task(&engine, &FileTask::new(&input, &output), &options(Some(100)));

        assert!(matches!(result, Err(ThumbnailError::EngineLaunch { .. })));
        assert!(!output.exists());
        // Neither the staged output nor the intermediate survives.
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);
    }
}
