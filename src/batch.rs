use crate::constants::{INTERRUPTED_EXIT_CODE, SIZE_PREFIX, SUCCESS_PREFIX};
use crate::engine::Engine;
use crate::error::{Result, ThumbnailError};
use crate::formats::{is_image_file, resolve_extension};
use crate::processing::{plan_invocation, process_task, FileTask, ThumbnailOptions};
use crate::utils::{calculate_compression_ratio, create_progress_bar, format_file_size};
use crate::validation::{prepare_output_dir, resolve_file_output, resolve_source, SourceKind};
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: Vec<(PathBuf, String)>,
    /// Tasks never started, or killed, because the run was interrupted.
    pub skipped: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed.len() + self.skipped
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped == 0
    }

    /// 0 when every file went through, 130 when interrupted, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.skipped > 0 {
            INTERRUPTED_EXIT_CODE
        } else if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn print(&self) {
        info!(
            "{} Done: {} image(s) processed",
            SUCCESS_PREFIX, self.processed
        );
        if self.processed > 0 {
            info!(
                "  {} Total size: {} -> {} ({:.1}% smaller)",
                SIZE_PREFIX,
                format_file_size(self.bytes_before),
                format_file_size(self.bytes_after),
                calculate_compression_ratio(self.bytes_before, self.bytes_after)
            );
        }
        info!("  ⏱️  Total time: {:.2?}", self.elapsed);

        if !self.failed.is_empty() {
            error!("{} of {} image(s) failed:", self.failed.len(), self.total());
            for (path, reason) in &self.failed {
                eprintln!("   {}: {}", path.display(), reason);
            }
        }
        if self.skipped > 0 {
            warn!("{} image(s) skipped after interrupt", self.skipped);
        }
    }
}

/// Lists image candidates under `root`. Subdirectories are only entered when
/// `recursive` is set; `exclude` prunes one directory (the output tree when
/// it lives inside the source). Order follows the directory listing.
pub fn collect_image_files(
    root: &Path,
    recursive: bool,
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root).min_depth(1).follow_links(true);
    let walker = if recursive {
        walker
    } else {
        walker.max_depth(1)
    };

    let mut image_files = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|e| Some(e.path()) != exclude)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_dangling_link(&e) => {
                if let Some(path) = e.path() {
                    warn!("Skipping {}: link target does not exist", path.display());
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            image_files.push(entry.into_path());
        }
    }

    Ok(image_files)
}

/// A followed symlink whose target is gone. Unreadable directories stay errors.
fn is_dangling_link(err: &walkdir::Error) -> bool {
    err.depth() > 0
        && err.path().is_some()
        && err
            .io_error()
            .map_or(false, |io| io.kind() == io::ErrorKind::NotFound)
}

/// `<output_dir>/<relative dir of input>/<stem><extension>`, mirroring the
/// input's position under `source_root`.
pub fn generate_output_path(
    input_path: &Path,
    source_root: &Path,
    output_dir: &Path,
    ext_override: Option<&str>,
) -> Result<PathBuf> {
    let file_stem = input_path
        .file_stem()
        .ok_or_else(|| ThumbnailError::InvalidFileName(input_path.to_path_buf()))?;

    let relative_dir = input_path
        .parent()
        .and_then(|parent| parent.strip_prefix(source_root).ok())
        .unwrap_or_else(|| Path::new(""));

    let mut output_filename = file_stem.to_os_string();
    output_filename.push(resolve_extension(input_path, ext_override));
    Ok(output_dir.join(relative_dir).join(output_filename))
}

/// Resolves source and output and produces the task list.
///
/// In directory mode the output directory is created before the walk, so it
/// exists even when no images are found. When two inputs map to the same
/// output (`a.JPG` and `a.jpg`, or `a.jpg` and `a.png` under `--ext .png`),
/// the later one carries `conflicts_with` and fails instead of overwriting.
pub fn plan_tasks(source: &Path, output: &Path, options: &ThumbnailOptions) -> Result<Vec<FileTask>> {
    let (source, kind) = resolve_source(source)?;
    let ext = options.ext.as_deref();

    match kind {
        SourceKind::File => {
            let output = resolve_file_output(&source, output, ext)?;
            Ok(vec![FileTask::new(source, output)])
        }
        SourceKind::Directory => {
            let output_dir = prepare_output_dir(output)?;
            let exclude = (output_dir != source && output_dir.starts_with(&source))
                .then_some(output_dir.as_path());

            // First input to claim an output path wins; later ones are marked.
            let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
            let mut tasks = Vec::new();
            for input in collect_image_files(&source, options.recursive, exclude)? {
                let output = generate_output_path(&input, &source, &output_dir, ext)?;
                let mut task = FileTask::new(input, output);
                match claimed.entry(task.output.clone()) {
                    Entry::Occupied(first) => task.conflicts_with = Some(first.get().clone()),
                    Entry::Vacant(slot) => {
                        slot.insert(task.input.clone());
                    }
                }
                tasks.push(task);
            }
            Ok(tasks)
        }
    }
}

/// Runs every task on a pool of `jobs` threads. A failing task is reported
/// and counted; it never stops the others.
pub fn run_tasks(
    engine: &Engine,
    tasks: &[FileTask],
    options: &ThumbnailOptions,
    jobs: usize,
) -> Result<BatchSummary> {
    let start_time = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.clamp(1, tasks.len().max(1)))
        .build()?;

    let progress = create_progress_bar(tasks.len() as u64);

    let results: Vec<Result<(u64, u64)>> = pool.install(|| {
        tasks
            .par_iter()
            .map(|task| {
                if let Ok(plan) = plan_invocation(task, options) {
                    verbose!("{} -> {} ({})", task.input.display(), task.output.display(), plan);
                }
                let result = process_task(engine, task, options);
                match &result {
                    Ok(_) => progress.set_message(file_label(&task.input)),
                    Err(ThumbnailError::Cancelled) => {}
                    Err(e) => progress.suspend(|| {
                        error!("Failed to process {}: {}", task.input.display(), e);
                    }),
                }
                progress.inc(1);
                result
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut summary = BatchSummary::default();
    for (task, result) in tasks.iter().zip(results) {
        match result {
            Ok((before, after)) => {
                summary.processed += 1;
                summary.bytes_before += before;
                summary.bytes_after += after;
            }
            Err(ThumbnailError::Cancelled) => summary.skipped += 1,
            Err(e) => summary.failed.push((task.input.clone(), e.to_string())),
        }
    }
    summary.elapsed = start_time.elapsed();
    Ok(summary)
}

/// Plans and runs a whole invocation. `Ok(None)` means there was nothing to do.
pub fn batch_thumbnail(
    source: &Path,
    output: &Path,
    options: &ThumbnailOptions,
    engine: &Engine,
    jobs: usize,
) -> Result<Option<BatchSummary>> {
    let tasks = plan_tasks(source, output, options)?;
    if tasks.is_empty() {
        return Ok(None);
    }

    info!("📁 Found {} image(s) to process", tasks.len());
    run_tasks(engine, &tasks, options, jobs).map(Some)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
