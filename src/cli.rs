// ============================================================================
// PixelForge CLI - headless batch editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   PixelForge -i photo.png --tool enhance -o result.png
//   PixelForge -i shots/*.jpg --tool remove-background --output-dir out/
//   PixelForge -i room.png --tool generative-fill --mask mask.png --prompt "a red sofa"
//   PixelForge -i portrait.jpg --tool replace-background --bg-mode color --bg-color "#0a84ff"
//   PixelForge -i photo.png --tool download --format jpeg --quality 85 --scale 0.5
//
// Each file runs through the same session pipeline the editor uses: intake
// validation, set image, select tool and inputs, one edit request, export.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use crate::components::mask::MaskRasterizer;
use crate::components::tools::{BackgroundMode, DownloadFormat, DownloadOptionsUpdate, Tool};
use crate::io::{EncodedImage, is_heic_base64, mime_for_extension};
use crate::ops::ai::{AiExecutor, EditBackend, HttpBackend, OperationOutcome};
use crate::session::{EditorSession, lock_session};
use crate::settings::EditorSettings;
use crate::validation::{
    ValidationError, validate_dimensions, validate_file_format, validate_file_size,
};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelForge headless image editor.
///
/// Apply one AI edit tool to image files without opening the editor.
#[derive(Parser, Debug)]
#[command(
    name = "PixelForge",
    version,
    about = "PixelForge headless AI image editor",
    long_about = "Apply an AI edit (enhance, background removal or replacement,\n\
                  generative fill, object removal) to image files through the\n\
                  configured edit service, or just re-export them.\n\n\
                  Example:\n  \
                  PixelForge --input photo.png --tool enhance --output result.png\n  \
                  PixelForge -i *.jpg --tool remove-background --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Edit tool: enhance, remove-background, replace-background,
    /// generative-fill, remove-object, download.
    #[arg(short, long, value_name = "TOOL")]
    pub tool: Tool,

    /// Text prompt (generative fill, prompt-mode background replacement).
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Mask image for generative fill / remove object. White = selected.
    #[arg(short, long, value_name = "FILE")]
    pub mask: Option<PathBuf>,

    /// Background replacement mode: prompt, color, upload.
    #[arg(long, default_value = "prompt", value_name = "MODE")]
    pub bg_mode: BackgroundMode,

    /// Background color for --bg-mode color.
    #[arg(long, value_name = "COLOR")]
    pub bg_color: Option<String>,

    /// Background image for --bg-mode upload.
    #[arg(long, value_name = "FILE")]
    pub bg_image: Option<PathBuf>,

    /// Request face enhancement (enhance tool).
    #[arg(long)]
    pub face_enhance: bool,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg. Inferred from --output's extension when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Output scale relative to the edited image (e.g. 0.5, 2).
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,

    /// Edit service base URL (overrides settings).
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Log to stderr at debug level and print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Per-run options shared by every file.
struct RunOptions<'a> {
    tool: Tool,
    prompt: Option<&'a str>,
    mask: Option<&'a Path>,
    bg_mode: BackgroundMode,
    bg_color: Option<&'a str>,
    bg_image: Option<&'a EncodedImage>,
    face_enhance: bool,
    download: DownloadOptionsUpdate,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub async fn run(args: CliArgs, mut settings: EditorSettings) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(url) = &args.endpoint {
        settings.api_base_url = url.clone();
    }
    let backend: Arc<dyn EditBackend> = match HttpBackend::from_settings(&settings) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let executor = AiExecutor::new(backend);

    let format = parse_format(args.format.as_deref(), args.output.as_deref());

    let bg_image = match &args.bg_image {
        Some(path) => match read_encoded(path) {
            Ok((image, _)) => Some(image),
            Err(e) => {
                eprintln!("error: background image '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let options = RunOptions {
        tool: args.tool,
        prompt: args.prompt.as_deref(),
        mask: args.mask.as_deref(),
        bg_mode: args.bg_mode,
        bg_color: args.bg_color.as_deref(),
        bg_image: bg_image.as_ref(),
        face_enhance: args.face_enhance,
        download: DownloadOptionsUpdate {
            format: Some(format),
            quality: Some(args.quality),
            scale: Some(args.scale),
        },
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &options, &executor, &settings).await {
            Ok(()) => {
                tracing::info!(input = %input_path.display(), output = %output_path.display(), "cli: file done");
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                tracing::warn!(input = %input_path.display(), error = %e, "cli: file failed");
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

async fn run_one(
    input: &Path,
    output: &Path,
    options: &RunOptions<'_>,
    executor: &AiExecutor,
    settings: &EditorSettings,
) -> Result<(), String> {
    // -- Step 1: Intake --------------------------------------------------
    let (image, (width, height)) = read_encoded(input)?;

    let mut session = EditorSession::with_settings(settings);
    session.set_image(image, width, height);

    // -- Step 2: Tool and inputs -----------------------------------------
    // Selecting the tool clears mask and prompt, so it goes first.
    session.set_active_tool(Some(options.tool));
    if let Some(prompt) = options.prompt {
        session.set_prompt(prompt);
    }
    session.set_background_mode(options.bg_mode);
    if let Some(color) = options.bg_color {
        session.set_background_color(color);
    }
    session.set_background_image(options.bg_image.cloned());
    session.set_face_enhance(options.face_enhance);
    session.set_download_options(options.download);
    if let Some(mask_path) = options.mask {
        let mask = load_mask(mask_path, width, height)?;
        session.set_mask_data(Some(mask));
    }

    // -- Step 3: Edit ----------------------------------------------------
    let session = session.into_shared();
    if options.tool != Tool::Download {
        match executor.run_active_tool(&session).await {
            OperationOutcome::Committed { .. } => {}
            OperationOutcome::Failed(e) => return Err(e.to_string()),
            OperationOutcome::Busy | OperationOutcome::Superseded => {
                return Err("edit did not complete".to_string());
            }
        }
    }

    // -- Step 4: Export --------------------------------------------------
    let artifact = lock_session(&session)
        .download()
        .map_err(|e| format!("export failed: {}", e))?;
    std::fs::write(output, &artifact.bytes)
        .map_err(|e| format!("write failed: {}", e))?;
    Ok(())
}

/// Read an image file through upload validation (size, format, dimensions).
fn read_encoded(path: &Path) -> Result<(EncodedImage, (u32, u32)), String> {
    let bytes = std::fs::read(path).map_err(|e| format!("read failed: {}", e))?;
    validate_file_size(bytes.len() as u64).map_err(|e| e.to_string())?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mime = mime_for_extension(ext)
        .ok_or_else(|| ValidationError::UnsupportedFormat(format!(".{ext}")).to_string())?;
    validate_file_format(mime).map_err(|e| e.to_string())?;

    let image = EncodedImage::from_bytes(&bytes, mime);
    // Detected by content: a renamed HEIC file still needs converting.
    if is_heic_base64(image.payload()) {
        return Err("HEIC images can't be decoded here; convert to PNG or JPEG first".to_string());
    }
    let (width, height) = image
        .dimensions()
        .map_err(|e| format!("decode failed: {}", e))?;
    validate_dimensions(width, height).map_err(|e| e.to_string())?;
    Ok((image, (width, height)))
}

/// Load a mask file and normalise it to the editor's mask encoding.
fn load_mask(path: &Path, width: u32, height: u32) -> Result<EncodedImage, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("mask read failed: {}", e))?;
    let mime = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(mime_for_extension)
        .unwrap_or("image/png");
    let raster = MaskRasterizer::from_encoded(&EncodedImage::from_bytes(&bytes, mime))
        .map_err(|e| format!("mask decode failed: {}", e))?;
    if raster.dimensions() != (width, height) {
        return Err(format!(
            "mask is {}x{} but the image is {}x{}",
            raster.width(),
            raster.height(),
            width,
            height
        ));
    }
    raster.export().map_err(|e| format!("mask encode failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`DownloadFormat`] from the `--format` string or infer it from
/// the output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> DownloadFormat {
    if let Some(f) = format_arg {
        return f.parse().unwrap_or_default();
    }

    output
        .and_then(|out| out.extension())
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse().ok())
        .unwrap_or_default()
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: DownloadFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    // Avoid silent overwrite of the input
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
