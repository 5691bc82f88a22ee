// ============================================================================
// StickerFE CLI — headless compositing via command-line arguments
// ============================================================================
//
// Usage examples:
//   stickerfe --input decorated.sfe --output flat.png
//   stickerfe -i photo.jpg -s logo.png -o out.png        (overlay + flatten)
//   stickerfe -i *.sfe --output-dir exports/ --format jpeg --quality 85
//   stickerfe -i doc.sfe --scale 0.5 -o half.png         (rescale then flatten)
//
// No GUI is opened in CLI mode. Documents keep their saved sticker
// placements; plain-image inputs get any --sticker overlays placed centered.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::CanvasState;
use crate::io::{self, ExportFormat};
use crate::ops::transform::OriginAngle;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// StickerFE headless compositor.
///
/// Flatten sticker documents (or overlay stickers onto plain images) without
/// opening the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "stickerfe",
    about = "StickerFE headless sticker compositor",
    long_about = "Flatten .sfe sticker documents to PNG or JPEG, or place sticker\n\
                  images onto plain photos, without opening the GUI.\n\n\
                  Example:\n  \
                  stickerfe --input decorated.sfe --output flat.png\n  \
                  stickerfe -i *.sfe --output-dir exports/ --format jpeg"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.sfe", "shots/*.jpg").
    /// .sfe documents keep their stickers; all other formats load as a bare photo.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Sticker image(s) to place centered on each input photo.
    #[arg(short = 's', long, value_name = "IMAGE")]
    pub sticker: Vec<PathBuf>,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png or jpeg.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Rescale the canvas (and every sticker with it) by this factor before
    /// flattening.
    #[arg(long, default_value_t = 1.0, value_name = "FACTOR")]
    pub scale: f32,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if args.scale <= 0.0 {
        eprintln!("error: --scale must be positive.");
        return ExitCode::FAILURE;
    }

    let format = parse_format(args.format.as_deref(), args.output.as_deref());

    // Create output directory if specified
    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "error: could not create output directory '{}': {}",
                dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
        ) {
            Some(p) => p,
            None => {
                eprintln!(
                    "  error: cannot determine output path for '{}'.",
                    input_path.display()
                );
                any_failure = true;
                continue;
            }
        };

        match run_one(input_path, &output_path, &args.sticker, args.scale, format, args.quality) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    stickers: &[PathBuf],
    scale: f32,
    format: ExportFormat,
    quality: u8,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let is_document = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sfe"));

    let mut state = if is_document {
        io::load_sfe(input).map_err(|e| format!("load failed: {}", e))?
    } else {
        let photo = io::load_photo(input).map_err(|e| format!("load failed: {}", e))?;
        CanvasState::new(photo)
    };

    // -- Step 2: Place overlay stickers (optional) -----------------------
    let now = Instant::now();
    for path in stickers {
        let img = io::load_sticker_image(path)
            .map_err(|e| format!("sticker '{}' load failed: {}", path.display(), e))?;
        state.add_sticker(img, 1.0, OriginAngle::Deg0, now);
    }

    // -- Step 3: Rescale (optional) --------------------------------------
    if (scale - 1.0).abs() > f32::EPSILON {
        state.resize_canvas(scale);
    }

    // -- Step 4: Flatten + save ------------------------------------------
    let flat = state.composite();
    io::export_image(&flat, output, format, quality).map_err(|e| format!("save failed: {}", e))
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
            // Literal path — use directly
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        // Treat as glob pattern
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

/// Choose the [`ExportFormat`] from the `--format` string or infer it from
/// the output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> ExportFormat {
    if let Some(f) = format_arg {
        return match f.to_lowercase().as_str() {
            "jpeg" | "jpg" => ExportFormat::Jpeg,
            _ => ExportFormat::Png,
        };
    }

    if let Some(out) = output {
        return ExportFormat::from_path(out);
    }

    ExportFormat::Png
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
    format: ExportFormat,
) -> Option<PathBuf> {
    // Explicit output path
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    // Write next to the input file
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
mod tests {
    use super::*;

    #[test]
    fn test_parse_format_prefers_explicit_flag() {
        assert_eq!(
            parse_format(Some("jpeg"), Some(Path::new("out.png"))),
            ExportFormat::Jpeg
        );
        assert_eq!(parse_format(None, Some(Path::new("out.jpg"))), ExportFormat::Jpeg);
        assert_eq!(parse_format(None, None), ExportFormat::Png);
    }

    #[test]
    fn test_build_output_path_avoids_input_collision() {
        let input = Path::new("dir/photo.png");
        let out = build_output_path(input, None, None, ExportFormat::Png).unwrap();
        assert_eq!(out, Path::new("dir/photo_out.png"));

        let out = build_output_path(input, None, None, ExportFormat::Jpeg).unwrap();
        assert_eq!(out, Path::new("dir/photo.jpg"));
    }

    #[test]
    fn test_build_output_path_batch_dir() {
        let input = Path::new("a/b/doc.sfe");
        let out =
            build_output_path(input, None, Some(Path::new("exports")), ExportFormat::Png).unwrap();
        assert_eq!(out, Path::new("exports/doc.png"));
    }
}
