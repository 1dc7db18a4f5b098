use crate::{
    density::{Density, ResourceType},
    tools::{Compressor, Rasterizer},
    transform::{transform_file, TransformParams},
};
use anyhow::{Context, Result};
use std::{
    fs::{self, create_dir_all},
    path::{Path, PathBuf},
};

#[derive(Debug)]
pub struct Options {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Height of the mdpi variant in pixels
    pub size: u32,
    pub suffix: String,
    pub transform: TransformParams,
    pub resource_type: ResourceType,
    pub densities: Vec<Density>,
}

/// Transform the input SVG once, then render it for every density.
///
/// A density that fails is reported and skipped; the remaining densities are
/// still generated and the run fails at the end. Returns the written PNG paths.
pub fn generate_pngs(
    opts: &Options,
    rasterizer: &dyn Rasterizer,
    compressor: Option<&dyn Compressor>,
) -> Result<Vec<PathBuf>> {
    let name = base_name(&opts.input)?;

    let transformed = tempfile::Builder::new()
        .prefix("pngs-from-svg")
        .suffix(".svg")
        .tempfile()
        .context("Failed to create temporary SVG")?;
    transform_file(&opts.input, transformed.path(), &opts.transform)?;
    tracing::debug!("Transformed SVG written to {}", transformed.path().display());

    let mut generated = Vec::new();
    let mut failed = Vec::new();

    for density in &opts.densities {
        match export_density(
            transformed.path(),
            opts,
            density,
            &name,
            rasterizer,
            compressor,
        ) {
            Ok(path) => generated.push(path),
            Err(err) => {
                tracing::error!("{}: {err:#}", density.name);
                failed.push(density.name.as_str());
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!(
            "Failed to generate {} of {} densities: {}",
            failed.len(),
            opts.densities.len(),
            failed.join(", ")
        );
    }

    Ok(generated)
}

fn export_density(
    svg: &Path,
    opts: &Options,
    density: &Density,
    name: &str,
    rasterizer: &dyn Rasterizer,
    compressor: Option<&dyn Compressor>,
) -> Result<PathBuf> {
    let dir = opts.output.join(density.dir_name(opts.resource_type));
    create_dir_all(&dir)
        .with_context(|| format!("Can't create output directory {}", dir.display()))?;

    let output = dir.join(format!("{name}{}.png", opts.suffix));
    let height = density.height_for(opts.size);
    println!("{} -> {}", opts.input.display(), output.display());

    // A stale file from an earlier run must not pass for fresh output
    if output.exists() {
        fs::remove_file(&output)
            .with_context(|| format!("Failed to remove old {}", output.display()))?;
    }

    rasterizer
        .rasterize(svg, height, &output)
        .with_context(|| format!("Failed to rasterize at {height}px"))?;
    check_png(&output, height)?;

    if let Some(compressor) = compressor {
        compress_in_place(&output, compressor)?;
    }

    Ok(output)
}

fn check_png(path: &Path, height: u32) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("Rasterizer did not produce {}", path.display());
    }

    let (actual_width, actual_height) = image::image_dimensions(path)
        .with_context(|| format!("Rasterizer produced an unreadable PNG {}", path.display()))?;
    if actual_height != height {
        tracing::warn!(
            "{} is {actual_width}x{actual_height}, expected a height of {height}",
            path.display()
        );
    }

    Ok(())
}

/// Recompress `png` through a scratch copy, since the compressor may not write over its input.
/// If compression fails the uncompressed PNG is put back.
fn compress_in_place(png: &Path, compressor: &dyn Compressor) -> Result<()> {
    let scratch = tempfile::Builder::new()
        .prefix("pngs-from-svg")
        .suffix(".png")
        .tempfile()
        .context("Failed to create scratch PNG")?;

    fs::copy(png, scratch.path())
        .with_context(|| format!("Failed to copy {} for compression", png.display()))?;
    fs::remove_file(png).with_context(|| format!("Failed to remove {}", png.display()))?;

    let result = compressor.compress(scratch.path(), png).and_then(|()| {
        if png.is_file() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Compressor did not produce {}", png.display()))
        }
    });

    if let Err(err) = result {
        fs::copy(scratch.path(), png)
            .with_context(|| format!("Failed to restore uncompressed {}", png.display()))?;
        return Err(err.context("Compression failed, kept the uncompressed PNG"));
    }

    Ok(())
}

/// Output file name stem: the input's file name without a trailing `.svg`, in any case
fn base_name(input: &Path) -> Result<String> {
    let file_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Input path has no usable file name: {}", input.display()))?;

    let stem = file_name
        .len()
        .checked_sub(4)
        .filter(|&split| file_name.is_char_boundary(split))
        .filter(|&split| file_name[split..].eq_ignore_ascii_case(".svg"))
        .map_or(file_name, |split| &file_name[..split]);

    Ok(stem.to_string())
}
