use anyhow::Result;
use clap::Parser;
use std::{ffi::OsString, path::PathBuf};

mod density;
mod png_gen;
mod svg_doc;
mod tools;
mod transform;

use density::ResourceType;
use tools::{Compressor, Inkscape, Pngcrush};

#[derive(Debug, Parser)]
#[clap(
    name = "pngs-from-svg",
    about = "Render an SVG into PNGs for every Android screen density"
)]
struct Args {
    /// Path to the SVG file.
    #[clap(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory; density directories are created inside it.
    #[clap(value_name = "OUTPUT_DIR")]
    output: PathBuf,

    /// Height in pixels of the mdpi variant.
    #[clap(value_name = "SIZE")]
    size: u32,

    /// Fill color for all shapes, e.g. '#104E8B'. Shapes with fill="none" are kept.
    #[clap(short, long)]
    color: Option<String>,

    /// Opacity of the whole image, e.g. '0.54'.
    #[clap(short, long, value_parser = parse_opacity)]
    opacity: Option<f64>,

    /// Suffix for the output filenames.
    #[clap(short, long, default_value = "")]
    suffix: String,

    /// Don't run pngcrush on the generated PNGs.
    #[clap(long)]
    nopngcrush: bool,

    /// Resource directory kind to write into.
    #[clap(long, value_enum, default_value_t = ResourceType::Drawable)]
    resource_type: ResourceType,

    /// JSON file replacing the default density table, e.g. '[{"name": "ldpi", "scale": 0.75}]'.
    #[clap(long, value_name = "FILE")]
    density_table: Option<PathBuf>,

    /// Rasterizer program, called like Inkscape 1.x.
    #[clap(
        long,
        value_name = "PROGRAM",
        env = "PNGS_FROM_SVG_RASTERIZER",
        default_value = "inkscape"
    )]
    rasterizer: OsString,

    /// Compressor program, called as `<PROGRAM> <input.png> <output.png>`.
    #[clap(
        long,
        value_name = "PROGRAM",
        env = "PNGS_FROM_SVG_COMPRESSOR",
        default_value = "pngcrush"
    )]
    compressor: OsString,

    /// Show debug output.
    #[clap(short, long)]
    verbose: bool,
}

fn parse_opacity(value: &str) -> Result<f64, String> {
    let opacity: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !(0.0..=1.0).contains(&opacity) {
        return Err(format!("{opacity} is not between 0 and 1"));
    }
    Ok(opacity)
}

fn setup_logger(verbose: bool) -> Result<()> {
    use tracing::Level;
    use tracing_subscriber::{
        filter::LevelFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt, Registry,
    };

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    Registry::default()
        .with(LevelFilter::from(level))
        .with(
            layer()
                .with_ansi(true)
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.verbose)?;

    let densities = match &args.density_table {
        Some(path) => density::load_density_table(path)?,
        None => density::default_densities(),
    };

    let opts = png_gen::Options {
        input: args.input,
        output: args.output,
        size: args.size,
        suffix: args.suffix,
        transform: transform::TransformParams {
            color: args.color,
            opacity: args.opacity,
        },
        resource_type: args.resource_type,
        densities,
    };

    let rasterizer = Inkscape::new(args.rasterizer);
    let pngcrush = Pngcrush::new(args.compressor);
    let compressor: Option<&dyn Compressor> = if args.nopngcrush {
        None
    } else {
        Some(&pngcrush)
    };

    let generated = png_gen::generate_pngs(&opts, &rasterizer, compressor)?;
    tracing::debug!("Generated {} PNGs", generated.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["pngs-from-svg", "icon.svg", "res", "48"]).unwrap();

        assert_eq!(args.size, 48);
        assert_eq!(args.suffix, "");
        assert_eq!(args.color, None);
        assert_eq!(args.opacity, None);
        assert!(!args.nopngcrush);
        assert_eq!(args.resource_type, ResourceType::Drawable);
    }

    #[test]
    fn test_args_all_options() {
        let args = Args::try_parse_from([
            "pngs-from-svg",
            "icon.svg",
            "res",
            "24",
            "-c",
            "#104E8B",
            "-o",
            "0.54",
            "--suffix",
            "_disabled",
            "--nopngcrush",
            "--resource-type",
            "mipmap",
        ])
        .unwrap();

        assert_eq!(args.color.as_deref(), Some("#104E8B"));
        assert_eq!(args.opacity, Some(0.54));
        assert_eq!(args.suffix, "_disabled");
        assert!(args.nopngcrush);
        assert_eq!(args.resource_type, ResourceType::Mipmap);
    }

    #[test]
    fn test_opacity_out_of_range_is_rejected() {
        assert!(Args::try_parse_from(["pngs-from-svg", "a.svg", "res", "48", "-o", "1.5"]).is_err());
        assert!(Args::try_parse_from(["pngs-from-svg", "a.svg", "res", "48", "-o", "x"]).is_err());
        assert!(Args::try_parse_from(["pngs-from-svg", "a.svg", "res", "-1"]).is_err());
    }
}
