use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::{fmt, path::Path};

/// Android density buckets, as (name, scale relative to mdpi)
pub const ANDROID_DENSITIES: [(&str, f64); 5] = [
    ("mdpi", 1.0),
    ("hdpi", 1.5),
    ("xhdpi", 2.0),
    ("xxhdpi", 3.0),
    ("xxxhdpi", 4.0),
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Density {
    pub name: String,
    pub scale: f64,
}

/// Android resource directory kind the PNGs are written into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ResourceType {
    #[default]
    Drawable,
    Mipmap,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Drawable => f.write_str("drawable"),
            ResourceType::Mipmap => f.write_str("mipmap"),
        }
    }
}

impl Density {
    /// Pixel height for this density given the mdpi height
    pub fn height_for(&self, base_size: u32) -> u32 {
        ((base_size as f64 * self.scale).round() as u32).max(1)
    }

    pub fn dir_name(&self, resource_type: ResourceType) -> String {
        format!("{resource_type}-{}", self.name)
    }
}

pub fn default_densities() -> Vec<Density> {
    ANDROID_DENSITIES
        .iter()
        .map(|&(name, scale)| Density {
            name: name.to_string(),
            scale,
        })
        .collect()
}

/// Load a replacement density table, e.g. `[{"name": "ldpi", "scale": 0.75}]`
pub fn load_density_table(path: &Path) -> Result<Vec<Density>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read density table {}", path.display()))?;
    parse_density_table(&json)
        .with_context(|| format!("Invalid density table {}", path.display()))
}

fn parse_density_table(json: &str) -> Result<Vec<Density>> {
    let densities: Vec<Density> = serde_json::from_str(json)?;

    if densities.is_empty() {
        anyhow::bail!("Density table must contain at least one entry");
    }
    for density in &densities {
        if density.name.is_empty() || density.name.contains(['/', '\\']) {
            anyhow::bail!("Invalid density name: '{}'", density.name);
        }
        if !(density.scale.is_finite() && density.scale > 0.0) {
            anyhow::bail!(
                "Density {} must have a positive scale, got {}",
                density.name,
                density.scale
            );
        }
    }

    Ok(densities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_heights_for_48() {
        let heights: Vec<u32> = default_densities().iter().map(|d| d.height_for(48)).collect();
        assert_eq!(heights, [48, 72, 96, 144, 192]);
    }

    #[test]
    fn test_fractional_heights_round() {
        let hdpi = &default_densities()[1];
        assert_eq!(hdpi.height_for(33), 50);
        assert_eq!(hdpi.height_for(1), 2);
        assert_eq!(hdpi.height_for(0), 1);
    }

    #[test]
    fn test_dir_names() {
        let names: Vec<String> = default_densities()
            .iter()
            .map(|d| d.dir_name(ResourceType::Drawable))
            .collect();
        assert_eq!(
            names,
            [
                "drawable-mdpi",
                "drawable-hdpi",
                "drawable-xhdpi",
                "drawable-xxhdpi",
                "drawable-xxxhdpi"
            ]
        );
        assert_eq!(
            default_densities()[4].dir_name(ResourceType::Mipmap),
            "mipmap-xxxhdpi"
        );
    }

    #[test]
    fn test_parse_density_table() {
        let table =
            parse_density_table(r#"[{"name": "ldpi", "scale": 0.75}, {"name": "mdpi", "scale": 1}]"#)
                .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].height_for(48), 36);
    }

    #[test]
    fn test_parse_density_table_rejects_bad_entries() {
        assert!(parse_density_table("[]").is_err());
        assert!(parse_density_table(r#"[{"name": "x", "scale": 0}]"#).is_err());
        assert!(parse_density_table(r#"[{"name": "../x", "scale": 1}]"#).is_err());
        assert!(parse_density_table(r#"{"name": "x"}"#).is_err());
    }
}
