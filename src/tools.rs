use anyhow::{Context, Result};
use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Stdio},
};

pub trait Rasterizer {
    /// Render `svg` to a PNG at `output`, exactly `height` pixels tall with the
    /// document's aspect ratio preserved
    fn rasterize(&self, svg: &Path, height: u32, output: &Path) -> Result<()>;
}

pub trait Compressor {
    /// Losslessly recompress `input` into `output`. The two paths always differ.
    fn compress(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Inkscape 1.x command line export
#[derive(Debug, Clone)]
pub struct Inkscape {
    program: OsString,
}

impl Inkscape {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, svg: &Path, height: u32, output: &Path) -> Command {
        let mut export_filename = OsString::from("--export-filename=");
        export_filename.push(output);

        let mut cmd = Command::new(&self.program);
        cmd.arg("--export-area-page")
            .arg("--export-type=png")
            .arg(export_filename)
            .arg(format!("--export-height={height}"))
            .arg(svg);
        cmd
    }
}

impl Rasterizer for Inkscape {
    fn rasterize(&self, svg: &Path, height: u32, output: &Path) -> Result<()> {
        run(self.command(svg, height, output), &self.program)
    }
}

#[derive(Debug, Clone)]
pub struct Pngcrush {
    program: OsString,
}

impl Pngcrush {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Compressor for Pngcrush {
    fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(input).arg(output);
        run(cmd, &self.program)
    }
}

/// Run `cmd` to completion, turning a spawn failure or unsuccessful exit into an error
fn run(mut cmd: Command, program: &OsString) -> Result<()> {
    let program = program.to_string_lossy();
    tracing::debug!("Running {cmd:?}");

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("Failed to run {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            anyhow::bail!("{program} exited with {}", output.status);
        }
        anyhow::bail!("{program} exited with {}: {stderr}", output.status);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inkscape_arguments() {
        let inkscape = Inkscape::new("inkscape");
        let cmd = inkscape.command(Path::new("/tmp/in.svg"), 72, Path::new("out/a.png"));

        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "inkscape");
        assert_eq!(
            args,
            [
                "--export-area-page",
                "--export-type=png",
                "--export-filename=out/a.png",
                "--export-height=72",
                "/tmp/in.svg",
            ]
        );
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let inkscape = Inkscape::new("pngs-from-svg-no-such-program");
        let err = inkscape
            .rasterize(Path::new("in.svg"), 48, Path::new("out.png"))
            .unwrap_err();
        assert!(err.to_string().contains("pngs-from-svg-no-such-program"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_exit_status_is_an_error() {
        let compressor = Pngcrush::new("false");
        let err = compressor
            .compress(Path::new("in.png"), Path::new("out.png"))
            .unwrap_err();
        assert!(err.to_string().starts_with("false exited with"), "{err}");
    }
}
