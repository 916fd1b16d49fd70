use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "probebake",
    author,
    version,
    about = "Headless light-probe baker"
)]
pub struct Cli {
    /// Scene description file (TOML).
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    /// Frame to evaluate the scene at.
    #[arg(long, value_name = "FRAME", default_value_t = 0)]
    pub frame: i64,

    /// Number of indirect light bounces to accumulate.
    #[arg(long, value_name = "COUNT", default_value_t = 1)]
    pub bounces: u32,

    /// Edge length of the reflection cubemap atlas (power of two, 4-2048).
    #[arg(
        long,
        value_name = "PIXELS",
        default_value_t = 128,
        value_parser = parse_cube_resolution
    )]
    pub cube_resolution: u32,

    /// Side length of one visibility block in the irradiance pool
    /// (power of two, 4-1024).
    #[arg(
        long,
        value_name = "PIXELS",
        default_value_t = 16,
        value_parser = parse_visibility_size
    )]
    pub visibility_size: u32,

    /// Write the baked irradiance atlas (layer 0) to this PNG path.
    #[arg(long, value_name = "PATH")]
    pub export_irradiance: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_power_of_two(value: &str, what: &str, min: u32, max: u32) -> Result<u32, String> {
    let size: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {what} '{value}'; expected a number"))?;
    if size.is_power_of_two() && (min..=max).contains(&size) {
        Ok(size)
    } else {
        Err(format!(
            "{what} must be a power of two between {min} and {max}, got {size}"
        ))
    }
}

pub fn parse_cube_resolution(value: &str) -> Result<u32, String> {
    parse_power_of_two(value, "cube resolution", 4, 2048)
}

pub fn parse_visibility_size(value: &str) -> Result<u32, String> {
    parse_power_of_two(value, "visibility size", 4, 1024)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn try_parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("probebake").chain(args.iter().copied()))
    }

    #[test]
    fn rejects_visibility_blocks_smaller_than_a_sample() {
        // A block below the 4x2 sample footprint would leave the pool with
        // zero visibility layers.
        assert!(try_parse(&["scene.toml", "--visibility-size", "2"]).is_err());
        assert!(try_parse(&["scene.toml", "--visibility-size", "0"]).is_err());
        assert!(try_parse(&["scene.toml", "--visibility-size", "24"]).is_err());
        let cli = try_parse(&["scene.toml", "--visibility-size", "8"]).expect("valid size");
        assert_eq!(cli.visibility_size, 8);
    }

    #[test]
    fn rejects_degenerate_cube_resolutions() {
        assert!(try_parse(&["scene.toml", "--cube-resolution", "0"]).is_err());
        assert!(try_parse(&["scene.toml", "--cube-resolution", "100"]).is_err());
        let cli = try_parse(&["scene.toml", "--cube-resolution", "64"]).expect("valid size");
        assert_eq!(cli.cube_resolution, 64);
    }

    #[test]
    fn defaults_pass_their_own_validation() {
        let cli = try_parse(&["scene.toml"]).expect("defaults");
        assert_eq!(cli.cube_resolution, 128);
        assert_eq!(cli.visibility_size, 16);
    }
}
