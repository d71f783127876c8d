use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const DEFAULT_OUT_ROOT: &str = "./out";
pub const DEFAULT_MIP_LEVELS: u32 = 6;
pub const DEFAULT_IRRADIANCE_SIZE: u32 = 32;
pub const DEFAULT_PREFILTER_SIZE: u32 = 128;
pub const MAX_IRRADIANCE_SIZE: u32 = 256;

/// Extensions the radiance codec accepts, compared case-insensitively.
pub const HDR_EXTENSIONS: &[&str] = &["hdr"];

pub const USAGE: &str = "\
usage: envmap-baker <input.hdr> [options]

options:
    -out <path>         output root directory (default ./out)
    -mips <n>           number of prefiltered specular mip levels (default 6)
    -irradiance <n>     irradiance cubemap side width (default 32)
    -envsize <n>        prefiltered specular base side width (default 128)
    -h, --help          print this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bake(Config),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input: PathBuf,
    pub out_root: PathBuf,
    pub mip_levels: u32,
    pub irradiance_size: u32,
    pub prefilter_size: u32,
}

impl Config {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            out_root: PathBuf::from(DEFAULT_OUT_ROOT),
            mip_levels: DEFAULT_MIP_LEVELS,
            irradiance_size: DEFAULT_IRRADIANCE_SIZE,
            prefilter_size: DEFAULT_PREFILTER_SIZE,
        }
    }

    /// Parses the arguments following the program name.
    pub fn from_args<I>(args: I) -> Result<Command>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut input = None;
        let mut out_root = None;
        let mut mip_levels = None;
        let mut irradiance_size = None;
        let mut prefilter_size = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(Command::Help),
                "-out" => out_root = Some(PathBuf::from(flag_value(&arg, args.next())?)),
                "-mips" => mip_levels = Some(parse_count(&arg, args.next())?),
                "-irradiance" => irradiance_size = Some(parse_count(&arg, args.next())?),
                "-envsize" => prefilter_size = Some(parse_count(&arg, args.next())?),
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(Error::Usage(format!("unknown option {flag}\n\n{USAGE}")));
                }
                _ if input.is_some() => {
                    return Err(Error::Usage(format!(
                        "only one input panorama is supported, got extra argument {arg}"
                    )));
                }
                _ => input = Some(PathBuf::from(arg)),
            }
        }

        let input = input.ok_or_else(|| Error::Usage(format!("missing input path\n\n{USAGE}")))?;
        let mut config = Config::new(input);
        if let Some(out_root) = out_root {
            config.out_root = out_root;
        }
        if let Some(mip_levels) = mip_levels {
            config.mip_levels = mip_levels;
        }
        if let Some(irradiance_size) = irradiance_size {
            if irradiance_size > MAX_IRRADIANCE_SIZE {
                return Err(Error::Usage(format!(
                    "-irradiance must be at most {MAX_IRRADIANCE_SIZE}, got {irradiance_size}"
                )));
            }
            config.irradiance_size = irradiance_size;
        }
        if let Some(prefilter_size) = prefilter_size {
            config.prefilter_size = prefilter_size;
        }
        Ok(Command::Bake(config))
    }

    /// Checks the input path. Runs before any GPU resource or output directory exists.
    pub fn validate(&self) -> Result<()> {
        validate_input(&self.input)
    }

    pub fn input_name(&self) -> String {
        crate::input_name(&self.input)
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.out_root)
    }
}

fn flag_value(flag: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::Usage(format!("{flag} expects a value")))
}

fn parse_count(flag: &str, value: Option<String>) -> Result<u32> {
    let value = flag_value(flag, value)?;
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Usage(format!(
            "{flag} expects a positive integer, got {value}"
        ))),
    }
}

pub fn validate_input(path: &Path) -> Result<()> {
    let invalid = |reason: &str| Error::InputValidation {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let recognized = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| HDR_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)));
    if !recognized {
        return Err(invalid("unrecognized extension, expected a .hdr file"));
    }

    let metadata = fs::metadata(path).map_err(|_| invalid("file does not exist"))?;
    if !metadata.is_file() {
        return Err(invalid("not a regular file"));
    }
    Ok(())
}

/// Directory layout of one bake: background faces at the root, irradiance
/// and prefiltered environment faces in fixed subdirectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
}

impl OutputLayout {
    pub const BACKGROUND_DIR: &'static str = "";
    pub const IRRADIANCE_DIR: &'static str = "irradiance";
    pub const ENVIRONMENT_DIR: &'static str = "env";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn create_dirs(&self) -> Result<()> {
        for subdir in [Self::IRRADIANCE_DIR, Self::ENVIRONMENT_DIR] {
            fs::create_dir_all(self.root.join(subdir))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_apply_without_flags() {
        let command = Config::from_args(args(&["room.hdr"])).unwrap();
        let Command::Bake(config) = command else {
            panic!("expected bake command");
        };
        assert_eq!(config.input, PathBuf::from("room.hdr"));
        assert_eq!(config.out_root, PathBuf::from(DEFAULT_OUT_ROOT));
        assert_eq!(config.mip_levels, DEFAULT_MIP_LEVELS);
        assert_eq!(config.irradiance_size, DEFAULT_IRRADIANCE_SIZE);
        assert_eq!(config.input_name(), "room");
    }

    #[test]
    fn flags_override_defaults_in_any_position() {
        let command = Config::from_args(args(&[
            "-mips", "3", "sky.hdr", "-out", "baked", "-irradiance", "16", "-envsize", "64",
        ]))
        .unwrap();
        assert_eq!(
            command,
            Command::Bake(Config {
                input: PathBuf::from("sky.hdr"),
                out_root: PathBuf::from("baked"),
                mip_levels: 3,
                irradiance_size: 16,
                prefilter_size: 64,
            })
        );
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(Config::from_args(args(&["-h"])).unwrap(), Command::Help);
        assert_eq!(
            Config::from_args(args(&["room.hdr", "--help"])).unwrap(),
            Command::Help
        );
    }

    #[test]
    fn rejects_bad_usage() {
        for bad in [
            vec![],
            vec!["room.hdr", "-mips"],
            vec!["room.hdr", "-mips", "0"],
            vec!["room.hdr", "-mips", "many"],
            vec!["room.hdr", "-irradiance", "4096"],
            vec!["room.hdr", "-fast"],
            vec!["a.hdr", "b.hdr"],
        ] {
            let err = Config::from_args(args(&bad)).unwrap_err();
            assert!(matches!(err, Error::Usage(_)), "{bad:?} gave {err:?}");
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[test]
    fn wrong_extension_is_rejected_before_touching_the_filesystem() {
        let err = validate_input(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, Error::InputValidation { .. }));
        let err = validate_input(Path::new("no_extension")).unwrap_err();
        assert!(matches!(err, Error::InputValidation { .. }));
    }

    #[test]
    fn missing_file_is_rejected() {
        let err = validate_input(Path::new("definitely/not/here.hdr")).unwrap_err();
        match err {
            Error::InputValidation { reason, .. } => assert!(reason.contains("does not exist")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
