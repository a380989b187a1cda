use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::graphics::BackendKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("unrecognized form factor {0:?} (expected Hmd or Handheld)")]
    UnknownFormFactor(String),
    #[error("unrecognized view configuration {0:?} (expected Mono or Stereo)")]
    UnknownViewConfiguration(String),
    #[error("unrecognized environment blend mode {0:?} (expected Opaque, Additive, or AlphaBlend)")]
    UnknownBlendMode(String),
    #[error("unrecognized reference space {0:?}")]
    UnknownReferenceSpace(String),
    #[error("unrecognized graphics backend {0:?} (expected Headless or Wgpu)")]
    UnknownBackend(String),
    #[error("{0} expects a positive integer, got {1:?}")]
    InvalidNumber(&'static str, String),
    #[error("unknown flag {0:?} (try --help)")]
    UnknownFlag(String),
    #[error("{0} expects a value")]
    MissingValue(&'static str),
    #[error("failed to read config file {path}: {reason}")]
    ConfigRead { path: String, reason: String },
    #[error("failed to parse config file {path}: {reason}")]
    ConfigParse { path: String, reason: String },
}

/// Device category the runtime system is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormFactor {
    HeadMounted,
    Handheld,
}

impl FormFactor {
    pub fn from_name(name: &str) -> Result<Self, OptionsError> {
        match name.to_ascii_lowercase().as_str() {
            "hmd" | "headmounted" => Ok(Self::HeadMounted),
            "handheld" => Ok(Self::Handheld),
            _ => Err(OptionsError::UnknownFormFactor(name.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HeadMounted => "Hmd",
            Self::Handheld => "Handheld",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewConfigKind {
    Mono,
    Stereo,
}

impl ViewConfigKind {
    pub fn from_name(name: &str) -> Result<Self, OptionsError> {
        match name.to_ascii_lowercase().as_str() {
            "mono" => Ok(Self::Mono),
            "stereo" => Ok(Self::Stereo),
            _ => Err(OptionsError::UnknownViewConfiguration(name.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Mono => "Mono",
            Self::Stereo => "Stereo",
        }
    }

    /// Number of views the configuration composes per frame.
    pub const fn view_count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    Opaque,
    Additive,
    AlphaBlend,
}

impl BlendMode {
    pub fn from_name(name: &str) -> Result<Self, OptionsError> {
        match name.to_ascii_lowercase().as_str() {
            "opaque" => Ok(Self::Opaque),
            "additive" => Ok(Self::Additive),
            "alphablend" => Ok(Self::AlphaBlend),
            _ => Err(OptionsError::UnknownBlendMode(name.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Opaque => "Opaque",
            Self::Additive => "Additive",
            Self::AlphaBlend => "AlphaBlend",
        }
    }
}

/// Named reference frames the application can anchor itself to or visualize.
/// Each maps to a fixed pose formula over a runtime base space (see
/// `math::reference_space_definition`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceSpace {
    View,
    ViewFront,
    Local,
    Stage,
    StageLeft,
    StageRight,
    StageLeftRotated,
    StageRightRotated,
}

impl ReferenceSpace {
    /// Spaces rendered as fixed cubes around the scene. `View` is excluded:
    /// a cube glued to the viewer's head is never visible.
    pub const VISUALIZED: [ReferenceSpace; 7] = [
        Self::ViewFront,
        Self::Local,
        Self::Stage,
        Self::StageLeft,
        Self::StageRight,
        Self::StageLeftRotated,
        Self::StageRightRotated,
    ];

    pub fn from_name(name: &str) -> Result<Self, OptionsError> {
        match name.to_ascii_lowercase().as_str() {
            "view" => Ok(Self::View),
            "viewfront" => Ok(Self::ViewFront),
            "local" => Ok(Self::Local),
            "stage" => Ok(Self::Stage),
            "stageleft" => Ok(Self::StageLeft),
            "stageright" => Ok(Self::StageRight),
            "stageleftrotated" => Ok(Self::StageLeftRotated),
            "stagerightrotated" => Ok(Self::StageRightRotated),
            _ => Err(OptionsError::UnknownReferenceSpace(name.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::View => "View",
            Self::ViewFront => "ViewFront",
            Self::Local => "Local",
            Self::Stage => "Stage",
            Self::StageLeft => "StageLeft",
            Self::StageRight => "StageRight",
            Self::StageLeftRotated => "StageLeftRotated",
            Self::StageRightRotated => "StageRightRotated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub form_factor: FormFactor,
    pub view_configuration: ViewConfigKind,
    pub blend_mode: BlendMode,
    pub app_space: ReferenceSpace,
    pub backend: BackendKind,
    /// Request session exit after this many rendered frames. Mostly useful
    /// for headless runs and soak tests; `None` runs until quit.
    pub max_frames: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            form_factor: FormFactor::HeadMounted,
            view_configuration: ViewConfigKind::Stereo,
            blend_mode: BlendMode::Opaque,
            app_space: ReferenceSpace::Local,
            backend: BackendKind::Headless,
            max_frames: None,
        }
    }
}

impl Options {
    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let text = fs::read_to_string(path).map_err(|err| OptionsError::ConfigRead {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|err| OptionsError::ConfigParse {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }
}

/// Result of command-line parsing: either a runnable configuration or a
/// request to print usage and stop.
#[derive(Debug, PartialEq)]
pub enum Invocation {
    Run(Options),
    Help,
}

pub fn usage() -> &'static str {
    "usage: cubist_xr [flags]\n\
     \n\
     --config <path>       load options from a JSON file (flags after it override)\n\
     --formfactor <name>   Hmd | Handheld (default Hmd)\n\
     --viewconfig <name>   Mono | Stereo (default Stereo)\n\
     --blendmode <name>    Opaque | Additive | AlphaBlend (default Opaque)\n\
     --space <name>        View | ViewFront | Local | Stage | StageLeft | StageRight |\n\
     \u{20}                     StageLeftRotated | StageRightRotated (default Local)\n\
     --backend <name>      Headless | Wgpu (default Headless)\n\
     --max-frames <n>      request exit after n rendered frames\n\
     --help                print this message"
}

pub fn parse_args<I>(args: I) -> Result<Invocation, OptionsError>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--help" | "-h" => return Ok(Invocation::Help),
            "--config" => {
                let path = args.next().ok_or(OptionsError::MissingValue("--config"))?;
                options = Options::from_file(Path::new(&path))?;
            }
            "--formfactor" | "-ff" => {
                let value = args
                    .next()
                    .ok_or(OptionsError::MissingValue("--formfactor"))?;
                options.form_factor = FormFactor::from_name(&value)?;
            }
            "--viewconfig" | "-vc" => {
                let value = args
                    .next()
                    .ok_or(OptionsError::MissingValue("--viewconfig"))?;
                options.view_configuration = ViewConfigKind::from_name(&value)?;
            }
            "--blendmode" | "-bm" => {
                let value = args
                    .next()
                    .ok_or(OptionsError::MissingValue("--blendmode"))?;
                options.blend_mode = BlendMode::from_name(&value)?;
            }
            "--space" | "-s" => {
                let value = args.next().ok_or(OptionsError::MissingValue("--space"))?;
                options.app_space = ReferenceSpace::from_name(&value)?;
            }
            "--backend" | "-g" => {
                let value = args.next().ok_or(OptionsError::MissingValue("--backend"))?;
                options.backend = BackendKind::from_name(&value)?;
            }
            "--max-frames" => {
                let value = args
                    .next()
                    .ok_or(OptionsError::MissingValue("--max-frames"))?;
                let count: u64 = value
                    .parse()
                    .map_err(|_| OptionsError::InvalidNumber("--max-frames", value.clone()))?;
                options.max_frames = Some(count);
            }
            other => return Err(OptionsError::UnknownFlag(other.to_string())),
        }
    }

    Ok(Invocation::Run(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Result<Invocation, OptionsError> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_match_documented_values() {
        let options = Options::default();
        assert_eq!(options.form_factor, FormFactor::HeadMounted);
        assert_eq!(options.view_configuration, ViewConfigKind::Stereo);
        assert_eq!(options.blend_mode, BlendMode::Opaque);
        assert_eq!(options.app_space, ReferenceSpace::Local);
    }

    #[test]
    fn parses_every_flag() {
        let parsed = parse(&[
            "--formfactor",
            "Handheld",
            "--viewconfig",
            "Mono",
            "--blendmode",
            "Additive",
            "--space",
            "StageLeftRotated",
            "--max-frames",
            "12",
        ])
        .expect("flags should parse");

        let Invocation::Run(options) = parsed else {
            panic!("expected a runnable invocation");
        };
        assert_eq!(options.form_factor, FormFactor::Handheld);
        assert_eq!(options.view_configuration, ViewConfigKind::Mono);
        assert_eq!(options.blend_mode, BlendMode::Additive);
        assert_eq!(options.app_space, ReferenceSpace::StageLeftRotated);
        assert_eq!(options.max_frames, Some(12));
    }

    #[test]
    fn flag_values_are_case_insensitive() {
        assert_eq!(
            FormFactor::from_name("hmd").expect("lowercase accepted"),
            FormFactor::HeadMounted
        );
        assert_eq!(
            ReferenceSpace::from_name("STAGERIGHT").expect("uppercase accepted"),
            ReferenceSpace::StageRight
        );
    }

    #[test]
    fn unknown_values_fail_with_invalid_argument() {
        assert_eq!(
            ReferenceSpace::from_name("Orbit"),
            Err(OptionsError::UnknownReferenceSpace("Orbit".to_string()))
        );
        assert_eq!(
            BlendMode::from_name("Subtractive"),
            Err(OptionsError::UnknownBlendMode("Subtractive".to_string()))
        );
        assert!(matches!(
            parse(&["--space", "Orbit"]),
            Err(OptionsError::UnknownReferenceSpace(_))
        ));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert_eq!(
            parse(&["--frobnicate"]),
            Err(OptionsError::UnknownFlag("--frobnicate".to_string()))
        );
    }

    #[test]
    fn missing_value_is_rejected() {
        assert_eq!(
            parse(&["--space"]),
            Err(OptionsError::MissingValue("--space"))
        );
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(parse(&["--help"]).expect("help parses"), Invocation::Help);
    }

    #[test]
    fn config_file_loads_and_flags_override() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "{}",
            serde_json::to_string(&Options {
                blend_mode: BlendMode::AlphaBlend,
                app_space: ReferenceSpace::Stage,
                ..Options::default()
            })
            .expect("options serialize")
        )
        .expect("write config");

        let path = file.path().to_string_lossy().to_string();
        let parsed = parse(&["--config", &path, "--space", "ViewFront"]).expect("config parses");
        let Invocation::Run(options) = parsed else {
            panic!("expected a runnable invocation");
        };
        assert_eq!(options.blend_mode, BlendMode::AlphaBlend);
        assert_eq!(options.app_space, ReferenceSpace::ViewFront);
    }

    #[test]
    fn missing_config_file_reports_path() {
        let err = parse(&["--config", "/nonexistent/options.json"]).unwrap_err();
        assert!(matches!(err, OptionsError::ConfigRead { .. }));
        assert!(err.to_string().contains("/nonexistent/options.json"));
    }

    #[test]
    fn visualized_set_excludes_view() {
        assert!(!ReferenceSpace::VISUALIZED.contains(&ReferenceSpace::View));
        assert_eq!(ReferenceSpace::VISUALIZED.len(), 7);
    }
}
