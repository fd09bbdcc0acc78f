//! Utility functions for CLI commands.

use std::path::Path;

use anyhow::Context;
use faceid::{
    AuthError, Config, ConfigError, EngineError, EnrollError, ErrorClass, ErrorKind, Image,
    MatchingEngine, Registry,
};

use crate::Cli;

/// Loads the engine configuration named by `--config`.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    Config::from_path(&cli.config).map_err(failure)
}

/// Builds the engine without touching the collection.
pub async fn build_engine(cli: &Cli) -> anyhow::Result<(MatchingEngine, Config)> {
    let cfg = load_config(cli)?;
    let engine = Registry::builtin()
        .build(&cfg)
        .await
        .map_err(failure)?;
    Ok((engine, cfg))
}

/// Builds the engine and creates the collection if needed.
pub async fn start_engine(cli: &Cli) -> anyhow::Result<(MatchingEngine, Config)> {
    let cfg = load_config(cli)?;
    let engine = Registry::builtin()
        .start(&cfg)
        .await
        .map_err(failure)?;
    Ok((engine, cfg))
}

/// Reads and decodes an image file to RGB8.
pub fn read_image(path: &Path) -> anyhow::Result<Image> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
    Image::decode(&bytes).with_context(|| format!("decode image {}", path.display()))
}

/// Engine errors that carry a kind and a class.
pub trait Classified: std::fmt::Display {
    fn kind(&self) -> ErrorKind;
    fn class(&self) -> ErrorClass;
}

macro_rules! classified {
    ($($t:ty),*) => {
        $(impl Classified for $t {
            fn kind(&self) -> ErrorKind {
                <$t>::kind(self)
            }
            fn class(&self) -> ErrorClass {
                <$t>::class(self)
            }
        })*
    };
}

classified!(ConfigError, EngineError, EnrollError, AuthError);

/// Wraps an engine error with its kind and whether it is worth retrying.
pub fn failure<E: Classified>(err: E) -> anyhow::Error {
    let (kind, class) = (err.kind(), err.class());
    let retry = if class.is_retryable() { ", retryable" } else { "" };
    anyhow::anyhow!("{err} [{kind:?}, {class:?}{retry}]")
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(result: &T, as_json: bool) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        serde_yaml::to_string(result)?
    };
    print!("{output}");
    Ok(())
}
