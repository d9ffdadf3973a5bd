// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod append;
pub mod clear;
pub mod dump;
pub mod format;
pub mod info;

use anyhow::Context;
use std::path::{Path, PathBuf};

use flashlog::{EventLog, ImageFlash, LogConfig, StateFile};

/// Image file, its state sidecar, and the log settings used to open it.
#[derive(Debug, Clone)]
pub struct Target {
    pub image: PathBuf,
    pub state: PathBuf,
    pub sector_size: u32,
    pub config: LogConfig,
}

impl Target {
    /// Target with the sidecar next to the image (`<image>.state`) and
    /// settings from `config_path` when given.
    pub fn new(
        image: impl AsRef<Path>,
        state: Option<PathBuf>,
        config_path: Option<PathBuf>,
        sector_size: u32,
    ) -> anyhow::Result<Self> {
        if sector_size == 0 {
            anyhow::bail!("sector size must not be zero");
        }
        let image = image.as_ref().to_path_buf();
        let state = state.unwrap_or_else(|| {
            let mut name = image.clone().into_os_string();
            name.push(".state");
            PathBuf::from(name)
        });
        let config = match config_path {
            Some(path) => LogConfig::from_json_file(&path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => LogConfig::default(),
        };

        Ok(Self {
            image,
            state,
            sector_size,
            config,
        })
    }

    pub fn state_file(&self) -> StateFile {
        StateFile::new(&self.state)
    }

    /// Maps the image and initializes the log, seeded from the sidecar.
    pub fn open_log(&self) -> anyhow::Result<EventLog<ImageFlash>> {
        let state_file = self.state_file();
        let seed = state_file
            .load()
            .with_context(|| format!("reading state file {}", self.state.display()))?;

        let flash = ImageFlash::open_with_sector_size(&self.image, self.sector_size)
            .with_context(|| format!("opening image {}", self.image.display()))?;

        let config = match seed {
            Some(state) => self.config.clone().with_seed(state),
            None => self.config.clone(),
        };
        EventLog::initialize(&config, flash, state_file)
            .with_context(|| format!("initializing log on {}", self.image.display()))
    }
}
