//! Where a finished G-code file goes.
//!
//! * [`SimulatorTarget`]: load the station, build the program, draw it in the
//!   simulator, optionally recording frames.
//! * [`OctoPrintTarget`]: upload to OctoPrint, select and start the print.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::config::{RecorderSettings, StationSettings};
use crate::printer::OctoPrintClient;
use crate::recorder::CameraRecorder;
use crate::robot::{draw_on_canvas, load_drawing_program, DrawOutcome, SimStation, StationScene};

/// Camera resolution of recorded frames.
pub const FRAME_SIZE: (u32, u32) = (640, 480);

/// Executes a G-code file on some machine.
#[async_trait]
pub trait DrawingTarget: Send + Sync {
    async fn draw(&self, gcode_file: &Path) -> anyhow::Result<()>;
}

/// Resolves once Ctrl-C is pressed; never if the handler can't be installed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// SimulatorTarget
// ---------------------------------------------------------------------------

pub struct SimulatorTarget {
    station: SimStation,
    station_file: PathBuf,
    settings: StationSettings,
    /// `Some` to record frames into the given directory.
    recording: Option<(PathBuf, RecorderSettings)>,
}

impl SimulatorTarget {
    pub fn new(station_file: impl Into<PathBuf>, settings: StationSettings) -> Self {
        Self {
            station: SimStation::new(settings.sim_speed),
            station_file: station_file.into(),
            settings,
            recording: None,
        }
    }

    pub fn with_station(mut self, station: SimStation) -> Self {
        self.station = station;
        self
    }

    pub fn record_to(mut self, recordings_dir: impl Into<PathBuf>, settings: RecorderSettings) -> Self {
        self.recording = Some((recordings_dir.into(), settings));
        self
    }

    pub fn station(&self) -> &SimStation {
        &self.station
    }

    /// Draw `gcode_file`, ending early when `cancel` resolves.
    pub async fn draw_until(
        &self,
        gcode_file: &Path,
        cancel: impl Future<Output = ()> + Send,
    ) -> anyhow::Result<DrawOutcome> {
        StationScene::ensure_file(&self.station_file)?;
        load_drawing_program(
            &self.station,
            &self.station_file,
            &self.settings.program_name,
            gcode_file,
        )
        .with_context(|| format!("preparing {}", gcode_file.display()))?;

        let mut recorder = self.recording.as_ref().and_then(|(dir, rs)| {
            let camera = Arc::new(self.station.camera(FRAME_SIZE.0, FRAME_SIZE.1));
            let mut rec = CameraRecorder::new(camera, dir.clone(), rs);
            match rec.start() {
                Ok(_) => Some(rec),
                Err(e) => {
                    log::warn!("recording disabled: {e}");
                    None
                }
            }
        });

        let outcome = draw_on_canvas(&self.station, &self.settings, cancel).await;

        if let Some(rec) = recorder.as_mut() {
            match rec.stop() {
                Ok(summary) => log::info!("{} frame(s) in {}", summary.frames, summary.dir.display()),
                Err(e) => log::warn!("recording failed: {e}"),
            }
        }

        Ok(outcome?)
    }
}

#[async_trait]
impl DrawingTarget for SimulatorTarget {
    async fn draw(&self, gcode_file: &Path) -> anyhow::Result<()> {
        self.draw_until(gcode_file, ctrl_c()).await.map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// OctoPrintTarget
// ---------------------------------------------------------------------------

pub struct OctoPrintTarget {
    client: OctoPrintClient,
}

impl OctoPrintTarget {
    pub fn new(client: OctoPrintClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DrawingTarget for OctoPrintTarget {
    async fn draw(&self, gcode_file: &Path) -> anyhow::Result<()> {
        let resp = self
            .client
            .upload(gcode_file, true, true)
            .await
            .with_context(|| format!("uploading {}", gcode_file.display()))?;
        log::info!("Upload done={} files={:?}", resp.done, resp.files.keys().collect::<Vec<_>>());
        Ok(())
    }
}
