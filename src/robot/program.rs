//! Loading a drawing program and driving it to completion.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::config::StationSettings;
use crate::robot::station::{SprayState, SprayToggle, Station, StationError};

/// How a drawing run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Completed,
    Interrupted,
}

/// Load `station_file` and create the drawing program from `gcode_file`.
pub fn load_drawing_program(
    station: &dyn Station,
    station_file: &Path,
    program_name: &str,
    gcode_file: &Path,
) -> Result<(), StationError> {
    station.load_station(station_file)?;
    station.create_program(program_name, gcode_file)
}

/// Run the program and toggle the pen until it finishes or `cancel` fires.
///
/// The pen is on while the tool is below `pen_contact_z`.  On cancel the
/// pen is switched off, the program stopped and the tool backed off by
/// `retract_mm`.
pub async fn draw_on_canvas(
    station: &dyn Station,
    settings: &StationSettings,
    cancel: impl Future<Output = ()>,
) -> Result<DrawOutcome, StationError> {
    station.clear_spray()?;
    station.run_program(&settings.program_name)?;

    let interval = Duration::from_millis(settings.poll_interval_ms.max(1));
    let mut toggle = SprayToggle::new(settings.pen_contact_z);
    tokio::pin!(cancel);

    log::info!("Drawing...");
    log::info!("Press CTRL+C to stop drawing");

    while station.is_busy()? {
        let z = station.tool_position()?.z;
        if let Some(state) = toggle.update(z) {
            station.set_spray(state)?;
        }

        tokio::select! {
            _ = &mut cancel => {
                log::info!("Drawing stopped");
                station.set_spray(SprayState::Off)?;
                station.stop_program()?;
                station.retract(settings.retract_mm)?;
                return Ok(DrawOutcome::Interrupted);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    if toggle.state() == SprayState::On {
        station.set_spray(SprayState::Off)?;
    }
    log::info!("Drawing finished");
    Ok(DrawOutcome::Completed)
}
