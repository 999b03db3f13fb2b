//! In-process drawing-robot simulator.
//!
//! ```text
//! main_station.json ─► SimStation::load_station
//! drawing.nc        ─► parse_gcode ─► Vec<Motion>           (create_program)
//!                                     └► Timeline           (run_program, from the current tool pose)
//! clock × sim_speed ─► Timeline::position_at ─► tool pose   (tool_position / is_busy)
//! spray On          ─► trail strokes                         (SimCamera renders them)
//! ```
//!
//! Time is taken from a [`Clock`] so the simulation can be driven
//! deterministically.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::recorder::FrameSource;
use crate::robot::station::{SprayState, Station, StationError, ToolPosition};

/// Feed used until the program sets one, mm/min.
pub const DEFAULT_FEED_MM_MIN: f64 = 6_000.0;

// ---------------------------------------------------------------------------
// Station scene file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 550.0,
            height: 850.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Home {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Home {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 50.0,
        }
    }
}

/// Contents of a station file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationScene {
    pub name: String,
    pub robot: String,
    /// Paper size, centred on the station origin.
    pub canvas: CanvasSize,
    pub home: Home,
}

impl Default for StationScene {
    fn default() -> Self {
        Self {
            name: "main_station".into(),
            robot: "UR10e".into(),
            canvas: CanvasSize::default(),
            home: Home::default(),
        }
    }
}

impl StationScene {
    pub fn read(path: &Path) -> Result<Self, StationError> {
        if !path.exists() {
            return Err(StationError::FileNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| StationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| StationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the default scene to `path` unless a file is already there.
    pub fn ensure_file(path: &Path) -> Result<bool, StationError> {
        if path.exists() {
            return Ok(false);
        }
        let io_err = |source| StationError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&StationScene::default()).map_err(|source| {
            StationError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, json).map_err(io_err)?;
        log::info!("Wrote default station to {}", path.display());
        Ok(true)
    }

    fn home_position(&self) -> ToolPosition {
        ToolPosition::new(self.home.x, self.home.y, self.home.z)
    }
}

// ---------------------------------------------------------------------------
// G-code interpreter
// ---------------------------------------------------------------------------

/// One linear move, already converted to millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    /// Axis words present on the line; `None` keeps that axis.
    pub target: [Option<f64>; 3],
    /// G91 in effect.
    pub relative: bool,
    /// mm/min.
    pub feed: f64,
}

fn gcode_err(line: usize, message: impl Into<String>) -> StationError {
    StationError::Gcode {
        line,
        message: message.into(),
    }
}

fn strip_comments(line: &str) -> String {
    let line = line.split(';').next().unwrap_or_default();
    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;
    for c in line.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Split `G0X1.5 Y-2` into `[('G', 0.0), ('X', 1.5), ('Y', -2.0)]`.
fn words(line: &str, line_no: usize) -> Result<Vec<(char, f64)>, StationError> {
    let mut out = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if !c.is_ascii_alphabetic() {
            return Err(gcode_err(line_no, format!("unexpected character {c:?}")));
        }
        let mut num = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() || d == '.' || d == '-' || d == '+' {
                num.push(d);
                chars.next();
            } else if d.is_whitespace() && num.is_empty() {
                chars.next();
            } else {
                break;
            }
        }
        let value: f64 = num
            .parse()
            .map_err(|_| gcode_err(line_no, format!("bad number {num:?} after {c}")))?;
        out.push((c.to_ascii_uppercase(), value));
    }
    Ok(out)
}

/// Interpret G0/G1 moves with G20/G21 units and G90/G91 distance modes.
pub fn parse_gcode(text: &str) -> Result<Vec<Motion>, StationError> {
    let mut motions = Vec::new();
    let mut scale = 1.0; // mm per program unit
    let mut relative = false;
    let mut motion_mode: Option<u32> = None;
    let mut feed = DEFAULT_FEED_MM_MIN;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comments(raw);
        let mut target = [None; 3];
        let mut has_axis = false;

        for (letter, value) in words(&line, line_no)? {
            match letter {
                'G' => match value as u32 {
                    code @ (0 | 1) if value.fract() == 0.0 => motion_mode = Some(code),
                    20 => scale = 25.4,
                    21 => scale = 1.0,
                    90 => relative = false,
                    91 => relative = true,
                    _ => return Err(gcode_err(line_no, format!("unsupported G{value}"))),
                },
                'X' | 'Y' | 'Z' => {
                    let axis = match letter {
                        'X' => 0,
                        'Y' => 1,
                        _ => 2,
                    };
                    target[axis] = Some(value * scale);
                    has_axis = true;
                }
                'F' => {
                    if value <= 0.0 {
                        return Err(gcode_err(line_no, "feed must be positive"));
                    }
                    feed = value * scale;
                }
                'N' => {}
                'M' => log::debug!("line {line_no}: ignoring M{value}"),
                other => return Err(gcode_err(line_no, format!("unsupported word {other}"))),
            }
        }

        if has_axis {
            if motion_mode.is_none() {
                return Err(gcode_err(line_no, "axis words before any G0/G1"));
            }
            motions.push(Motion {
                target,
                relative,
                feed,
            });
        }
    }
    Ok(motions)
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Segment {
    from: ToolPosition,
    to: ToolPosition,
    start: f64,
    duration: f64,
}

impl Segment {
    fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Program motions laid out in (simulated) seconds.
#[derive(Debug, Clone)]
pub struct Timeline {
    segments: Vec<Segment>,
    start: ToolPosition,
    total: f64,
}

impl Timeline {
    pub fn build(motions: &[Motion], start: ToolPosition) -> Self {
        let mut pos = start;
        let mut t = 0.0;
        let mut segments = Vec::with_capacity(motions.len());
        for m in motions {
            let mut next = pos;
            for (axis, value) in m.target.iter().enumerate() {
                if let Some(v) = value {
                    let slot = match axis {
                        0 => &mut next.x,
                        1 => &mut next.y,
                        _ => &mut next.z,
                    };
                    *slot = if m.relative { *slot + v } else { *v };
                }
            }
            let dist = pos.distance(&next);
            if dist > 0.0 {
                let duration = dist / (m.feed / 60.0);
                segments.push(Segment {
                    from: pos,
                    to: next,
                    start: t,
                    duration,
                });
                t += duration;
            }
            pos = next;
        }
        Self {
            segments,
            start,
            total: t,
        }
    }

    /// Simulated seconds until the last move completes.
    pub fn total_secs(&self) -> f64 {
        self.total
    }

    pub fn end_position(&self) -> ToolPosition {
        self.segments.last().map(|s| s.to).unwrap_or(self.start)
    }

    pub fn position_at(&self, t: f64) -> ToolPosition {
        if t <= 0.0 {
            return self.start;
        }
        match self.segments.iter().find(|s| t < s.end()) {
            Some(s) => s.from.lerp(&s.to, (t - s.start) / s.duration),
            None => self.end_position(),
        }
    }

    /// Segment end points reached in `(t0, t1]`.
    fn corners_between(&self, t0: f64, t1: f64) -> impl Iterator<Item = ToolPosition> + '_ {
        self.segments
            .iter()
            .filter(move |s| s.end() > t0 && s.end() <= t1)
            .map(|s| s.to)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Monotonic time source for the simulator.
pub trait Clock: Send + Sync {
    fn elapsed(&self) -> Duration;
}

/// Wall-clock time since construction.
#[derive(Debug)]
pub struct MonotonicClock(Instant);

impl Default for MonotonicClock {
    fn default() -> Self {
        Self(Instant::now())
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Hand-advanced clock.
#[derive(Debug, Default)]
pub struct ManualClock(Mutex<Duration>);

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.0.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// SimStation
// ---------------------------------------------------------------------------

struct Run {
    timeline: Timeline,
    started: Duration,
    /// Simulated time already covered by the trail.
    cursor: f64,
}

#[derive(Default)]
struct SimState {
    scene: Option<StationScene>,
    programs: HashMap<String, Vec<Motion>>,
    run: Option<Run>,
    position: ToolPosition,
    spray: SprayState,
    trail: Vec<Vec<(f64, f64)>>,
}

impl SimState {
    fn scene(&self) -> Result<&StationScene, StationError> {
        self.scene.as_ref().ok_or(StationError::NoStation)
    }

    /// Bring pose and trail up to `now`.
    fn advance(&mut self, now: Duration, speed: f64) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let t = (now.saturating_sub(run.started).as_secs_f64() * speed).min(run.timeline.total_secs());
        let pos = run.timeline.position_at(t);

        if self.spray == SprayState::On {
            let stroke = self.trail.last_mut();
            if let Some(stroke) = stroke {
                stroke.extend(run.timeline.corners_between(run.cursor, t).map(|p| (p.x, p.y)));
                stroke.push((pos.x, pos.y));
            }
        }
        run.cursor = t;
        self.position = pos;

        if t >= run.timeline.total_secs() {
            self.run = None;
        }
    }
}

/// Simulated station with one pen-carrying robot over a paper canvas.
#[derive(Clone)]
pub struct SimStation {
    state: Arc<Mutex<SimState>>,
    clock: Arc<dyn Clock>,
    speed: f64,
}

impl SimStation {
    /// `speed` multiplies simulated time (2.0 draws twice as fast).
    pub fn new(speed: f64) -> Self {
        Self::with_clock(speed, Arc::new(MonotonicClock::default()))
    }

    pub fn with_clock(speed: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            clock,
            speed: if speed > 0.0 { speed } else { 1.0 },
        }
    }

    /// Camera looking down at the canvas.
    pub fn camera(&self, width: u32, height: u32) -> SimCamera {
        SimCamera {
            station: self.clone(),
            width,
            height,
        }
    }

    /// Ink strokes drawn so far, in station millimetres.
    pub fn trail(&self) -> Vec<Vec<(f64, f64)>> {
        let mut st = self.state.lock().unwrap();
        st.advance(self.clock.elapsed(), self.speed);
        st.trail.clone()
    }

    pub fn scene(&self) -> Option<StationScene> {
        self.state.lock().unwrap().scene.clone()
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut SimState) -> Result<T, StationError>,
    ) -> Result<T, StationError> {
        let mut st = self.state.lock().unwrap();
        st.advance(self.clock.elapsed(), self.speed);
        f(&mut st)
    }
}

impl Station for SimStation {
    fn load_station(&self, path: &Path) -> Result<(), StationError> {
        let scene = StationScene::read(path)?;
        let mut st = self.state.lock().unwrap();
        if st.scene.is_some() {
            log::info!("Closing active station");
        }
        log::info!("Loading station from {}", path.display());
        *st = SimState {
            position: scene.home_position(),
            scene: Some(scene),
            ..SimState::default()
        };
        Ok(())
    }

    fn create_program(&self, name: &str, gcode_file: &Path) -> Result<(), StationError> {
        let text = std::fs::read_to_string(gcode_file).map_err(|source| StationError::Io {
            path: gcode_file.to_path_buf(),
            source,
        })?;
        let motions = parse_gcode(&text)?;
        self.with_state(|st| {
            st.scene()?;
            if st.programs.insert(name.to_string(), motions).is_some() {
                log::info!("Replaced program {name:?}");
            } else {
                log::info!("Created program {name:?} from {}", gcode_file.display());
            }
            Ok(())
        })
    }

    fn run_program(&self, name: &str) -> Result<(), StationError> {
        let now = self.clock.elapsed();
        self.with_state(|st| {
            st.scene()?;
            let motions = st
                .programs
                .get(name)
                .ok_or_else(|| StationError::ProgramNotFound(name.to_string()))?;
            let timeline = Timeline::build(motions, st.position);
            log::info!(
                "Running {name:?}: {} moves, {:.1} s simulated",
                motions.len(),
                timeline.total_secs()
            );
            st.run = Some(Run {
                timeline,
                started: now,
                cursor: 0.0,
            });
            Ok(())
        })
    }

    fn is_busy(&self) -> Result<bool, StationError> {
        self.with_state(|st| Ok(st.run.is_some()))
    }

    fn tool_position(&self) -> Result<ToolPosition, StationError> {
        self.with_state(|st| {
            st.scene()?;
            Ok(st.position)
        })
    }

    fn set_spray(&self, state: SprayState) -> Result<(), StationError> {
        self.with_state(|st| {
            st.scene()?;
            if state == SprayState::On && st.spray == SprayState::Off {
                st.trail.push(vec![(st.position.x, st.position.y)]);
            }
            st.spray = state;
            Ok(())
        })
    }

    fn clear_spray(&self) -> Result<(), StationError> {
        self.with_state(|st| {
            st.scene()?;
            st.trail.clear();
            Ok(())
        })
    }

    fn stop_program(&self) -> Result<(), StationError> {
        self.with_state(|st| {
            if st.run.take().is_some() {
                log::info!("Program stopped at {:?}", st.position);
            }
            Ok(())
        })
    }

    fn retract(&self, mm: f64) -> Result<(), StationError> {
        self.with_state(|st| {
            st.scene()?;
            st.run = None;
            st.position.z += mm;
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// SimCamera
// ---------------------------------------------------------------------------

const BACKGROUND: Rgb<u8> = Rgb([90, 90, 96]);
const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const TOOL: Rgb<u8> = Rgb([220, 30, 30]);

/// Top-down view of the canvas, the ink trail and the tool.
#[derive(Clone)]
pub struct SimCamera {
    station: SimStation,
    width: u32,
    height: u32,
}

impl SimCamera {
    /// Render the current scene; `None` while no station is loaded.
    pub fn render(&self) -> Option<RgbImage> {
        let (canvas, trail, tool, spray) = {
            let mut st = self.station.state.lock().unwrap();
            st.advance(self.station.clock.elapsed(), self.station.speed);
            let canvas = st.scene.as_ref()?.canvas.clone();
            (canvas, st.trail.clone(), st.position, st.spray)
        };

        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        if canvas.width <= 0.0 || canvas.height <= 0.0 {
            return Some(img);
        }

        let scale = (self.width as f64 / canvas.width).min(self.height as f64 / canvas.height) * 0.95;
        let (cx, cy) = (self.width as f64 / 2.0, self.height as f64 / 2.0);
        // Station Y points up, image rows grow down.
        let to_px = |x: f64, y: f64| ((cx + x * scale) as f32, (cy - y * scale) as f32);

        let (pw, ph) = (canvas.width * scale, canvas.height * scale);
        let paper = Rect::at((cx - pw / 2.0) as i32, (cy - ph / 2.0) as i32)
            .of_size(pw.max(1.0) as u32, ph.max(1.0) as u32);
        draw_filled_rect_mut(&mut img, paper, PAPER);

        for stroke in &trail {
            for w in stroke.windows(2) {
                draw_line_segment_mut(&mut img, to_px(w[0].0, w[0].1), to_px(w[1].0, w[1].1), INK);
            }
        }

        let (tx, ty) = to_px(tool.x, tool.y);
        let centre = (tx as i32, ty as i32);
        match spray {
            SprayState::On => draw_filled_circle_mut(&mut img, centre, 4, TOOL),
            SprayState::Off => draw_hollow_circle_mut(&mut img, centre, 6, TOOL),
        }
        Some(img)
    }
}

impl FrameSource for SimCamera {
    fn snapshot(&self) -> Option<RgbImage> {
        self.render()
    }
}
