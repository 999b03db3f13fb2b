//! Application entry point for drawbot.
//!
//! # Startup sequence
//!
//! 1. Parse the command line.
//! 2. Load `.env` (for `OPENAI_API_KEY` and `SETTINGS_NAME`).
//! 3. Initialise logging into `logs/<command>/<timestamp>.log`.
//! 4. Open the settings profile and build only the collaborators the
//!    chosen command needs.
//! 5. Run the command on the tokio runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use drawbot::config::{
    AppPaths, CanvasSettings, GcodeSettings, ImageSettings, OctoprintSettings, OpenAiSettings,
    RecorderSettings, SettingsStore, SpeechSettings, StationSettings, TraceSettings, VoiceSettings,
};
use drawbot::drawing::{scale_contours_to_canvas, trace_file, GcodeProgram, ImageGenerator, OpenAiImageGenerator};
use drawbot::logging;
use drawbot::pipeline::{
    ctrl_c, log_progress, needs_spoken_prompt, new_shared_state, DrawingOptions, DrawingPipeline, DrawingTarget, ListenOptions,
    OctoPrintTarget, SimulatorTarget,
};
use drawbot::printer::OctoPrintClient;
use drawbot::stt::{MicRecorder, ModelPaths, PromptListener, TranscribeParams, WhisperEngine};
use drawbot::voice::{Narrator, Recordings, RodioPlayer, TtsClient, TtsNarrator};

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "drawbot",
    version,
    about = "Drawing robot: ask for a subject, generate line art, draw it"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetKind {
    /// In-process robot simulator
    Sim,
    /// OctoPrint server (upload, select and print)
    Octoprint,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the whole pipeline: prompt, image, G-code, drawing
    Draw {
        /// Prompt for the drawing (asks out loud when omitted)
        #[arg(long)]
        human_prompt: Option<String>,
        /// Where the G-code is executed
        #[arg(long, value_enum, default_value_t = TargetKind::Sim)]
        target: TargetKind,
        /// Record simulator frames
        #[arg(long)]
        record: bool,
        /// Seconds to listen for a spoken prompt
        #[arg(long, value_name = "SECS")]
        duration: Option<u32>,
    },
    /// Record from the microphone and print the transcription
    Transcribe {
        /// Duration of the recording in seconds
        #[arg(long, value_name = "SECS")]
        duration: Option<u32>,
        /// File the recording is saved to
        #[arg(long, default_value = "recording.wav")]
        filename: PathBuf,
        /// Keep the recording after transcription
        #[arg(long)]
        keep_file: bool,
    },
    /// Speak a line of text through the TTS cache
    Say {
        #[arg(long, default_value = "the quick brown fox jumped over the lazy dogs")]
        text: String,
        /// Voice to use (defaults to the configured one)
        #[arg(long)]
        voice: Option<String>,
    },
    /// Generate a line-art image and save it
    Generate {
        #[arg(long, default_value = "a cat")]
        prompt: String,
        /// Output image path (defaults to a timestamped PNG in the G-code dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Turn an image file into a G-code file
    Trace {
        #[arg(long)]
        image: PathBuf,
        /// Output `.nc` path (defaults to a timestamped file in the G-code dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Draw an existing G-code file in the simulator
    Simulate {
        #[arg(long)]
        gcode: PathBuf,
        /// Record simulator frames
        #[arg(long)]
        record: bool,
    },
    /// Upload a file to OctoPrint and start printing it
    Upload {
        #[arg(long)]
        file: PathBuf,
    },
}

impl Command {
    /// Folder name for this command's log files.
    fn log_name(&self) -> &'static str {
        match self {
            Command::Draw { .. } => "draw",
            Command::Transcribe { .. } => "transcribe",
            Command::Say { .. } => "say",
            Command::Generate { .. } => "generate",
            Command::Trace { .. } => "trace",
            Command::Simulate { .. } => "simulate",
            Command::Upload { .. } => "upload",
        }
    }
}

// ── main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let paths = AppPaths::new();
    if let Some(file) = logging::init(&paths.logs_dir, cli.command.log_name()) {
        log::debug!("logging to {}", file.display());
    }

    let store = SettingsStore::from_env_in(&paths);
    log::info!("settings: {}", store.path().display());

    match cli.command {
        Command::Draw {
            human_prompt,
            target,
            record,
            duration,
        } => draw(&paths, &store, human_prompt, target, record, duration).await,

        Command::Transcribe {
            duration,
            filename,
            keep_file,
        } => {
            let speech: SpeechSettings = store.load()?;
            let secs = duration.unwrap_or(speech.duration_secs);
            let listener = prompt_listener(&paths, &speech)?;
            let text = tokio::task::spawn_blocking(move || {
                listener.record_and_transcribe(Duration::from_secs(u64::from(secs)), &filename, keep_file)
            })
            .await??;
            println!("{text}");
            Ok(())
        }

        Command::Say { text, voice } => {
            let narrator = tts_narrator(&paths, &store, voice)?;
            narrator.say(&text).await?;
            Ok(())
        }

        Command::Generate { prompt, output } => {
            let generator = image_generator(&store)?;
            let image = generator.generate(&prompt).await?;
            let output = match output {
                Some(p) => p,
                None => timestamped(&paths.gcode_dir, "png")?,
            };
            image
                .save(&output)
                .with_context(|| format!("saving {}", output.display()))?;
            log::info!("Image saved to {}", output.display());
            println!("{}", output.display());
            Ok(())
        }

        Command::Trace { image, output } => {
            let trace: TraceSettings = store.load()?;
            let canvas: CanvasSettings = store.load()?;
            let gcode: GcodeSettings = store.load()?;

            let contours = trace_file(&image, trace.threshold)?;
            let scaled = scale_contours_to_canvas(&contours, &canvas)?;
            let program = GcodeProgram::from_contours(&scaled, &gcode);
            let file = match output {
                Some(p) => {
                    program.write_to(&p)?;
                    p
                }
                None => program.write_to_dir(&paths.gcode_dir)?,
            };
            log::info!("{} stroke(s) written to {}", program.strokes(), file.display());
            println!("{}", file.display());
            Ok(())
        }

        Command::Simulate { gcode, record } => {
            let target = simulator(&paths, &store, record)?;
            let outcome = target.draw_until(&gcode, ctrl_c()).await?;
            log::info!("Simulation ended: {outcome:?}");
            Ok(())
        }

        Command::Upload { file } => {
            let settings: OctoprintSettings = store.load()?;
            OctoPrintTarget::new(OctoPrintClient::new(&settings))
                .draw(&file)
                .await
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn draw(
    paths: &AppPaths,
    store: &SettingsStore,
    human_prompt: Option<String>,
    target: TargetKind,
    record: bool,
    duration: Option<u32>,
) -> Result<()> {
    let mut speech: SpeechSettings = store.load()?;
    if let Some(secs) = duration {
        speech.duration_secs = secs;
    }

    let options = DrawingOptions {
        trace: store.load()?,
        canvas: store.load()?,
        gcode: store.load()?,
        gcode_dir: paths.gcode_dir.clone(),
        listen: ListenOptions::from(&speech),
    };

    let target: Arc<dyn DrawingTarget> = match target {
        TargetKind::Sim => Arc::new(simulator(paths, store, record)?),
        TargetKind::Octoprint => {
            let settings: OctoprintSettings = store.load()?;
            Arc::new(OctoPrintTarget::new(OctoPrintClient::new(&settings)))
        }
    };

    let state = new_shared_state();
    let mut pipeline = DrawingPipeline::new(
        state.clone(),
        Arc::new(tts_narrator(paths, store, None)?),
        Arc::new(image_generator(store)?),
        target,
        options,
    );
    if needs_spoken_prompt(human_prompt.as_deref()) {
        pipeline = pipeline.with_listener(Arc::new(prompt_listener(paths, &speech)?));
    }

    let (out, ()) = tokio::join!(
        pipeline.run(human_prompt),
        log_progress(state, Duration::from_millis(250))
    );
    let out = out?;
    log::info!(
        "Drew \"{}\" with {} stroke(s) from {}",
        out.human_prompt,
        out.strokes,
        out.gcode_file.display()
    );
    Ok(())
}

// ── Collaborators ───────────────────────────────────────────────────────────

fn prompt_listener(paths: &AppPaths, speech: &SpeechSettings) -> Result<PromptListener> {
    let model_path = ModelPaths::from_app_paths(paths).model_path(&speech.model);
    let engine = WhisperEngine::load(&model_path, TranscribeParams::from(speech))
        .with_context(|| format!("loading Whisper model {}", model_path.display()))?;
    log::info!("Whisper model loaded: {}", model_path.display());

    Ok(
        PromptListener::new(Arc::new(MicRecorder), Arc::new(engine), &paths.prompt_recordings_dir)
            .with_sample_rate(speech.sample_rate),
    )
}

fn tts_narrator(paths: &AppPaths, store: &SettingsStore, voice: Option<String>) -> Result<TtsNarrator> {
    let openai: OpenAiSettings = store.load()?;
    let voice_settings: VoiceSettings = store.load()?;
    let client = TtsClient::new(&openai, openai.resolve_api_key()?, &voice_settings);
    let recordings = Recordings::load(&paths.dictations_dir)?;

    Ok(TtsNarrator::new(
        recordings,
        Arc::new(client),
        Arc::new(RodioPlayer::default()),
        voice.unwrap_or(voice_settings.voice),
    ))
}

fn image_generator(store: &SettingsStore) -> Result<OpenAiImageGenerator> {
    let openai: OpenAiSettings = store.load()?;
    let image: ImageSettings = store.load()?;
    Ok(OpenAiImageGenerator::new(&openai, openai.resolve_api_key()?, image))
}

fn simulator(paths: &AppPaths, store: &SettingsStore, record: bool) -> Result<SimulatorTarget> {
    let station: StationSettings = store.load()?;
    let station_file = station.station_file_or_default(paths);
    let mut target = SimulatorTarget::new(station_file, station);
    if record {
        let recorder: RecorderSettings = store.load()?;
        target = target.record_to(&paths.recordings_dir, recorder);
    }
    Ok(target)
}

fn timestamped(dir: &Path, extension: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir.join(format!(
        "{}.{extension}",
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    )))
}
