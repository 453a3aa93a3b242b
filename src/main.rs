//! Application entry point: Focus Radio.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the [`AudioEngine`] on the cpal output and start loading the
//!    rain / vinyl / chime samples in the background.
//! 5. Build the [`StreamRadio`] and spawn the now-playing [`MetadataFeed`].
//! 6. Build the [`TimerEngine`] and the shared UI state.
//! 7. Start the OS [`MediaSession`] and spawn the [`Coordinator`] on the
//!    tokio runtime.
//! 8. Run [`eframe::run_native`], which blocks the main thread until the window
//!    is closed.  The window saves the mixer positions on exit.

use std::sync::Arc;

use pomodoro_radio::{
    app::FocusApp,
    audio::{AudioEngine, CpalOutput},
    config::{AppConfig, AppPaths},
    coordinator::{new_shared_state, Coordinator, CoordinatorInputs, UiCommand},
    media::{MediaSession, NowPlaying},
    radio::{MetadataFeed, RadioSource, StreamRadio, TrackInfo},
    timer::{TimerEngine, TimerSettings},
};
use tokio::sync::mpsc;

use eframe::egui;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title("Focus Radio")
        .with_inner_size([width, height])
        .with_min_inner_size([300.0, 360.0])
        .with_resizable(false);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Focus Radio {} starting up", env!("CARGO_PKG_VERSION"));

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (timer, coordinator, radio fetch and metadata tasks)
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    let _guard = rt.enter();

    // 4. Audio engine.  The output device opens here; if that fails, the
    //    first resume retries it.
    let audio = Arc::new(AudioEngine::new(
        config.audio.clone(),
        Box::new(CpalOutput::new()),
    ));
    audio.ensure_initialized();
    {
        let audio = Arc::clone(&audio);
        let assets = config.assets.resolve(&AppPaths::new().assets_dir);
        rt.spawn(async move { audio.load_samples(assets).await });
    }

    // 5. Radio stream + now-playing feed
    let (radio, radio_rx) = StreamRadio::new(&config.radio, audio.music_input());
    let radio: Arc<dyn RadioSource> = Arc::new(radio);

    let (track_tx, track_rx) = mpsc::unbounded_channel::<TrackInfo>();
    let _metadata = MetadataFeed::spawn(&config.radio, track_tx);

    // 6. Timer + shared state
    let (timer, timer_rx) = TimerEngine::from_config(&config.timer);
    let state = new_shared_state(TimerSettings::from(&config.timer), &config.audio);

    // 7. Media session + coordinator
    let (command_tx, command_rx) = mpsc::channel::<UiCommand>(32);
    let media: Arc<dyn NowPlaying> =
        Arc::new(MediaSession::start(command_tx.clone(), Arc::clone(&state)));
    let coordinator = Coordinator::new(
        Arc::clone(&state),
        timer,
        Arc::clone(&audio),
        radio,
        config.audio.clone(),
    )
    .with_now_playing(media);
    rt.spawn(coordinator.run(CoordinatorInputs {
        commands: command_rx,
        timer: timer_rx,
        radio: radio_rx,
        tracks: track_rx,
    }));

    // 8. Build the egui app and run it (blocks until the window is closed)
    let options = native_options(&config);
    let app = FocusApp::new(state, command_tx, config);

    eframe::run_native(
        "Focus Radio",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}
