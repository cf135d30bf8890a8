use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use visor_config::{FovConfig, Settings, ViewConfig};
use visor_input::haptics::{run_haptics_loop, HapticScheduler, LogHapticProvider};
use visor_input::mapper::{run_input_loop, ControllerEvent};
use visor_link::{Fov, LogSink, TrackingSink};
use visor_spatial::{SimulatedRuntime, SpatialRuntime};
use visor_tracking::{SessionEvent, TrackingSession};

/// Device-to-eye offsets from the configured IPD.
fn eye_transforms(view: &ViewConfig) -> [Mat4; 2] {
    let half_ipd_m = view.ipd_mm / 2000.0;
    [
        Mat4::from_translation(Vec3::new(-half_ipd_m, 0.0, 0.0)),
        Mat4::from_translation(Vec3::new(half_ipd_m, 0.0, 0.0)),
    ]
}

/// Config half-angles are degrees mirrored between the eyes; the wire wants
/// radians with left and down negative.
fn eye_fovs(fov: &FovConfig) -> [Fov; 2] {
    let outward = fov.outward_deg.to_radians();
    let inward = fov.inward_deg.to_radians();
    let up = fov.upward_deg.to_radians();
    let down = -fov.downward_deg.to_radians();
    [
        Fov {
            left: -outward,
            right: inward,
            up,
            down,
        },
        Fov {
            left: -inward,
            right: outward,
            up,
            down,
        },
    ]
}

/// Fixed-cadence pose production: resolve, convert and queue one tracking
/// packet per tick, with placeholder poses whenever the platform cannot
/// answer, so the downstream video path is never starved.
async fn streaming_loop(
    session: Arc<TrackingSession>,
    runtime: Arc<dyn SpatialRuntime>,
    settings: Settings,
) {
    let eyes = eye_transforms(&settings.view);
    let fovs = eye_fovs(&settings.view.fov);
    let period = Duration::from_secs_f32(1.0 / settings.tracking.cadence_hz);
    let mut ticker = tokio::time::interval(period);
    let mut frames: u64 = 0;

    loop {
        ticker.tick().await;
        let target = runtime.now() + settings.tracking.requested_prediction_s;
        if session.send_tracking(&eyes, fovs, target, target).is_err() {
            session.send_placeholder_tracking(fovs, target);
        }

        frames += 1;
        if frames % 300 == 0 {
            let snapshot = session.snapshot();
            debug!(
                frames,
                sent_poses = snapshot.sent_poses,
                anchors = snapshot.anchor_count,
                origin_adopted = snapshot.origin_adopted,
                "streaming heartbeat"
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "visor_stream=info,visor_tracking=info,visor_spatial=info,visor_input=info".into()
            }),
        )
        .init();

    info!("visor-stream tracking client starting");

    let settings = visor_config::load_config().unwrap_or_else(|error| {
        warn!(?error, "failed to load config, using defaults");
        Settings::default()
    });
    info!(
        keep_center_fixed = settings.tracking.keep_center_fixed,
        cadence_hz = settings.tracking.cadence_hz,
        ipd_mm = settings.view.ipd_mm,
        "config loaded"
    );

    // A headset runtime would slot in behind the trait here; development
    // runs against the simulated environment.
    let runtime: Arc<dyn SpatialRuntime> = Arc::new(SimulatedRuntime::new());
    let sink: Arc<dyn TrackingSink> = Arc::new(LogSink);

    // Bootstrap failure is the one fatal condition: without the spatial
    // capability no tracking data can exist at all.
    let (session, mut events) =
        TrackingSession::start(runtime.clone(), sink.clone(), &settings.tracking)
            .context("spatial tracking session failed to start")?;
    let session = Arc::new(session);

    // Controller enumeration feeds these channels on real hardware; the
    // loops are wired up-front so a pad can appear at any point.
    let (controller_tx, controller_rx) = mpsc::unbounded_channel::<ControllerEvent>();
    tokio::spawn(run_input_loop(controller_rx, sink.clone()));

    let haptics_tx = if settings.haptics.enabled {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = HapticScheduler::new(Arc::new(LogHapticProvider));
        let clock = runtime.clone();
        tokio::spawn(run_haptics_loop(
            scheduler,
            rx,
            Duration::from_millis(settings.haptics.service_interval_ms),
            move || clock.now(),
        ));
        Some(tx)
    } else {
        None
    };

    let streaming = tokio::spawn(streaming_loop(
        session.clone(),
        runtime.clone(),
        settings.clone(),
    ));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            event = events.recv() => match event {
                Some(SessionEvent::TrackingLost) => {
                    warn!("tracking lost, placeholder poses until it returns");
                }
                Some(SessionEvent::OriginReset) => info!("world origin re-established"),
                None => break,
            }
        }
    }

    streaming.abort();
    drop(controller_tx);
    drop(haptics_tx);

    let snapshot = session.snapshot();
    info!(
        sent_poses = snapshot.sent_poses,
        anchors = snapshot.anchor_count,
        "session ended"
    );
    Ok(())
}
