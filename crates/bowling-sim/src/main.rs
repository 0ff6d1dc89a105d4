//! Strike-Lane headless driver.
//!
//! Bowls one scripted game on a flat lane and prints the scoreboard.
//! Usage: `bowling-sim [tuning.json]`.

use anyhow::{Context, bail};
use bowling_core::{RollReport, ThrowController, ThrowPhase, TuningConfig};
use glam::Vec2;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const FRAME_DT: f32 = 1.0 / 60.0;
const SWING_SAMPLES: u32 = 12;
const MAX_THROWS: usize = 21;

/// One scripted swing: sideways drift and a bend that builds spin.
#[derive(Debug, Clone, Copy)]
struct Swing {
    drift: f32,
    bend: f32,
}

const SWINGS: [Swing; 5] = [
    Swing { drift: 0.0, bend: 0.0 },
    Swing { drift: 0.02, bend: -0.06 },
    Swing { drift: -0.03, bend: 0.08 },
    Swing { drift: 0.05, bend: 0.0 },
    Swing { drift: -0.01, bend: -0.03 },
];

fn bowl(controller: &mut ThrowController, swing: Swing) {
    let start = Vec2::new(0.5, 0.9);
    controller.pointer_down(start);
    for i in 1..=SWING_SAMPLES {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f32 / SWING_SAMPLES as f32;
        let offset = Vec2::new(swing.drift * t + swing.bend * t * t, -0.6 * t);
        controller.pointer_move(start + offset, FRAME_DT);
    }
    controller.pointer_up();
}

fn settle(controller: &mut ThrowController) -> anyhow::Result<RollReport> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_frames = ((controller.tuning().throw.max_throw_time + 1.0) / FRAME_DT) as usize;
    for _ in 0..max_frames {
        if let Some(report) = controller.tick(FRAME_DT).context("scoring the throw")? {
            return Ok(report);
        }
    }
    bail!("throw did not finish within {max_frames} frames")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let tuning = match std::env::args().nth(1) {
        Some(path) => TuningConfig::load(&path)
            .with_context(|| format!("failed to load tuning file {path}"))?,
        None => TuningConfig::default(),
    };
    let mut controller =
        ThrowController::with_flat_lane(tuning).context("failed to build the lane")?;

    let mut throws = 0;
    while controller.phase() != ThrowPhase::Result {
        if throws >= MAX_THROWS {
            bail!("game still running after {throws} throws");
        }
        bowl(&mut controller, SWINGS[throws % SWINGS.len()]);
        let report = settle(&mut controller)?;
        tracing::info!(
            throw = throws + 1,
            frame = report.frame_index + 1,
            knocked = report.knocked,
            "[sim] throw settled"
        );
        throws += 1;
    }

    println!("{}", controller.scoreboard());
    Ok(())
}
