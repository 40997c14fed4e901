use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::events::Displayed;
use crate::render::RenderPlan;

/// What the presenter last drew, reduced to the parts that change the picture.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Loading,
    Frame {
        base: usize,
        incoming: Option<usize>,
        controls: bool,
    },
}

impl Shown {
    fn from_plan(plan: &RenderPlan) -> Self {
        match plan {
            RenderPlan::Loading => Self::Loading,
            RenderPlan::Slides {
                base,
                overlay,
                transitioning,
                controls,
            } => Self::Frame {
                base: base.index,
                incoming: overlay
                    .as_ref()
                    .filter(|_| *transitioning)
                    .map(|layer| layer.index),
                controls: *controls,
            },
        }
    }
}

/// Headless presenter: follows the published render plan and logs what would be on screen.
pub async fn run(
    mut plans: watch::Receiver<RenderPlan>,
    mut displayed_rx: Receiver<Displayed>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut last: Option<Shown> = None;
    let mut displayed_open = true;

    loop {
        select! {
            _ = cancel.cancelled() => break,

            changed = plans.changed() => {
                if changed.is_err() {
                    debug!("render plan channel closed");
                    break;
                }
                let plan = plans.borrow_and_update().clone();
                if let RenderPlan::Slides { base, overlay, .. } = &plan {
                    trace!(
                        base_scale = base.scale,
                        incoming_opacity = overlay.as_ref().map_or(0.0, |l| l.opacity),
                        incoming_scale = overlay.as_ref().map_or(1.0, |l| l.scale),
                        "frame sample"
                    );
                }
                let shown = Shown::from_plan(&plan);
                if last.as_ref() == Some(&shown) {
                    continue;
                }
                match &plan {
                    RenderPlan::Loading => info!("showing loading placeholder"),
                    RenderPlan::Slides { base, overlay, controls, .. } => debug!(
                        base = %base.url,
                        base_scale = base.scale,
                        incoming = ?overlay.as_ref().map(|l| &l.url),
                        controls,
                        "frame updated"
                    ),
                }
                last = Some(shown);
            }

            displayed = displayed_rx.recv(), if displayed_open => {
                match displayed {
                    Some(Displayed { index, url }) => info!(index, url = %url, "displaying"),
                    None => displayed_open = false,
                }
            }
        }
    }

    Ok(())
}
