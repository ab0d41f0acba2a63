//! Event loop that keeps a session refreshed while field changes arrive.

use log::{debug, warn};
use tokio::sync::{mpsc, watch};

use crate::evaluator::RuleTransport;
use crate::refresh::{self, Scope};
use crate::session::{DisplaySnapshot, FormSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    Changed { field: String, value: String },
    Shutdown,
}

/// Run `session` until the event channel closes or `Shutdown` arrives,
/// then hand the session back.
///
/// A pass runs on start (initial load) and after every change, computed
/// stage first. If a change arrives while either stage is still
/// evaluating, the pass is dropped together with its outstanding requests
/// and a fresh one starts from the computed stage, so only results for the
/// latest field values reach the document. Every completed pass is
/// published on `updates`.
pub async fn drive<T: RuleTransport>(
    mut session: FormSession<T>,
    mut events: mpsc::Receiver<FormEvent>,
    updates: watch::Sender<DisplaySnapshot>,
) -> FormSession<T> {
    let mut pending = true;
    loop {
        if !pending {
            match events.recv().await {
                Some(event) => {
                    if !handle(&mut session, event) {
                        return session;
                    }
                    pending = true;
                }
                None => return session,
            }
            continue;
        }

        let mut superseded = false;
        for &stage in Scope::All.stages() {
            let plan = session.plan(stage);
            let evaluator = session.evaluator();
            let pass = refresh::evaluate_pass(&evaluator, plan);
            tokio::pin!(pass);

            let results = tokio::select! {
                results = &mut pass => results,
                event = events.recv() => match event {
                    Some(event) => {
                        if !handle(&mut session, event) {
                            return session;
                        }
                        superseded = true;
                        break;
                    }
                    None => return session,
                },
            };
            session.apply(&results);
        }

        if superseded {
            debug!("superseding in-flight pass");
            continue;
        }
        // No receivers left is not an error for the loop itself.
        let _ = updates.send(session.snapshot());
        pending = false;
    }
}

/// Apply one event; `false` means stop.
fn handle<T: RuleTransport>(session: &mut FormSession<T>, event: FormEvent) -> bool {
    match event {
        FormEvent::Changed { field, value } => {
            if let Err(err) = session.change(&field, &value) {
                warn!("ignoring change: {}", err);
            }
            true
        }
        FormEvent::Shutdown => false,
    }
}
