//! Background step driver
//!
//! `next_graph` blocks until the engine prints a line, so the GUI never
//! calls it directly. The driver owns the session on a worker thread,
//! applies each snapshot to the shared visual graph and reports back.

use super::session::{SessionCloser, StepSession};
use crate::error::StepError;
use crate::visual::SharedVisualGraph;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Reports from the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// A snapshot was applied
    Stepped { step: usize, nodes: usize, edges: usize },
    /// The engine has no more steps
    Finished { steps: usize },
    /// The session failed and was closed
    Failed(String),
}

enum DriverCommand {
    Step,
    Shutdown,
}

/// Worker thread owning one [`StepSession`]
pub struct StepDriver {
    commands: Sender<DriverCommand>,
    events: Receiver<DriverEvent>,
    closer: SessionCloser,
    handle: Option<JoinHandle<()>>,
}

impl StepDriver {
    /// Start the worker; `notify` runs after every event (e.g. request a repaint)
    pub fn spawn<F>(session: StepSession, graph: SharedVisualGraph, notify: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = channel();
        let closer = session.closer();

        let handle = thread::spawn(move || run(session, graph, cmd_rx, event_tx, notify));

        Self {
            commands: cmd_tx,
            events: event_rx,
            closer,
            handle: Some(handle),
        }
    }

    /// Ask for one more step; false if the worker is gone
    pub fn request_step(&self) -> bool {
        self.commands.send(DriverCommand::Step).is_ok()
    }

    /// Events produced since the last poll
    pub fn poll_events(&self) -> Vec<DriverEvent> {
        self.events.try_iter().collect()
    }

    /// Wait for the next event
    pub fn recv_event(&self) -> Option<DriverEvent> {
        self.events.recv().ok()
    }

    /// Kill the engine and join the worker
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.closer.close();
        let _ = self.commands.send(DriverCommand::Shutdown);
        if handle.join().is_err() {
            log::warn!("Step driver thread panicked");
        }
    }
}

impl Drop for StepDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<F>(
    mut session: StepSession,
    graph: SharedVisualGraph,
    commands: Receiver<DriverCommand>,
    events: Sender<DriverEvent>,
    notify: F,
) where
    F: Fn(),
{
    while let Ok(command) = commands.recv() {
        match command {
            DriverCommand::Shutdown => break,
            DriverCommand::Step => {
                let event = step_once(&mut session, &graph);
                if events.send(event).is_err() {
                    break;
                }
                notify();
            }
        }
    }

    session.close();
    log::debug!("Step driver for {} stopped", session.program().display());
}

fn step_once(session: &mut StepSession, graph: &SharedVisualGraph) -> DriverEvent {
    if !session.has_next() {
        return DriverEvent::Finished {
            steps: session.steps(),
        };
    }

    match session.next_graph() {
        Ok(snapshot) => {
            graph.lock().rewrite(&snapshot);
            DriverEvent::Stepped {
                step: session.steps(),
                nodes: snapshot.nodes().len(),
                edges: snapshot.edges().len(),
            }
        }
        Err(StepError::ProcessExited { steps }) => DriverEvent::Finished { steps },
        Err(e) => DriverEvent::Failed(e.to_string()),
    }
}
