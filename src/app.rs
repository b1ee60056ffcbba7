//! Application shell
//!
//! [`AppContext`] holds everything one window needs (config, layout, pan,
//! mover, step driver) and is passed explicitly instead of living in a
//! global. [`UnyoApp`] is the thin eframe wrapper: menu, toolbar, status
//! bar and the canvas.

use crate::config::UnyoConfig;
use crate::error::StepError;
use crate::runtime::{DriverEvent, StepDriver, StepSession};
use crate::visual::{render, CanvasTheme, Mover, MoverHandle, PainterSurface, SharedVisualGraph};
use crate::visual::{ViewTransform, VisualGraph};
use eframe::egui::{self, Key, Sense};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Movement below this does not trigger a repaint
const REPAINT_THRESHOLD: f32 = 0.01;

/// Callback used to wake the UI from background threads
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// What the status bar shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Idle,
    Running { steps: usize },
    Finished { steps: usize },
    Error(String),
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Idle => write!(f, "Open an LMNtal file to start"),
            Status::Running { steps } => write!(f, "Step {}", steps),
            Status::Finished { steps } => write!(f, "Finished after {} step(s)", steps),
            Status::Error(e) => write!(f, "Error: {}", e),
        }
    }
}

/// Per-window state shared by the UI and its background workers
pub struct AppContext {
    pub config: UnyoConfig,
    pub graph: SharedVisualGraph,
    pub transform: Arc<ViewTransform>,
    mover: MoverHandle,
    driver: Option<StepDriver>,
    program: Option<PathBuf>,
    status: Status,
    notify: Notify,
}

impl AppContext {
    /// Create the context and start the mover
    pub fn new(config: UnyoConfig, notify: Notify) -> Self {
        let graph = VisualGraph::new(config.layout.spawn_jitter).into_shared();
        let on_tick = Arc::clone(&notify);
        let mover = MoverHandle::spawn(
            Arc::clone(&graph),
            Mover::new(config.layout.clone()),
            config.layout.tick(),
            move |moved| {
                if moved > REPAINT_THRESHOLD {
                    on_tick();
                }
            },
        );

        Self {
            config,
            graph,
            transform: Arc::new(ViewTransform::new()),
            mover,
            driver: None,
            program: None,
            status: Status::Idle,
            notify,
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    pub fn mover_running(&self) -> bool {
        self.mover.is_running()
    }

    /// Replace the current session with one running `path`, then request the first step
    pub fn open_program(&mut self, path: &Path) -> Result<(), StepError> {
        self.close_program();

        let session = match StepSession::open(path, &self.config.engine) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Could not open {}: {}", path.display(), e);
                self.status = Status::Error(e.to_string());
                return Err(e);
            }
        };

        self.graph.lock().clear();
        self.transform.reset();

        let notify = Arc::clone(&self.notify);
        let driver = StepDriver::spawn(session, Arc::clone(&self.graph), move || notify());
        driver.request_step();

        self.driver = Some(driver);
        self.program = Some(path.to_path_buf());
        self.status = Status::Running { steps: 0 };
        log::info!("Opened {}", path.display());
        Ok(())
    }

    /// Advance one step
    pub fn step(&mut self) {
        let Some(driver) = &self.driver else {
            log::debug!("Step requested with no program loaded");
            return;
        };
        if !matches!(self.status, Status::Running { .. }) {
            return;
        }
        if !driver.request_step() {
            self.fail("step driver stopped".to_string());
        }
    }

    /// Re-randomize the layout and let the mover settle it again
    pub fn scramble(&self) {
        self.graph.lock().scramble();
        (self.notify)();
    }

    /// Apply every event the driver produced since the last call
    pub fn poll(&mut self) {
        let events = match &self.driver {
            Some(driver) => driver.poll_events(),
            None => return,
        };
        for event in events {
            self.apply(event);
        }
    }

    /// Block until the driver reports, then apply the event
    pub fn wait(&mut self) -> Option<DriverEvent> {
        let event = self.driver.as_ref()?.recv_event()?;
        self.apply(event.clone());
        Some(event)
    }

    /// Stop the current session, if any
    pub fn close_program(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.shutdown();
        }
        self.program = None;
        self.status = Status::Idle;
    }

    fn apply(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Stepped { step, nodes, edges } => {
                log::info!("Step {}: {} nodes, {} edges", step, nodes, edges);
                self.status = Status::Running { steps: step };
            }
            DriverEvent::Finished { steps } => {
                self.status = Status::Finished { steps };
            }
            DriverEvent::Failed(message) => self.fail(message),
        }
    }

    fn fail(&mut self, message: String) {
        log::warn!("Session failed: {}", message);
        if let Some(mut driver) = self.driver.take() {
            driver.shutdown();
        }
        self.status = Status::Error(message);
    }
}

/// eframe application
pub struct UnyoApp {
    context: AppContext,
    theme: CanvasTheme,
}

impl UnyoApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: UnyoConfig,
        program: Option<PathBuf>,
    ) -> Self {
        let repaint = cc.egui_ctx.clone();
        let notify: Notify = Arc::new(move || repaint.request_repaint());

        let mut context = AppContext::new(config, notify);
        if let Some(path) = program {
            // Failure is already reflected in the status bar
            let _ = context.open_program(&path);
        }

        Self {
            context,
            theme: CanvasTheme::dark(),
        }
    }

    fn open_dialog(&mut self) {
        let extension = self.context.config.window.file_extension.clone();
        let mut dialog = rfd::FileDialog::new()
            .add_filter(format!("LMNtal file (*.{})", extension), &[extension.as_str()]);
        if let Some(home) = dirs::home_dir() {
            dialog = dialog.set_directory(home);
        }

        if let Some(path) = dialog.pick_file() {
            let _ = self.context.open_program(&path);
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::drag());
        if response.dragged() {
            self.context.transform.move_by(response.drag_delta());
        }

        let rect = response.rect;
        let mut surface = PainterSurface::new(
            &painter,
            rect,
            self.theme,
            self.context.config.window.node_radius,
        );

        let mut graph = self.context.graph.lock();
        graph.set_canvas_size(rect.size());
        render(&graph, &self.context.transform, &mut surface);
    }
}

impl eframe::App for UnyoApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.context.poll();

        let (mut open, mut step, mut scramble) = ctx.input(|i| {
            (
                i.modifiers.command && i.key_pressed(Key::O),
                i.key_pressed(Key::Space) || i.key_pressed(Key::ArrowRight),
                i.key_pressed(Key::R),
            )
        });

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open… (Ctrl+O)").clicked() {
                        open = true;
                        ui.close_menu();
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.separator();
                let can_step = matches!(self.context.status(), Status::Running { .. });
                if ui.add_enabled(can_step, egui::Button::new("▶ Step")).clicked() {
                    step = true;
                }
                if ui.button("⟲ Reset view").clicked() {
                    self.context.transform.reset();
                }
                if ui.button("⤨ Scramble (R)").clicked() {
                    scramble = true;
                }
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(program) = self.context.program() {
                    ui.label(program.display().to_string());
                    ui.separator();
                }
                ui.label(self.context.status().to_string());
            });
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.canvas(ui));

        if open {
            self.open_dialog();
        }
        if step {
            self.context.step();
        }
        if scramble {
            self.context.scramble();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("Closing session on exit...");
        self.context.close_program();
    }
}
