mod api;
mod components;

use std::rc::Rc;

use components::header::render_header;
use components::stock_results::render_stock_result;
use components::task_status::TaskStatusPanel;
use components::theme_toggle::render_theme_toggle;
use components::upload_section::render_upload_section;
use components::utils::{first_matching_file, render_error_message};
use components::waste_results::render_waste_results;
use gloo_file::{File as GlooFile, ObjectUrl};
use shared::{NormalizationOutcome, PollConfig, ResponseNormalizer, Submission, TaskState};
use wasm_bindgen_futures::spawn_local;
use web_sys::DragEvent;
use yew::prelude::*;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Waste,
    Stock,
}

impl Mode {
    pub fn mime_prefix(self) -> &'static str {
        match self {
            Mode::Waste => "image/",
            Mode::Stock => "video/",
        }
    }

    pub fn accept(self) -> &'static str {
        match self {
            Mode::Waste => "image/jpeg,image/png,image/webp,image/bmp,image/gif",
            Mode::Stock => "video/mp4,video/quicktime,video/x-msvideo,video/webm",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            Mode::Waste => "photo",
            Mode::Stock => "video",
        }
    }

    pub fn formats(self) -> &'static str {
        match self {
            Mode::Waste => "JPG, PNG, WEBP, BMP, GIF",
            Mode::Stock => "MP4, MOV, AVI, WEBM",
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            Mode::Waste => "Classify waste",
            Mode::Stock => "Detect stock",
        }
    }
}

pub enum Msg {
    SwitchMode(Mode),
    FileSelected(GlooFile),
    Clear,

    Analyze,
    WasteResult(NormalizationOutcome),
    Submitted(Submission),
    TaskFinished(TaskState),

    SetError(Option<String>),
    SetDragging(bool),
    HandleDrop(DragEvent),
    ToggleTheme,
}

pub struct Model {
    mode: Mode,
    file: Option<GlooFile>,
    preview_url: Option<ObjectUrl>,
    loading: bool,
    error: Option<String>,
    is_dragging: bool,
    theme: String,
    outcome: Option<NormalizationOutcome>,
    submission: Option<Submission>,
    normalizer: Rc<ResponseNormalizer>,
    poll: PollConfig,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(_ctx: &Context<Self>) -> Self {
        Self {
            mode: Mode::Waste,
            file: None,
            preview_url: None,
            loading: false,
            error: None,
            is_dragging: false,
            theme: "light".to_string(),
            outcome: None,
            submission: None,
            normalizer: Rc::new(ResponseNormalizer::new()),
            poll: PollConfig::default(),
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::SwitchMode(mode) => self.handle_switch_mode(mode),
            Msg::FileSelected(file) => self.handle_file_selected(file),
            Msg::Clear => self.handle_clear(),

            Msg::Analyze => self.handle_analyze(ctx),
            Msg::WasteResult(outcome) => {
                self.loading = false;
                self.outcome = Some(outcome);
                true
            }
            Msg::Submitted(submission) => {
                self.loading = matches!(submission, Submission::Pending { .. });
                self.submission = Some(submission);
                true
            }
            Msg::TaskFinished(state) => {
                log::info!("Task {} finished: {}", state.task_id, state.status);
                self.loading = false;
                true
            }

            Msg::SetError(error) => {
                self.error = error;
                self.loading = false;
                true
            }
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }
            Msg::HandleDrop(event) => self.handle_drop(ctx, event),
            Msg::ToggleTheme => self.handle_toggle_theme(),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { render_header() }
                { render_theme_toggle(&self.theme, ctx.link()) }

                <main class="main-content">
                { render_upload_section(self, ctx) }
                { render_error_message(self) }
                { self.render_results(ctx) }
                </main>

                <footer class="app-footer">
                    <p>{"Kitchen Waste & Stock Monitor | Fullstack Rust WASM"}</p>
                </footer>
            </div>
        }
    }
}

impl Model {
    fn reset_results(&mut self) {
        self.outcome = None;
        self.submission = None;
        self.error = None;
        self.loading = false;
    }

    fn handle_switch_mode(&mut self, mode: Mode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        self.file = None;
        self.preview_url = None;
        self.reset_results();
        true
    }

    fn handle_file_selected(&mut self, file: GlooFile) -> bool {
        self.reset_results();
        self.preview_url = Some(ObjectUrl::from(file.clone()));
        self.file = Some(file);
        true
    }

    fn handle_clear(&mut self) -> bool {
        self.file = None;
        self.preview_url = None;
        self.reset_results();
        true
    }

    fn handle_analyze(&mut self, ctx: &Context<Self>) -> bool {
        let Some(file) = self.file.clone() else {
            ctx.link()
                .send_message(Msg::SetError(Some("No file selected for analysis.".into())));
            return false;
        };

        self.outcome = None;
        self.submission = None;
        self.error = None;
        self.loading = true;

        let link = ctx.link().clone();
        match self.mode {
            Mode::Waste => {
                let normalizer = Rc::clone(&self.normalizer);
                spawn_local(async move {
                    match api::classify_waste(&normalizer, &file).await {
                        Ok(outcome) => link.send_message(Msg::WasteResult(outcome)),
                        Err(e) => link.send_message(Msg::SetError(Some(e))),
                    }
                });
            }
            Mode::Stock => {
                spawn_local(async move {
                    match api::submit_stock_video(&file).await {
                        Ok(submission) => link.send_message(Msg::Submitted(submission)),
                        Err(e) => link.send_message(Msg::SetError(Some(e))),
                    }
                });
            }
        }
        true
    }

    fn handle_drop(&mut self, ctx: &Context<Self>, event: DragEvent) -> bool {
        event.prevent_default();
        self.is_dragging = false;

        let file = event
            .data_transfer()
            .and_then(|data_transfer| data_transfer.files())
            .and_then(|files| first_matching_file(&files, self.mode.mime_prefix()));
        match file {
            Some(file) => ctx.link().send_message(Msg::FileSelected(file)),
            None => {
                log::warn!("Dropped files contained no {}", self.mode.noun());
                ctx.link().send_message(Msg::SetError(Some(format!(
                    "Drop a {} file to continue.",
                    self.mode.noun()
                ))));
            }
        }
        true
    }

    fn handle_toggle_theme(&mut self) -> bool {
        let Some(body) = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.body())
        else {
            return false;
        };

        let toggled = if self.theme == "light" {
            self.theme = "dark".to_string();
            body.class_list().add_1("dark-mode")
        } else {
            self.theme = "light".to_string();
            body.class_list().remove_1("dark-mode")
        };
        if toggled.is_err() {
            log::warn!("Failed to switch theme class");
        }
        true
    }

    fn render_results(&self, ctx: &Context<Self>) -> Html {
        match (self.mode, &self.outcome, &self.submission) {
            (Mode::Waste, Some(outcome), _) => render_waste_results(outcome),
            (Mode::Stock, _, Some(Submission::Pending { task_id })) => html! {
                <TaskStatusPanel
                    task_id={task_id.clone()}
                    poll={self.poll}
                    on_finish={ctx.link().callback(Msg::TaskFinished)}
                />
            },
            (Mode::Stock, _, Some(Submission::Ready(result))) => render_stock_result(result),
            _ => html! {},
        }
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    yew::Renderer::<Model>::new().render();
}
