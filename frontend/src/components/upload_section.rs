use super::super::{Mode, Model, Msg};
use super::utils::{debounce, first_matching_file};
use wasm_bindgen::JsCast;
use web_sys::{DragEvent, HtmlInputElement};
use yew::prelude::*;

pub fn render_upload_section(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let mode = model.mode;

    let handle_change = link.callback(move |e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let file = input
            .files()
            .as_ref()
            .and_then(|files| first_matching_file(files, mode.mime_prefix()));

        input.set_value("");

        match file {
            Some(file) => Msg::FileSelected(file),
            None => Msg::SetError(Some(format!("No valid {} file selected.", mode.noun()))),
        }
    });

    let handle_drag_over = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(true)
    });

    let handle_drag_leave = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(false)
    });

    let handle_drop = link.callback(Msg::HandleDrop);
    let trigger_file_input = Callback::from(|_| {
        let input = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id("file-input"));
        if let Some(input) = input {
            if let Ok(html_input) = input.dyn_into::<web_sys::HtmlElement>() {
                html_input.click();
            }
        }
    });

    html! {
        <div class="upload-section">
            { render_mode_tabs(model, ctx) }
            <input
                type="file"
                id="file-input"
                accept={mode.accept()}
                style="display: none;"
                onchange={handle_change}
            />

            <div
                id="drop-zone"
                class={classes!("upload-area", model.is_dragging.then_some("drag-over"))}
                ondragover={handle_drag_over}
                ondragleave={handle_drag_leave}
                ondrop={handle_drop}
                onclick={debounce(300, {
                    let trigger_file_input = trigger_file_input.clone();
                    move || trigger_file_input.emit(())
                })}
            >
                {
                    match (&model.file, &model.preview_url) {
                        (Some(file), Some(url)) => render_preview(mode, &file.name(), &url.to_string()),
                        _ => html! {
                            <div class="upload-placeholder">
                                <i class="fa-solid fa-cloud-arrow-up"></i>
                                <p>{format!("Drag & drop a {} here, or click", mode.noun())}</p>
                                <p class="file-types">{format!("Supported formats: {}", mode.formats())}</p>
                            </div>
                        },
                    }
                }
            </div>

            <div class="action-buttons">
                <button
                    class="analyze-btn"
                    disabled={model.file.is_none() || model.loading}
                    onclick={link.callback(|_| Msg::Analyze)}
                >
                    {
                        if model.loading {
                            html! { <><i class="fa-solid fa-spinner fa-spin"></i>{" Working..."}</> }
                        } else {
                            html! { <><i class="fa-solid fa-magnifying-glass"></i>{format!(" {}", mode.action())}</> }
                        }
                    }
                </button>
                <button
                    class="clear-btn"
                    disabled={model.file.is_none()}
                    onclick={link.callback(|_| Msg::Clear)}
                >
                    <i class="fa-solid fa-trash"></i>{" Clear"}
                </button>
            </div>
        </div>
    }
}

fn render_mode_tabs(model: &Model, ctx: &Context<Model>) -> Html {
    let tab = |mode: Mode, label: &'static str| {
        html! {
            <button
                class={classes!("mode-tab", (model.mode == mode).then_some("active"))}
                onclick={ctx.link().callback(move |_| Msg::SwitchMode(mode))}
            >
                { label }
            </button>
        }
    };
    html! {
        <div class="mode-tabs">
            { tab(Mode::Waste, "Food waste") }
            { tab(Mode::Stock, "Stock video") }
        </div>
    }
}

fn render_preview(mode: Mode, name: &str, url: &str) -> Html {
    let media = match mode {
        Mode::Waste => html! { <img src={url.to_string()} alt={name.to_string()} class="preview-media" /> },
        Mode::Stock => html! { <video src={url.to_string()} controls=true class="preview-media" /> },
    };
    html! {
        <div class="preview-container">
            { media }
            <p class="preview-name">{ name }</p>
        </div>
    }
}
