use yew::prelude::*;

/// Renders the application header
pub fn render_header() -> Html {
    html! {
        <header class="app-header">
            <h1><i class="fa-solid fa-recycle"></i> {" Kitchen Waste & Stock Monitor"}</h1>
            <p class="subtitle">{"Classify food waste from a photo or count stock from a fridge video"}</p>
        </header>
    }
}
