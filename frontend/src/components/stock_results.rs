use shared::TaskResult;
use yew::prelude::*;

pub fn render_stock_result(result: &TaskResult) -> Html {
    let video_url = result.video_url_with_cache_buster(js_sys::Date::now() as i64);
    html! {
        <div class="results-container stock-detected">
            <h2><i class="fa-solid fa-boxes-stacked"></i>{" Detected stock"}</h2>
            {
                if result.results.is_empty() {
                    html! { <p class="no-results-message">{"No items detected."}</p> }
                } else {
                    html! {
                        <table class="stock-table">
                            <thead><tr><th>{"Item"}</th><th>{"Count"}</th></tr></thead>
                            <tbody>
                                { for result.results.iter().map(|(item, count)| html! {
                                    <tr><td>{ item.clone() }</td><td>{ count.to_string() }</td></tr>
                                })}
                            </tbody>
                        </table>
                    }
                }
            }
            {
                match video_url {
                    Some(url) => html! { <video class="annotated-video" src={url} controls=true /> },
                    None => html! {},
                }
            }
            {
                match &result.results_url {
                    Some(url) => html! { <a href={url.clone()} target="_blank">{"Download results"}</a> },
                    None => html! {},
                }
            }
        </div>
    }
}
