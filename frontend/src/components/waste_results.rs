use shared::{format_confidence, ClassificationResult, ConfidenceBand, NormalizationOutcome, WasteCategory};
use yew::prelude::*;

pub fn render_waste_results(outcome: &NormalizationOutcome) -> Html {
    match outcome {
        NormalizationOutcome::NoFood => render_notice("no-food", "fa-ban", outcome.summary()),
        NormalizationOutcome::FoodNoWaste => render_notice("no-waste", "fa-circle-check", outcome.summary()),
        NormalizationOutcome::Unparseable => html! {
            <div class="results-container unparseable">
                <h2><i class="fa-solid fa-triangle-exclamation"></i>{format!(" {}", outcome.summary())}</h2>
                <p>{"The classifier answered, but not in a form we could read. Try another photo."}</p>
            </div>
        },
        NormalizationOutcome::Classified(result) => render_classification(result),
    }
}

fn render_notice(class: &'static str, icon: &'static str, message: &str) -> Html {
    html! {
        <div class={classes!("results-container", class)}>
            <h2><i class={classes!("fa-solid", icon)}></i>{format!(" {}", message)}</h2>
        </div>
    }
}

fn render_classification(result: &ClassificationResult) -> Html {
    html! {
        <div class="results-container waste-detected">
            <div class="result-header">
                <h2 title={format!("Classified at {}", result.timestamp)}>
                    <i class="fa-solid fa-dumpster"></i>{" Food waste found"}
                    <span class="analyzed-filename-display">{format!("({})", result.image_id)}</span>
                </h2>
            </div>
            <div class="detailed-results">
                <h3>{format!("{} categories", result.categories.len())}</h3>
                { for result.categories.iter().map(render_category) }
            </div>
        </div>
    }
}

fn render_category(category: &WasteCategory) -> Html {
    let band = ConfidenceBand::of(category.confidence);
    let percentage = (category.confidence * 100.0).clamp(0.0, 100.0);
    html! {
        <div class="result-item">
            <div class="result-label">
                <strong>{ &category.name }</strong>
                <span class="food-type">{ &category.food_type }</span>
            </div>
            <div class="result-bar-container">
                <div class={classes!("result-bar", band.to_string())} style={format!("width: {}%", percentage)}></div>
            </div>
            <div class="result-value">{ format_confidence(category.confidence) }</div>
            <p class="explanation">{ &category.explanation }</p>
        </div>
    }
}
