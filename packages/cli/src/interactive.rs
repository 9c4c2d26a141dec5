#![allow(clippy::module_name_repetitions)]

//! Interactive menu for the response planner.
//!
//! Provides a menu-driven interface using `dialoguer` for running the
//! headless commands without memorizing CLI flags.

use dialoguer::{Input, MultiSelect, Select};
use response_planner_cli_utils::MultiProgress;
use response_planner_source::registry::all_definitions;

use crate::{
    build_registry, list_sources, load, parse_zooms, print_features, print_icon, print_scale,
    query_near,
};

/// Top-level actions available in the interactive menu.
enum Action {
    LoadFacilities,
    QueryNearPoint,
    ListSources,
    ResolveIcon,
    ShowScale,
}

impl Action {
    const ALL: &[Self] = &[
        Self::LoadFacilities,
        Self::QueryNearPoint,
        Self::ListSources,
        Self::ResolveIcon,
        Self::ShowScale,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::LoadFacilities => "Load facilities onto a headless map",
            Self::QueryNearPoint => "Query facilities near a point",
            Self::ListSources => "List sources",
            Self::ResolveIcon => "Resolve a category to an icon",
            Self::ShowScale => "Show marker sizes for zoom levels",
        }
    }
}

/// Runs the interactive menu, prompting the user to select and configure
/// an operation.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected operation fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Response Planner");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::LoadFacilities => {
            let Some(sources) = select_sources()? else {
                return Ok(());
            };
            let zooms: String = Input::new()
                .with_prompt("Zoom levels to replay (comma-separated)")
                .default("10,15,12,25".to_string())
                .interact_text()?;
            let zooms = parse_zooms(&zooms)?;

            let registry = build_registry(None, Some(sources))?;
            load(registry, &zooms, multi).await?.print();
        }
        Action::QueryNearPoint => {
            let latitude: f64 = Input::new().with_prompt("Latitude").interact_text()?;
            let longitude: f64 = Input::new().with_prompt("Longitude").interact_text()?;

            let registry = build_registry(None, None)?;
            let results = query_near(&registry, latitude, longitude, multi).await?;
            print_features(&results);
        }
        Action::ListSources => list_sources(&build_registry(None, None)?),
        Action::ResolveIcon => {
            let category: String = Input::new()
                .with_prompt("Category")
                .allow_empty(true)
                .interact_text()?;
            print_icon(&category)?;
        }
        Action::ShowScale => {
            let zooms: String = Input::new()
                .with_prompt("Zoom levels (comma-separated)")
                .default("10,12,13,15,16,21,22".to_string())
                .interact_text()?;
            print_scale(&parse_zooms(&zooms)?);
        }
    }

    Ok(())
}

/// Prompts for the sources to load. Returns `None` if nothing was picked.
fn select_sources() -> Result<Option<String>, Box<dyn std::error::Error>> {
    let definitions = all_definitions();
    let labels: Vec<String> = definitions
        .iter()
        .map(|d| format!("{} ({})", d.name(), d.fetcher.kind()))
        .collect();
    let defaults: Vec<bool> = definitions.iter().map(|d| d.enabled).collect();

    let selected = MultiSelect::new()
        .with_prompt("Select sources to load (space=toggle, a=all, enter=confirm)")
        .items(&labels)
        .defaults(&defaults)
        .max_length(20)
        .interact()?;

    if selected.is_empty() {
        println!("No sources selected.");
        return Ok(None);
    }

    Ok(Some(
        selected
            .iter()
            .map(|&i| definitions[i].id())
            .collect::<Vec<_>>()
            .join(","),
    ))
}
