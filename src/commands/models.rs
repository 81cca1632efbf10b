//! `ab models`: browse the OpenRouter model catalogue.

use std::cmp::Ordering;

use colored::Colorize;

use super::format::ModelSort;
use super::options::ModelsListOptions;
use crate::config::ConfigStore;
use crate::error::{AbError, Result};
use crate::llm::provider::openrouter::{ModelInfo, OpenRouterProvider, Pricing};

const ID_WIDTH_MAX: usize = 40;
const NAME_WIDTH_MAX: usize = 30;
const AMBIGUOUS_SHOWN: usize = 10;
const DESCRIPTION_MAX_CHARS: usize = 200;
const PARAMETERS_SHOWN: usize = 10;

/// `ab models list`
pub async fn list(options: &ModelsListOptions, config: &ConfigStore, colored: bool) -> Result<()> {
    let provider = OpenRouterProvider::from_config(config)?;
    let models = provider.list_models().await?;
    let shown = select_models(models, options);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        print_table(&shown, colored);
    }
    Ok(())
}

/// `ab models info <ID>`
pub async fn info(model_id: &str, json: bool, config: &ConfigStore, colored: bool) -> Result<()> {
    let provider = OpenRouterProvider::from_config(config)?;
    let models = provider.list_models().await?;
    let model = find_model(&models, model_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(model)?);
    } else {
        print_model_info(model, colored);
    }
    Ok(())
}

/// Filter, sort, then apply the limit (`0` keeps everything).
pub fn select_models(models: Vec<ModelInfo>, options: &ModelsListOptions) -> Vec<ModelInfo> {
    let term = options.search.as_deref().map(str::to_lowercase);
    let modality = options.modality.as_deref().map(str::to_lowercase);

    let mut models: Vec<ModelInfo> = models
        .into_iter()
        .filter(|m| !options.free || m.is_free())
        .filter(|m| match &term {
            Some(term) => {
                m.id.to_lowercase().contains(term)
                    || m.name.to_lowercase().contains(term)
                    || m
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(term))
            }
            None => true,
        })
        .filter(|m| match options.context_min {
            Some(min) => m.context_length.unwrap_or(0) >= min,
            None => true,
        })
        .filter(|m| match &modality {
            Some(wanted) => m.modalities().to_lowercase().contains(wanted),
            None => true,
        })
        .collect();

    sort_models(&mut models, options.sort);
    if options.limit > 0 {
        models.truncate(options.limit);
    }
    models
}

pub fn sort_models(models: &mut [ModelInfo], sort: ModelSort) {
    match sort {
        ModelSort::Name => models.sort_by_key(|m| {
            if m.name.is_empty() {
                m.id.to_lowercase()
            } else {
                m.name.to_lowercase()
            }
        }),
        ModelSort::Context => {
            models.sort_by(|a, b| b.context_length.unwrap_or(0).cmp(&a.context_length.unwrap_or(0)))
        }
        // 价格无法解析的排在最后
        ModelSort::Price => models.sort_by(|a, b| {
            let price = |m: &ModelInfo| {
                m.pricing
                    .as_ref()
                    .map_or(Some(0.0), Pricing::prompt_per_token)
                    .unwrap_or(f64::INFINITY)
            };
            price(a).partial_cmp(&price(b)).unwrap_or(Ordering::Equal)
        }),
    }
}

/// Exact id, then a unique case-insensitive substring match.
pub fn find_model<'a>(models: &'a [ModelInfo], model_id: &str) -> Result<&'a ModelInfo> {
    if let Some(model) = models.iter().find(|m| m.id == model_id) {
        return Ok(model);
    }

    let needle = model_id.to_lowercase();
    let matches: Vec<&ModelInfo> = models
        .iter()
        .filter(|m| m.id.to_lowercase().contains(&needle))
        .collect();

    match matches.as_slice() {
        [] => Err(AbError::InvalidInput(format!("Model not found: {}", model_id))),
        [only] => Ok(only),
        many => {
            let mut listed: Vec<String> = many
                .iter()
                .take(AMBIGUOUS_SHOWN)
                .map(|m| format!("  - {}", m.id))
                .collect();
            if many.len() > AMBIGUOUS_SHOWN {
                listed.push(format!("  ... and {} more", many.len() - AMBIGUOUS_SHOWN));
            }
            Err(AbError::InvalidInput(format!(
                "Multiple models match '{}':\n{}",
                model_id,
                listed.join("\n")
            )))
        }
    }
}

/// `1.0M`, `128k`, `512`, or `N/A`.
pub fn format_context(context_length: Option<u64>) -> String {
    match context_length {
        None | Some(0) => "N/A".to_string(),
        Some(n) if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        Some(n) if n >= 1_000 => format!("{:.0}k", n as f64 / 1_000.0),
        Some(n) => n.to_string(),
    }
}

/// `$in / $out` per million tokens, `FREE`, or `N/A`.
pub fn format_price(pricing: Option<&Pricing>) -> String {
    let Some(pricing) = pricing else {
        return "N/A".to_string();
    };
    match (pricing.prompt_per_token(), pricing.completion_per_token()) {
        (Some(p), Some(c)) if p == 0.0 && c == 0.0 => "FREE".to_string(),
        (Some(p), Some(c)) => format!("${:.2} / ${:.2}", p * 1_000_000.0, c * 1_000_000.0),
        _ => "N/A".to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

fn print_table(models: &[ModelInfo], colored: bool) {
    if models.is_empty() {
        println!("No models found matching the criteria.");
        return;
    }

    let id_width = models
        .iter()
        .map(|m| m.id.chars().count())
        .max()
        .unwrap_or(2)
        .clamp(2, ID_WIDTH_MAX);
    let name_width = models
        .iter()
        .map(|m| m.name.chars().count())
        .max()
        .unwrap_or(4)
        .clamp(4, NAME_WIDTH_MAX);

    let header = format!(
        "{:<id_width$} | {:<name_width$} | {:>8} | {:<20} | Modality",
        "ID", "Name", "Context", "Price/1M (in/out)"
    );
    let separator = "-".repeat(id_width + name_width + 60);

    if colored {
        println!("{}", header.bold());
    } else {
        println!("{}", header);
    }
    println!("{}", separator);

    for model in models {
        let price = format_price(model.pricing.as_ref());
        let price = if colored && price == "FREE" {
            format!("{:<20}", price).green().to_string()
        } else {
            format!("{:<20}", price)
        };
        println!(
            "{:<id_width$} | {:<name_width$} | {:>8} | {} | {}",
            truncate(&model.id, id_width),
            truncate(&model.name, name_width),
            format_context(model.context_length),
            price,
            model.modalities()
        );
    }

    println!("{}", separator);
    let footer = format!("Showing {} model(s)", models.len());
    if colored {
        println!("{}", footer.dimmed());
    } else {
        println!("{}", footer);
    }
}

fn print_model_info(model: &ModelInfo, colored: bool) {
    let label = |text: &str| {
        if colored {
            text.cyan().to_string()
        } else {
            text.to_string()
        }
    };
    let heading = |text: &str| {
        if colored {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    };

    let title = format!("Model: {}", model.id);
    println!();
    println!("{}", heading(&title));
    println!("{}", "=".repeat(title.chars().count()));
    println!("{}           {}", label("Name:"), model.name);

    let description = model
        .description
        .as_deref()
        .unwrap_or("No description available.");
    println!(
        "{}    {}",
        label("Description:"),
        truncate(description, DESCRIPTION_MAX_CHARS)
    );
    match model.context_length {
        Some(n) => println!("{} {} tokens", label("Context Length:"), group_thousands(n)),
        None => println!("{} N/A", label("Context Length:")),
    }
    if let Some(max) = model.top_provider.as_ref().and_then(|t| t.max_completion_tokens) {
        println!("{}     {} tokens", label("Max Output:"), group_thousands(max));
    }

    println!();
    println!("{}", heading("Pricing (per 1M tokens):"));
    match model.pricing.as_ref() {
        Some(p) if p.is_free() => println!("  FREE"),
        Some(p) => {
            let per_million = |v: Option<f64>| {
                v.map_or_else(|| "N/A".to_string(), |v| format!("${:.4}", v * 1_000_000.0))
            };
            println!("  Prompt:       {}", per_million(p.prompt_per_token()));
            println!("  Completion:   {}", per_million(p.completion_per_token()));
        }
        None => println!("  N/A"),
    }

    println!();
    println!("{}", heading("Modalities:"));
    let (input, output) = match &model.architecture {
        Some(arch) => (
            join_or_text(&arch.input_modalities),
            join_or_text(&arch.output_modalities),
        ),
        None => ("text".to_string(), "text".to_string()),
    };
    println!("  Input:        {}", input);
    println!("  Output:       {}", output);

    if !model.supported_parameters.is_empty() {
        println!();
        println!("{}", heading("Supported Parameters:"));
        let mut params = model
            .supported_parameters
            .iter()
            .take(PARAMETERS_SHOWN)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if model.supported_parameters.len() > PARAMETERS_SHOWN {
            params.push_str(&format!(
                " (+{} more)",
                model.supported_parameters.len() - PARAMETERS_SHOWN
            ));
        }
        println!("  {}", params);
    }
    println!();
}

fn join_or_text(values: &[String]) -> String {
    if values.is_empty() {
        "text".to_string()
    } else {
        values.join(", ")
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
