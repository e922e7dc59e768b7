//! Evaluation command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, EvaluateRequest, EvaluationResult};
use crate::output::{
    color_alert_level, format_probability, format_timestamp, print_error, OutputFormat,
};

/// Run one evaluation and print the result; an error result fails the command
pub async fn run_evaluation(
    client: &ApiClient,
    gauge_id: Option<String>,
    station_id: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let request = EvaluateRequest {
        gauge_id,
        station_id,
    };
    let result = client.evaluate(&request).await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    let prediction = match result {
        EvaluationResult::Prediction(prediction) => prediction,
        EvaluationResult::Error { error } => {
            if let OutputFormat::Table = format {
                print_error(&error);
            }
            anyhow::bail!("evaluation failed");
        }
    };

    if let OutputFormat::Table = format {
        println!("{}", "Flood Evaluation".bold());
        println!("{}", "=".repeat(50));
        if let Some(gauge) = &request.gauge_id {
            println!("Gauge:        {}", gauge.cyan());
        }
        if let Some(station) = &request.station_id {
            println!("Station:      {}", station.cyan());
        }
        println!(
            "Alert Level:  {}",
            color_alert_level(&prediction.alert_level)
        );
        println!(
            "Probability:  {}",
            format_probability(prediction.flood_probability)
        );
        println!("Evaluated:    {}", format_timestamp(&prediction.timestamp));
        println!();
        println!("{}", prediction.message);
    }

    Ok(())
}
