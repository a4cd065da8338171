//! Interactive operator console
//!
//! Reads line commands from stdin and drives the session controller:
//! selecting the model, mode, and temperature that incoming signal frames
//! are filed under. Observer callbacks print session events between
//! prompts so the operator sees captures as they happen.

use std::sync::Arc;

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::session::SessionController;

/// Wires the status printers, starts listening, and runs the command loop
/// until `quit` or end of input
pub async fn run(controller: Arc<SessionController>) -> Result<()> {
    wire_status_printers(&controller).await;
    controller.start_listening().await?;

    println!("Type {} for a list of commands.", "\"help\"".blue());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !dispatch(&controller, &line).await {
            break;
        }
    }

    Ok(())
}

async fn wire_status_printers(controller: &SessionController) {
    controller.on_listening(|is_listening| {
        if is_listening {
            println!("Session {}", "is listening".green());
            println!("{}", "Waiting for transmitter connection...".blue());
        } else {
            println!("Session {}", "stopped listening".red());
        }
    });

    controller
        .on_transmitter(true, |status| {
            if status.connected {
                println!("Transmitter {}", "connected".green());
            } else {
                println!("Transmitter {}", "disconnected".red());
            }
        })
        .await;

    controller.on_capture(|event| {
        println!(
            "{} set for {} with mode {} and output {}",
            event.encoded_signal,
            event.model_name,
            event.mode.to_string().green(),
            event.output.to_string().green(),
        );
    });
}

/// Handles one console line; returns false when the console should exit
async fn dispatch(controller: &SessionController, line: &str) -> bool {
    let (command, value) = parse_line(line);

    let command = match command {
        Some(command) => command,
        None => {
            println!("{}", "Invalid command".red());
            return true;
        }
    };

    match command.as_str() {
        "setmode" | "sm" => {
            if let Some(mode) = require_numeric(&value) {
                controller.set_mode(mode).await;
                println!("Mode set to {}", mode.to_string().green());
            }
        }
        "settemperature" | "setoutput" | "so" | "st" => {
            if let Some(temperature) = require_numeric(&value) {
                controller.set_temperature(temperature).await;
                println!("Temperature set to {}", temperature.to_string().green());
            }
        }
        "select" => {
            if let Some(value) = require_value(&value) {
                select_model(controller, value).await;
            }
        }
        "create" => {
            if let Some(value) = require_value(&value) {
                match controller.create_model(value, false).await {
                    Ok(model) => println!("{} {}", model.name, "created".green()),
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
        }
        "save" => {
            if let Err(e) = controller.save_current_model().await {
                println!("{}", e.to_string().red());
            }
        }
        "list" => match controller.list_models().await {
            Ok(models) => {
                let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                println!("{}", names.join(", "));
            }
            Err(e) => println!("{}", e.to_string().red()),
        },
        "help" => println!("{}", help_text()),
        "quit" | "exit" => return false,
        _ => {
            println!("{}", "Unknown command.".red());
            println!("Use {} for possible commands.", "\"help\"".blue());
        }
    }

    true
}

/// Tries the value as a model name first, then as an id
async fn select_model(controller: &SessionController, value: &str) {
    match controller.select_model_by_name(value).await {
        Ok(Some(model)) => println!("Selected {}", model.name.green()),
        Ok(None) => match controller.select_model_by_id(value).await {
            Ok(Some(model)) => println!("Selected {}", model.name.green()),
            Ok(None) | Err(_) => println!("{} {}", value, "not found.".red()),
        },
        Err(e) => println!("{}", e.to_string().red()),
    }
}

/// Splits a raw line into lowercase command and first value token
///
/// Surrounding whitespace and repeated separators are dropped; tokens past
/// the second are ignored.
fn parse_line(line: &str) -> (Option<String>, Option<String>) {
    let normalized = line.trim().to_lowercase();
    let mut parts = normalized.split_whitespace();
    (
        parts.next().map(str::to_string),
        parts.next().map(str::to_string),
    )
}

fn require_value<'a>(value: &'a Option<String>) -> Option<&'a str> {
    match value.as_deref() {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            println!("{}", "Invalid value".red());
            None
        }
    }
}

fn require_numeric(value: &Option<String>) -> Option<i64> {
    let value = require_value(value)?;
    match value.parse::<i64>() {
        Ok(number) => Some(number),
        Err(_) => {
            println!("{}", "Value must be a number".red());
            None
        }
    }
}

fn help_text() -> String {
    format!(
        r#"
Use <command> <value>.
List of possible commands:

    {}: Sets the session's current mode.
    {}: Sets the session's current temperature.
    {}: Selects a model by id or name.
    {}: Creates a model. The value is its name.
    {}: Saves the current selected model.
    {}: Gives a list of all models.
    {}: Exits the console.
"#,
        "setmode".blue(),
        "setoutput|settemperature".blue(),
        "select".blue(),
        "create".blue(),
        "save".blue(),
        "list".blue(),
        "quit".blue(),
    )
}
