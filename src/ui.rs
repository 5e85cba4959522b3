// UI layer: a line-based command loop using `dialoguer` prompts.
// Each verb maps to one engine call; results are rendered here and any
// engine error is printed without ending the session.

use crate::activity::{Activity, ActivityState};
use crate::config::Config;
use crate::engine::Legym;
use crate::error::Result as EngineResult;
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const HELP: &str = "\
login            log in again as another user
act [category]   list activities (signed, registered, available, blocked; prefixes ok)
reg [name..]     register for the named activities, or the only open one
sign             check in to every registered activity
run [km]         upload a run (default: daily mileage)
help             show this text
quit             leave";

/// Log in, then read commands until `quit`.
pub fn main_loop(config: Config) -> Result<()> {
    println!("{}", "------ Legym CLI ------".bold());
    let mut engine = loop {
        if let Some(engine) = handle_login(&config)? {
            break engine;
        }
    };
    println!("Type `help` to see the available commands.");

    loop {
        let line: String = Input::new().with_prompt(">>>").interact_text()?;
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        let outcome = match verb {
            "login" => {
                // A fresh login replaces the whole engine; the old session is dropped.
                if let Some(fresh) = handle_login(&config)? {
                    engine = fresh;
                }
                Ok(())
            }
            "act" => handle_act(&mut engine, &args),
            "reg" => handle_reg(&mut engine, &args),
            "sign" => handle_sign(&mut engine),
            "run" => handle_run(&mut engine, &args),
            "help" => {
                println!("\n{HELP}\n");
                Ok(())
            }
            "quit" | "exit" => break,
            other => {
                println!("Unsupported command: {other}");
                Ok(())
            }
        };

        if let Err(err) = outcome {
            println!("{}", err.to_string().red());
            if err.is_auth_failure() {
                println!("Use `login` to start a new session.");
            }
        }
    }
    println!("------ Bye ------");
    Ok(())
}

/// Collect credentials and log in. Returns `None` when the login failed.
fn handle_login(config: &Config) -> Result<Option<Legym>> {
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password: String = Password::new().with_prompt("Password").interact()?;

    let spinner = spinner("Logging in...");
    let result = Legym::connect(config.clone(), &username, &password);
    spinner.finish_and_clear();

    match result {
        Ok(engine) => {
            let (name, school) = engine.identity();
            println!("Welcome back, {} of {}!", name, school);
            Ok(Some(engine))
        }
        Err(e) => {
            println!("Login failed: {}", e);
            Ok(None)
        }
    }
}

fn handle_act(engine: &mut Legym, args: &[&str]) -> EngineResult<()> {
    let only = args.first().map(|arg| arg.parse::<ActivityState>()).transpose()?;
    let catalog = engine.list_activities()?;
    for (state, activities) in catalog.grouped() {
        if only.map_or(true, |wanted| wanted == state) {
            print_group(state, &activities);
        }
    }
    Ok(())
}

fn print_group(state: ActivityState, activities: &[&Activity]) {
    println!("{}", format!("{}:", state.label()).bold());
    for activity in activities {
        println!("  {}", activity.name);
    }
}

fn handle_reg(engine: &mut Legym, args: &[&str]) -> EngineResult<()> {
    if args.is_empty() {
        let outcome = engine.sign_up(None)?;
        println!("{}: {}", outcome.activity_name, outcome.message);
        return Ok(());
    }
    for &selector in args {
        match engine.sign_up(Some(selector)) {
            Ok(outcome) => println!("{}: {}", outcome.activity_name, outcome.message),
            Err(err) if err.is_auth_failure() => return Err(err),
            Err(err) => println!("{}: {}", selector, err),
        }
    }
    Ok(())
}

fn handle_sign(engine: &mut Legym) -> EngineResult<()> {
    let results = engine.sign_in()?;
    if results.is_empty() {
        println!("No registered activities to check in to.");
    }
    for (name, message) in results {
        println!("{}: {}", name, message);
    }
    Ok(())
}

fn handle_run(engine: &mut Legym, args: &[&str]) -> EngineResult<()> {
    let target = match args.first() {
        None => None,
        Some(arg) => match arg.parse::<f64>() {
            Ok(km) => Some(km),
            Err(_) => {
                let limits = engine.running_limits();
                println!(
                    "Not a distance: {} (expected {}..={} km)",
                    arg, limits.min_km, limits.max_km
                );
                return Ok(());
            }
        },
    };

    let spinner = spinner("Uploading run...");
    let report = engine.running(target);
    spinner.finish_and_clear();

    let report = report?;
    if report.success {
        println!("Uploaded {} km", report.distance_km);
    } else {
        println!("Upload failed: {}", report.message);
    }
    Ok(())
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
