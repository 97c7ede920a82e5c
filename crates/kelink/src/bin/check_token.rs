//! Diagnose `BOT_TOKEN` problems (stray whitespace, wrong shape) without starting the bot.

use std::{path::Path, process::ExitCode};

use kelink_core::{config::load_dotenv_if_present, token};

fn main() -> ExitCode {
    load_dotenv_if_present(Path::new(".env"));

    let Ok(raw) = std::env::var("BOT_TOKEN") else {
        println!("TOKEN : <unset>");
        println!("LENGTH: None");
        println!("FORMAT: false");
        return ExitCode::FAILURE;
    };

    let report = token::inspect(&raw);
    println!("TOKEN : {:?}", token::mask(&raw));
    println!("LENGTH: {}", report.length);
    if report.has_surrounding_whitespace {
        println!("WARN  : value has leading/trailing whitespace");
    }
    println!("FORMAT: {}", report.format_ok);

    if report.format_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
