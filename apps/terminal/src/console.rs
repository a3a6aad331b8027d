//! Operator prompts on stdin/stdout.

use std::io::{self, BufRead, Write};

use caixa_core::{Money, Till};
use caixa_fiscal::{Operator, RetryDecision, TillEditor};

/// Reads one trimmed line after printing `question`. `None` on end of input.
fn prompt(question: &str) -> Option<String> {
    print!("{question} ");
    io::stdout().flush().ok()?;

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Parses "12", "12.5", "12,50", "-3.10" into money. At most one leading
/// minus sign and two decimals; `None` for anything else, including empty
/// input.
pub fn parse_money(input: &str) -> Option<Money> {
    let input = input.trim();
    let (negative, unsigned) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let (major, minor) = unsigned.split_once(['.', ',']).unwrap_or((unsigned, ""));

    if major.is_empty() && minor.is_empty() {
        return None;
    }
    if !major.chars().chain(minor.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let major: i64 = match major {
        "" => 0,
        digits => digits.parse().ok()?,
    };
    let minor: i64 = match minor.len() {
        0 => 0,
        1 => minor.parse::<i64>().ok()? * 10,
        2 => minor.parse().ok()?,
        _ => return None,
    };

    let cents = major.checked_mul(100)?.checked_add(minor)?;
    Some(Money::from_cents(if negative { -cents } else { cents }))
}

#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn warning(&self, message: &str, details: Option<&str>) {
        eprintln!("\n[!] {message}");
        if let Some(details) = details {
            eprintln!("    {details}");
        }
    }

    fn ask_retry(&self, message: &str) -> RetryDecision {
        println!("\n{message}");
        loop {
            match prompt("[r] Resume  [c] Confirm later:").as_deref() {
                Some("r") | Some("R") => return RetryDecision::Retry,
                Some("c") | Some("C") | None => return RetryDecision::Abort,
                Some(_) => continue,
            }
        }
    }

    fn confirm_close_till(&self, opened_on: &str) -> bool {
        println!(
            "\nYou need to close the till opened {opened_on} before creating a new order.\n\nClose the till?"
        );
        loop {
            match prompt("[c] Close Till  [n] Not now:").as_deref() {
                Some("c") | Some("C") => return true,
                Some("n") | Some("N") | None => return false,
                Some(_) => continue,
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleTillEditor;

impl ConsoleTillEditor {
    fn ask_amount(question: &str) -> Option<Money> {
        loop {
            let answer = prompt(question)?;
            if answer.is_empty() {
                return None;
            }
            match parse_money(&answer) {
                Some(amount) => return Some(amount),
                None => eprintln!("Not an amount: {answer}"),
            }
        }
    }
}

impl TillEditor for ConsoleTillEditor {
    fn run_opening(&self, carry_over: Money) -> Option<Money> {
        println!("\n== Till opening ==");
        println!("Cash left in the drawer: {carry_over}");
        Self::ask_amount("Cash to add (empty to cancel):")
    }

    fn run_closing(&self, till: &Till, previous_day: bool) -> Option<Money> {
        println!("\n== Till closing ==");
        if previous_day {
            println!("This till was opened on a previous day.");
        }
        if let Some(opened) = till.opening_date {
            println!("Opened at {}", opened.format("%Y-%m-%d %H:%M"));
        }
        println!("Initial cash: {}", till.initial_cash());
        Self::ask_amount("Cash counted in the drawer (empty to cancel):")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("12"), Some(Money::from_cents(1200)));
        assert_eq!(parse_money("12.5"), Some(Money::from_cents(1250)));
        assert_eq!(parse_money("12,05"), Some(Money::from_cents(1205)));
        assert_eq!(parse_money(" 0.99 "), Some(Money::from_cents(99)));
        assert_eq!(parse_money("-3.10"), Some(Money::from_cents(-310)));
        assert_eq!(parse_money(".5"), Some(Money::from_cents(50)));
    }

    #[test]
    fn test_parse_money_rejects_garbage() {
        assert_eq!(parse_money("abc"), None);
        assert_eq!(parse_money("1.234"), None);
        assert_eq!(parse_money("1.-5"), None);
        assert_eq!(parse_money("1.+5"), None);
        assert_eq!(parse_money("--5"), None);
        assert_eq!(parse_money("-"), None);
        assert_eq!(parse_money("."), None);
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("   "), None);
    }
}
