use rand::Rng;
use rand::seq::SliceRandom;

use super::options::PassgenOptions;
use crate::config::ConfigStore;
use crate::error::{AbError, Result};

const COMMAND: &str = "passgenerator";
const DEFAULT_LENGTH: i64 = 16;

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:,.<>?/|~";
const AMBIGUOUS: &str = "0O1lI|";

/// `ab util passgenerator`
pub fn run(options: &PassgenOptions, config: &ConfigStore) -> Result<()> {
    let length = config
        .command_int(COMMAND, "default_length", options.length)
        .unwrap_or(DEFAULT_LENGTH);
    let classes = character_classes(!options.no_symbols, options.no_ambiguous);

    let mut rng = rand::thread_rng();
    for _ in 0..options.count.max(1) {
        println!("{}", generate(length, &classes, &mut rng)?);
    }
    Ok(())
}

/// Lower, upper, digits and (optionally) symbols, each as its own pool.
pub fn character_classes(symbols: bool, no_ambiguous: bool) -> Vec<Vec<char>> {
    let mut pools = vec![LOWERCASE, UPPERCASE, DIGITS];
    if symbols {
        pools.push(SYMBOLS);
    }
    pools
        .into_iter()
        .map(|pool| {
            pool.chars()
                .filter(|c| !no_ambiguous || !AMBIGUOUS.contains(*c))
                .collect::<Vec<char>>()
        })
        .filter(|pool| !pool.is_empty())
        .collect()
}

/// One character from every class, the rest from the union, then shuffled.
pub fn generate<R: Rng + ?Sized>(
    length: i64,
    classes: &[Vec<char>],
    rng: &mut R,
) -> Result<String> {
    let minimum = classes.len();
    let length = usize::try_from(length).unwrap_or(0);
    if length < minimum {
        return Err(AbError::InvalidInput(format!(
            "Password length must be at least {} (one character per class)",
            minimum
        )));
    }

    let all: Vec<char> = classes.iter().flatten().copied().collect();
    if all.is_empty() {
        return Err(AbError::InvalidInput("No characters to choose from".to_string()));
    }
    let mut password: Vec<char> = classes
        .iter()
        .filter_map(|pool| pool.choose(&mut *rng).copied())
        .collect();
    while password.len() < length {
        if let Some(c) = all.choose(&mut *rng) {
            password.push(*c);
        }
    }
    password.shuffle(&mut *rng);
    Ok(password.into_iter().collect())
}
