/// Lexicon Linter: validates an operator phrasebook before it is deployed.
///
/// Usage: lexicon_linter <phrasebook.json|phrasebook.ron> [--strict]

use entry_trainer::core::lexicon::{base_phrases, is_valid_reflect_template, Phrasebook, PhrasebookIssue};
use entry_trainer::core::matcher::normalize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: lexicon_linter <phrasebook.json|phrasebook.ron> [--strict]");
        process::exit(0);
    }

    let path = Path::new(&args[1]);
    let strict = args[2..].iter().any(|a| a == "--strict");

    if !path.is_file() {
        eprintln!("ERROR: Path '{}' does not exist", path.display());
        process::exit(1);
    }

    let (phrasebook, issues) = match Phrasebook::load_checked(path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("ERROR: Failed to load phrasebook: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded {} intent bucket(s), {} smalltalk entr{}",
        phrasebook.intents.len(),
        phrasebook.smalltalk.len(),
        if phrasebook.smalltalk.len() == 1 { "y" } else { "ies" }
    );

    let (mut errors, mut warnings) = lint_phrasebook(&phrasebook);
    for issue in issues {
        match issue {
            PhrasebookIssue::IntentNotAList(_) | PhrasebookIssue::InvalidSection(_) => {
                errors.push(issue.to_string())
            }
            _ => warnings.push(issue.to_string()),
        }
    }

    println!("\n=== Lexicon Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() && !(strict && !warnings.is_empty()) {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn lint_phrasebook(phrasebook: &Phrasebook) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let base = base_phrases();

    // normalized phrase -> intent, seeded from the built-in table
    let mut owner: HashMap<String, String> = HashMap::new();
    for (intent, phrases) in &base {
        for phrase in phrases {
            owner.insert(normalize(phrase), intent.clone());
        }
    }

    for (intent, phrases) in &phrasebook.intents {
        if !base.contains_key(intent) {
            warnings.push(format!(
                "Intent '{}' is not used by any step; its phrases are never checked",
                intent
            ));
        }
        if phrases.is_empty() {
            warnings.push(format!("Intent '{}' has no phrases", intent));
        }

        let mut seen = HashSet::new();
        for phrase in phrases {
            let key = normalize(phrase);
            if key.is_empty() {
                warnings.push(format!(
                    "Intent '{}': phrase '{}' is only punctuation",
                    intent, phrase
                ));
                continue;
            }
            if !seen.insert(key.clone()) {
                warnings.push(format!("Intent '{}': duplicate phrase '{}'", intent, phrase));
                continue;
            }
            match owner.get(&key) {
                Some(other) if other == intent => {
                    warnings.push(format!(
                        "Intent '{}': phrase '{}' is already built in",
                        intent, phrase
                    ));
                }
                Some(other) => {
                    errors.push(format!(
                        "Phrase '{}' is listed under both '{}' and '{}'",
                        phrase, other, intent
                    ));
                }
                None => {
                    owner.insert(key, intent.clone());
                }
            }
        }
    }

    if !is_valid_reflect_template(&phrasebook.reflect_template) {
        errors.push(format!(
            "Reflect template '{}' must contain {{q}} and no other placeholder",
            phrasebook.reflect_template
        ));
    }

    // Small talk is checked before intents; a pattern inside an intent
    // phrase would swallow that question.
    let mut names = HashSet::new();
    for entry in &phrasebook.smalltalk {
        if !names.insert(entry.name.as_str()) {
            warnings.push(format!("Duplicate smalltalk name '{}'", entry.name));
        }
        for pattern in &entry.patterns {
            let pattern_key = normalize(pattern);
            if pattern_key.is_empty() {
                warnings.push(format!(
                    "Smalltalk '{}': pattern '{}' is only punctuation",
                    entry.name, pattern
                ));
                continue;
            }
            let mut shadowed: Vec<&str> = owner
                .iter()
                .filter(|(phrase, _)| phrase.contains(&pattern_key))
                .map(|(_, intent)| intent.as_str())
                .collect();
            shadowed.sort_unstable();
            shadowed.dedup();
            for intent in shadowed {
                warnings.push(format!(
                    "Smalltalk '{}': pattern '{}' shadows phrases of intent '{}'",
                    entry.name, pattern, intent
                ));
            }
        }
    }

    (errors, warnings)
}
