//! Terminal rendering for studies, reviews and listings.

use crate::config::Config;
use crate::engines::EngineKind;
use crate::protocols::collision::VectorCategory;
use crate::storage::SavedStudy;
use crate::utilities::printer::{ColoredText, Printer, PrinterColor};
use crate::validation::{FlagLevel, ValidationResult};

pub(super) fn show_study(printer: &Printer, engine: Option<EngineKind>, content: &str) {
    let title = match engine {
        Some(kind) => format!("{} STUDY", kind.as_str().to_uppercase()),
        None => "STUDY".to_string(),
    };
    println!();
    printer.heading(&title);
    println!();
    println!("{}", content.trim_end());
    println!();
}

pub(super) fn show_validation(printer: &Printer, review: &ValidationResult) {
    printer.heading("Validation");
    let band = PrinterColor::for_band(review.score_color());
    printer.print_colored(&[
        ColoredText::new("Overall: ", PrinterColor::BoldWhite),
        ColoredText::new(format!("{}/100", review.overall_score), band),
        ColoredText::new(format!("  ({})", review.recommendation), PrinterColor::Dim),
    ]);
    if !review.vibe.is_empty() {
        printer.info(&review.vibe);
    }
    printer.field("Accuracy", &review.accuracy.score.to_string());
    printer.field("Helpfulness", &review.helpfulness.score.to_string());
    printer.field("Faithfulness", &review.faithfulness.score.to_string());

    for flag in review.display_flags() {
        let color = match flag.level {
            FlagLevel::Critical => PrinterColor::BoldRed,
            FlagLevel::Important => PrinterColor::Yellow,
            FlagLevel::Minor => PrinterColor::Dim,
        };
        printer.print(&format!("[{}] {}", flag.level.as_str(), flag.message), color);
    }
    if !review.summary.is_empty() {
        println!("{}", review.summary);
    }
    if let Some(error) = &review.validation_error {
        printer.warning(error);
    }
}

pub(super) fn show_config(printer: &Printer, config: &Config) {
    printer.heading("Current Configuration");
    let key = if config.validate_api_key() {
        printer.paint("✓ Set", PrinterColor::Green)
    } else {
        printer.paint("✗ Not set", PrinterColor::Red)
    };
    println!("API Key: {}", key);
    printer.field("Default Translation", &config.default_translation);
    printer.field("Default Engine", &config.default_engine);
    printer.field("Output Directory", &config.output_directory.display().to_string());
    printer.field("Model", &config.model);
    printer.field("Validation Model", &config.validation_model);
    printer.field("Prompt Caching", &config.enable_prompt_caching.to_string());
    printer.field("Validation", &config.enable_validation.to_string());
}

pub(super) fn show_saved(printer: &Printer, studies: &[SavedStudy]) {
    if studies.is_empty() {
        printer.info("No saved studies found");
        return;
    }
    printer.heading("Saved Studies");
    for (i, study) in studies.iter().enumerate() {
        printer.print_colored(&[
            ColoredText::new(format!("{}. ", i + 1), PrinterColor::BoldWhite),
            ColoredText::new(format!("[{}] ", study.engine), PrinterColor::Cyan),
            ColoredText::new(&study.reference, PrinterColor::BoldWhite),
        ]);
        let date = if study.timestamp.is_empty() {
            "Unknown".to_string()
        } else {
            study.timestamp.chars().take(10).collect()
        };
        println!("   Date: {}", date);
        println!("   Words: {}", study.word_count);
        println!("   File: {}", study.filepath);
        println!();
    }
}

pub(super) fn show_vectors(printer: &Printer, lists: &[(VectorCategory, &'static [&'static str])]) {
    for (category, options) in lists {
        printer.print(category.title(), PrinterColor::BoldCyan);
        for option in options.iter() {
            println!("  - {}", option);
        }
        println!();
    }
}
