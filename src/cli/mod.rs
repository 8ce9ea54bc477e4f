//! Command-line interface for the study engines.
//!
//! Generation commands differ only in where the passage comes from:
//!
//! - `lectionary paste <engine>`: reference and text typed or piped in
//! - `lectionary run <engine> <reference>`: text fetched from Bible Gateway
//! - `lectionary moravian <engine>`: today's Moravian Daily Texts
//! - `lectionary rcl <engine>`: today's Revised Common Lectionary reading
//!
//! Preference flags (`--length`, `--tone`, `--language`, `--focus`,
//! `--cultural-artifacts`) are global and switch generation onto the
//! preference-aware prompt builder.

mod display;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use crate::config::Config;
use crate::engines::{CollisionEngine, EngineKind, GenerationOptions};
use crate::preferences::StudyPreferences;
use crate::protocols::collision::VectorCategory;
use crate::services::{GeneratedStudy, StudyGeneratorService, StudyRequest, TextSource};
use crate::storage::{list_studies, read_study, save_study};
use crate::text_fetcher::{ReadingType, Translation};
use crate::utilities::errors::PreferencesError;
use crate::utilities::printer::{Printer, PrinterColor};
use crate::utilities::string_utils::word_count;

/// Lectionary Engines: biblical interpretation from the command line.
#[derive(Debug, Parser)]
#[command(name = "lectionary", version, after_long_help = EXAMPLES)]
pub struct Cli {
    #[command(flatten)]
    pub preferences: PreferenceArgs,

    /// Pin a collision vector; it replaces the random pick in its category.
    #[arg(long, global = true)]
    pub collision_vector: Option<String>,

    /// Print the study as it is generated.
    #[arg(long, global = true)]
    pub stream: bool,

    /// Review the study with the validation model after generating it.
    #[arg(long, global = true)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Command,
}

const EXAMPLES: &str = r#"Examples:
  lectionary run threshold "Mark 5:1-5"
  lectionary run palimpsest "John 3:16-21" --translation NIV
  lectionary run collision "Romans 8:18-30" -t MSG --collision-vector "Quantum entanglement"
  lectionary moravian threshold --length short --tone 7
  lectionary rcl palimpsest -r epistle --validate
  echo "In the beginning..." | lectionary paste threshold --reference "Genesis 1:1""#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an engine on pasted text.
    ///
    /// Text is read from stdin until a blank line or end of input.
    Paste {
        engine: EngineKind,
        /// Prompted for when omitted.
        #[arg(long)]
        reference: Option<String>,
    },

    /// Run an engine on text fetched from Bible Gateway.
    Run {
        engine: EngineKind,
        reference: String,
        #[arg(short, long)]
        translation: Option<Translation>,
    },

    /// Run an engine on today's Moravian Daily Texts (all passages).
    Moravian {
        engine: EngineKind,
        #[arg(long)]
        translation: Option<Translation>,
    },

    /// Run an engine on today's Revised Common Lectionary reading.
    ///
    /// RCL readings are listed for Sundays and major feast days.
    Rcl {
        engine: EngineKind,
        /// ot, psalm, epistle or gospel.
        #[arg(short, long, default_value = "gospel")]
        reading: ReadingType,
        #[arg(long)]
        translation: Option<Translation>,
    },

    /// Show the current configuration.
    Config,

    /// List saved studies.
    List,

    /// Display a saved study.
    Show { file: PathBuf },

    /// List collision vector options.
    Vectors {
        /// scientific, cultural, philosophical, technological or personal.
        category: Option<VectorCategory>,
    },
}

/// Per-study preferences from the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct PreferenceArgs {
    /// short, medium or long.
    #[arg(long, global = true)]
    pub length: Option<String>,

    /// 0 (academic) through 8 (devotional).
    #[arg(long, global = true)]
    pub tone: Option<i32>,

    /// accessible, standard or advanced.
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// Free-text focus areas.
    #[arg(long, global = true)]
    pub focus: Option<String>,

    /// 0 (none) through 10.
    #[arg(long = "cultural-artifacts", global = true)]
    pub cultural_artifacts: Option<i32>,
}

impl PreferenceArgs {
    pub fn is_set(&self) -> bool {
        self.length.is_some()
            || self.tone.is_some()
            || self.language.is_some()
            || self.focus.is_some()
            || self.cultural_artifacts.is_some()
    }

    /// `None` when no preference flag was given.
    pub fn to_preferences(&self) -> Result<Option<StudyPreferences>, PreferencesError> {
        if !self.is_set() {
            return Ok(None);
        }
        let overrides = json!({
            "study_length": self.length,
            "tone_level": self.tone,
            "language_complexity": self.language,
            "focus_areas": self.focus,
            "cultural_artifacts_level": self.cultural_artifacts,
        });
        StudyPreferences::overlay(StudyPreferences::default(), &overrides).map(Some)
    }
}

impl Command {
    /// The generation request for this command, if it generates one.
    ///
    /// `paste` requests carry no text yet.
    pub fn study_request(&self, options: GenerationOptions) -> Option<StudyRequest> {
        let request = match self {
            Self::Paste { engine, reference } => StudyRequest {
                engine: *engine,
                source: TextSource::Paste,
                reference: reference.clone(),
                ..Default::default()
            },
            Self::Run {
                engine,
                reference,
                translation,
            } => StudyRequest {
                engine: *engine,
                source: TextSource::Run,
                reference: Some(reference.clone()),
                translation: *translation,
                ..Default::default()
            },
            Self::Moravian {
                engine,
                translation,
            } => StudyRequest {
                engine: *engine,
                source: TextSource::Moravian,
                translation: *translation,
                ..Default::default()
            },
            Self::Rcl {
                engine,
                reading,
                translation,
            } => StudyRequest {
                engine: *engine,
                source: TextSource::Rcl,
                translation: *translation,
                reading: *reading,
                ..Default::default()
            },
            Self::Config | Self::List | Self::Show { .. } | Self::Vectors { .. } => return None,
        };
        Some(StudyRequest { options, ..request })
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load();
    let printer = Printer::new();

    let options = GenerationOptions {
        preferences: cli.preferences.to_preferences()?,
        collision_vector: cli.collision_vector.clone(),
        custom_vectors: None,
    };

    match &cli.command {
        Command::Config => {
            display::show_config(&printer, &config);
            return Ok(());
        }
        Command::List => {
            let studies = list_studies(&config.output_directory).context("Failed to list studies")?;
            display::show_saved(&printer, &studies);
            return Ok(());
        }
        Command::Show { file } => {
            let content = read_study(file).context("Failed to read study")?;
            display::show_study(&printer, None, &content);
            return Ok(());
        }
        Command::Vectors { category } => {
            display::show_vectors(&printer, &CollisionEngine::list_collision_vectors(*category));
            return Ok(());
        }
        _ => {}
    }

    let Some(mut request) = cli.command.study_request(options) else {
        return Ok(());
    };

    if !config.validate_api_key() {
        printer.info("Set ANTHROPIC_API_KEY in your .env file or environment");
        bail!("ANTHROPIC_API_KEY not found in environment");
    }

    if request.source == TextSource::Paste {
        let stdin = io::stdin();
        if request.reference.is_none() {
            print!("Biblical reference (e.g., 'John 3:16-21'): ");
            io::stdout().flush()?;
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            request.reference = Some(line.trim().to_string());
        }
        printer.print("Paste your biblical text below.", PrinterColor::Yellow);
        printer.info("Finish with a blank line or end of input (Ctrl+D).");
        let text = read_until_blank(stdin.lock())?;
        if text.is_empty() {
            bail!("No text provided");
        }
        request.text = Some(text);
    }

    let generator = StudyGeneratorService::from_config(&config);
    let engine = request.engine;
    printer.heading(&format!("Lectionary Engines: {}", engine.as_str().to_uppercase()));
    announce_fetch(&printer, &request);
    printer.print(&format!("Generating {} study...", engine), PrinterColor::BoldGreen);
    printer.info(&format!("This may take {}...", time_estimate(engine)));

    let generated = if cli.stream {
        let mut stdout = io::stdout();
        let mut on_delta = |delta: &str| {
            let _ = stdout.write_all(delta.as_bytes());
            let _ = stdout.flush();
        };
        let generated = generator
            .generate_study_streaming(&request, &mut on_delta)
            .await
            .context("Failed to generate study")?;
        println!();
        generated
    } else {
        let generated = generator
            .generate_study(&request)
            .await
            .context("Failed to generate study")?;
        display::show_study(&printer, Some(engine), &generated.study.content);
        generated
    };
    report_fetched(&printer, &generated);

    if cli.validate {
        printer.print("Validating study...", PrinterColor::Yellow);
        let study = &generated.study;
        let review = generator
            .run_validation(&generated.biblical_text, &study.reference, &study.content)
            .await;
        display::show_validation(&printer, &review);
    }

    match save_study(&generated.study, &config.output_directory) {
        Ok(path) => printer.success(&format!("Study saved to: {}", path.display())),
        Err(e) => printer.warning(&format!("Failed to save study: {}", e)),
    }
    Ok(())
}

fn announce_fetch(printer: &Printer, request: &StudyRequest) {
    let message = match request.source {
        TextSource::Paste => return,
        TextSource::Run => format!(
            "Fetching {} ({})...",
            request.reference.as_deref().unwrap_or_default(),
            request.translation.map(|t| t.name()).unwrap_or("default translation"),
        ),
        TextSource::Moravian => "Fetching today's Moravian Daily Text (all passages)...".to_string(),
        TextSource::Rcl => format!("Fetching today's RCL reading ({})...", request.reading),
    };
    printer.print(&message, PrinterColor::Yellow);
}

fn report_fetched(printer: &Printer, generated: &GeneratedStudy) {
    if generated.source == TextSource::Paste {
        return;
    }
    printer.success(&generated.study.reference);
    printer.success(&format!(
        "Studied {} words of {}",
        word_count(&generated.biblical_text),
        generated.translation
    ));
}

fn time_estimate(engine: EngineKind) -> &'static str {
    match engine {
        EngineKind::Threshold => "30-60 seconds",
        EngineKind::Palimpsest => "60-90 seconds",
        EngineKind::Collision => "90-120 seconds",
    }
}

/// Lines up to the first blank line after some input, or end of input.
fn read_until_blank<R: BufRead>(reader: R) -> io::Result<String> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() && !lines.is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use crate::preferences::StudyLength;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lectionary",
            "run",
            "collision",
            "Romans 8:18-30",
            "-t",
            "MSG",
            "--length",
            "long",
            "--collision-vector",
            "Quantum entanglement",
            "--stream",
        ])
        .unwrap();
        assert!(cli.stream);
        assert!(!cli.validate);
        assert_eq!(cli.collision_vector.as_deref(), Some("Quantum entanglement"));

        let prefs = cli.preferences.to_preferences().unwrap().unwrap();
        assert_eq!(prefs.study_length, StudyLength::Long);
        assert_eq!(prefs.tone_level, 5);

        let request = cli.command.study_request(GenerationOptions::default()).unwrap();
        assert_eq!(request.engine, EngineKind::Collision);
        assert_eq!(request.source, TextSource::Run);
        assert_eq!(request.translation, Some(Translation::MSG));
        assert_eq!(request.reference.as_deref(), Some("Romans 8:18-30"));
    }

    #[test]
    fn test_rcl_defaults_to_gospel() {
        let cli = Cli::try_parse_from(["lectionary", "rcl", "palimpsest"]).unwrap();
        let request = cli.command.study_request(GenerationOptions::default()).unwrap();
        assert_eq!(request.reading, ReadingType::Gospel);
        assert_eq!(request.translation, None);

        let cli = Cli::try_parse_from(["lectionary", "rcl", "threshold", "-r", "epistle"]).unwrap();
        let request = cli.command.study_request(GenerationOptions::default()).unwrap();
        assert_eq!(request.reading, ReadingType::Epistle);
    }

    #[test]
    fn test_invalid_values_rejected_by_parser() {
        assert!(Cli::try_parse_from(["lectionary", "run", "midrash", "John 1:1"]).is_err());
        assert!(Cli::try_parse_from(["lectionary", "run", "threshold", "John 1:1", "-t", "KJV"]).is_err());
        assert!(Cli::try_parse_from(["lectionary", "vectors", "culinary"]).is_err());
    }

    #[test]
    fn test_non_generating_commands_have_no_request() {
        let cli = Cli::try_parse_from(["lectionary", "list"]).unwrap();
        assert!(cli.command.study_request(GenerationOptions::default()).is_none());
    }

    #[test]
    fn test_preferences_unset_and_invalid() {
        assert_eq!(PreferenceArgs::default().to_preferences().unwrap(), None);

        let args = PreferenceArgs {
            tone: Some(9),
            ..Default::default()
        };
        assert!(matches!(
            args.to_preferences(),
            Err(PreferencesError::ToneLevel { .. })
        ));

        let args = PreferenceArgs {
            focus: Some("justice".into()),
            cultural_artifacts: Some(4),
            ..Default::default()
        };
        let prefs = args.to_preferences().unwrap().unwrap();
        assert_eq!(prefs.focus(), Some("justice"));
        assert_eq!(prefs.cultural_artifacts_level, 4);
    }

    #[test]
    fn test_read_until_blank() {
        let input = "\nFor God so loved\nthe world\n\nignored\n";
        assert_eq!(read_until_blank(input.as_bytes()).unwrap(), "For God so loved\nthe world");
        assert_eq!(read_until_blank("".as_bytes()).unwrap(), "");
    }
}
