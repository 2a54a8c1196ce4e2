//! Command-line arguments.

use clap::{Parser, Subcommand};
use studio_core::types::DbId;

/// Side-by-side text generation and video jobs from the shell.
///
/// Service endpoints and models come from environment variables; see the
/// crate docs for the full table.
#[derive(Parser, Debug, Clone)]
#[command(name = "studio", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stream `input` through every configured model side by side.
    Compare {
        /// Text sent to every model.
        input: String,

        /// Instruction applied to the input.
        #[arg(default_value = "")]
        prompt: String,

        #[arg(long = "project", default_value_t = 1)]
        project_id: DbId,

        /// Save the selected column as a version under this name.
        #[arg(long = "save")]
        save_as: Option<String>,
    },
    /// Submit a text-to-video job and wait for it.
    Video {
        prompt: String,

        #[arg(long = "project", default_value_t = 1)]
        project_id: DbId,

        #[arg(long = "model", default_value = "video-default")]
        model_id: String,

        /// Number of attempts generated for the prompt.
        #[arg(long = "groups", default_value_t = 1)]
        group_count: u32,
    },
    /// List saved versions of a project.
    Versions {
        #[arg(default_value_t = 1)]
        project_id: DbId,
    },
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("studio").chain(args.iter().copied())).map(|cli| cli.command)
    }

    #[test]
    fn compare_with_save_and_project() {
        let cmd = parse(&["compare", "a scene", "--save", "v1", "make it tense", "--project", "7"]).unwrap();
        assert_eq!(
            cmd,
            Command::Compare {
                project_id: 7,
                input: "a scene".into(),
                prompt: "make it tense".into(),
                save_as: Some("v1".into()),
            }
        );
    }

    #[test]
    fn compare_prompt_defaults_to_empty() {
        assert_matches!(
            parse(&["compare", "a scene"]).unwrap(),
            Command::Compare { prompt, save_as: None, .. } if prompt.is_empty()
        );
    }

    #[test]
    fn video_defaults() {
        assert_matches!(
            parse(&["video", "waves"]).unwrap(),
            Command::Video { project_id: 1, group_count: 1, model_id, .. } if model_id == "video-default"
        );
    }

    #[test]
    fn video_flags() {
        assert_matches!(
            parse(&["video", "waves", "--model", "m2", "--groups", "4"]).unwrap(),
            Command::Video { group_count: 4, model_id, .. } if model_id == "m2"
        );
    }

    #[test]
    fn versions_takes_positional_project() {
        assert_eq!(parse(&["versions", "3"]).unwrap(), Command::Versions { project_id: 3 });
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["compare"]).is_err());
        assert!(parse(&["video", "p", "--groups", "many"]).is_err());
        assert!(parse(&["video", "p", "--bogus"]).is_err());
        assert!(parse(&["dance"]).is_err());
    }
}
