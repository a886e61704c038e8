use crate::authors::{Author, AuthorSet};
use crate::jenkins::adapter::{BuildRecord, BuildResult};
use serde::Serialize;
use std::fmt;

pub const RELEASE_NOTES_PARAMETER: &str = "releaseNotes";
const NO_CHANGES: &str = "*No changes.*\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Good,
    Danger,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Good => "good",
            Color::Danger => "danger",
        }
    }
}

/// The rendered notification: attachment color plus mrkdwn body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComposedMessage {
    pub color: Color,
    pub body: String,
}

/// Renders a build notification.
///
/// ```text
/// <job> - #<n>[ by <user>] Success|Failure after <secs> sec (<url|Open>)
/// *Changelog* (<url>changes|<n> commits>):      or      *No changes.*
/// • <author> [<k> commits]
/// *Release Notes*:
/// <notes>
/// ```
pub fn compose(
    job_display_name: &str,
    build: &BuildRecord,
    authors: &AuthorSet,
) -> ComposedMessage {
    let color = match build.result {
        BuildResult::Success => Color::Good,
        BuildResult::Failure | BuildResult::Other(_) => Color::Danger,
    };
    let body = Body {
        job_display_name,
        build,
        authors,
        color,
    }
    .to_string();

    ComposedMessage { color, body }
}

struct Body<'a> {
    job_display_name: &'a str,
    build: &'a BuildRecord,
    authors: &'a AuthorSet,
    color: Color,
}

impl fmt::Display for Body<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Body {
            job_display_name,
            build,
            authors,
            color,
        } = self;

        write!(
            f,
            "{} - #{}",
            escape(job_display_name),
            escape(&build.build_number)
        )?;

        if let Some(starter) = authors.starter() {
            write!(f, " by {}", mention(starter))?;
        }

        let outcome = match color {
            Color::Good => "Success",
            Color::Danger => "Failure",
        };
        writeln!(
            f,
            " {outcome} after {} sec (<{}|Open>)",
            build.duration_ms as f64 / 1000.0,
            build.url
        )?;

        if authors.is_empty() {
            f.write_str(NO_CHANGES)?;
        } else {
            writeln!(
                f,
                "*Changelog* (<{}changes|{}>):",
                build.url,
                commits(build.changelog.len())
            )?;

            for author in authors.members().filter(|a| a.commit_count > 0) {
                writeln!(
                    f,
                    "• {} [{}]",
                    mention(author),
                    commits(author.commit_count)
                )?;
            }
        }

        if let Some(notes) = build
            .parameter(RELEASE_NOTES_PARAMETER)
            .filter(|notes| !notes.is_empty())
        {
            writeln!(f, "*Release Notes*:\n{notes}")?;
        }

        Ok(())
    }
}

fn mention(author: &Author) -> String {
    match &author.chat_user_id {
        Some(id) => format!("<@{id}>"),
        None => escape(&author.name),
    }
}

fn commits(count: usize) -> String {
    match count {
        1 => "1 commit".to_string(),
        n => format!("{n} commits"),
    }
}

/// Escapes the characters the chat markup treats as control sequences.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
