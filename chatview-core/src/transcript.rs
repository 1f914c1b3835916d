//! Plain-text conversation logs as persisted by the assistant service.
//!
//! ```text
//! User: what is the status?
//! Bot: **Status**: open
//! continuation of the answer
//!
//! User: thanks
//! Bot: you're welcome
//! ```
//!
//! Files are named `TE{n}_{YYYYMMDD}_{HHMMSS}.txt`; the name doubles as the
//! conversation identifier.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use walkdir::WalkDir;

use crate::error::{ChatviewError, Result};
use crate::model::RawTurnRecord;

const FILE_PREFIX: &str = "TE";
const FILE_SUFFIX: &str = ".txt";
const USER_LABEL: &str = "User:";
const BOT_LABEL: &str = "Bot:";

pub fn parse_transcript(text: &str) -> Vec<RawTurnRecord> {
    let mut records = Vec::new();
    let mut current = RawTurnRecord::default();
    let mut capturing_bot = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(user) = line.strip_prefix(USER_LABEL) {
            if current != RawTurnRecord::default() {
                records.push(std::mem::take(&mut current));
            }
            current.user = Some(user.trim().to_string());
            capturing_bot = false;
        } else if let Some(bot) = line.strip_prefix(BOT_LABEL) {
            current.bot = Some(bot.trim().to_string());
            capturing_bot = true;
        } else if capturing_bot && let Some(bot) = current.bot.as_mut() {
            bot.push(' ');
            bot.push_str(line);
        }
    }

    if current != RawTurnRecord::default() {
        records.push(current);
    }

    records
}

pub fn render_transcript(records: &[RawTurnRecord]) -> String {
    let mut output = String::new();
    for record in records {
        output.push_str(&format!(
            "{USER_LABEL} {}\n",
            record.user.as_deref().unwrap_or_default()
        ));
        output.push_str(&format!(
            "{BOT_LABEL} {}\n\n",
            record.bot.as_deref().unwrap_or_default()
        ));
    }
    output
}

pub fn read_transcript(path: &Path) -> Result<Vec<RawTurnRecord>> {
    let bytes = fs::read(path).map_err(|source| ChatviewError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(ChatviewError::EmptyTranscriptFile {
            path: path.to_path_buf(),
        });
    }

    let text = String::from_utf8(bytes).map_err(|_| ChatviewError::NonUtf8TranscriptFile {
        path: path.to_path_buf(),
    })?;
    Ok(parse_transcript(&text))
}

pub fn list_transcripts(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| ChatviewError::Io {
            path: dir.to_path_buf(),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if is_transcript_name(name) {
            names.push(name.to_string());
        }
    }

    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}

fn is_transcript_name(name: &str) -> bool {
    name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX)
}

fn transcript_number(name: &str) -> Option<u64> {
    name.strip_prefix(FILE_PREFIX)?
        .split('_')
        .next()?
        .parse()
        .ok()
}

pub fn next_transcript_name(dir: &Path, now: NaiveDateTime) -> Result<String> {
    let next = list_transcripts(dir)?
        .iter()
        .filter_map(|name| transcript_number(name))
        .max()
        .map_or(1, |max| max + 1);

    Ok(format!(
        "{FILE_PREFIX}{next}_{}{FILE_SUFFIX}",
        now.format("%Y%m%d_%H%M%S")
    ))
}

pub fn write_transcript(
    dir: &Path,
    records: &[RawTurnRecord],
    now: NaiveDateTime,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|source| ChatviewError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(next_transcript_name(dir, now)?);
    fs::write(&path, render_transcript(records)).map_err(|source| ChatviewError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

pub fn validate_conversation_id(id: &str) -> Result<()> {
    if id.trim().is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(ChatviewError::InvalidConversationId(id.to_string()));
    }
    Ok(())
}
