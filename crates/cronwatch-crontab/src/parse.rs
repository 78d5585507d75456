// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crontab line parsing and rendering.
//!
//! Managed entries carry a trailing `# cronwatch:<id>` tag; entries
//! without a tag get a derived id hashed from their command and
//! schedule. A managed entry commented out with a leading `# ` is
//! treated as disabled rather than as prose.

use cronwatch_core::{Job, JobId, JobSource, ScheduleExpr};

const TAG_MARKER: &str = " # cronwatch:";

/// Parse a whole crontab file into jobs.
///
/// `with_user_field` selects the system crontab format, which carries a
/// user column between the schedule and the command. Environment
/// assignments, blank lines and ordinary comments are skipped.
pub fn parse_crontab(content: &str, source: &JobSource, with_user_field: bool) -> Vec<Job> {
	let mut jobs = Vec::new();
	for line in content.lines() {
		let trimmed = line.trim();
		if trimmed.is_empty() || is_env_assignment(trimmed) {
			continue;
		}

		if let Some(disabled) = trimmed.strip_prefix('#') {
			// Only a tagged entry is recognized as a disabled job;
			// everything else under a # is prose.
			let candidate = disabled.trim_start();
			if candidate.contains(TAG_MARKER.trim_start_matches(' ')) {
				if let Some(mut job) = parse_entry(candidate, source, with_user_field) {
					job.enabled = false;
					jobs.push(job);
					continue;
				}
			}
			continue;
		}

		if let Some(job) = parse_entry(trimmed, source, with_user_field) {
			jobs.push(job);
		}
	}
	jobs
}

/// Parse a single active crontab entry line. Returns `None` for lines
/// that are not job entries.
pub fn parse_entry(line: &str, source: &JobSource, with_user_field: bool) -> Option<Job> {
	let (schedule, mut rest) = split_schedule(line)?;

	let user = if with_user_field {
		let mut parts = rest.splitn(2, char::is_whitespace);
		let user = parts.next()?.to_string();
		rest = parts.next()?.trim_start();
		Some(user)
	} else {
		None
	};

	// The id tag is appended by us, so only the last occurrence counts.
	let (command, tag) = match rest.rfind(TAG_MARKER) {
		Some(pos) => (rest[..pos].trim_end(), Some(rest[pos + TAG_MARKER.len()..].trim())),
		None => (rest, None),
	};
	if command.is_empty() {
		return None;
	}

	let (id, comment) = match tag {
		Some(tag) => {
			let (id_text, comment) = match tag.split_once(char::is_whitespace) {
				Some((id_text, comment)) => (id_text, Some(comment.trim().to_string())),
				None => (tag, None),
			};
			let id = JobId::new(id_text).ok()?;
			(id, comment.filter(|c| !c.is_empty()))
		}
		None => (
			JobId::derived(command, &schedule.as_crontab_field()),
			None,
		),
	};

	Some(Job {
		id,
		command: command.to_string(),
		schedule,
		comment,
		enabled: true,
		source: source.clone(),
		user,
	})
}

/// Render a job back into a crontab line. Inverse of [`parse_entry`]
/// for managed entries.
pub fn format_entry(job: &Job) -> String {
	let mut line = String::new();
	if !job.enabled {
		line.push_str("# ");
	}
	line.push_str(&job.schedule.as_crontab_field());
	line.push(' ');
	if let Some(user) = &job.user {
		line.push_str(user);
		line.push(' ');
	}
	line.push_str(&job.command);
	line.push_str(TAG_MARKER);
	line.push_str(job.id.as_str());
	if let Some(comment) = &job.comment {
		line.push(' ');
		line.push_str(comment);
	}
	line
}

/// Split the schedule prefix (an `@`-alias or 5 fields) from the rest
/// of the line.
fn split_schedule(line: &str) -> Option<(ScheduleExpr, &str)> {
	if line.starts_with('@') {
		let (alias, rest) = line.split_once(char::is_whitespace)?;
		let schedule = ScheduleExpr::parse(alias).ok()?;
		return Some((schedule, rest.trim_start()));
	}

	let mut boundary = 0;
	let mut fields = 0;
	let mut in_field = false;
	for (i, ch) in line.char_indices() {
		if ch.is_whitespace() {
			if in_field {
				fields += 1;
				in_field = false;
			}
			if fields == 5 {
				boundary = i;
				break;
			}
		} else {
			in_field = true;
		}
	}
	if fields < 5 {
		return None;
	}

	let schedule = ScheduleExpr::parse(&line[..boundary]).ok()?;
	Some((schedule, line[boundary..].trim_start()))
}

/// `NAME=value` environment lines, legal in crontabs, are not entries.
fn is_env_assignment(line: &str) -> bool {
	match line.split_once('=') {
		Some((name, _)) => {
			!name.trim().is_empty()
				&& name
					.trim()
					.chars()
					.all(|c| c.is_ascii_alphanumeric() || c == '_')
		}
		None => false,
	}
}
