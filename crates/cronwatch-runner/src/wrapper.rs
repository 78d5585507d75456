// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crontab command wrapping.
//!
//! A monitored job's crontab command is rewritten to invoke the
//! `cronwatch run` recorder, which executes the original command and
//! forwards its exit status. Wrapping is deterministic and reversible,
//! so applying it twice is a no-op and unwrapping recovers the original
//! command byte for byte.

use cronwatch_core::JobId;

const WRAP_PREFIX: &str = "cronwatch run --job ";

/// Rewrite a command to run under the recorder.
///
/// Already-wrapped commands are returned unchanged.
pub fn wrap_command(job_id: &JobId, command: &str) -> String {
	if is_wrapped(command) {
		return command.to_string();
	}
	format!("{}{} -- {}", WRAP_PREFIX, job_id, sh_quote(command))
}

/// Whether a crontab command already invokes the recorder.
pub fn is_wrapped(command: &str) -> bool {
	command.trim_start().starts_with(WRAP_PREFIX)
}

/// Recover the job id and original command from a wrapped command.
/// Returns `None` for commands not produced by [`wrap_command`].
pub fn unwrap_command(command: &str) -> Option<(JobId, String)> {
	let rest = command.trim().strip_prefix(WRAP_PREFIX)?;
	let (id, quoted) = rest.split_once(" -- ")?;
	let job_id: JobId = id.trim().parse().ok()?;
	let original = sh_unquote(quoted.trim())?;
	Some((job_id, original))
}

/// Quote a string for POSIX sh. Single quotes pass everything through
/// literally; an embedded single quote becomes `'\''`.
pub fn sh_quote(s: &str) -> String {
	if !s.is_empty()
		&& s.bytes().all(|b| {
			b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'/' | b'=' | b':')
		}) {
		return s.to_string();
	}
	let mut quoted = String::with_capacity(s.len() + 2);
	quoted.push('\'');
	for ch in s.chars() {
		if ch == '\'' {
			quoted.push_str("'\\''");
		} else {
			quoted.push(ch);
		}
	}
	quoted.push('\'');
	quoted
}

/// Invert [`sh_quote`]. Handles the unquoted safe-word case and the
/// single-quoted case with `'\''` escapes; anything else is rejected.
fn sh_unquote(s: &str) -> Option<String> {
	if !s.starts_with('\'') {
		// Unquoted form is only produced for safe words.
		if s.contains('\'') || s.contains(' ') {
			return None;
		}
		return Some(s.to_string());
	}

	let mut out = String::with_capacity(s.len());
	let mut rest = &s[1..];
	loop {
		let close = rest.find('\'')?;
		out.push_str(&rest[..close]);
		rest = &rest[close + 1..];
		if rest.is_empty() {
			return Some(out);
		}
		// A close followed by \'' is an escaped single quote.
		rest = rest.strip_prefix("\\''")?;
		out.push('\'');
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn job() -> JobId {
		JobId::new("backup").unwrap()
	}

	#[test]
	fn wraps_a_simple_command() {
		let wrapped = wrap_command(&job(), "/opt/backup.sh --full");
		assert_eq!(
			wrapped,
			"cronwatch run --job backup -- '/opt/backup.sh --full'"
		);
		assert!(is_wrapped(&wrapped));
	}

	#[test]
	fn wrapping_is_idempotent() {
		let once = wrap_command(&job(), "echo hi");
		let twice = wrap_command(&job(), &once);
		assert_eq!(once, twice);
	}

	#[test]
	fn unwrap_recovers_the_original() {
		let original = "psql -c \"select 'x'\" | grep -v '^$'";
		let wrapped = wrap_command(&job(), original);
		let (id, command) = unwrap_command(&wrapped).unwrap();
		assert_eq!(id, job());
		assert_eq!(command, original);
	}

	#[test]
	fn unwrap_rejects_plain_commands() {
		assert!(unwrap_command("/opt/backup.sh").is_none());
		assert!(unwrap_command("cronwatch run --job").is_none());
	}

	#[test]
	fn quotes_single_quotes() {
		assert_eq!(sh_quote("it's"), "'it'\\''s'");
		assert_eq!(sh_quote("safe/word.sh"), "safe/word.sh");
		assert_eq!(sh_quote(""), "''");
	}

	proptest! {
		#[test]
		fn wrap_unwrap_roundtrip(command in "[ -~]{1,80}") {
			let wrapped = wrap_command(&job(), &command);
			if let Some((id, recovered)) = unwrap_command(&wrapped) {
				prop_assert_eq!(id, job());
				prop_assert_eq!(recovered, command);
			} else {
				// Only commands that already look wrapped may fail to
				// roundtrip, and those are returned unchanged.
				prop_assert!(is_wrapped(&command));
			}
		}
	}
}
