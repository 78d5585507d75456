// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job table backends: the user crontab and read-only system sources.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use cronwatch_core::{Job, JobId, JobSource, ScheduleExpr};

use crate::error::{CrontabError, Result};
use crate::parse::{format_entry, parse_crontab};

/// A source of job entries.
///
/// Only the user crontab accepts wholesale `save`; system sources
/// reject it so a bug can never rewrite `/etc/crontab`. Installing a
/// single system entry goes through [`SystemCrontabs::add_cron_d`] or
/// [`SystemCrontabs::add_periodic`].
#[async_trait]
pub trait JobTable: Send + Sync {
	async fn load(&self) -> Result<Vec<Job>>;
	async fn save(&self, jobs: &[Job]) -> Result<()>;
}

/// The invoking user's crontab, accessed through the `crontab` binary
/// so we never guess at spool file locations.
pub struct UserCrontab;

impl UserCrontab {
	pub fn new() -> Self {
		Self
	}
}

impl Default for UserCrontab {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl JobTable for UserCrontab {
	async fn load(&self) -> Result<Vec<Job>> {
		let output = Command::new("crontab")
			.arg("-l")
			.output()
			.await
			.map_err(|e| {
				if e.kind() == std::io::ErrorKind::NotFound {
					warn!("crontab not found in PATH");
					CrontabError::CrontabNotInstalled
				} else {
					CrontabError::Io(e)
				}
			})?;

		if output.status.success() {
			let content = String::from_utf8_lossy(&output.stdout);
			let jobs = parse_crontab(&content, &JobSource::User, false);
			debug!(jobs_count = jobs.len(), "loaded user crontab");
			return Ok(jobs);
		}

		let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
		// `crontab -l` exits 1 when the user simply has no crontab yet.
		if stderr.contains("no crontab") {
			trace!("user has no crontab");
			return Ok(Vec::new());
		}
		if stderr.contains("not allowed") || stderr.contains("permission") {
			return Err(CrontabError::PermissionDenied("user crontab".to_string()));
		}
		Err(CrontabError::CommandFailed { stderr })
	}

	async fn save(&self, jobs: &[Job]) -> Result<()> {
		let mut content = String::new();
		for job in jobs {
			content.push_str(&format_entry(job));
			content.push('\n');
		}

		let mut child = Command::new("crontab")
			.arg("-")
			.stdin(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| {
				if e.kind() == std::io::ErrorKind::NotFound {
					CrontabError::CrontabNotInstalled
				} else {
					CrontabError::Io(e)
				}
			})?;

		if let Some(mut stdin) = child.stdin.take() {
			stdin.write_all(content.as_bytes()).await?;
		}

		let output = child.wait_with_output().await?;
		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
			return Err(CrontabError::CommandFailed { stderr });
		}

		debug!(jobs_count = jobs.len(), "wrote user crontab");
		Ok(())
	}
}

/// System cron sources: `/etc/crontab`, `/etc/cron.d/` and the periodic
/// `run-parts` directories. Paths are injectable for tests.
pub struct SystemCrontabs {
	pub etc_crontab: PathBuf,
	pub cron_d: PathBuf,
	pub periodic_root: PathBuf,
}

const PERIODS: [(&str, &str); 4] = [
	("hourly", "@hourly"),
	("daily", "@daily"),
	("weekly", "@weekly"),
	("monthly", "@monthly"),
];

impl SystemCrontabs {
	pub fn new() -> Self {
		Self {
			etc_crontab: PathBuf::from("/etc/crontab"),
			cron_d: PathBuf::from("/etc/cron.d"),
			periodic_root: PathBuf::from("/etc"),
		}
	}

	async fn load_etc_crontab(&self) -> Result<Vec<Job>> {
		match tokio::fs::read_to_string(&self.etc_crontab).await {
			Ok(content) => Ok(parse_crontab(&content, &JobSource::System, true)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
			Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(
				CrontabError::PermissionDenied(self.etc_crontab.display().to_string()),
			),
			Err(e) => Err(e.into()),
		}
	}

	async fn load_cron_d(&self) -> Result<Vec<Job>> {
		let mut jobs = Vec::new();
		let mut entries = match tokio::fs::read_dir(&self.cron_d).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(jobs),
			Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
				return Err(CrontabError::PermissionDenied(
					self.cron_d.display().to_string(),
				))
			}
			Err(e) => return Err(e.into()),
		};

		while let Some(entry) = entries.next_entry().await? {
			let name = entry.file_name().to_string_lossy().into_owned();
			// run-parts skips names with dots; so does cron for cron.d.
			if name.contains('.') {
				continue;
			}
			let content = match tokio::fs::read_to_string(entry.path()).await {
				Ok(content) => content,
				Err(e) => {
					warn!(file = %entry.path().display(), error = %e, "skipping unreadable cron.d file");
					continue;
				}
			};
			jobs.extend(parse_crontab(&content, &JobSource::CronD(name), true));
		}
		Ok(jobs)
	}

	/// Install a job entry in a `cron.d` file, creating the file if
	/// needed. The whole file is replaced in one rename, so a failed
	/// write leaves the previous content untouched.
	pub async fn add_cron_d(&self, file: &str, job: &Job) -> Result<()> {
		validate_name(file)?;
		let path = self.cron_d.join(file);
		map_denied(tokio::fs::create_dir_all(&self.cron_d).await, &self.cron_d)?;

		let mut content = match tokio::fs::read_to_string(&path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
			Err(e) => return Err(map_denied_err(e, &path)),
		};
		if !content.is_empty() && !content.ends_with('\n') {
			content.push('\n');
		}
		content.push_str(&format_entry(job));
		content.push('\n');

		replace_file(&self.cron_d, file, content.as_bytes(), 0o644).await?;
		debug!(file = %path.display(), job_id = %job.id, "installed cron.d entry");
		Ok(())
	}

	/// Install a run-parts script under `cron.<period>`. Refuses to
	/// overwrite an existing script.
	pub async fn add_periodic(&self, period: &str, name: &str, command: &str) -> Result<()> {
		if !PERIODS.iter().any(|(p, _)| *p == period) {
			return Err(CrontabError::UnknownPeriod(period.to_string()));
		}
		validate_name(name)?;
		let dir = self.periodic_root.join(format!("cron.{period}"));
		map_denied(tokio::fs::create_dir_all(&dir).await, &dir)?;

		let path = dir.join(name);
		match tokio::fs::metadata(&path).await {
			Ok(_) => return Err(CrontabError::AlreadyExists(path.display().to_string())),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(map_denied_err(e, &path)),
		}

		let script = format!("#!/bin/sh\n{command}\n");
		replace_file(&dir, name, script.as_bytes(), 0o755).await?;
		debug!(script = %path.display(), "installed periodic script");
		Ok(())
	}

	async fn load_periodic(&self) -> Result<Vec<Job>> {
		let mut jobs = Vec::new();
		for (period, alias) in PERIODS {
			let dir = self.periodic_root.join(format!("cron.{}", period));
			let mut entries = match tokio::fs::read_dir(&dir).await {
				Ok(entries) => entries,
				Err(_) => continue,
			};
			let schedule = match ScheduleExpr::parse(alias) {
				Ok(schedule) => schedule,
				Err(_) => continue,
			};
			while let Some(entry) = entries.next_entry().await? {
				let name = entry.file_name().to_string_lossy().into_owned();
				if name.contains('.') {
					continue;
				}
				let command = entry.path().display().to_string();
				jobs.push(Job {
					id: JobId::derived(&command, &schedule.as_crontab_field()),
					command,
					schedule: schedule.clone(),
					comment: None,
					enabled: true,
					source: JobSource::Periodic(period.to_string()),
					user: Some("root".to_string()),
				});
			}
		}
		Ok(jobs)
	}
}

impl Default for SystemCrontabs {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl JobTable for SystemCrontabs {
	async fn load(&self) -> Result<Vec<Job>> {
		let mut jobs = self.load_etc_crontab().await?;
		jobs.extend(self.load_cron_d().await?);
		jobs.extend(self.load_periodic().await?);
		debug!(jobs_count = jobs.len(), "loaded system cron sources");
		Ok(jobs)
	}

	async fn save(&self, _jobs: &[Job]) -> Result<()> {
		Err(CrontabError::ReadOnly("system crontab".to_string()))
	}
}

// cron skips cron.d and run-parts names containing dots, so a dotted
// name would install an entry that never fires.
fn validate_name(name: &str) -> Result<()> {
	let ok = !name.is_empty()
		&& name
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
	if ok {
		Ok(())
	} else {
		Err(CrontabError::InvalidName(name.to_string()))
	}
}

// Write beside the target and rename into place so readers never see a
// torn file; cron ignores the dotted temp name in the meantime.
async fn replace_file(dir: &Path, name: &str, content: &[u8], mode: u32) -> Result<()> {
	use std::os::unix::fs::PermissionsExt;

	let target = dir.join(name);
	let tmp = dir.join(format!(".{name}.tmp"));
	map_denied(tokio::fs::write(&tmp, content).await, &target)?;
	map_denied(
		tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(mode)).await,
		&target,
	)?;
	map_denied(tokio::fs::rename(&tmp, &target).await, &target)?;
	Ok(())
}

fn map_denied<T>(result: std::io::Result<T>, path: &Path) -> Result<T> {
	result.map_err(|e| map_denied_err(e, path))
}

fn map_denied_err(e: std::io::Error, path: &Path) -> CrontabError {
	if e.kind() == std::io::ErrorKind::PermissionDenied {
		CrontabError::PermissionDenied(path.display().to_string())
	} else {
		CrontabError::Io(e)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	fn system_in(dir: &TempDir) -> SystemCrontabs {
		SystemCrontabs {
			etc_crontab: dir.path().join("crontab"),
			cron_d: dir.path().join("cron.d"),
			periodic_root: dir.path().to_path_buf(),
		}
	}

	#[tokio::test]
	async fn missing_system_files_mean_no_jobs() {
		let dir = TempDir::new().unwrap();
		let jobs = system_in(&dir).load().await.unwrap();
		assert!(jobs.is_empty());
	}

	#[tokio::test]
	async fn loads_etc_crontab_with_user_column() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("crontab"),
			"SHELL=/bin/sh\n25 6 * * * root test -x /usr/sbin/anacron\n",
		)
		.unwrap();

		let jobs = system_in(&dir).load().await.unwrap();
		assert_eq!(jobs.len(), 1);
		assert_eq!(jobs[0].source, JobSource::System);
		assert_eq!(jobs[0].user.as_deref(), Some("root"));
	}

	#[tokio::test]
	async fn loads_cron_d_files_skipping_dotted_names() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join("cron.d")).unwrap();
		fs::write(
			dir.path().join("cron.d/certbot"),
			"0 */12 * * * root certbot renew -q\n",
		)
		.unwrap();
		fs::write(
			dir.path().join("cron.d/backup.rpmsave"),
			"0 1 * * * root /opt/old-backup.sh\n",
		)
		.unwrap();

		let jobs = system_in(&dir).load().await.unwrap();
		assert_eq!(jobs.len(), 1);
		assert_eq!(jobs[0].source, JobSource::CronD("certbot".to_string()));
		assert_eq!(jobs[0].command, "certbot renew -q");
	}

	#[tokio::test]
	async fn periodic_scripts_get_alias_schedules() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join("cron.daily")).unwrap();
		fs::write(dir.path().join("cron.daily/logrotate"), "#!/bin/sh\n").unwrap();

		let jobs = system_in(&dir).load().await.unwrap();
		assert_eq!(jobs.len(), 1);
		assert_eq!(jobs[0].source, JobSource::Periodic("daily".to_string()));
		assert_eq!(jobs[0].schedule.as_crontab_field(), "0 0 * * *");
		assert!(jobs[0].command.ends_with("cron.daily/logrotate"));
	}

	#[tokio::test]
	async fn system_sources_refuse_wholesale_writes() {
		let dir = TempDir::new().unwrap();
		let result = system_in(&dir).save(&[]).await;
		assert!(matches!(result, Err(CrontabError::ReadOnly(_))));
	}

	fn cron_d_job(id: &str) -> Job {
		Job {
			id: JobId::new(id).unwrap(),
			command: "/usr/sbin/logrotate /etc/logrotate.conf".to_string(),
			schedule: ScheduleExpr::parse("0 3 * * *").unwrap(),
			comment: None,
			enabled: true,
			source: JobSource::CronD("maint".to_string()),
			user: Some("root".to_string()),
		}
	}

	#[tokio::test]
	async fn cron_d_add_keeps_existing_entries() {
		let dir = TempDir::new().unwrap();
		let system = system_in(&dir);
		fs::create_dir(dir.path().join("cron.d")).unwrap();
		fs::write(
			dir.path().join("cron.d/maint"),
			"0 1 * * * root /opt/nightly.sh\n",
		)
		.unwrap();

		system.add_cron_d("maint", &cron_d_job("rotate")).await.unwrap();

		let jobs = system.load().await.unwrap();
		assert_eq!(jobs.len(), 2);
		assert!(jobs.iter().any(|j| j.command == "/opt/nightly.sh"));
		let added = jobs.iter().find(|j| j.id.as_str() == "rotate").unwrap();
		assert_eq!(added.user.as_deref(), Some("root"));
		assert_eq!(added.schedule.as_crontab_field(), "0 3 * * *");
	}

	#[tokio::test]
	async fn cron_d_add_creates_a_missing_file() {
		let dir = TempDir::new().unwrap();
		let system = system_in(&dir);

		system.add_cron_d("rotate", &cron_d_job("rotate")).await.unwrap();

		let jobs = system.load().await.unwrap();
		assert_eq!(jobs.len(), 1);
		assert_eq!(jobs[0].source, JobSource::CronD("rotate".to_string()));
		// No leftover temp file for the loader to trip over.
		let names: Vec<_> = fs::read_dir(dir.path().join("cron.d"))
			.unwrap()
			.map(|e| e.unwrap().file_name())
			.collect();
		assert_eq!(names, vec![std::ffi::OsString::from("rotate")]);
	}

	#[tokio::test]
	async fn cron_d_rejects_dotted_file_names() {
		let dir = TempDir::new().unwrap();
		let result = system_in(&dir)
			.add_cron_d("backup.rpmsave", &cron_d_job("rotate"))
			.await;
		assert!(matches!(result, Err(CrontabError::InvalidName(_))));
	}

	#[tokio::test]
	async fn periodic_add_writes_an_executable_script() {
		use std::os::unix::fs::PermissionsExt;

		let dir = TempDir::new().unwrap();
		let system = system_in(&dir);

		system
			.add_periodic("daily", "rotate", "/usr/sbin/logrotate /etc/logrotate.conf")
			.await
			.unwrap();

		let path = dir.path().join("cron.daily/rotate");
		let content = fs::read_to_string(&path).unwrap();
		assert!(content.starts_with("#!/bin/sh\n"));
		let mode = fs::metadata(&path).unwrap().permissions().mode();
		assert_eq!(mode & 0o111, 0o111);

		let jobs = system.load().await.unwrap();
		assert_eq!(jobs.len(), 1);
		assert_eq!(jobs[0].source, JobSource::Periodic("daily".to_string()));
	}

	#[tokio::test]
	async fn periodic_add_refuses_to_overwrite() {
		let dir = TempDir::new().unwrap();
		let system = system_in(&dir);
		system.add_periodic("daily", "rotate", "/bin/true").await.unwrap();

		let result = system.add_periodic("daily", "rotate", "/bin/false").await;
		assert!(matches!(result, Err(CrontabError::AlreadyExists(_))));
		assert_eq!(
			fs::read_to_string(dir.path().join("cron.daily/rotate")).unwrap(),
			"#!/bin/sh\n/bin/true\n"
		);
	}

	#[tokio::test]
	async fn periodic_add_rejects_unknown_periods() {
		let dir = TempDir::new().unwrap();
		let result = system_in(&dir)
			.add_periodic("fortnightly", "rotate", "/bin/true")
			.await;
		assert!(matches!(result, Err(CrontabError::UnknownPeriod(_))));
	}
}
