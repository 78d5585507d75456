// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The mergeable configuration layer produced by each source.

use serde::{Deserialize, Serialize};

use crate::sections::{
	CaptureConfigLayer, EmailConfigLayer, MonitoringConfigLayer, PathsConfigLayer,
	RetentionConfigLayer,
};

/// One source's view of the configuration. Later (higher-precedence)
/// layers overwrite only the fields they actually set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigLayer {
	pub email: Option<EmailConfigLayer>,
	pub monitoring: Option<MonitoringConfigLayer>,
	pub retention: Option<RetentionConfigLayer>,
	pub capture: Option<CaptureConfigLayer>,
	pub paths: Option<PathsConfigLayer>,
}

impl ConfigLayer {
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.email, other.email, EmailConfigLayer::merge);
		merge_section(
			&mut self.monitoring,
			other.monitoring,
			MonitoringConfigLayer::merge,
		);
		merge_section(
			&mut self.retention,
			other.retention,
			RetentionConfigLayer::merge,
		);
		merge_section(&mut self.capture, other.capture, CaptureConfigLayer::merge);
		merge_section(&mut self.paths, other.paths, PathsConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, overlay: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), overlay) {
		(Some(base), Some(overlay)) => merge(base, overlay),
		(None, Some(overlay)) => *base = Some(overlay),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_combines_sections_field_by_field() {
		let mut base = ConfigLayer {
			monitoring: Some(MonitoringConfigLayer {
				max_failures: Some(5),
				timezone: Some("UTC".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		let overlay = ConfigLayer {
			monitoring: Some(MonitoringConfigLayer {
				max_failures: Some(2),
				..Default::default()
			}),
			retention: Some(RetentionConfigLayer { days: Some(7) }),
			..Default::default()
		};

		base.merge(overlay);

		let monitoring = base.monitoring.unwrap();
		assert_eq!(monitoring.max_failures, Some(2));
		assert_eq!(monitoring.timezone, Some("UTC".to_string()));
		assert_eq!(base.retention.unwrap().days, Some(7));
	}
}
