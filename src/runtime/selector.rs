//! Version Selector List Builder.
//!
//! Turns the published version list (oldest first) into display entries,
//! most recent first, each labeled with a human-readable size. Hidden
//! versions are kept and flagged; the view decides how to treat them.

use crate::api::types::{VersionList, VersionTag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorEntry {
    /// "<name> - <size>"
    pub label: String,
    /// The version tag passed to install
    pub value: VersionTag,
    pub hidden: bool,
    pub name: String,
}

pub fn build_selector_entries(list: VersionList) -> Vec<SelectorEntry> {
    list.versions
        .into_iter()
        .rev()
        .map(|version| SelectorEntry {
            label: format!("{} - {}", version.name, human_file_size(version.size, true, 2)),
            value: version.tag,
            hidden: version.hidden,
            name: version.name,
        })
        .collect()
}

/// Format a byte count, e.g. `1.50 MB` (SI, powers of 1000) or `1.43 MiB`
/// (IEC, powers of 1024), with `dp` decimal places.
pub fn human_file_size(bytes: u64, si: bool, dp: usize) -> String {
    let thresh: f64 = if si { 1000.0 } else { 1024.0 };
    if (bytes as f64) < thresh {
        return format!("{bytes} B");
    }

    let units: [&str; 8] = if si {
        ["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"]
    } else {
        ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"]
    };
    let r = 10f64.powi(dp as i32);

    let mut value = bytes as f64;
    let mut unit = 0usize;
    loop {
        value /= thresh;
        if (value * r).round() / r < thresh || unit == units.len() - 1 {
            break;
        }
        unit += 1;
    }

    format!("{value:.dp$} {}", units[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::VersionDescriptor;

    fn version(tag: &str, name: &str, size: u64, hidden: bool) -> VersionDescriptor {
        VersionDescriptor {
            tag: tag.to_string(),
            name: name.to_string(),
            size,
            hidden,
        }
    }

    #[test]
    fn test_entries_are_most_recent_first() {
        let list = VersionList {
            versions: vec![
                version("v1.0", "First", 999, false),
                version("v1.1", "Beta", 2_500_000, true),
                version("v2.0", "Second", 1_234_567_890, false),
            ],
        };

        let entries = build_selector_entries(list);

        let tags: Vec<&str> = entries.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(tags, vec!["v2.0", "v1.1", "v1.0"]);
        assert_eq!(entries[0].label, "Second - 1.23 GB");
        assert_eq!(entries[1].label, "Beta - 2.50 MB");
        assert!(entries[1].hidden);
        assert_eq!(entries[2].label, "First - 999 B");
        assert_eq!(entries[2].name, "First");
    }

    #[test]
    fn test_human_file_size_units() {
        assert_eq!(human_file_size(0, true, 2), "0 B");
        assert_eq!(human_file_size(1000, true, 2), "1.00 kB");
        assert_eq!(human_file_size(1024, false, 1), "1.0 KiB");
        assert_eq!(human_file_size(1_500_000, true, 2), "1.50 MB");
        // Rounds up into the next unit instead of printing "1000.00 kB"
        assert_eq!(human_file_size(999_999, true, 2), "1.00 MB");
    }
}
