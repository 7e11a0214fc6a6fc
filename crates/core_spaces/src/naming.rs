//! Default space names and recognition of auto-generated names.

use crate::directory::{DisplayDescriptor, SpaceDescriptor};
use regex::Regex;
use std::sync::OnceLock;

/// Label used when a space id cannot be found in the topology.
pub const FALLBACK_SPACE_NAME: &str = "Desktop";

/// Label used for full-screen application spaces.
pub const FULLSCREEN_SPACE_NAME: &str = "Fullscreen App";

/// Human-readable name of a display: "Main" or "Secondary N".
pub fn display_name(display: &DisplayDescriptor) -> String {
    if display.is_primary {
        "Main".to_string()
    } else {
        format!("Secondary {}", display.display_index)
    }
}

/// Default name of a user desktop, e.g. "Main Desktop 2".
pub fn desktop_name(space: &SpaceDescriptor) -> String {
    format!(
        "{} Desktop {}",
        display_name(&space.display),
        space.index_on_display
    )
}

fn auto_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            // "Desktop", "Desktop 3", "Main Desktop 3", "Secondary 1 Desktop 2", "Fullscreen App"
            Regex::new(r"^(?:(?:(?:Main|Secondary \d+) )?Desktop(?: \d+)?|Fullscreen App)$").ok()
        })
        .as_ref()
}

/// Whether `name` is in any form this engine generates on its own.
///
/// Only names that pass this check are replaced when a note changes space;
/// anything else was typed by the user and is kept.
pub fn is_auto_generated_name(name: &str) -> bool {
    auto_name_pattern().is_some_and(|re| re.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(is_primary: bool, index: usize) -> DisplayDescriptor {
        DisplayDescriptor {
            identifier: format!("display-{index}"),
            is_primary,
            display_index: index,
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name(&display(true, 0)), "Main");
        assert_eq!(display_name(&display(false, 1)), "Secondary 1");
        assert_eq!(display_name(&display(false, 2)), "Secondary 2");
    }

    #[test]
    fn test_desktop_name_format() {
        let space = SpaceDescriptor {
            space_id: 42,
            display: display(false, 1),
            index_on_display: 3,
        };
        assert_eq!(desktop_name(&space), "Secondary 1 Desktop 3");
    }

    #[test]
    fn test_auto_generated_names_recognized() {
        for name in [
            "Desktop",
            "Desktop 3",
            "Main Desktop 1",
            "Main Desktop 12",
            "Secondary 1 Desktop 2",
            "Fullscreen App",
        ] {
            assert!(is_auto_generated_name(name), "expected auto name: {name}");
        }
    }

    #[test]
    fn test_user_names_not_recognized() {
        for name in [
            "Work",
            "Focus Zone",
            "",
            "Desktop X",
            "My Desktop 3",
            "Desktop 3 notes",
            "Fullscreen",
        ] {
            assert!(!is_auto_generated_name(name), "expected user name: {name}");
        }
    }
}
