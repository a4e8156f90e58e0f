//! Quality reconciliation between the proxy format list and engine representations
//!
//! The proxy advertises formats ahead of time; the engine only knows the
//! representations of the manifest it was actually given. Anonymous viewers
//! receive a manifest stripped of the gated formats, so those formats show up
//! in the menu as login-gated placeholders until authentication unlocks them.

use crate::{
    engine::Representation,
    types::{FormatItem, Quality},
};
use tracing::debug;

/// Format ids below this value require authentication for anonymous viewers
pub const LOGIN_FORMAT_THRESHOLD: u32 = 112;

/// Build the selectable quality menu.
///
/// A format carrying a codec string is resolvable: it maps onto the engine
/// representation with the matching numeric id, keyed by that
/// representation's index. A format without a codec string is only present
/// for anonymous viewers below the login threshold, keyed by its raw id
/// until a login refetch makes it resolvable.
pub fn build_quality_menu(
    formats: &[FormatItem],
    representations: &[Representation],
    logged_in: bool,
    login_threshold: u32,
) -> Vec<Quality> {
    let mut menu = Vec::new();

    for item in formats {
        if item.codec.is_some() {
            let matched = representations
                .iter()
                .find(|rep| rep.numeric_id() == Some(item.id));

            match matched {
                Some(rep) => menu.push(Quality {
                    index: rep.index as i32,
                    label: item.label.clone(),
                    id: item.id,
                    needs_login: false,
                }),
                None => {
                    debug!(format_id = item.id, "No engine representation for format");
                }
            }
        } else if !logged_in && item.id < login_threshold {
            menu.push(Quality {
                index: item.id as i32,
                label: item
                    .display_label
                    .clone()
                    .unwrap_or_else(|| item.label.clone()),
                id: item.id,
                needs_login: true,
            });
        }
    }

    debug!(
        formats = formats.len(),
        representations = representations.len(),
        menu = menu.len(),
        "Quality menu rebuilt"
    );

    menu
}

/// Resolve the label shown beneath the automatic indicator.
///
/// `None` when the engine has no current representation; otherwise the label
/// of the format whose id matches the representation's numeric id.
pub fn resolve_auto_label(
    formats: &[FormatItem],
    current: Option<&Representation>,
) -> Option<String> {
    let rep = current?;
    let id = rep.numeric_id()?;

    formats
        .iter()
        .find(|item| item.id == id)
        .map(|item| item.label.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(id: u32, label: &str, codec: Option<&str>) -> FormatItem {
        FormatItem {
            id,
            label: label.to_string(),
            display_label: None,
            codec: codec.map(str::to_string),
        }
    }

    fn representation(index: usize, id: &str) -> Representation {
        Representation {
            index,
            id: id.to_string(),
            bandwidth: 1_000_000,
            height: 720,
        }
    }

    #[test]
    fn test_resolvable_format_maps_to_representation_index() {
        let formats = vec![format(5, "720p", Some("avc1.64001f"))];
        let reps = vec![representation(0, "3"), representation(2, "5")];

        let menu = build_quality_menu(&formats, &reps, false, LOGIN_FORMAT_THRESHOLD);

        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].index, 2);
        assert_eq!(menu[0].id, 5);
        assert!(!menu[0].needs_login);
    }

    #[test]
    fn test_gated_format_below_threshold() {
        let formats = vec![format(50, "1080p", None)];

        let menu = build_quality_menu(&formats, &[], false, LOGIN_FORMAT_THRESHOLD);

        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].index, 50);
        assert!(menu[0].needs_login);
    }

    #[test]
    fn test_gated_format_above_threshold_is_dropped() {
        let formats = vec![format(150, "4K", None)];

        let menu = build_quality_menu(&formats, &[], false, LOGIN_FORMAT_THRESHOLD);

        assert!(menu.is_empty());
    }

    #[test]
    fn test_logged_in_viewer_sees_no_placeholders() {
        let formats = vec![format(50, "1080p", None)];

        let menu = build_quality_menu(&formats, &[], true, LOGIN_FORMAT_THRESHOLD);

        assert!(menu.is_empty());
    }

    #[test]
    fn test_unmatched_codec_format_is_dropped() {
        let formats = vec![format(7, "720p", Some("avc1.64001f"))];
        let reps = vec![representation(0, "3")];

        let menu = build_quality_menu(&formats, &reps, false, LOGIN_FORMAT_THRESHOLD);

        assert!(menu.is_empty());
    }

    #[test]
    fn test_gated_format_prefers_display_label() {
        let formats = vec![FormatItem {
            id: 50,
            label: "fhd".to_string(),
            display_label: Some("Full HD".to_string()),
            codec: None,
        }];

        let menu = build_quality_menu(&formats, &[], false, LOGIN_FORMAT_THRESHOLD);
        assert_eq!(menu[0].label, "Full HD");
    }

    #[test]
    fn test_auto_label_resolution() {
        let formats = vec![format(5, "720p", Some("avc1.64001f"))];

        assert_eq!(resolve_auto_label(&formats, None), None);

        let rep = representation(2, "5");
        assert_eq!(
            resolve_auto_label(&formats, Some(&rep)),
            Some("720p".to_string())
        );

        // Representation the proxy never advertised
        let rep = representation(0, "9");
        assert_eq!(resolve_auto_label(&formats, Some(&rep)), None);
    }
}
