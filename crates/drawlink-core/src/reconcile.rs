//! Deciding how a freshly loaded drawing meets the caller's local scene.

use crate::address::DrawingAddress;
use crate::scene::{Scene, ViewState};

/// Outcome of the load policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Replace local content with the remote scene
    UseRemote,
    /// Local content would be lost; ask the caller first
    Confirm,
    /// Abandon the remote load and leave local content untouched
    KeepLocal { reset_address: bool },
}

/// Pure load policy.
///
/// `confirmed` is the caller's answer to a previous [`Reconciliation::Confirm`],
/// or `None` if nobody was asked yet. A load that was not triggered by an
/// external reference is the caller reopening its own drawing, so the remote
/// content is taken without asking.
pub fn decide(has_local_content: bool, is_external_reference: bool, confirmed: Option<bool>) -> Reconciliation {
    match (has_local_content, is_external_reference, confirmed) {
        (false, _, _) | (true, false, _) => Reconciliation::UseRemote,
        (true, true, None) => Reconciliation::Confirm,
        (true, true, Some(true)) => Reconciliation::UseRemote,
        (true, true, Some(false)) => Reconciliation::KeepLocal { reset_address: true },
    }
}

/// Merge view state, keeping the local viewing preferences.
///
/// Theme, grid and viewport come from `local` when it has them; the drawing's
/// own name and background come from `remote`.
pub fn merge_view(local: &ViewState, remote: ViewState) -> ViewState {
    ViewState {
        name: remote.name.or_else(|| local.name.clone()),
        theme: local.theme.or(remote.theme),
        view_background_color: remote
            .view_background_color
            .or_else(|| local.view_background_color.clone()),
        grid_size: local.grid_size.or(remote.grid_size),
        zoom: local.zoom.or(remote.zoom),
        scroll_x: local.scroll_x.or(remote.scroll_x),
        scroll_y: local.scroll_y.or(remote.scroll_y),
    }
}

/// Scene and address the caller should continue with
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub scene: Scene,
    pub address: DrawingAddress,
    /// Whether the remote scene was taken
    pub replaced: bool,
}

/// Apply a decision to the local and remote scenes.
///
/// `Confirm` leaves everything as it is; call [`decide`] again once the
/// caller has answered.
pub fn apply(decision: Reconciliation, local: Scene, remote: Scene, address: DrawingAddress) -> Reconciled {
    match decision {
        Reconciliation::UseRemote => {
            let view = merge_view(&local.view, remote.view);
            Reconciled {
                scene: Scene { view, ..remote },
                address,
                replaced: true,
            }
        }
        Reconciliation::Confirm => Reconciled {
            scene: local,
            address,
            replaced: false,
        },
        Reconciliation::KeepLocal { reset_address } => Reconciled {
            scene: local,
            address: if reset_address { DrawingAddress::Root } else { address },
            replaced: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Element, ElementKind, Theme};
    use crate::slug::Slug;

    fn scene_with(id: &str, view: ViewState) -> Scene {
        Scene::new(vec![Element::new(id, ElementKind::Rectangle, 0.0, 0.0)], view)
    }

    fn address() -> DrawingAddress {
        DrawingAddress::Drawing(Slug::parse("team-roadmap").unwrap())
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(decide(false, true, None), Reconciliation::UseRemote);
        assert_eq!(decide(false, false, None), Reconciliation::UseRemote);
        assert_eq!(decide(true, false, None), Reconciliation::UseRemote);
        assert_eq!(decide(true, true, None), Reconciliation::Confirm);
        assert_eq!(decide(true, true, Some(true)), Reconciliation::UseRemote);
        assert_eq!(
            decide(true, true, Some(false)),
            Reconciliation::KeepLocal { reset_address: true }
        );
    }

    #[test]
    fn test_local_theme_wins() {
        let local = ViewState {
            theme: Some(Theme::Dark),
            name: Some("scratch".into()),
            ..ViewState::default()
        };
        let remote = ViewState {
            theme: Some(Theme::Light),
            name: Some("Roadmap".into()),
            view_background_color: Some("#ffffff".into()),
            zoom: Some(2.0),
            ..ViewState::default()
        };

        let merged = merge_view(&local, remote);
        assert_eq!(merged.theme, Some(Theme::Dark));
        assert_eq!(merged.name.as_deref(), Some("Roadmap"));
        assert_eq!(merged.view_background_color.as_deref(), Some("#ffffff"));
        assert_eq!(merged.zoom, Some(2.0));
    }

    #[test]
    fn test_remote_theme_used_when_local_has_none() {
        let remote = ViewState {
            theme: Some(Theme::Light),
            ..ViewState::default()
        };
        assert_eq!(merge_view(&ViewState::default(), remote).theme, Some(Theme::Light));
    }

    #[test]
    fn test_decline_keeps_local_and_resets_address() {
        let local = scene_with("mine", ViewState::default());
        let remote = scene_with("theirs", ViewState::default());

        let decision = decide(local.has_content(), address().is_external_reference(), Some(false));
        let result = apply(decision, local.clone(), remote, address());

        assert!(!result.replaced);
        assert_eq!(result.scene, local);
        assert_eq!(result.address, DrawingAddress::Root);
    }

    #[test]
    fn test_empty_local_takes_remote() {
        let local = Scene {
            view: ViewState {
                theme: Some(Theme::Dark),
                ..ViewState::default()
            },
            ..Scene::default()
        };
        let remote = scene_with("theirs", ViewState::default());

        let decision = decide(local.has_content(), true, None);
        let result = apply(decision, local, remote, address());

        assert!(result.replaced);
        assert_eq!(result.scene.elements[0].id, "theirs");
        assert_eq!(result.scene.view.theme, Some(Theme::Dark));
        assert_eq!(result.address, address());
    }

    #[test]
    fn test_confirm_changes_nothing() {
        let local = scene_with("mine", ViewState::default());
        let result = apply(
            Reconciliation::Confirm,
            local.clone(),
            scene_with("theirs", ViewState::default()),
            address(),
        );
        assert_eq!(result.scene, local);
        assert_eq!(result.address, address());
    }
}
