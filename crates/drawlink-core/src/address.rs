//! Parsing of the addresses drawings are shared under.

use crate::slug::Slug;

const DRAWING_PREFIX: &str = "/d/";

/// Where the caller's editor is currently pointed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DrawingAddress {
    /// Not addressing any persistent drawing
    #[default]
    Root,
    /// A slug-addressed drawing, e.g. `/d/team-roadmap`
    Drawing(Slug),
}

impl DrawingAddress {
    /// Parse a URL path. Anything that is not `/d/{valid slug}` is `Root`.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        path.strip_prefix(DRAWING_PREFIX)
            .map(|rest| rest.trim_end_matches('/'))
            .and_then(|rest| Slug::parse(rest).ok())
            .map(DrawingAddress::Drawing)
            .unwrap_or(DrawingAddress::Root)
    }

    pub fn slug(&self) -> Option<&Slug> {
        match self {
            DrawingAddress::Drawing(slug) => Some(slug),
            DrawingAddress::Root => None,
        }
    }

    /// Whether a load from this address was explicitly requested from outside
    pub fn is_external_reference(&self) -> bool {
        matches!(self, DrawingAddress::Drawing(_))
    }

    pub fn path(&self) -> String {
        match self {
            DrawingAddress::Drawing(slug) => format!("{}{}", DRAWING_PREFIX, slug),
            DrawingAddress::Root => "/".to_string(),
        }
    }
}

impl From<Slug> for DrawingAddress {
    fn from(slug: Slug) -> Self {
        DrawingAddress::Drawing(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let address = DrawingAddress::from_path("/d/team-roadmap");
        assert_eq!(address.slug().map(Slug::as_str), Some("team-roadmap"));
        assert!(address.is_external_reference());
        assert_eq!(address.path(), "/d/team-roadmap");

        assert_eq!(
            DrawingAddress::from_path("/d/team-roadmap/?open=1#x"),
            DrawingAddress::from_path("/d/team-roadmap")
        );
    }

    #[test]
    fn test_non_drawing_paths() {
        for path in ["/", "", "/d/", "/d/Bad Slug", "/drawings/plan", "/d/a/b"] {
            let address = DrawingAddress::from_path(path);
            assert_eq!(address, DrawingAddress::Root, "{path}");
            assert!(!address.is_external_reference());
        }
        assert_eq!(DrawingAddress::Root.path(), "/");
    }
}
