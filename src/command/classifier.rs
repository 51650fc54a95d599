//! Command classifier - maps a command name to its catalog category

use gamepad_shared::{Action, CommandCatalog, Movement};

/// Category of a command name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Movement(Movement),
    Action(Action),
    Invalid,
}

/// Classify a command name against the catalog
///
/// Actions are checked before movements. Never fails: unknown names are `Invalid`.
pub fn classify(catalog: &CommandCatalog, name: &str) -> Classification {
    if let Some(action) = catalog.action(name) {
        return Classification::Action(action);
    }
    if let Some(movement) = catalog.movement(name) {
        return Classification::Movement(movement);
    }

    Classification::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_movements() {
        let catalog = CommandCatalog::standard();
        for movement in Movement::ALL {
            assert_eq!(
                classify(&catalog, movement.as_str()),
                Classification::Movement(movement)
            );
        }
    }

    #[test]
    fn test_classify_actions() {
        let catalog = CommandCatalog::standard();
        for action in Action::ALL {
            assert_eq!(
                classify(&catalog, action.as_str()),
                Classification::Action(action)
            );
        }
    }

    #[test]
    fn test_classify_invalid() {
        let catalog = CommandCatalog::standard();
        assert_eq!(classify(&catalog, "foo"), Classification::Invalid);
        assert_eq!(classify(&catalog, ""), Classification::Invalid);
        assert_eq!(classify(&catalog, "Left"), Classification::Invalid);
        // animation names are not commands on their own
        assert_eq!(classify(&catalog, "flipLeft"), Classification::Invalid);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let catalog = CommandCatalog::standard();
        for name in ["left", "animate", "bogus", "takeoffOrLand"] {
            assert_eq!(classify(&catalog, name), classify(&catalog, name));
        }
    }

    #[test]
    fn test_classify_respects_reduced_catalog() {
        let catalog = CommandCatalog::standard().without(&["up", "land"]).unwrap();
        assert_eq!(classify(&catalog, "up"), Classification::Invalid);
        assert_eq!(classify(&catalog, "land"), Classification::Invalid);
        assert_eq!(
            classify(&catalog, "down"),
            Classification::Movement(Movement::Down)
        );
    }
}
