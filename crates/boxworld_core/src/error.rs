//! Scene error types

use std::fmt;

use boxworld_physics::JointError;

use crate::scene::NodeKey;

/// Error raised by scene graph and component configuration operations
#[derive(Clone, Debug, PartialEq)]
pub enum SceneError {
    /// The key does not refer to a live node
    NodeNotFound(NodeKey),
    /// A dynamic rigid body was given a non-positive mass
    InvalidMass { node: String, mass: f32 },
    /// A joint could not be attached
    Joint(JointError),
    /// Re-parenting would make a node its own ancestor
    CyclicHierarchy { parent: String, child: String },
    /// A component rejected the node it was attached to
    Attach {
        node: String,
        component: String,
        message: String,
    },
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::NodeNotFound(key) => write!(f, "Node not found: {:?}", key),
            SceneError::InvalidMass { node, mass } => {
                write!(f, "Rigid body on '{}' needs a positive mass, got {}", node, mass)
            }
            SceneError::Joint(err) => write!(f, "Joint error: {}", err),
            SceneError::CyclicHierarchy { parent, child } => {
                write!(f, "Cannot parent '{}' under its own descendant '{}'", child, parent)
            }
            SceneError::Attach { node, component, message } => {
                write!(f, "Failed to attach '{}' to '{}': {}", component, node, message)
            }
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Joint(err) => Some(err),
            _ => None,
        }
    }
}

impl From<JointError> for SceneError {
    fn from(err: JointError) -> Self {
        SceneError::Joint(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        let err = SceneError::InvalidMass { node: "crate".into(), mass: 0.0 };
        assert!(err.to_string().contains("crate"));

        let err = SceneError::CyclicHierarchy { parent: "leaf".into(), child: "root".into() };
        assert_eq!(err.to_string(), "Cannot parent 'root' under its own descendant 'leaf'");
    }

    #[test]
    fn test_joint_error_converts_and_chains() {
        let err: SceneError = JointError::KinematicTarget.into();
        assert_eq!(err, SceneError::Joint(JointError::KinematicTarget));
        assert!(err.source().is_some());
        assert!(SceneError::NodeNotFound(NodeKey::default()).source().is_none());
    }
}
