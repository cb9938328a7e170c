/// How a distributed object's changes are transmitted
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ChangeType {
    /// Never changes after registration
    Static,
    /// Every commit sends the full instance data
    #[default]
    Instance,
    /// Commits send whatever `pack` writes
    Delta,
}
