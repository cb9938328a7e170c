use lattice_serde::{DataIStream, DataOStream, SerdeErr};

use super::change_type::ChangeType;

/// Application state that can be distributed as a versioned object.
///
/// The master serializes its state with `get_instance_data` (full snapshot)
/// or `pack` (change since the last commit). Slaves read the same bytes back
/// with `apply_instance_data` or `unpack`, in the same order.
pub trait Distributable: Send + Sync + 'static {
    fn change_type(&self) -> ChangeType {
        ChangeType::Instance
    }

    /// Whether anything changed since the last commit. A clean object is
    /// not committed.
    fn is_dirty(&self) -> bool {
        true
    }

    /// Called once a commit has serialized this object's changes
    fn clear_dirty(&mut self) {}

    fn get_instance_data(&self, writer: &mut DataOStream);

    fn apply_instance_data(&mut self, reader: &mut DataIStream) -> Result<(), SerdeErr>;

    fn pack(&self, writer: &mut DataOStream) {
        self.get_instance_data(writer);
    }

    fn unpack(&mut self, reader: &mut DataIStream) -> Result<(), SerdeErr> {
        self.apply_instance_data(reader)
    }
}
